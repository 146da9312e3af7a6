// 该文件是 Lieying （猎影） 项目的一部分。
// src/motion/intensity.rs - 整体运动强度
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use crate::motion::DifferenceMap;

const INTENSITY_NORMALIZER: f64 = 10.0;
const INTENSITY_MAX: f64 = 100.0;

/// 整体运动强度：差分值总和除以 `像素数 * 10`，限制在 [0, 100]
pub fn overall_intensity(map: &DifferenceMap) -> f32 {
  let pixels = map.pixel_count();
  if pixels == 0 {
    return 0.0;
  }

  let sum: u64 = map.values().iter().map(|&v| v as u64).sum();
  (sum as f64 / (pixels as f64 * INTENSITY_NORMALIZER)).clamp(0.0, INTENSITY_MAX) as f32
}
