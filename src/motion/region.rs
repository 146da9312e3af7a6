// 该文件是 Lieying （猎影） 项目的一部分。
// src/motion/region.rs - 连通区域提取
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

use std::{collections::VecDeque, str::FromStr};

use crate::motion::{DEFAULT_MAX_REGIONS, DEFAULT_MIN_REGION_SIZE, DifferenceMap, MotionArea};

/// 区域输出顺序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegionOrder {
  /// 按光栅扫描中首次发现的顺序
  #[default]
  Discovery,
  /// 按平均强度从高到低
  Intensity,
}

impl FromStr for RegionOrder {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "discovery" => Ok(RegionOrder::Discovery),
      "intensity" => Ok(RegionOrder::Intensity),
      other => Err(format!("未知的区域排序方式: {}", other)),
    }
  }
}

/// 区域提取器
///
/// 按光栅顺序扫描差分图，对每个未访问的非零像素做 4 邻接的广度优先填充，
/// 得到包围盒和平均强度。宽或高小于 `min_size` 的区域被丢弃，
/// 最多返回 `max_regions` 个区域。
#[derive(Debug, Clone, Copy)]
pub struct RegionExtractor {
  min_size: u32,
  max_regions: usize,
  order: RegionOrder,
}

impl Default for RegionExtractor {
  fn default() -> Self {
    Self::new(DEFAULT_MIN_REGION_SIZE, DEFAULT_MAX_REGIONS)
  }
}

impl RegionExtractor {
  pub fn new(min_size: u32, max_regions: usize) -> Self {
    Self {
      min_size,
      max_regions,
      order: RegionOrder::Discovery,
    }
  }

  pub fn with_order(mut self, order: RegionOrder) -> Self {
    self.order = order;
    self
  }

  pub fn extract(&self, map: &DifferenceMap) -> Vec<MotionArea> {
    let width = map.width() as usize;
    let height = map.height() as usize;
    let values = map.values();

    let mut visited = vec![false; values.len()];
    let mut queue = VecDeque::new();
    let mut areas = Vec::new();

    for start in 0..values.len() {
      if visited[start] || values[start] == 0 {
        continue;
      }
      // 按发现顺序截断时，后面的区域不会再被输出
      if self.order == RegionOrder::Discovery && areas.len() >= self.max_regions {
        break;
      }

      visited[start] = true;
      queue.push_back(start);

      let (mut min_x, mut min_y) = (start % width, start / width);
      let (mut max_x, mut max_y) = (min_x, min_y);
      let mut sum = 0u64;
      let mut count = 0u64;

      while let Some(idx) = queue.pop_front() {
        let (x, y) = (idx % width, idx / width);
        sum += values[idx] as u64;
        count += 1;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);

        let neighbors = [
          (x > 0).then(|| idx - 1),
          (x + 1 < width).then(|| idx + 1),
          (y > 0).then(|| idx - width),
          (y + 1 < height).then(|| idx + width),
        ];
        for next in neighbors.into_iter().flatten() {
          if !visited[next] && values[next] != 0 {
            visited[next] = true;
            queue.push_back(next);
          }
        }
      }

      let area_width = (max_x - min_x + 1) as u32;
      let area_height = (max_y - min_y + 1) as u32;
      if area_width < self.min_size || area_height < self.min_size {
        continue;
      }

      areas.push(MotionArea {
        x: min_x as u32,
        y: min_y as u32,
        width: area_width,
        height: area_height,
        intensity: (sum as f64 / count as f64) as f32,
      });
    }

    if self.order == RegionOrder::Intensity {
      // 稳定排序，强度相同时保持发现顺序
      areas.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
    }
    areas.truncate(self.max_regions);
    areas
  }
}
