// 该文件是 Lieying （猎影） 项目的一部分。
// src/motion/difference.rs - 逐像素差分
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

use crate::{
  frame::{RGB_CHANNELS, RgbFrame},
  motion::{DEFAULT_NOISE_THRESHOLD, MotionError},
};

/// 差分图：每个像素一个标量，低于噪声阈值的像素为 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferenceMap {
  width: u32,
  height: u32,
  values: Box<[u16]>,
}

impl DifferenceMap {
  pub fn from_values(width: u32, height: u32, values: Vec<u16>) -> Result<Self, MotionError> {
    let expected = (width as usize) * (height as usize);
    if values.len() != expected {
      return Err(MotionError::LengthMismatch {
        expected,
        actual: values.len(),
      });
    }

    Ok(Self {
      width,
      height,
      values: values.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn pixel_count(&self) -> usize {
    self.values.len()
  }

  pub fn values(&self) -> &[u16] {
    &self.values
  }

  pub fn get(&self, x: u32, y: u32) -> u16 {
    self.values[(y as usize) * (self.width as usize) + (x as usize)]
  }

  pub fn nonzero_count(&self) -> usize {
    self.values.iter().filter(|&&v| v != 0).count()
  }
}

/// 差分器
#[derive(Debug, Clone, Copy)]
pub struct Differencer {
  threshold: u16,
}

impl Default for Differencer {
  fn default() -> Self {
    Self::new(DEFAULT_NOISE_THRESHOLD)
  }
}

impl Differencer {
  pub fn new(threshold: u16) -> Self {
    Self { threshold }
  }

  pub fn threshold(&self) -> u16 {
    self.threshold
  }

  /// 计算 R、G、B 三个通道绝对差之和，严格大于阈值才保留
  pub fn diff(&self, previous: &RgbFrame, current: &RgbFrame) -> Result<DifferenceMap, MotionError> {
    if previous.dimensions() != current.dimensions() {
      return Err(MotionError::DimensionMismatch {
        previous: previous.dimensions(),
        current: current.dimensions(),
      });
    }

    let values = previous
      .as_nhwc()
      .chunks_exact(RGB_CHANNELS)
      .zip(current.as_nhwc().chunks_exact(RGB_CHANNELS))
      .map(|(p, c)| {
        let sum: u16 = p
          .iter()
          .zip(c)
          .map(|(&a, &b)| a.abs_diff(b) as u16)
          .sum();
        if sum > self.threshold { sum } else { 0 }
      })
      .collect();

    DifferenceMap::from_values(previous.width(), previous.height(), values)
  }
}
