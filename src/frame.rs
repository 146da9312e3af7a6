// 该文件是 Lieying （猎影） 项目的一部分。
// src/frame.rs - RGB 帧缓冲与帧采样
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

use image::{
  RgbImage,
  imageops::{self, FilterType},
};
use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// NHWC 排列（行优先，通道交错）的 RGB 帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl RgbFrame {
  /// 创建全零帧
  pub fn with_shape(width: u32, height: u32) -> Self {
    let size = RGB_CHANNELS * (width as usize) * (height as usize);
    Self {
      width,
      height,
      data: vec![0u8; size].into_boxed_slice(),
    }
  }

  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = RGB_CHANNELS * (width as usize) * (height as usize);
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  pub fn pixel_count(&self) -> usize {
    (self.width as usize) * (self.height as usize)
  }

  pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    let idx = self.index(x, y);
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  pub fn put_pixel(&mut self, x: u32, y: u32, value: [u8; 3]) {
    let idx = self.index(x, y);
    self.data[idx..idx + RGB_CHANNELS].copy_from_slice(&value);
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    // 长度在构造时已校验
    RgbImage::from_raw(self.width, self.height, self.data.to_vec())
      .unwrap_or_else(|| RgbImage::new(self.width, self.height))
  }

  fn index(&self, x: u32, y: u32) -> usize {
    ((y as usize) * (self.width as usize) + (x as usize)) * RGB_CHANNELS
  }
}

impl From<RgbImage> for RgbFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

impl From<&RgbImage> for RgbFrame {
  fn from(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      data: image.as_raw().clone().into_boxed_slice(),
    }
  }
}

/// 帧采样器：把视频帧缩放到较小的工作分辨率，降低差分的计算量
#[derive(Debug, Clone, Copy)]
pub struct FrameSampler {
  width: u32,
  height: u32,
  filter: FilterType,
}

impl FrameSampler {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      width,
      height,
      filter: FilterType::Triangle,
    }
  }

  pub fn with_filter(mut self, filter: FilterType) -> Self {
    self.filter = filter;
    self
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  /// 采样一帧；尺寸已经一致时直接拷贝，不做插值
  pub fn sample(&self, image: &RgbImage) -> RgbFrame {
    if image.dimensions() == (self.width, self.height) {
      return RgbFrame::from(image);
    }

    RgbFrame::from(imageops::resize(
      image,
      self.width,
      self.height,
      self.filter,
    ))
  }
}
