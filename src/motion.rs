// 该文件是 Lieying （猎影） 项目的一部分。
// src/motion.rs - 帧差分运动检测
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::frame::{FrameSampler, RgbFrame};

mod difference;
mod intensity;
mod region;

pub use self::difference::{DifferenceMap, Differencer};
pub use self::intensity::overall_intensity;
pub use self::region::{RegionExtractor, RegionOrder};

pub const DEFAULT_SAMPLE_WIDTH: u32 = 160;
pub const DEFAULT_SAMPLE_HEIGHT: u32 = 120;
pub const DEFAULT_NOISE_THRESHOLD: u16 = 30;
pub const DEFAULT_MIN_REGION_SIZE: u32 = 5;
pub const DEFAULT_MAX_REGIONS: usize = 10;

#[derive(Error, Debug)]
pub enum MotionError {
  #[error("帧尺寸不一致: 前一帧 {previous:?}, 当前帧 {current:?}")]
  DimensionMismatch {
    previous: (u32, u32),
    current: (u32, u32),
  },
  #[error("差分数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("配置无效: {0}")]
  InvalidConfig(String),
}

pub trait Detector {
  type Input;
  type Output;
  type Error;

  fn detect(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;

  /// 丢弃跨帧保留的状态
  fn reset(&mut self);
}

/// 运动区域，坐标位于采样空间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionArea {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
  /// 区域内差分值的均值
  pub intensity: f32,
}

impl MotionArea {
  pub fn centroid(&self) -> (f32, f32) {
    (
      self.x as f32 + self.width as f32 / 2.0,
      self.y as f32 + self.height as f32 / 2.0,
    )
  }
}

/// 一次检测的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionReport {
  pub areas: Box<[MotionArea]>,
  /// 整体运动强度，范围 [0, 100]
  pub intensity: f32,
  pub sample_width: u32,
  pub sample_height: u32,
}

impl MotionReport {
  pub fn empty(sample_width: u32, sample_height: u32) -> Self {
    Self {
      areas: Box::new([]),
      intensity: 0.0,
      sample_width,
      sample_height,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.areas.is_empty()
  }

  pub fn len(&self) -> usize {
    self.areas.len()
  }
}

#[derive(Debug, Clone)]
pub struct MotionConfig {
  pub sample_width: u32,
  pub sample_height: u32,
  pub noise_threshold: u16,
  pub min_region_size: u32,
  pub max_regions: usize,
  pub order: RegionOrder,
}

impl Default for MotionConfig {
  fn default() -> Self {
    Self {
      sample_width: DEFAULT_SAMPLE_WIDTH,
      sample_height: DEFAULT_SAMPLE_HEIGHT,
      noise_threshold: DEFAULT_NOISE_THRESHOLD,
      min_region_size: DEFAULT_MIN_REGION_SIZE,
      max_regions: DEFAULT_MAX_REGIONS,
      order: RegionOrder::default(),
    }
  }
}

impl MotionConfig {
  pub fn with_sample_size(mut self, width: u32, height: u32) -> Self {
    self.sample_width = width;
    self.sample_height = height;
    self
  }

  pub fn with_noise_threshold(mut self, threshold: u16) -> Self {
    self.noise_threshold = threshold;
    self
  }

  pub fn with_min_region_size(mut self, size: u32) -> Self {
    self.min_region_size = size;
    self
  }

  pub fn with_max_regions(mut self, max_regions: usize) -> Self {
    self.max_regions = max_regions;
    self
  }

  pub fn with_order(mut self, order: RegionOrder) -> Self {
    self.order = order;
    self
  }

  pub fn validate(&self) -> Result<(), MotionError> {
    if self.sample_width == 0 || self.sample_height == 0 {
      return Err(MotionError::InvalidConfig(format!(
        "采样分辨率必须大于 0, 实际为 {}x{}",
        self.sample_width, self.sample_height
      )));
    }
    if self.max_regions == 0 {
      return Err(MotionError::InvalidConfig(
        "最大区域数必须大于 0".to_string(),
      ));
    }
    Ok(())
  }
}

/// 帧差分运动检测器
///
/// 每次 [`Detector::detect`] 都会采样当前帧并与上一帧的采样做差分，
/// 之后把当前采样保存下来供下一帧使用。第一帧只做保存，不产生结果。
#[derive(Debug)]
pub struct MotionDetector {
  sampler: FrameSampler,
  differencer: Differencer,
  extractor: RegionExtractor,
  previous: Option<RgbFrame>,
}

impl MotionDetector {
  pub fn new(config: &MotionConfig) -> Result<Self, MotionError> {
    config.validate()?;
    info!(
      "创建运动检测器: 采样 {}x{}, 噪声阈值 {}, 最小区域 {}, 最多 {} 个区域, 排序 {:?}",
      config.sample_width,
      config.sample_height,
      config.noise_threshold,
      config.min_region_size,
      config.max_regions,
      config.order
    );

    Ok(Self {
      sampler: FrameSampler::new(config.sample_width, config.sample_height),
      differencer: Differencer::new(config.noise_threshold),
      extractor: RegionExtractor::new(config.min_region_size, config.max_regions)
        .with_order(config.order),
      previous: None,
    })
  }

  pub fn sampler(&self) -> &FrameSampler {
    &self.sampler
  }

  pub fn has_previous(&self) -> bool {
    self.previous.is_some()
  }

  /// 对两帧采样做一次完整的检测，不读写内部状态
  pub fn compare(&self, previous: &RgbFrame, current: &RgbFrame) -> Result<MotionReport, MotionError> {
    let map = self.differencer.diff(previous, current)?;
    let areas = self.extractor.extract(&map);
    let intensity = overall_intensity(&map);
    debug!(
      "差分完成: {} 个变化像素, {} 个区域, 强度 {:.2}",
      map.nonzero_count(),
      areas.len(),
      intensity
    );

    Ok(MotionReport {
      areas: areas.into_boxed_slice(),
      intensity,
      sample_width: map.width(),
      sample_height: map.height(),
    })
  }
}

impl Detector for MotionDetector {
  type Input = RgbImage;
  type Output = Option<MotionReport>;
  type Error = MotionError;

  fn detect(&mut self, input: &RgbImage) -> Result<Self::Output, Self::Error> {
    let current = self.sampler.sample(input);
    let report = match self.previous.as_ref() {
      Some(previous) => Some(self.compare(previous, &current)?),
      None => None,
    };
    self.previous = Some(current);
    Ok(report)
  }

  fn reset(&mut self) {
    self.previous = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn config_40() -> MotionConfig {
    MotionConfig::default().with_sample_size(40, 40)
  }

  #[test]
  fn first_frame_only_primes() {
    let mut detector = MotionDetector::new(&config_40()).unwrap();
    let frame = RgbImage::new(40, 40);
    assert!(detector.detect(&frame).unwrap().is_none());
    assert!(detector.has_previous());
    assert!(detector.detect(&frame).unwrap().is_some());
  }

  #[test]
  fn identical_frames_report_nothing() {
    let mut detector = MotionDetector::new(&config_40()).unwrap();
    let frame = RgbImage::from_pixel(40, 40, Rgb([90, 90, 90]));
    detector.detect(&frame).unwrap();
    let report = detector.detect(&frame).unwrap().unwrap();
    assert!(report.is_empty());
    assert_eq!(report.intensity, 0.0);
    assert_eq!((report.sample_width, report.sample_height), (40, 40));
  }

  #[test]
  fn detects_block_through_the_sampler() {
    let mut detector = MotionDetector::new(&config_40()).unwrap();
    let previous = RgbImage::new(40, 40);
    let mut current = RgbImage::new(40, 40);
    for y in 5..15 {
      for x in 5..15 {
        current.put_pixel(x, y, Rgb([200, 0, 0]));
      }
    }

    detector.detect(&previous).unwrap();
    let report = detector.detect(&current).unwrap().unwrap();
    assert_eq!(
      &*report.areas,
      &[MotionArea {
        x: 5,
        y: 5,
        width: 10,
        height: 10,
        intensity: 200.0,
      }]
    );
  }

  #[test]
  fn reset_forgets_previous_sample() {
    let mut detector = MotionDetector::new(&config_40()).unwrap();
    let frame = RgbImage::new(40, 40);
    detector.detect(&frame).unwrap();
    detector.reset();
    assert!(!detector.has_previous());
    assert!(detector.detect(&frame).unwrap().is_none());
  }

  #[test]
  fn rejects_zero_sample_size() {
    let config = MotionConfig::default().with_sample_size(0, 120);
    assert!(matches!(
      MotionDetector::new(&config),
      Err(MotionError::InvalidConfig(_))
    ));
  }

  #[test]
  fn centroid_is_box_center() {
    let area = MotionArea {
      x: 4,
      y: 10,
      width: 6,
      height: 8,
      intensity: 50.0,
    };
    assert_eq!(area.centroid(), (7.0, 14.0));
  }
}
