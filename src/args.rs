// 该文件是 Lieying （猎影） 项目的一部分。
// src/args.rs - 运动检测参数配置
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

use std::path::PathBuf;

use clap::Args;

use crate::motion::{
  DEFAULT_MAX_REGIONS, DEFAULT_MIN_REGION_SIZE, DEFAULT_NOISE_THRESHOLD, DEFAULT_SAMPLE_HEIGHT,
  DEFAULT_SAMPLE_WIDTH, MotionConfig, RegionOrder,
};
use crate::output::{OverlayRenderer, load_font};

/// 各个程序共用的运动检测参数
#[derive(Args, Debug, Clone)]
pub struct MotionArgs {
  /// 采样宽度（像素）
  #[arg(long, default_value_t = DEFAULT_SAMPLE_WIDTH, value_name = "WIDTH")]
  pub sample_width: u32,

  /// 采样高度（像素）
  #[arg(long, default_value_t = DEFAULT_SAMPLE_HEIGHT, value_name = "HEIGHT")]
  pub sample_height: u32,

  /// 噪声阈值，RGB 三通道差之和必须大于该值
  #[arg(long, default_value_t = DEFAULT_NOISE_THRESHOLD, value_name = "THRESHOLD")]
  pub noise_threshold: u16,

  /// 区域最小宽高（采样像素）
  #[arg(long, default_value_t = DEFAULT_MIN_REGION_SIZE, value_name = "SIZE")]
  pub min_region_size: u32,

  /// 最多输出的区域数
  #[arg(long, default_value_t = DEFAULT_MAX_REGIONS, value_name = "COUNT")]
  pub max_regions: usize,

  /// 区域排序方式: discovery 或 intensity
  #[arg(long, default_value = "discovery", value_name = "ORDER")]
  pub order: RegionOrder,

  /// 标签字体（TrueType），不指定或读取失败时使用内置字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
}

impl MotionArgs {
  pub fn config(&self) -> MotionConfig {
    MotionConfig::default()
      .with_sample_size(self.sample_width, self.sample_height)
      .with_noise_threshold(self.noise_threshold)
      .with_min_region_size(self.min_region_size)
      .with_max_regions(self.max_regions)
      .with_order(self.order)
  }

  pub fn renderer(&self) -> OverlayRenderer {
    OverlayRenderer::new(load_font(self.font.as_deref()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;

  #[derive(Parser, Debug)]
  struct TestCli {
    #[command(flatten)]
    motion: MotionArgs,
  }

  #[test]
  fn defaults_match_motion_config() {
    let cli = TestCli::parse_from(["test"]);
    let config = cli.motion.config();
    let defaults = MotionConfig::default();
    assert_eq!(config.sample_width, defaults.sample_width);
    assert_eq!(config.sample_height, defaults.sample_height);
    assert_eq!(config.noise_threshold, 30);
    assert_eq!(config.min_region_size, 5);
    assert_eq!(config.max_regions, 10);
    assert_eq!(config.order, RegionOrder::Discovery);
  }

  #[test]
  fn parses_overrides() {
    let cli = TestCli::parse_from([
      "test",
      "--sample-width",
      "64",
      "--sample-height",
      "48",
      "--order",
      "intensity",
      "--max-regions",
      "3",
    ]);
    let config = cli.motion.config();
    assert_eq!((config.sample_width, config.sample_height), (64, 48));
    assert_eq!(config.order, RegionOrder::Intensity);
    assert_eq!(config.max_regions, 3);
  }
}
