// 该文件是 Lieying （猎影） 项目的一部分。
// src/bin/motion_continueshot.rs - 持续运动检测
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use lieying::{
  FromUrl,
  args::MotionArgs,
  input::InputWrapper,
  motion::MotionDetector,
  output::OutputWrapper,
  task::{ContinuousTask, MotionToggle, Task},
};
use tracing::info;

/// 持续检测视频源中的运动
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  /// 节拍帧率，默认跟随输入
  #[arg(long, value_name = "FPS")]
  pub fps: Option<f64>,

  /// 启动时关闭检测
  #[arg(long)]
  pub disabled: bool,

  /// 模拟跟踪的目标标签，逗号分隔
  #[arg(long, value_name = "LABELS", value_delimiter = ',')]
  pub track: Vec<String>,

  /// 跟踪模拟的随机种子
  #[arg(long, value_name = "SEED")]
  pub seed: Option<u64>,

  #[command(flatten)]
  pub motion: MotionArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let detector = MotionDetector::new(&args.motion.config())?;
  let output = OutputWrapper::from_url(&args.output)?;

  ContinuousTask::new(args.motion.renderer())
    .with_frame_number(args.frame_number)
    .with_fps(args.fps)
    .with_ctrlc(true)
    .with_toggle(MotionToggle::new(!args.disabled))
    .with_tracking(args.track, args.seed)
    .run_task(input, detector, output)?;

  Ok(())
}
