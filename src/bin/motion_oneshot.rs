// 该文件是 Lieying （猎影） 项目的一部分。
// src/bin/motion_oneshot.rs - 两帧运动检测
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
  input::{InputWrapper, VideoSource},
  motion::MotionDetector,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};
use tracing::info;

/// 对前后两帧做一次运动检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源，只给一个来源时取它的前两帧
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 当前帧来源，与 `--input` 的第一帧比较
  #[arg(long, value_name = "SOURCE")]
  pub current: Option<Url>,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[command(flatten)]
  pub motion: MotionArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  if let Some(current) = &args.current {
    info!("当前帧来源: {}", current);
  }
  info!("输出路径: {}", args.output);

  let previous = InputWrapper::from_url(&args.input)?;
  let current = args
    .current
    .as_ref()
    .map(InputWrapper::from_url)
    .transpose()?;
  let frames = previous
    .frames()
    .chain(current.into_iter().flat_map(|source| source.frames()));

  let detector = MotionDetector::new(&args.motion.config())?;
  let output = OutputWrapper::from_url(&args.output)?;

  OneShotTask::new(args.motion.renderer()).run_task(frames, detector, output)?;

  Ok(())
}
