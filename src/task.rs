// 该文件是 Lieying （猎影） 项目的一部分。
// src/task.rs - 任务定义
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

use std::{thread, time::Duration};

use image::RgbImage;
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info, warn};

use crate::{
  input::{PlaybackState, VideoSource},
  motion::{Detector, MotionReport},
  output::{MotionOverlay, OverlayCanvas, OverlayRenderer, Render},
  tracker::TrackingState,
};

mod scheduler;
pub use self::scheduler::{
  FrameClock, IntervalClock, LoopState, MotionLoop, MotionToggle, SkipReason, TickOutcome,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 取前两帧做一次检测，输出第二帧的标注结果
#[derive(Default)]
pub struct OneShotTask {
  renderer: OverlayRenderer,
}

impl OneShotTask {
  pub fn new(renderer: OverlayRenderer) -> Self {
    Self { renderer }
  }
}

fn next_pair<I: Iterator<Item = RgbImage>>(input: &mut I) -> anyhow::Result<(RgbImage, RgbImage)> {
  let previous = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
  let current = input
    .next()
    .ok_or_else(|| anyhow::anyhow!("只有一帧输入，至少需要两帧"))?;
  Ok((previous, current))
}

fn detect_pair<M>(model: &mut M, previous: &RgbImage, current: &RgbImage) -> anyhow::Result<MotionReport>
where
  M: Detector<Input = RgbImage, Output = Option<MotionReport>>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  model.reset();
  model.detect(previous)?;
  model
    .detect(current)?
    .ok_or_else(|| anyhow::anyhow!("检测器没有产生结果"))
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbImage>,
  M: Detector<Input = RgbImage, Output = Option<MotionReport>, Error = ME>,
  O: Render<RgbImage, MotionOverlay, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (previous, current) = next_pair(&mut input)?;
    info!("输入帧获取成功，开始检测...");
    let now = std::time::Instant::now();
    let report = detect_pair(&mut model, &previous, &current)?;
    let elapsed = now.elapsed();
    info!(
      "检测完成，耗时: {:.2?}，{} 个运动区域，强度 {:.2}",
      elapsed,
      report.len(),
      report.intensity
    );

    let mut overlay = MotionOverlay::new(OverlayCanvas::new(current.width(), current.height()));
    self.renderer.render(
      &mut overlay.canvas,
      &report.areas,
      report.sample_width,
      report.sample_height,
    );
    overlay.report = report;
    output.render_result(&current, &overlay)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一对帧反复检测并绘制，统计平均耗时
pub struct RepeatShotTask {
  renderer: OverlayRenderer,
  repeat_times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self::new(OverlayRenderer::default())
  }
}

impl RepeatShotTask {
  const REPEAT_TIMES: usize = 1000;

  pub fn new(renderer: OverlayRenderer) -> Self {
    Self {
      renderer,
      repeat_times: Self::REPEAT_TIMES,
    }
  }

  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times.max(1);
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbImage>,
  M: Detector<Input = RgbImage, Output = Option<MotionReport>, Error = ME>,
  O: Render<RgbImage, MotionOverlay, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (previous, current) = next_pair(&mut input)?;
    info!("输入帧获取成功，开始检测...");

    let mut overlay = MotionOverlay::new(OverlayCanvas::new(current.width(), current.height()));
    let mut times = Vec::with_capacity(self.repeat_times);
    for i in 0..self.repeat_times {
      let now = std::time::Instant::now();
      let report = detect_pair(&mut model, &previous, &current)?;
      self.renderer.render(
        &mut overlay.canvas,
        &report.areas,
        report.sample_width,
        report.sample_height,
      );
      overlay.report = report;
      let elapsed = now.elapsed();
      debug!("({})检测并绘制完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
    }

    output.render_result(&current, &overlay)?;
    info!("渲染完成，{} 个运动区域", overlay.report.len());

    // 前两次包含缓存预热，不计入平均
    let counted = if times.len() > 2 { &times[2..] } else { &times[..] };
    warn!(
      "平均检测时间: {:.2?}",
      counted.iter().sum::<Duration>() / counted.len() as u32
    );

    Ok(())
  }
}

/// 持续从视频源取帧，经调度循环检测后逐帧输出
#[derive(Default)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  fps: Option<f64>,
  ctrlc: bool,
  toggle: MotionToggle,
  renderer: OverlayRenderer,
  tracking_labels: Vec<String>,
  seed: Option<u64>,
}

impl ContinuousTask {
  pub fn new(renderer: OverlayRenderer) -> Self {
    Self {
      renderer,
      ..Default::default()
    }
  }

  /// 输出到指定帧数后退出，检测关闭时透传的帧也计入
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 节拍帧率，不指定时使用视频源的帧率
  pub fn with_fps(mut self, fps: Option<f64>) -> Self {
    self.fps = fps;
    self
  }

  /// 安装 Ctrl-C 处理函数，每个进程只能安装一次
  pub fn with_ctrlc(mut self, ctrlc: bool) -> Self {
    self.ctrlc = ctrlc;
    self
  }

  pub fn with_toggle(mut self, toggle: MotionToggle) -> Self {
    self.toggle = toggle;
    self
  }

  pub fn with_tracking(mut self, labels: Vec<String>, seed: Option<u64>) -> Self {
    self.tracking_labels = labels;
    self.seed = seed;
    self
  }

  fn install_ctrlc(&self) -> anyhow::Result<std::sync::mpsc::Receiver<()>> {
    let (tx, rx) = std::sync::mpsc::channel();
    if self.ctrlc {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }
    Ok(rx)
  }
}

impl<
  SE: std::error::Error + Sync + Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: VideoSource<Error = SE>,
  M: Detector<Input = RgbImage, Output = Option<MotionReport>, Error = ME>,
  O: Render<RgbImage, MotionOverlay, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let rx = self.install_ctrlc()?;

    let mut clock = IntervalClock::from_fps(self.fps.or(input.fps()).unwrap_or(0.0));
    info!("节拍间隔: {:.2?}", clock.interval());

    let mut motion = MotionLoop::new(input, model, self.renderer).with_toggle(self.toggle);
    if !self.tracking_labels.is_empty() {
      let mut rng = match self.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
      };
      let state = TrackingState::spawn(&self.tracking_labels, &mut rng);
      motion = motion.with_tracking(state, rng);
    }

    let mut frame_index = 0usize;
    loop {
      clock.wait();
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        motion.stop();
      }

      let now = std::time::Instant::now();
      match motion.tick()? {
        TickOutcome::Stopped => break,
        TickOutcome::Skipped(SkipReason::Ended) => {
          info!("视频源播放结束");
          motion.stop();
          break;
        }
        TickOutcome::Skipped(_) => continue,
        TickOutcome::Disabled => {
          if motion.frame().is_none() {
            if motion.source().playback_state() == PlaybackState::Ended {
              info!("视频源播放结束");
              motion.stop();
              break;
            }
            continue;
          }
          debug!("检测关闭，原样输出");
        }
        TickOutcome::Primed => debug!("保存首帧采样"),
        TickOutcome::Processed { regions, intensity } => {
          info!(
            "第 {} 帧: {} 个运动区域，强度 {:.2}",
            frame_index + 1,
            regions,
            intensity
          );
        }
      }
      let elapsed_a = now.elapsed();

      if let Some(frame) = motion.frame() {
        output.render_result(frame, motion.overlay())?;
      }
      let elapsed_b = now.elapsed();
      debug!("检测完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);

      frame_index = frame_index.wrapping_add(1);
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        motion.stop();
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  #[cfg(feature = "read_image_file")]
  use crate::input::ImageFileInput;
  use crate::motion::{MotionConfig, MotionDetector};
  use image::Rgb;
  use std::cell::RefCell;
  use std::convert::Infallible;

  #[derive(Default)]
  struct Collect {
    reports: RefCell<Vec<MotionReport>>,
  }

  impl Render<RgbImage, MotionOverlay> for &Collect {
    type Error = Infallible;

    fn render_result(&self, _frame: &RgbImage, result: &MotionOverlay) -> Result<(), Self::Error> {
      self.reports.borrow_mut().push(result.report.clone());
      Ok(())
    }
  }

  fn detector() -> MotionDetector {
    MotionDetector::new(&MotionConfig::default().with_sample_size(40, 40)).unwrap()
  }

  fn block_frame() -> RgbImage {
    let mut image = RgbImage::new(40, 40);
    for y in 5..15 {
      for x in 5..15 {
        image.put_pixel(x, y, Rgb([0, 200, 0]));
      }
    }
    image
  }

  #[test]
  fn one_shot_reports_the_changed_block() {
    let collect = Collect::default();
    let frames = vec![RgbImage::new(40, 40), block_frame()];
    OneShotTask::new(OverlayRenderer::new(None))
      .run_task(frames.into_iter(), detector(), &collect)
      .unwrap();

    let reports = collect.reports.borrow();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].len(), 1);
    let area = reports[0].areas[0];
    assert_eq!((area.x, area.y, area.width, area.height), (5, 5, 10, 10));
    assert_eq!(area.intensity, 200.0);
  }

  #[test]
  fn one_shot_needs_two_frames() {
    let collect = Collect::default();
    let result = OneShotTask::new(OverlayRenderer::new(None)).run_task(
      vec![RgbImage::new(40, 40)].into_iter(),
      detector(),
      &collect,
    );
    assert!(result.is_err());
    assert!(collect.reports.borrow().is_empty());
  }

  #[test]
  fn repeat_shot_renders_once() {
    let collect = Collect::default();
    let frames = vec![RgbImage::new(40, 40), block_frame()];
    RepeatShotTask::new(OverlayRenderer::new(None))
      .with_repeat_times(5)
      .run_task(frames.into_iter(), detector(), &collect)
      .unwrap();

    let reports = collect.reports.borrow();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].len(), 1);
  }

  #[cfg(feature = "read_image_file")]
  #[test]
  fn continuous_stops_when_source_ends() {
    let collect = Collect::default();
    let input = ImageFileInput::from_image(block_frame());
    ContinuousTask::new(OverlayRenderer::new(None))
      .run_task(input, detector(), &collect)
      .unwrap();

    // 单张图片只能保存首帧采样
    let reports = collect.reports.borrow();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_empty());
  }

  #[cfg(feature = "read_image_file")]
  #[test]
  fn disabled_continuous_task_still_finishes() {
    let collect = Collect::default();
    ContinuousTask::new(OverlayRenderer::new(None))
      .with_toggle(MotionToggle::new(false))
      .run_task(ImageFileInput::from_image(block_frame()), detector(), &collect)
      .unwrap();
    // 检测关闭时原图透传，叠加层为空
    let reports = collect.reports.borrow();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_empty());
    drop(reports);

    let collect = Collect::default();
    ContinuousTask::new(OverlayRenderer::new(None))
      .with_toggle(MotionToggle::new(false))
      .with_frame_number(Some(2))
      .run_task(
        ImageFileInput::from_image(block_frame()).with_hold(true),
        detector(),
        &collect,
      )
      .unwrap();
    assert_eq!(collect.reports.borrow().len(), 2);
  }

  #[cfg(feature = "read_image_file")]
  #[test]
  fn continuous_respects_frame_number() {
    let collect = Collect::default();
    let input = ImageFileInput::from_image(block_frame()).with_hold(true);
    ContinuousTask::new(OverlayRenderer::new(None))
      .with_frame_number(Some(3))
      .with_tracking(vec!["fox".to_string()], Some(9))
      .run_task(input, detector(), &collect)
      .unwrap();

    let reports = collect.reports.borrow();
    assert_eq!(reports.len(), 3);
    // 同一张图反复出现，没有运动
    assert!(reports.iter().all(|r| r.is_empty()));
  }
}
