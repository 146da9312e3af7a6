// 该文件是 Lieying （猎影） 项目的一部分。
// src/task/scheduler.rs - 逐帧调度循环
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

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use image::RgbImage;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::{
  input::{PlaybackState, VideoSource},
  motion::{Detector, MotionReport},
  output::{MotionOverlay, OverlayCanvas, OverlayRenderer},
  tracker::{TrackingState, render_tracking},
};

/// 帧时钟：调度循环唯一的等待点
pub trait FrameClock {
  /// 阻塞到下一帧应当开始的时刻
  fn wait(&mut self);
}

/// 按固定帧率节拍的时钟，处理慢于节拍时不累积欠账
#[derive(Debug, Clone)]
pub struct IntervalClock {
  interval: Duration,
  last: Option<Instant>,
}

impl IntervalClock {
  pub fn new(interval: Duration) -> Self {
    Self {
      interval,
      last: None,
    }
  }

  /// 帧率不是正数时不做等待
  pub fn from_fps(fps: f64) -> Self {
    if fps.is_finite() && fps > 0.0 {
      Self::new(Duration::from_secs_f64(1.0 / fps))
    } else {
      Self::new(Duration::ZERO)
    }
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }
}

impl FrameClock for IntervalClock {
  fn wait(&mut self) {
    if let Some(last) = self.last {
      let elapsed = last.elapsed();
      if elapsed < self.interval {
        std::thread::sleep(self.interval - elapsed);
      }
    }
    self.last = Some(Instant::now());
  }
}

type ToggleCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// 运动检测开关，可在线程间共享
///
/// 状态真正改变时才调用回调。
#[derive(Clone)]
pub struct MotionToggle {
  enabled: Arc<AtomicBool>,
  on_change: Option<ToggleCallback>,
}

impl fmt::Debug for MotionToggle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MotionToggle")
      .field("enabled", &self.is_enabled())
      .field("on_change", &self.on_change.is_some())
      .finish()
  }
}

impl Default for MotionToggle {
  fn default() -> Self {
    Self::new(true)
  }
}

impl MotionToggle {
  pub fn new(enabled: bool) -> Self {
    Self {
      enabled: Arc::new(AtomicBool::new(enabled)),
      on_change: None,
    }
  }

  pub fn with_callback(mut self, callback: impl Fn(bool) + Send + Sync + 'static) -> Self {
    self.on_change = Some(Arc::new(callback));
    self
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled.load(Ordering::Acquire)
  }

  pub fn set(&self, enabled: bool) {
    let previous = self.enabled.swap(enabled, Ordering::AcqRel);
    if previous != enabled {
      info!("运动检测{}", if enabled { "开启" } else { "关闭" });
      if let Some(callback) = &self.on_change {
        callback(enabled);
      }
    }
  }

  pub fn toggle(&self) -> bool {
    let enabled = !self.is_enabled();
    self.set(enabled);
    enabled
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
  Idle,
  Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  Paused,
  Ended,
  NoDimensions,
  NoFrame,
}

/// 一次节拍的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
  /// 循环已停止
  Stopped,
  /// 检测被关闭
  Disabled,
  /// 本帧跳过，继续调度
  Skipped(SkipReason),
  /// 第一帧，只保存采样
  Primed,
  Processed { regions: usize, intensity: f32 },
}

/// 调度循环：每个节拍读取当前帧，做一次完整检测并刷新叠加层
///
/// 跟踪模拟的状态也由循环持有，每个处理过的节拍推进一步。
pub struct MotionLoop<V, D> {
  source: V,
  detector: D,
  renderer: OverlayRenderer,
  overlay: MotionOverlay,
  toggle: MotionToggle,
  state: LoopState,
  stopped: bool,
  was_enabled: bool,
  auto_fit: bool,
  tracking: Option<(TrackingState, StdRng)>,
  frame: Option<RgbImage>,
}

impl<V, D> MotionLoop<V, D>
where
  V: VideoSource,
  V::Error: std::error::Error + Send + Sync + 'static,
  D: Detector<Input = RgbImage, Output = Option<MotionReport>>,
  D::Error: std::error::Error + Send + Sync + 'static,
{
  /// 叠加画布默认跟随视频尺寸
  pub fn new(source: V, detector: D, renderer: OverlayRenderer) -> Self {
    let (width, height) = source.dimensions();
    Self {
      source,
      detector,
      renderer,
      overlay: MotionOverlay::new(OverlayCanvas::new(width, height)),
      toggle: MotionToggle::default(),
      state: LoopState::Idle,
      stopped: false,
      was_enabled: true,
      auto_fit: true,
      tracking: None,
      frame: None,
    }
  }

  pub fn with_toggle(mut self, toggle: MotionToggle) -> Self {
    self.toggle = toggle;
    self
  }

  /// 使用调用方给定尺寸的画布，不再跟随视频尺寸
  pub fn with_canvas(mut self, canvas: OverlayCanvas) -> Self {
    self.overlay = MotionOverlay::new(canvas);
    self.auto_fit = false;
    self
  }

  pub fn with_tracking(mut self, state: TrackingState, rng: StdRng) -> Self {
    self.tracking = Some((state, rng));
    self
  }

  pub fn toggle(&self) -> &MotionToggle {
    &self.toggle
  }

  pub fn state(&self) -> LoopState {
    self.state
  }

  pub fn overlay(&self) -> &MotionOverlay {
    &self.overlay
  }

  /// 最近一次取到的视频帧；检测关闭时为本节拍原样透传的帧
  pub fn frame(&self) -> Option<&RgbImage> {
    self.frame.as_ref()
  }

  pub fn tracking(&self) -> Option<&TrackingState> {
    self.tracking.as_ref().map(|(state, _)| state)
  }

  pub fn source(&self) -> &V {
    &self.source
  }

  pub fn source_mut(&mut self) -> &mut V {
    &mut self.source
  }

  /// 停止循环，之后的节拍都不再处理
  pub fn stop(&mut self) {
    if !self.stopped {
      info!("调度循环停止");
    }
    self.stopped = true;
    self.state = LoopState::Idle;
  }

  pub fn is_stopped(&self) -> bool {
    self.stopped
  }

  pub fn tick(&mut self) -> anyhow::Result<TickOutcome> {
    if self.stopped {
      return Ok(TickOutcome::Stopped);
    }

    if !self.toggle.is_enabled() {
      if self.was_enabled {
        debug!("检测关闭，丢弃上一帧并清空叠加层");
        self.detector.reset();
        self.clear_overlay();
        self.was_enabled = false;
      }
      self.state = LoopState::Idle;
      // 检测关闭时视频照常播放，帧不经检测直接透传
      self.frame = match self.source.playback_state() {
        PlaybackState::Playing => self.source.grab_frame()?,
        PlaybackState::Paused | PlaybackState::Ended => None,
      };
      return Ok(TickOutcome::Disabled);
    }
    self.was_enabled = true;

    match self.source.playback_state() {
      PlaybackState::Paused => return Ok(self.skip(SkipReason::Paused)),
      PlaybackState::Ended => return Ok(self.skip(SkipReason::Ended)),
      PlaybackState::Playing => {}
    }

    let (width, height) = self.source.dimensions();
    if width == 0 || height == 0 {
      return Ok(self.skip(SkipReason::NoDimensions));
    }

    let Some(frame) = self.source.grab_frame()? else {
      return Ok(self.skip(SkipReason::NoFrame));
    };
    if frame.width() == 0 || frame.height() == 0 {
      return Ok(self.skip(SkipReason::NoDimensions));
    }

    if self.state == LoopState::Idle {
      debug!("调度循环进入运行状态");
    }
    self.state = LoopState::Running;
    self.fit_canvas(frame.dimensions());

    let report = self.detector.detect(&frame)?;

    let outcome = match report {
      Some(report) => {
        self.renderer.render(
          &mut self.overlay.canvas,
          &report.areas,
          report.sample_width,
          report.sample_height,
        );
        let outcome = TickOutcome::Processed {
          regions: report.len(),
          intensity: report.intensity,
        };
        self.overlay.report = report;
        outcome
      }
      None => {
        self.clear_overlay();
        TickOutcome::Primed
      }
    };

    if let Some((state, rng)) = self.tracking.as_mut() {
      state.step(rng);
      render_tracking(&mut self.overlay.canvas, state, self.renderer.font());
    }

    self.frame = Some(frame);
    Ok(outcome)
  }

  fn skip(&mut self, reason: SkipReason) -> TickOutcome {
    if self.state == LoopState::Running {
      debug!("调度循环进入空闲状态: {:?}", reason);
    }
    self.state = LoopState::Idle;
    TickOutcome::Skipped(reason)
  }

  fn clear_overlay(&mut self) {
    self.overlay.canvas.clear();
    self.overlay.report = MotionReport::empty(0, 0);
  }

  fn fit_canvas(&mut self, dimensions: (u32, u32)) {
    if self.auto_fit && self.overlay.canvas.dimensions() != dimensions {
      debug!("叠加画布调整为 {}x{}", dimensions.0, dimensions.1);
      self.overlay.canvas = OverlayCanvas::new(dimensions.0, dimensions.1);
    }
  }
}
