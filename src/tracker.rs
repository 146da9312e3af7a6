// 该文件是 Lieying （猎影） 项目的一部分。
// src/tracker.rs - 模拟跟踪叠加层
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

//! 装饰性的目标跟踪效果。
//!
//! 目标的位置和置信度只是随机游走，并不来自真实检测。状态由调度循环持有，
//! 每帧调用一次 [`TrackingState::step`]，再交给 [`render_tracking`] 绘制。

use ab_glyph::{FontArc, PxScale};
use image::Rgba;
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use rand::Rng;

use crate::output::OverlayCanvas;

const MAX_SPEED: f32 = 0.02;
const VELOCITY_JITTER: f32 = 0.004;
const CONFIDENCE_JITTER: f32 = 0.02;
const MIN_CONFIDENCE: f32 = 0.5;
const MAX_CONFIDENCE: f32 = 0.99;
const DEFAULT_TARGET_SIZE: f32 = 0.2;
/// 角标长度占框边长的比例
const BRACKET_RATIO: f32 = 0.25;
const TRACK_COLOR: [u8; 3] = [255, 200, 0]; // 琥珀色
const TRACK_FONT_SIZE: f32 = 14.0;
const TRACK_TEXT_HEIGHT: f32 = 16.0;

/// 一个被“跟踪”的目标，坐标均为相对画布的归一化值
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTarget {
  pub label: String,
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
  pub vx: f32,
  pub vy: f32,
  pub confidence: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingState {
  targets: Vec<TrackedTarget>,
  tick: u64,
}

impl TrackingState {
  pub fn new(targets: Vec<TrackedTarget>) -> Self {
    Self { targets, tick: 0 }
  }

  /// 为每个标签在随机位置生成一个目标
  pub fn spawn<R: Rng + ?Sized>(labels: &[String], rng: &mut R) -> Self {
    let targets = labels
      .iter()
      .map(|label| TrackedTarget {
        label: label.clone(),
        x: rng.gen_range(0.0..=1.0 - DEFAULT_TARGET_SIZE),
        y: rng.gen_range(0.0..=1.0 - DEFAULT_TARGET_SIZE),
        width: DEFAULT_TARGET_SIZE,
        height: DEFAULT_TARGET_SIZE,
        vx: rng.gen_range(-MAX_SPEED..=MAX_SPEED),
        vy: rng.gen_range(-MAX_SPEED..=MAX_SPEED),
        confidence: rng.gen_range(MIN_CONFIDENCE..=MAX_CONFIDENCE),
      })
      .collect();
    Self::new(targets)
  }

  pub fn targets(&self) -> &[TrackedTarget] {
    &self.targets
  }

  pub fn tick(&self) -> u64 {
    self.tick
  }

  /// 推进一帧：扰动速度、移动、在边缘反弹，置信度随机游走
  pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    for target in &mut self.targets {
      target.vx =
        (target.vx + rng.gen_range(-VELOCITY_JITTER..=VELOCITY_JITTER)).clamp(-MAX_SPEED, MAX_SPEED);
      target.vy =
        (target.vy + rng.gen_range(-VELOCITY_JITTER..=VELOCITY_JITTER)).clamp(-MAX_SPEED, MAX_SPEED);

      (target.x, target.vx) = bounce(target.x + target.vx, target.vx, target.width);
      (target.y, target.vy) = bounce(target.y + target.vy, target.vy, target.height);

      target.confidence = (target.confidence
        + rng.gen_range(-CONFIDENCE_JITTER..=CONFIDENCE_JITTER))
      .clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
    }
    self.tick += 1;
  }
}

/// 把位置约束在 [0, 1 - size] 内，越界时镜像回来并反转速度
fn bounce(position: f32, velocity: f32, size: f32) -> (f32, f32) {
  let limit = (1.0 - size).max(0.0);
  if position < 0.0 {
    ((-position).min(limit), -velocity)
  } else if position > limit {
    ((2.0 * limit - position).max(0.0), -velocity)
  } else {
    (position, velocity)
  }
}

/// 在画布上绘制跟踪框（四角标记）和 `标签 置信度%`，不清空画布
pub fn render_tracking(canvas: &mut OverlayCanvas, state: &TrackingState, font: Option<&FontArc>) {
  let (width, height) = (canvas.width() as f32, canvas.height() as f32);
  if width == 0.0 || height == 0.0 {
    return;
  }

  let [r, g, b] = TRACK_COLOR;
  let color = Rgba([r, g, b, 255]);
  let image = canvas.as_image_mut();

  for target in state.targets() {
    let x0 = target.x * width;
    let y0 = target.y * height;
    let x1 = ((target.x + target.width) * width).min(width - 1.0);
    let y1 = ((target.y + target.height) * height).min(height - 1.0);
    let dx = (x1 - x0) * BRACKET_RATIO;
    let dy = (y1 - y0) * BRACKET_RATIO;

    for (corner, horizontal, vertical) in [
      ((x0, y0), (x0 + dx, y0), (x0, y0 + dy)),
      ((x1, y0), (x1 - dx, y0), (x1, y0 + dy)),
      ((x0, y1), (x0 + dx, y1), (x0, y1 - dy)),
      ((x1, y1), (x1 - dx, y1), (x1, y1 - dy)),
    ] {
      draw_line_segment_mut(image, corner, horizontal, color);
      draw_line_segment_mut(image, corner, vertical, color);
    }

    if let Some(font) = font {
      let label = format!("{} {:.0}%", target.label, target.confidence * 100.0);
      let text_y = (y0 - TRACK_TEXT_HEIGHT).max(0.0);
      draw_text_mut(
        image,
        color,
        x0 as i32,
        text_y as i32,
        PxScale::from(TRACK_FONT_SIZE),
        font,
        &label,
      );
    }
  }
}
