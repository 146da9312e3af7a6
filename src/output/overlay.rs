// 该文件是 Lieying （猎影） 项目的一部分。
// src/output/overlay.rs - 运动区域叠加层绘制
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, Rgba, RgbImage, RgbaImage, imageops};
use imageproc::{
  drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use tracing::{debug, warn};

use crate::motion::MotionArea;

// 绘制常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_HEIGHT: i32 = 18;
const STROKE_WIDTH: i32 = 2;
const CENTROID_RADIUS: i32 = 3;
const STROKE_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const CENTROID_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const LABEL_COLOR: [u8; 3] = [255, 255, 255]; // 白色
/// 达到该强度时边框完全不透明
const FULL_OPACITY_INTENSITY: f32 = 100.0;

/// 内置的标签字体
static DEFAULT_FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// 内置字体
pub fn default_font() -> Option<FontArc> {
  match FontArc::try_from_slice(DEFAULT_FONT_DATA) {
    Ok(font) => Some(font),
    Err(e) => {
      warn!("无法加载内置字体: {}", e);
      None
    }
  }
}

/// 加载标签字体；给出路径时优先使用该字体，读取失败时退回内置字体
pub fn load_font(path: Option<&Path>) -> Option<FontArc> {
  let Some(path) = path else {
    return default_font();
  };

  let font = std::fs::read(path)
    .map_err(|e| e.to_string())
    .and_then(|data| FontArc::try_from_vec(data).map_err(|e| e.to_string()));
  match font {
    Ok(font) => {
      debug!("加载字体: {}", path.display());
      Some(font)
    }
    Err(e) => {
      warn!("无法加载字体 {}: {}，使用内置字体", path.display(), e);
      default_font()
    }
  }
}

/// 透明叠加画布，尺寸由调用方决定（通常与视频显示尺寸一致）
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayCanvas {
  image: RgbaImage,
}

impl OverlayCanvas {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      image: RgbaImage::new(width, height),
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  pub fn clear(&mut self) {
    self.image.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
  }

  pub fn is_clear(&self) -> bool {
    self.image.pixels().all(|p| p[3] == 0)
  }

  pub fn as_image(&self) -> &RgbaImage {
    &self.image
  }

  pub fn as_image_mut(&mut self) -> &mut RgbaImage {
    &mut self.image
  }

  /// 按 alpha 把叠加层混合到视频帧上，视频帧本身不被修改
  pub fn composite_onto(&self, frame: &RgbImage) -> RgbImage {
    let mut base = DynamicImage::ImageRgb8(frame.clone()).to_rgba8();
    imageops::overlay(&mut base, &self.image, 0, 0);
    DynamicImage::ImageRgba8(base).to_rgb8()
  }
}

/// 叠加画布上的矩形，像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayRect {
  pub x: i32,
  pub y: i32,
  pub width: u32,
  pub height: u32,
}

impl DisplayRect {
  pub fn center(&self) -> (i32, i32) {
    (
      self.x + self.width as i32 / 2,
      self.y + self.height as i32 / 2,
    )
  }
}

/// 把采样空间的区域线性缩放到画布空间，并裁剪到画布范围内
pub fn scale_area(
  area: &MotionArea,
  scale_x: f32,
  scale_y: f32,
  canvas_width: u32,
  canvas_height: u32,
) -> Option<DisplayRect> {
  if canvas_width == 0 || canvas_height == 0 {
    return None;
  }

  let left = (area.x as f32 * scale_x).floor().clamp(0.0, (canvas_width - 1) as f32) as i32;
  let top = (area.y as f32 * scale_y).floor().clamp(0.0, (canvas_height - 1) as f32) as i32;
  let right = ((area.x + area.width) as f32 * scale_x)
    .ceil()
    .clamp(0.0, canvas_width as f32) as i32;
  let bottom = ((area.y + area.height) as f32 * scale_y)
    .ceil()
    .clamp(0.0, canvas_height as f32) as i32;

  if right <= left || bottom <= top {
    return None;
  }

  Some(DisplayRect {
    x: left,
    y: top,
    width: (right - left) as u32,
    height: (bottom - top) as u32,
  })
}

/// 边框不透明度，随区域强度线性增加，最高为 1
pub fn stroke_opacity(intensity: f32) -> f32 {
  (intensity / FULL_OPACITY_INTENSITY).clamp(0.0, 1.0)
}

/// 运动区域叠加层绘制器
///
/// 每次绘制先清空画布，再为每个区域画边框、中心点和从 1 开始的序号。
/// 只修改叠加画布。
#[derive(Clone)]
pub struct OverlayRenderer {
  font: Option<FontArc>,
  font_scale: PxScale,
  stroke_color: [u8; 3],
  centroid_color: [u8; 3],
  label_color: [u8; 3],
}

impl Default for OverlayRenderer {
  fn default() -> Self {
    Self::new(load_font(None))
  }
}

impl OverlayRenderer {
  pub fn new(font: Option<FontArc>) -> Self {
    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      stroke_color: STROKE_COLOR,
      centroid_color: CENTROID_COLOR,
      label_color: LABEL_COLOR,
    }
  }

  pub fn with_stroke_color(mut self, color: [u8; 3]) -> Self {
    self.stroke_color = color;
    self
  }

  pub fn font(&self) -> Option<&FontArc> {
    self.font.as_ref()
  }

  pub fn render(
    &self,
    canvas: &mut OverlayCanvas,
    areas: &[MotionArea],
    sample_width: u32,
    sample_height: u32,
  ) {
    canvas.clear();
    if sample_width == 0 || sample_height == 0 {
      return;
    }

    let (canvas_width, canvas_height) = canvas.dimensions();
    let scale_x = canvas_width as f32 / sample_width as f32;
    let scale_y = canvas_height as f32 / sample_height as f32;

    for (index, area) in areas.iter().enumerate() {
      let Some(rect) = scale_area(area, scale_x, scale_y, canvas_width, canvas_height) else {
        continue;
      };
      let alpha = (stroke_opacity(area.intensity) * 255.0).round() as u8;
      self.draw_area(canvas.as_image_mut(), &rect, index + 1, alpha);
    }
  }

  fn draw_area(&self, image: &mut RgbaImage, rect: &DisplayRect, label: usize, alpha: u8) {
    let [r, g, b] = self.stroke_color;
    let stroke = Rgba([r, g, b, alpha]);

    // 边框加粗为 STROKE_WIDTH 像素，向内收缩
    for t in 0..STROKE_WIDTH {
      let width = rect.width as i32 - 2 * t;
      let height = rect.height as i32 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let inner = Rect::at(rect.x + t, rect.y + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, inner, stroke);
    }

    let [r, g, b] = self.centroid_color;
    draw_filled_circle_mut(image, rect.center(), CENTROID_RADIUS, Rgba([r, g, b, 255]));

    if let Some(font) = &self.font {
      let [r, g, b] = self.label_color;
      let label_y = (rect.y - LABEL_TEXT_HEIGHT).max(0);
      draw_text_mut(
        image,
        Rgba([r, g, b, 255]),
        rect.x + STROKE_WIDTH,
        label_y,
        self.font_scale,
        font,
        &label.to_string(),
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn area(x: u32, y: u32, width: u32, height: u32, intensity: f32) -> MotionArea {
    MotionArea {
      x,
      y,
      width,
      height,
      intensity,
    }
  }

  #[test]
  fn scaling_is_linear_per_axis() {
    let rect = scale_area(&area(5, 5, 10, 10, 200.0), 2.0, 3.0, 80, 120).unwrap();
    assert_eq!(
      rect,
      DisplayRect {
        x: 10,
        y: 15,
        width: 20,
        height: 30
      }
    );
  }

  #[test]
  fn scaling_stays_inside_canvas() {
    let rect = scale_area(&area(35, 38, 10, 10, 50.0), 2.0, 2.0, 80, 80).unwrap();
    assert!(rect.x >= 0 && rect.y >= 0);
    assert!(rect.x + rect.width as i32 <= 80);
    assert!(rect.y + rect.height as i32 <= 80);
    assert!(scale_area(&area(0, 0, 1, 1, 1.0), 1.0, 1.0, 0, 10).is_none());
  }

  #[test]
  fn opacity_is_proportional_and_capped() {
    assert_eq!(stroke_opacity(0.0), 0.0);
    assert_eq!(stroke_opacity(50.0), 0.5);
    assert_eq!(stroke_opacity(100.0), 1.0);
    assert_eq!(stroke_opacity(765.0), 1.0);
  }

  #[test]
  fn draws_box_and_centroid_in_display_space() {
    let renderer = OverlayRenderer::new(None);
    let mut canvas = OverlayCanvas::new(80, 80);
    renderer.render(&mut canvas, &[area(5, 5, 10, 10, 200.0)], 40, 40);

    let image = canvas.as_image();
    assert_eq!(image.get_pixel(10, 10), &Rgba([0, 255, 0, 255]));
    assert_eq!(image.get_pixel(29, 29), &Rgba([0, 255, 0, 255]));
    assert_eq!(image.get_pixel(11, 20), &Rgba([0, 255, 0, 255]));
    assert_eq!(image.get_pixel(20, 20), &Rgba([255, 0, 0, 255]));
    // 区域之外保持透明
    assert_eq!(image.get_pixel(9, 9)[3], 0);
    assert_eq!(image.get_pixel(31, 31)[3], 0);
  }

  #[test]
  fn labels_are_drawn_above_the_box() {
    let areas = [area(10, 20, 10, 10, 200.0)];
    let mut plain = OverlayCanvas::new(40, 40);
    OverlayRenderer::new(None).render(&mut plain, &areas, 40, 40);
    let mut labelled = OverlayCanvas::new(40, 40);
    OverlayRenderer::default().render(&mut labelled, &areas, 40, 40);

    // 标签画在框上方 LABEL_TEXT_HEIGHT 像素内
    let label_pixels = (2..20)
      .flat_map(|y| (10..30).map(move |x| (x, y)))
      .filter(|&(x, y)| labelled.as_image().get_pixel(x, y) != plain.as_image().get_pixel(x, y))
      .count();
    assert!(label_pixels > 0);
    // 框下方没有文字
    assert_eq!(labelled.as_image().get_pixel(15, 35), plain.as_image().get_pixel(15, 35));
  }

  #[test]
  fn font_falls_back_to_builtin() {
    assert!(default_font().is_some());
    assert!(load_font(None).is_some());
    assert!(load_font(Some(Path::new("/nonexistent/font.ttf"))).is_some());
    assert!(OverlayRenderer::default().font().is_some());
  }

  #[test]
  fn custom_stroke_color_is_used() {
    let renderer = OverlayRenderer::new(None).with_stroke_color([0, 0, 255]);
    let mut canvas = OverlayCanvas::new(40, 40);
    renderer.render(&mut canvas, &[area(0, 0, 20, 20, 100.0)], 40, 40);
    assert_eq!(canvas.as_image().get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
  }

  #[test]
  fn weak_regions_are_translucent() {
    let renderer = OverlayRenderer::new(None);
    let mut canvas = OverlayCanvas::new(40, 40);
    renderer.render(&mut canvas, &[area(0, 0, 20, 20, 50.0)], 40, 40);
    assert_eq!(canvas.as_image().get_pixel(0, 0), &Rgba([0, 255, 0, 128]));
  }

  #[test]
  fn rendering_twice_is_identical() {
    let renderer = OverlayRenderer::new(None);
    let areas = [area(1, 2, 7, 9, 80.0), area(20, 20, 6, 5, 400.0)];
    let mut canvas = OverlayCanvas::new(64, 48);
    renderer.render(&mut canvas, &areas, 32, 24);
    let first = canvas.clone();
    renderer.render(&mut canvas, &areas, 32, 24);
    assert_eq!(first, canvas);
  }

  #[test]
  fn rendering_clears_previous_content() {
    let renderer = OverlayRenderer::new(None);
    let mut canvas = OverlayCanvas::new(40, 40);
    renderer.render(&mut canvas, &[area(0, 0, 10, 10, 100.0)], 40, 40);
    assert!(!canvas.is_clear());
    renderer.render(&mut canvas, &[], 40, 40);
    assert!(canvas.is_clear());
  }

  #[test]
  fn transparent_overlay_leaves_frame_untouched() {
    let frame = RgbImage::from_pixel(16, 16, Rgb([12, 34, 56]));
    let canvas = OverlayCanvas::new(16, 16);
    assert_eq!(canvas.composite_onto(&frame), frame);
  }

  #[test]
  fn opaque_overlay_pixels_replace_frame() {
    let frame = RgbImage::from_pixel(16, 16, Rgb([12, 34, 56]));
    let mut canvas = OverlayCanvas::new(16, 16);
    OverlayRenderer::new(None).render(&mut canvas, &[area(0, 0, 8, 8, 300.0)], 16, 16);
    let composed = canvas.composite_onto(&frame);
    assert_eq!(composed.get_pixel(0, 0), &Rgb([0, 255, 0]));
    assert_eq!(composed.get_pixel(15, 15), &Rgb([12, 34, 56]));
  }
}
