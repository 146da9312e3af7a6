// 该文件是 Lieying （猎影） 项目的一部分。
// src/input/image_sequence.rs - 图像序列输入
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

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{IMAGE_EXTENSIONS, PlaybackState, VideoSource},
  url_file_path, url_has_flag, url_query_value,
};

const DEFAULT_SEQUENCE_FPS: f64 = 15.0;

#[derive(Error, Debug)]
pub enum ImageSequenceInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("帧率参数无效: {0}")]
  InvalidFps(String),
}

/// 把一个目录中的图片按文件名顺序当作视频播放
///
/// URL 形如 `frames:///path/to/dir?fps=15&loop`。
pub struct ImageSequenceInput {
  frames: Vec<PathBuf>,
  cursor: usize,
  fps: f64,
  looping: bool,
  paused: bool,
  dimensions: (u32, u32),
  current: Option<RgbImage>,
}

impl FromUrlWithScheme for ImageSequenceInput {
  const SCHEME: &'static str = "frames";
}

impl FromUrl for ImageSequenceInput {
  type Error = ImageSequenceInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageSequenceInputError::SchemeMismatch);
    }

    let fps = match url_query_value(url, "fps") {
      Some(value) => value
        .parse::<f64>()
        .ok()
        .filter(|fps| *fps > 0.0)
        .ok_or(ImageSequenceInputError::InvalidFps(value))?,
      None => DEFAULT_SEQUENCE_FPS,
    };

    Ok(
      Self::open(url_file_path(url))?
        .with_fps(fps)
        .with_looping(url_has_flag(url, "loop")),
    )
  }
}

impl ImageSequenceInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, ImageSequenceInputError> {
    let directory = directory.as_ref();
    let mut frames = std::fs::read_dir(directory)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| is_image_file(path))
      .collect::<Vec<_>>();
    frames.sort();

    // 只读文件头获取尺寸，真正解码推迟到播放时
    let dimensions = match frames.first() {
      Some(first) => image::image_dimensions(first)?,
      None => {
        warn!("图像序列目录为空: {}", directory.display());
        (0, 0)
      }
    };

    info!(
      "打开图像序列: {} ({} 帧, {}x{})",
      directory.display(),
      frames.len(),
      dimensions.0,
      dimensions.1
    );

    Ok(Self {
      frames,
      cursor: 0,
      fps: DEFAULT_SEQUENCE_FPS,
      looping: false,
      paused: false,
      dimensions,
      current: None,
    })
  }

  pub fn with_fps(mut self, fps: f64) -> Self {
    self.fps = fps;
    self
  }

  pub fn with_looping(mut self, looping: bool) -> Self {
    self.looping = looping;
    self
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn pause(&mut self) {
    self.paused = true;
  }

  pub fn play(&mut self) {
    self.paused = false;
  }

  fn finished(&self) -> bool {
    self.frames.is_empty() || (!self.looping && self.cursor >= self.frames.len())
  }
}

impl VideoSource for ImageSequenceInput {
  type Error = ImageSequenceInputError;

  fn playback_state(&self) -> PlaybackState {
    if self.finished() {
      PlaybackState::Ended
    } else if self.paused {
      PlaybackState::Paused
    } else {
      PlaybackState::Playing
    }
  }

  fn dimensions(&self) -> (u32, u32) {
    self.dimensions
  }

  fn grab_frame(&mut self) -> Result<Option<RgbImage>, Self::Error> {
    if self.paused {
      return Ok(self.current.clone());
    }
    if self.finished() {
      return Ok(None);
    }
    if self.cursor >= self.frames.len() {
      debug!("图像序列循环播放");
      self.cursor = 0;
    }

    let path = &self.frames[self.cursor];
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    self.cursor += 1;
    self.dimensions = image.dimensions();
    self.current = Some(image.clone());
    Ok(Some(image))
  }

  fn fps(&self) -> Option<f64> {
    Some(self.fps)
  }
}

fn is_image_file(path: &Path) -> bool {
  path.is_file()
    && path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
      .unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn write_sequence(dir: &Path, values: &[u8]) {
    for (i, v) in values.iter().enumerate() {
      RgbImage::from_pixel(8, 6, Rgb([*v, *v, *v]))
        .save(dir.join(format!("frame-{:03}.png", i)))
        .unwrap();
    }
    std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();
  }

  #[test]
  fn plays_frames_in_name_order_then_ends() {
    let dir = tempfile::tempdir().unwrap();
    write_sequence(dir.path(), &[10, 20, 30]);

    let mut input = ImageSequenceInput::open(dir.path()).unwrap();
    assert_eq!(input.len(), 3);
    assert_eq!(input.dimensions(), (8, 6));

    for expected in [10, 20, 30] {
      assert_eq!(input.playback_state(), PlaybackState::Playing);
      let frame = input.grab_frame().unwrap().unwrap();
      assert_eq!(frame.get_pixel(0, 0)[0], expected);
    }
    assert_eq!(input.playback_state(), PlaybackState::Ended);
    assert!(input.grab_frame().unwrap().is_none());
  }

  #[test]
  fn looping_wraps_around() {
    let dir = tempfile::tempdir().unwrap();
    write_sequence(dir.path(), &[1, 2]);

    let mut input = ImageSequenceInput::open(dir.path()).unwrap().with_looping(true);
    let seen: Vec<u8> = (0..5)
      .map(|_| input.grab_frame().unwrap().unwrap().get_pixel(0, 0)[0])
      .collect();
    assert_eq!(seen, vec![1, 2, 1, 2, 1]);
    assert_eq!(input.playback_state(), PlaybackState::Playing);
  }

  #[test]
  fn paused_sequence_holds_current_frame() {
    let dir = tempfile::tempdir().unwrap();
    write_sequence(dir.path(), &[5, 6, 7]);

    let mut input = ImageSequenceInput::open(dir.path()).unwrap();
    input.grab_frame().unwrap();
    input.pause();
    assert_eq!(input.playback_state(), PlaybackState::Paused);
    let held = input.grab_frame().unwrap().unwrap();
    assert_eq!(held.get_pixel(0, 0)[0], 5);
    input.play();
    assert_eq!(input.grab_frame().unwrap().unwrap().get_pixel(0, 0)[0], 6);
  }

  #[test]
  fn empty_directory_is_ended_with_zero_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let input = ImageSequenceInput::open(dir.path()).unwrap();
    assert!(input.is_empty());
    assert_eq!(input.dimensions(), (0, 0));
    assert_eq!(input.playback_state(), PlaybackState::Ended);
  }

  #[test]
  fn parses_url_options() {
    let dir = tempfile::tempdir().unwrap();
    write_sequence(dir.path(), &[1]);
    let url = Url::parse(&format!("frames://{}?fps=24&loop", dir.path().display())).unwrap();
    let input = ImageSequenceInput::from_url(&url).unwrap();
    assert_eq!(input.fps(), Some(24.0));
    assert!(input.looping);

    let url = Url::parse(&format!("frames://{}?fps=abc", dir.path().display())).unwrap();
    assert!(matches!(
      ImageSequenceInput::from_url(&url),
      Err(ImageSequenceInputError::InvalidFps(_))
    ));
  }
}
