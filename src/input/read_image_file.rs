// 该文件是 Lieying （猎影） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{PlaybackState, VideoSource},
  url_file_path, url_has_flag,
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 单张图片作为视频源
///
/// 默认只播放一帧随后进入 `Ended`；带 `?hold` 时一直停留在这一帧。
pub struct ImageFileInput {
  image: RgbImage,
  served: bool,
  hold: bool,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let mut input = Self::open(url_file_path(url))?;
    input.hold = url_has_flag(url, "hold");
    Ok(input)
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    info!(
      "读取图像文件: {} ({}x{})",
      path.display(),
      image.width(),
      image.height()
    );
    Ok(Self::from_image(image))
  }

  pub fn from_image(image: RgbImage) -> Self {
    Self {
      image,
      served: false,
      hold: false,
    }
  }

  pub fn with_hold(mut self, hold: bool) -> Self {
    self.hold = hold;
    self
  }
}

impl VideoSource for ImageFileInput {
  type Error = ImageFileInputError;

  fn playback_state(&self) -> PlaybackState {
    if self.served && !self.hold {
      PlaybackState::Ended
    } else {
      PlaybackState::Playing
    }
  }

  fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  fn grab_frame(&mut self) -> Result<Option<RgbImage>, Self::Error> {
    if self.served && !self.hold {
      return Ok(None);
    }
    self.served = true;
    Ok(Some(self.image.clone()))
  }
}
