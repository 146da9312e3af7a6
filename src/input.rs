// 该文件是 Lieying （猎影） 项目的一部分。
// src/input.rs - 视频/图像输入
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
use tracing::warn;

use crate::FromUrl;

/// 播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
  Playing,
  Paused,
  Ended,
}

/// 视频源：运动检测只读取它当前显示的帧，不负责采集
pub trait VideoSource {
  type Error;

  fn playback_state(&self) -> PlaybackState;

  /// 当前显示尺寸，尚未知道时为 (0, 0)
  fn dimensions(&self) -> (u32, u32);

  /// 取当前帧，暂时没有可用帧时返回 `Ok(None)`
  fn grab_frame(&mut self) -> Result<Option<RgbImage>, Self::Error>;

  fn fps(&self) -> Option<f64> {
    None
  }

  /// 把视频源当作帧迭代器使用，见 [`Frames`]
  fn frames(self) -> Frames<Self>
  where
    Self: Sized,
  {
    Frames { source: self }
  }
}

/// 依次取帧，播放结束、暂时无帧或出错时迭代结束
pub struct Frames<V> {
  source: V,
}

impl<V> Iterator for Frames<V>
where
  V: VideoSource,
  V::Error: std::fmt::Display,
{
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    if self.source.playback_state() == PlaybackState::Ended {
      return None;
    }
    match self.source.grab_frame() {
      Ok(frame) => frame,
      Err(e) => {
        warn!("读取帧失败: {}", e);
        None
      }
    }
  }
}

/// 识别为图片文件的扩展名
pub(crate) const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "image_sequence")]
mod image_sequence;
#[cfg(feature = "image_sequence")]
pub use self::image_sequence::{ImageSequenceInput, ImageSequenceInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{
  GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder,
};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "image_sequence")]
  #[error("Image sequence input error: {0}")]
  ImageSequenceInputError(#[from] ImageSequenceInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "image_sequence")]
  ImageSequence(ImageSequenceInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    #[cfg(feature = "image_sequence")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageSequenceInput::SCHEME {
        let input = ImageSequenceInput::from_url(url)?;
        return Ok(InputWrapper::ImageSequence(input));
      }
    }
    #[cfg(feature = "gstreamer_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == GStreamerInputPipelineBuilder::SCHEME {
        let input = GStreamerInputPipelineBuilder::from_url(url)?.build()?;
        return Ok(InputWrapper::GStreamerInput(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl VideoSource for InputWrapper {
  type Error = InputError;

  fn playback_state(&self) -> PlaybackState {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.playback_state(),
      #[cfg(feature = "image_sequence")]
      InputWrapper::ImageSequence(input) => input.playback_state(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.playback_state(),
    }
  }

  fn dimensions(&self) -> (u32, u32) {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.dimensions(),
      #[cfg(feature = "image_sequence")]
      InputWrapper::ImageSequence(input) => input.dimensions(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.dimensions(),
    }
  }

  fn grab_frame(&mut self) -> Result<Option<RgbImage>, Self::Error> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.grab_frame().map_err(InputError::from),
      #[cfg(feature = "image_sequence")]
      InputWrapper::ImageSequence(input) => input.grab_frame().map_err(InputError::from),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.grab_frame().map_err(InputError::from),
    }
  }

  fn fps(&self) -> Option<f64> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.fps(),
      #[cfg(feature = "image_sequence")]
      InputWrapper::ImageSequence(input) => input.fps(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.fps(),
    }
  }
}
