// 该文件是 Lieying （猎影） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use image::RgbImage;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{MotionOverlay, Render},
  url_file_path, url_has_flag,
};

/// 把合成了叠加层的帧保存为图片，每次覆盖同一个文件
///
/// 带 `?overlay-only` 时只保存透明叠加层（PNG）。
pub struct SaveImageFileOutput {
  path: PathBuf,
  overlay_only: bool,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: url_file_path(uri),
      overlay_only: url_has_flag(uri, "overlay-only"),
    })
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      overlay_only: false,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn ensure_parent(&self) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    Ok(())
  }
}

impl Render<RgbImage, MotionOverlay> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbImage, result: &MotionOverlay) -> Result<(), Self::Error> {
    self.ensure_parent()?;
    if self.overlay_only {
      result.canvas.as_image().save(&self.path)?;
    } else {
      result.composite(frame).save(&self.path)?;
    }

    debug!(
      "保存图像到文件: {} ({} 个运动区域)",
      self.path.display(),
      result.report.len()
    );

    Ok(())
  }
}
