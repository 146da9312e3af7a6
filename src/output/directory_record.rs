// 该文件是 Lieying （猎影） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Datelike, Utc};
use image::RgbImage;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  motion::MotionReport,
  output::{MotionOverlay, Render},
  url_file_path, url_has_flag, url_query_value,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 图片旁附带的区域记录格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
  /// 只保存合成后的图片
  None,
  /// 每个区域一行 `index, x, y, width, height, intensity`
  Text,
  /// 完整的检测结果 JSON
  Json,
}

impl RecordKind {
  fn with(kind: Option<&str>) -> Self {
    match kind {
      Some("json") => RecordKind::Json,
      Some(_) => RecordKind::Text,
      None => RecordKind::None,
    }
  }
}

/// 按日期分目录保存每一帧的标注结果
///
/// URL 形如 `folder:///path/to/dir?record=json&always`，
/// 默认只在检测到运动区域时保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: RecordKind,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = RecordKind::with(url_query_value(uri, "record").as_deref());
    let always = url_has_flag(uri, "always");

    Ok(DirectoryRecordOutput::new(url_file_path(uri))
      .with_record(record)
      .with_always(always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      record: RecordKind::None,
      frame_counter: AtomicU16::new(0),
      always: false,
    }
  }

  pub fn with_record(mut self, record: RecordKind) -> Self {
    self.record = record;
    self
  }

  pub fn with_always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, now: &DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn write_record(
    &self,
    path: &Path,
    report: &MotionReport,
    now: &DateTime<Utc>,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self.record {
      RecordKind::None => {}
      RecordKind::Text => {
        let lines = report
          .areas
          .iter()
          .enumerate()
          .map(|(i, a)| {
            format!(
              "{}, {}, {}, {}, {}, {:.2}",
              i + 1,
              a.x,
              a.y,
              a.width,
              a.height,
              a.intensity
            )
          })
          .collect::<Vec<_>>();
        std::fs::write(path.with_extension("txt"), lines.join("\n"))?;
      }
      RecordKind::Json => {
        let areas = report
          .areas
          .iter()
          .map(|a| {
            json!({
              "x": a.x,
              "y": a.y,
              "width": a.width,
              "height": a.height,
              "intensity": a.intensity,
            })
          })
          .collect::<Vec<_>>();
        let record = json!({
          "timestamp": now.to_rfc3339(),
          "intensity": report.intensity,
          "sample": { "width": report.sample_width, "height": report.sample_height },
          "areas": areas,
        });
        std::fs::write(
          path.with_extension("json"),
          serde_json::to_string_pretty(&record)?,
        )?;
      }
    }
    Ok(())
  }
}

impl Render<RgbImage, MotionOverlay> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &MotionOverlay) -> Result<(), Self::Error> {
    if !self.always && result.report.is_empty() {
      return Ok(());
    }

    let now = Utc::now();
    let path = self.frame_path(&now)?;
    result.composite(frame).save(&path)?;
    self.write_record(&path, &result.report, &now)?;
    debug!("记录帧: {}", path.display());
    Ok(())
  }
}
