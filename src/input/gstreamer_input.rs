// 该文件是 Lieying （猎影） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频输入
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

//! # GStreamer 视频输入模块
//!
//! 通过 GStreamer 管道读取视频文件或摄像头，作为运动检测的视频源。
//!
//! 使用前需要安装 GStreamer 开发库，并启用 `gstreamer_input` 特性：
//!
//! ```toml
//! [dependencies]
//! lieying = { version = "0.1", features = ["gstreamer_input"] }
//! ```
//!
//! ## URL 格式
//!
//! - 视频文件：`gst://file/path/to/video.mp4?rotate=90`
//! - 摄像头：`gst://camera/dev/video0?width=640&height=480&fps=30&format=YUY2`
//!
//! ```no_run
//! use lieying::{FromUrl, input::{GStreamerInputPipelineBuilder, VideoSource}};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("gst://file/tmp/garden.mp4")?;
//! let mut input = GStreamerInputPipelineBuilder::from_url(&url)?.build()?;
//! while let Some(frame) = input.grab_frame()? {
//!     println!("帧: {}x{}", frame.width(), frame.height());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{PlaybackState, VideoSource},
};

/// 等待一帧的最长时间，超时视为暂时没有新帧
const PULL_TIMEOUT_MS: u64 = 100;
const DEFAULT_CAMERA_FPS: u32 = 15;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://"）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  #[error("Unsupported video format")]
  UnsupportedFormat,
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

pub enum GStreamerInputBuilderItem {
  FileSource(String),
  CameraSource {
    camera: String,
    format: String,
    width: Option<u32>,
    height: Option<u32>,
    fps: u32,
  },
  TargetFormat {
    format: String,
  },
  VideoFlip {
    method: u32,
  },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::FileSource(path) => {
        format!("filesrc location=\"{}\" ! decodebin", path)
      }
      GStreamerInputBuilderItem::CameraSource {
        camera,
        format,
        width,
        height,
        fps,
      } => {
        let mut caps = format!("video/x-raw,format={},framerate={}/1", format, fps);
        if let Some(width) = width {
          caps.push_str(&format!(",width={}", width));
        }
        if let Some(height) = height {
          caps.push_str(&format!(",height={}", height));
        }
        format!("v4l2src device={} ! {}", camera, caps)
      }
      GStreamerInputBuilderItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
      GStreamerInputBuilderItem::VideoFlip { method } => {
        format!("videoflip method={}", method)
      }
    }
  }
}

/// GStreamer 输入管道构建器
pub struct GStreamerInputPipelineBuilder {
  items: Vec<GStreamerInputBuilderItem>,
}

impl Default for GStreamerInputPipelineBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl GStreamerInputPipelineBuilder {
  pub fn new() -> Self {
    Self { items: Vec::new() }
  }

  pub fn file(mut self, path: &str) -> Self {
    self
      .items
      .push(GStreamerInputBuilderItem::FileSource(path.to_string()));
    self
  }

  pub fn camera(mut self, device: &str, width: u32, height: u32, fps: u32) -> Self {
    self.items.push(GStreamerInputBuilderItem::CameraSource {
      camera: device.to_string(),
      format: "YUY2".to_string(),
      width: Some(width),
      height: Some(height),
      fps,
    });
    self
  }

  pub fn target_format(mut self, format: &str) -> Self {
    self.items.push(GStreamerInputBuilderItem::TargetFormat {
      format: format.to_string(),
    });
    self
  }

  fn camera_items(path: &str, query: &HashMap<String, String>) -> Vec<GStreamerInputBuilderItem> {
    let parse = |key: &str| query.get(key).and_then(|v| v.parse::<u32>().ok());
    vec![GStreamerInputBuilderItem::CameraSource {
      camera: path.to_string(),
      format: query
        .get("format")
        .cloned()
        .unwrap_or_else(|| "YUY2".to_string()),
      width: parse("width"),
      height: parse("height"),
      fps: parse("fps").unwrap_or(DEFAULT_CAMERA_FPS),
    }]
  }

  fn video_flip(rotate: Option<&str>) -> Option<GStreamerInputBuilderItem> {
    let method = match rotate? {
      "90" => 1,
      "180" => 2,
      "270" => 3,
      _ => return None,
    };
    Some(GStreamerInputBuilderItem::VideoFlip { method })
  }

  pub fn build(self) -> Result<GStreamerInput, GStreamerInputError> {
    gst::init()?;

    let basic_pipeline = self
      .items
      .iter()
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    let full_pipeline = format!(
      "{} ! appsink max-buffers=2 drop=true name=sink",
      basic_pipeline
    );

    info!("GStreamer pipeline description: {}", full_pipeline);

    let pipeline = gst::parse::launch(&full_pipeline)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerInput {
      pipeline,
      appsink,
      dimensions: (0, 0),
      fps: None,
      paused: false,
    })
  }
}

impl FromUrlWithScheme for GStreamerInputPipelineBuilder {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let path = crate::url_file_path(url);
    let path = path.to_string_lossy();

    let mut items = match url.host_str() {
      Some("camera") => Self::camera_items(&path, &query),
      Some("file") => vec![GStreamerInputBuilderItem::FileSource(path.to_string())],
      _ => return Err(GStreamerInputError::SchemeMismatch),
    };

    if let Some(flip) = Self::video_flip(query.get("rotate").map(|s| s.as_ref())) {
      items.push(flip);
    }
    items.push(GStreamerInputBuilderItem::TargetFormat {
      format: "RGB".to_string(),
    });

    Ok(GStreamerInputPipelineBuilder { items })
  }
}

/// GStreamer 视频输入
///
/// 管道到达 EOS 之后播放状态为 `Ended`；拉取超时返回 `Ok(None)`，
/// 调度循环会把这一次当作没有新帧而跳过。
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  dimensions: (u32, u32),
  fps: Option<f64>,
  paused: bool,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl GStreamerInput {
  pub fn pause(&mut self) -> Result<(), GStreamerInputError> {
    self.pipeline.set_state(gst::State::Paused)?;
    self.paused = true;
    Ok(())
  }

  pub fn play(&mut self) -> Result<(), GStreamerInputError> {
    self.pipeline.set_state(gst::State::Playing)?;
    self.paused = false;
    Ok(())
  }

  fn convert_sample(&mut self, sample: gst::Sample) -> Result<RgbImage, GStreamerInputError> {
    let buffer = sample
      .buffer()
      .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
    let caps = sample
      .caps()
      .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

    let video_info =
      gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

    let width = video_info.width() as usize;
    let height = video_info.height() as usize;
    let stride = video_info.stride()[0] as usize;

    let fps = video_info.fps();
    if fps.denom() != 0 && fps.numer() > 0 {
      self.fps = Some(fps.numer() as f64 / fps.denom() as f64);
    }

    let map = buffer.map_readable().map_err(|e| {
      GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
    })?;
    let data = map.as_slice();

    let expected_size = stride * height.saturating_sub(1) + width * 3;
    if height > 0 && data.len() < expected_size {
      return Err(GStreamerInputError::BufferSizeMismatch {
        expected: expected_size,
        actual: data.len(),
      });
    }

    let mut pixels = Vec::with_capacity(width * height * 3);
    match video_info.format() {
      gst_video::VideoFormat::Rgb => {
        for row in 0..height {
          let start = row * stride;
          pixels.extend_from_slice(&data[start..start + width * 3]);
        }
      }
      gst_video::VideoFormat::Bgr => {
        for row in 0..height {
          let start = row * stride;
          for bgr in data[start..start + width * 3].chunks_exact(3) {
            pixels.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
          }
        }
      }
      _ => return Err(GStreamerInputError::UnsupportedFormat),
    }

    self.dimensions = (width as u32, height as u32);
    RgbImage::from_raw(width as u32, height as u32, pixels).ok_or(
      GStreamerInputError::BufferSizeMismatch {
        expected: width * height * 3,
        actual: 0,
      },
    )
  }
}

impl VideoSource for GStreamerInput {
  type Error = GStreamerInputError;

  fn playback_state(&self) -> PlaybackState {
    if self.appsink.is_eos() {
      PlaybackState::Ended
    } else if self.paused || self.pipeline.current_state() != gst::State::Playing {
      PlaybackState::Paused
    } else {
      PlaybackState::Playing
    }
  }

  fn dimensions(&self) -> (u32, u32) {
    self.dimensions
  }

  fn grab_frame(&mut self) -> Result<Option<RgbImage>, Self::Error> {
    let Some(sample) = self
      .appsink
      .try_pull_sample(gst::ClockTime::from_mseconds(PULL_TIMEOUT_MS))
    else {
      debug!("等待 GStreamer 帧超时");
      return Ok(None);
    };
    self.convert_sample(sample).map(Some)
  }

  fn fps(&self) -> Option<f64> {
    self.fps
  }
}
