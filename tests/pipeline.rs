// 该文件是 Lieying （猎影） 项目的一部分。
// tests/pipeline.rs - 端到端检测流程测试
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

use image::{Rgb, RgbImage};
use url::Url;

use lieying::{
  FromUrl,
  frame::RgbFrame,
  input::{InputWrapper, VideoSource},
  motion::{
    DifferenceMap, Differencer, MotionConfig, MotionDetector, RegionExtractor, overall_intensity,
  },
  output::{OutputWrapper, OverlayCanvas, OverlayRenderer},
  task::{ContinuousTask, MotionLoop, OneShotTask, Task, TickOutcome},
};

fn block_frame(size: u32, value: u8) -> RgbImage {
  let mut image = RgbImage::new(size, size);
  for y in 5..15 {
    for x in 5..15 {
      image.put_pixel(x, y, Rgb([value, 0, 0]));
    }
  }
  image
}

fn collect_files(dir: &Path, ext: &str) -> Vec<PathBuf> {
  let mut found = Vec::new();
  for entry in std::fs::read_dir(dir).unwrap() {
    let path = entry.unwrap().path();
    if path.is_dir() {
      found.extend(collect_files(&path, ext));
    } else if path.extension().and_then(|e| e.to_str()) == Some(ext) {
      found.push(path);
    }
  }
  found.sort();
  found
}

#[test]
fn forty_by_forty_block_scenario() {
  let previous = RgbFrame::from(RgbImage::new(40, 40));
  let current = RgbFrame::from(block_frame(40, 200));

  let map: DifferenceMap = Differencer::default().diff(&previous, &current).unwrap();
  assert_eq!(map.nonzero_count(), 100);
  assert!(map.values().iter().all(|&v| v == 0 || v == 200));

  let areas = RegionExtractor::default().extract(&map);
  assert_eq!(areas.len(), 1);
  let area = areas[0];
  assert_eq!((area.x, area.y, area.width, area.height), (5, 5, 10, 10));
  assert_eq!(area.intensity, 200.0);

  // 20000 / (1600 * 10)
  assert!((overall_intensity(&map) - 1.25).abs() < 1e-6);
}

#[test]
fn overlay_is_identical_across_renders() {
  let config = MotionConfig::default().with_sample_size(40, 40);
  let mut detector = MotionDetector::new(&config).unwrap();
  let previous = RgbFrame::from(RgbImage::new(40, 40));
  let current = RgbFrame::from(block_frame(40, 200));
  let report = detector.compare(&previous, &current).unwrap();

  let renderer = OverlayRenderer::new(None);
  let mut first = OverlayCanvas::new(160, 120);
  let mut second = OverlayCanvas::new(160, 120);
  renderer.render(&mut first, &report.areas, 40, 40);
  renderer.render(&mut second, &report.areas, 40, 40);
  renderer.render(&mut second, &report.areas, 40, 40);
  assert_eq!(first.as_image(), second.as_image());

  lieying::motion::Detector::reset(&mut detector);
  assert!(!detector.has_previous());
}

#[test]
fn one_shot_from_image_files() {
  let dir = tempfile::tempdir().unwrap();
  let before = dir.path().join("before.png");
  let after = dir.path().join("after.png");
  let result = dir.path().join("out/result.png");
  RgbImage::new(40, 40).save(&before).unwrap();
  block_frame(40, 200).save(&after).unwrap();

  let image_url = |path: &Path| Url::parse(&format!("image://{}", path.display())).unwrap();
  let previous = InputWrapper::from_url(&image_url(&before)).unwrap();
  let current = InputWrapper::from_url(&image_url(&after)).unwrap();
  let output = OutputWrapper::from_url(&image_url(&result)).unwrap();
  let detector = MotionDetector::new(&MotionConfig::default().with_sample_size(40, 40)).unwrap();

  OneShotTask::new(OverlayRenderer::new(None))
    .run_task(previous.frames().chain(current.frames()), detector, output)
    .unwrap();

  let saved = image::open(&result).unwrap().to_rgb8();
  assert_eq!(saved.dimensions(), (40, 40));
  // 区域左上角被描边
  assert_eq!(saved.get_pixel(5, 5), &Rgb([0, 255, 0]));
  assert_eq!(saved.get_pixel(30, 30), &Rgb([0, 0, 0]));
}

#[test]
fn continuous_sequence_records_moving_frames() {
  let frames = tempfile::tempdir().unwrap();
  RgbImage::new(40, 40).save(frames.path().join("000.png")).unwrap();
  block_frame(40, 200).save(frames.path().join("001.png")).unwrap();
  block_frame(40, 200).save(frames.path().join("002.png")).unwrap();
  RgbImage::new(40, 40).save(frames.path().join("003.png")).unwrap();

  let records = tempfile::tempdir().unwrap();
  let input = InputWrapper::from_url(
    &Url::parse(&format!("frames://{}?fps=1000", frames.path().display())).unwrap(),
  )
  .unwrap();
  let output = OutputWrapper::from_url(
    &Url::parse(&format!("folder://{}?record=json", records.path().display())).unwrap(),
  )
  .unwrap();
  let detector = MotionDetector::new(&MotionConfig::default().with_sample_size(40, 40)).unwrap();

  ContinuousTask::new(OverlayRenderer::new(None))
    .run_task(input, detector, output)
    .unwrap();

  // 第一帧只保存采样，第三帧与第二帧相同，只有第二、四帧有运动
  assert_eq!(collect_files(records.path(), "png").len(), 2);
  let jsons = collect_files(records.path(), "json");
  assert_eq!(jsons.len(), 2);
  for json in jsons {
    let value: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
    assert_eq!(value["areas"].as_array().map(Vec::len), Some(1));
    assert_eq!(value["areas"][0]["x"], 5);
  }
}

#[test]
fn loop_over_sequence_reaches_end() {
  let frames = tempfile::tempdir().unwrap();
  RgbImage::new(40, 40).save(frames.path().join("a.png")).unwrap();
  block_frame(40, 200).save(frames.path().join("b.png")).unwrap();

  let input = InputWrapper::from_url(
    &Url::parse(&format!("frames://{}", frames.path().display())).unwrap(),
  )
  .unwrap();
  assert_eq!(input.dimensions(), (40, 40));
  let detector = MotionDetector::new(&MotionConfig::default().with_sample_size(40, 40)).unwrap();
  let mut motion = MotionLoop::new(input, detector, OverlayRenderer::new(None));

  assert_eq!(motion.tick().unwrap(), TickOutcome::Primed);
  assert!(matches!(
    motion.tick().unwrap(),
    TickOutcome::Processed { regions: 1, .. }
  ));
  assert!(matches!(motion.tick().unwrap(), TickOutcome::Skipped(_)));
  assert_eq!(motion.overlay().report.sample_width, 40);
}
