// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use barcode_scanner::Config;
use barcode_scanner::backends::camera::{BackpressureStrategy, LensFacing, PixelFormat};
use barcode_scanner::constants::{CAPTURE_BUFFER_COUNT, CaptureResolution, DECODER_MAX_DIMENSION};
use std::path::PathBuf;

fn temp_config_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("barcode-scanner-test-{}-{}", std::process::id(), name))
        .join("config.json")
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.lens_facing, LensFacing::Back);
    assert_eq!(config.device_path, None);
    assert_eq!(config.capture_resolution, CaptureResolution::Medium);
    assert_eq!(config.pixel_format, PixelFormat::Yuyv);
    assert_eq!(config.capture_buffers, CAPTURE_BUFFER_COUNT);
    assert_eq!(config.decoder_max_dimension, DECODER_MAX_DIMENSION);
    assert_eq!(config.backpressure, BackpressureStrategy::KeepOnlyLatest);
}

#[test]
fn test_partial_file_fills_defaults() {
    let path = temp_config_path("partial");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{ "lens_facing": "front", "backpressure": "block-producer" }"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.lens_facing, LensFacing::Front);
    assert_eq!(config.backpressure, BackpressureStrategy::BlockProducer);
    assert_eq!(config.capture_buffers, CAPTURE_BUFFER_COUNT);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_missing_file_is_default() {
    let path = temp_config_path("missing");
    assert_eq!(Config::load_from(&path).unwrap(), Config::default());
}

#[test]
fn test_malformed_file_is_an_error() {
    let path = temp_config_path("malformed");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ lens_facing: ").unwrap();

    assert!(Config::load_from(&path).is_err());

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_invalid_values_rejected() {
    let path = temp_config_path("invalid");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{ "capture_buffers": 0 }"#).unwrap();

    assert!(Config::load_from(&path).is_err());

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_save_and_reload() {
    let path = temp_config_path("save");
    let config = Config {
        lens_facing: LensFacing::External,
        device_path: Some("/dev/video2".to_string()),
        capture_resolution: CaptureResolution::High,
        pixel_format: PixelFormat::Mjpeg,
        ..Config::default()
    };

    // Parent directory does not exist yet
    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), config);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_selector_and_capture_format() {
    let config = Config {
        lens_facing: LensFacing::Front,
        device_path: Some("/dev/video4".to_string()),
        capture_resolution: CaptureResolution::Low,
        pixel_format: PixelFormat::Nv12,
        ..Config::default()
    };

    let selector = config.selector();
    assert_eq!(selector.facing, LensFacing::Front);
    assert_eq!(selector.device_path.as_deref(), Some("/dev/video4"));

    let format = config.capture_format();
    assert_eq!((format.width, format.height), (320, 240));
    assert_eq!(format.pixel_format, PixelFormat::Nv12);
}
