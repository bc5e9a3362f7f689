// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use barcode_scanner::constants::{
    CAPTURE_BUFFER_COUNT, CaptureResolution, DECODER_MAX_DIMENSION, UI_POLL_INTERVAL,
};
use barcode_scanner::permission::RequestCode;

#[test]
fn test_resolution_preset_values() {
    // Test that all presets exist (Low, Medium, High)
    assert_eq!(CaptureResolution::ALL.len(), 3);
}

#[test]
fn test_resolution_preset_ordering() {
    let mut prev_pixels = 0u32;
    for preset in CaptureResolution::ALL {
        let (width, height) = preset.dimensions();
        assert!(
            width * height > prev_pixels,
            "Presets should be ordered from lowest to highest"
        );
        prev_pixels = width * height;
    }
}

#[test]
fn test_resolution_display_names_mention_size() {
    for preset in CaptureResolution::ALL {
        let (width, height) = preset.dimensions();
        assert!(preset.display_name().contains(&format!("{}x{}", width, height)));
    }
}

#[test]
fn test_decoder_limit_fits_default_capture() {
    let (width, height) = CaptureResolution::default().dimensions();
    assert!(width.max(height) <= DECODER_MAX_DIMENSION);
}

#[test]
fn test_pipeline_sizes() {
    assert!(CAPTURE_BUFFER_COUNT >= 2, "Streaming needs at least two buffers");
    assert!(UI_POLL_INTERVAL.as_millis() > 0);
    assert_eq!(RequestCode::CAMERA_ACCESS.0, 200);
}
