// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Directory name used under the XDG config/state directories
pub const APP_DIR_NAME: &str = "barcode-scanner";

/// Request identifier attached to camera access requests
pub const CAMERA_ACCESS_REQUEST_CODE: u32 = 200;

/// Name given to the dedicated frame-analysis worker thread
pub const ANALYSIS_THREAD_NAME: &str = "scanner-analysis";

/// Name given to the V4L2 capture thread
pub const CAPTURE_THREAD_NAME: &str = "scanner-capture";

/// Number of memory-mapped V4L2 buffers requested from the driver
pub const CAPTURE_BUFFER_COUNT: u32 = 4;

/// How long binding waits for the capture thread to open the device
pub const CAPTURE_STARTUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Longest wait for one frame before the capture thread rechecks its stop
/// signal
pub const CAPTURE_FRAME_TIMEOUT: Duration = Duration::from_millis(500);

/// Repeated capture errors are logged once per this many failures
pub const CAPTURE_ERROR_LOG_INTERVAL: u32 = 100;

/// Frames are downscaled so their longest edge is at most this many pixels
/// before detection runs
pub const DECODER_MAX_DIMENSION: u32 = 640;

/// How long the UI loop waits for input before redrawing
pub const UI_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// How long the preview outlines a freshly decoded barcode
pub const DETECTION_HIGHLIGHT: Duration = Duration::from_millis(1500);

/// Capture resolution presets
///
/// Barcode detection does not benefit from very large frames, so the presets
/// stay in the range a webcam streams at full frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureResolution {
    /// 320x240
    Low,
    /// 640x480 (default)
    #[default]
    Medium,
    /// 1280x720
    High,
}

impl CaptureResolution {
    /// All presets, lowest first
    pub const ALL: [CaptureResolution; 3] = [
        CaptureResolution::Low,
        CaptureResolution::Medium,
        CaptureResolution::High,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            CaptureResolution::Low => "Low (320x240)",
            CaptureResolution::Medium => "Medium (640x480)",
            CaptureResolution::High => "High (1280x720)",
        }
    }

    /// Requested frame size in pixels (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            CaptureResolution::Low => (320, 240),
            CaptureResolution::Medium => (640, 480),
            CaptureResolution::High => (1280, 720),
        }
    }
}
