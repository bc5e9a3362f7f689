// SPDX-License-Identifier: GPL-3.0-only

//! Application messages and shared UI state types

use crate::app::frame_processor::types::{Barcode, BarcodeFormat, FrameRegion, ValueType};
use crate::backends::camera::types::{BackendResult, CameraDevice};
use crate::permission::PermissionResult;
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Identity of one scanner screen instance
///
/// Asynchronous completions carry the id of the screen that started them, so
/// a completion that outlives its screen is recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// A fresh, process-unique id
    pub fn next() -> Self {
        SessionId(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The text currently shown on the scanner screen
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResult {
    pub text: String,
    pub format: BarcodeFormat,
    pub value_type: ValueType,
    /// Where the barcode was in its frame
    pub region: Option<FrameRegion>,
    pub decoded_at: DateTime<Local>,
}

impl DecodedResult {
    /// Decoded less than `within` ago
    pub fn is_recent(&self, within: Duration) -> bool {
        let age = Local::now().signed_duration_since(self.decoded_at);
        age.num_milliseconds() < within.as_millis() as i64
    }
}

impl From<Barcode> for DecodedResult {
    fn from(barcode: Barcode) -> Self {
        Self {
            text: barcode.raw_value,
            format: barcode.format,
            value_type: barcode.value_type,
            region: barcode.bounding_box,
            decoded_at: Local::now(),
        }
    }
}

/// Which screen is in front
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenKind {
    #[default]
    Launcher,
    Scanner,
}

#[derive(Debug, Clone)]
pub enum Message {
    // ===== Navigation =====
    /// Launcher's Scan control was activated
    ScanPressed,
    /// Leave the scanner screen
    Back,
    Quit,

    // ===== Permission =====
    /// Authorization callback for a request made by `session`
    PermissionResult {
        session: SessionId,
        result: PermissionResult,
    },
    /// User asked to be prompted again after a denial
    RequestPermissionAgain,

    // ===== Camera =====
    /// Camera provider finished acquiring devices
    CameraProviderReady {
        session: SessionId,
        result: BackendResult<Vec<CameraDevice>>,
    },

    // ===== Analysis =====
    /// A barcode was decoded from a frame
    BarcodeDecoded {
        session: SessionId,
        result: DecodedResult,
    },
    /// Open the displayed result with the desktop URL handler
    OpenDecodedUrl,
}
