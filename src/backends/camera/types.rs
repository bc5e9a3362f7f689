// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the camera pipeline

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Which way a camera points relative to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    /// Facing the user (selfie camera, laptop webcam)
    Front,
    /// Facing away from the user
    #[default]
    Back,
    /// Detachable camera (USB webcam, capture card)
    External,
}

impl LensFacing {
    /// Map a `V4L2_CID_CAMERA_SENSOR_LOCATION` value
    pub fn from_v4l2_location(value: i32) -> Option<Self> {
        match value {
            0 => Some(LensFacing::Front),
            1 => Some(LensFacing::Back),
            2 => Some(LensFacing::External),
            _ => None,
        }
    }

    /// Guess the facing from the driver-reported card name and bus
    ///
    /// Used when the sensor does not expose a location control, which is the
    /// case for nearly every UVC webcam.
    pub fn from_device_name(card: &str, bus_info: &str) -> Self {
        let card = card.to_lowercase();

        if ["rear", "back", "world"].iter().any(|k| card.contains(k)) {
            return LensFacing::Back;
        }
        if ["front", "user", "integrated", "facetime"]
            .iter()
            .any(|k| card.contains(k))
        {
            return LensFacing::Front;
        }
        // Platform (non-USB) sensors without a location control are usually
        // the main camera of a phone or tablet
        if bus_info.starts_with("platform:") {
            return LensFacing::Back;
        }
        LensFacing::External
    }
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Front => write!(f, "front"),
            LensFacing::Back => write!(f, "back"),
            LensFacing::External => write!(f, "external"),
        }
    }
}

impl std::str::FromStr for LensFacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "front" | "user" => Ok(LensFacing::Front),
            "back" | "rear" => Ok(LensFacing::Back),
            "external" | "usb" => Ok(LensFacing::External),
            other => Err(format!("unknown lens facing '{}'", other)),
        }
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// The angle the image has to be rotated clockwise to appear upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees_int(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// V4L2 card name
    pub name: String,
    /// Capture device node (e.g. /dev/video0)
    pub path: String,
    /// V4L2 driver name
    pub driver: String,
    pub facing: LensFacing,
    pub rotation: SensorRotation,
}

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Packed 4:2:2 (Y0 U Y1 V)
    Yuyv,
    /// Semi-planar 4:2:0 (Y plane followed by interleaved UV)
    Nv12,
    /// 8-bit grayscale
    Gray8,
    /// 24-bit RGB
    Rgb24,
    /// 32-bit RGBA
    Rgba,
    /// Motion JPEG, only seen on the wire; decoded to RGB24 before leaving
    /// the capture thread
    Mjpeg,
}

impl PixelFormat {
    /// Parse a V4L2 FourCC code
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"YUYV" => Some(Self::Yuyv),
            b"NV12" => Some(Self::Nv12),
            b"GREY" => Some(Self::Gray8),
            b"RGB3" => Some(Self::Rgb24),
            b"AB24" => Some(Self::Rgba),
            b"MJPG" => Some(Self::Mjpeg),
            _ => None,
        }
    }

    /// V4L2 FourCC code for this format
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::Yuyv => *b"YUYV",
            Self::Nv12 => *b"NV12",
            Self::Gray8 => *b"GREY",
            Self::Rgb24 => *b"RGB3",
            Self::Rgba => *b"AB24",
            Self::Mjpeg => *b"MJPG",
        }
    }

    /// Bytes per pixel in the first plane (0 for compressed formats)
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::Yuyv => 2,
            Self::Nv12 | Self::Gray8 => 1,
            Self::Rgb24 => 3,
            Self::Rgba => 4,
            Self::Mjpeg => 0,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.fourcc()))
    }
}

/// Capture size and pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.pixel_format)
    }
}

/// A single frame from the camera
///
/// The pixel data is reference counted so the preview and analysis sinks can
/// hold the same frame without copying it.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Bytes per row of the first plane, including padding
    pub stride: u32,
    /// Rotation needed to display the frame upright
    pub rotation: SensorRotation,
    /// Driver sequence number
    pub sequence: u64,
    /// Timestamp when frame was captured (for latency diagnostics)
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a tightly packed frame (stride = width * bytes per pixel)
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data),
            format,
            stride: width * format.bytes_per_pixel(),
            rotation: SensorRotation::None,
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    /// Set the sequence number (builder style)
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Set the rotation (builder style)
    pub fn with_rotation(mut self, rotation: SensorRotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for camera pipeline operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to open or configure the device
    InitializationFailed(String),
    /// No camera matches the selector
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Use cases are already bound; unbind first
    AlreadyBound,
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::AlreadyBound => write!(f, "Use cases already bound"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_from_location_control() {
        assert_eq!(LensFacing::from_v4l2_location(0), Some(LensFacing::Front));
        assert_eq!(LensFacing::from_v4l2_location(1), Some(LensFacing::Back));
        assert_eq!(LensFacing::from_v4l2_location(2), Some(LensFacing::External));
        assert_eq!(LensFacing::from_v4l2_location(7), None);
    }

    #[test]
    fn test_facing_from_device_name() {
        assert_eq!(
            LensFacing::from_device_name("Rear Camera", "platform:qcom-camss"),
            LensFacing::Back
        );
        assert_eq!(
            LensFacing::from_device_name("Integrated Camera: Integrated C", "usb-0000:00:14.0-8"),
            LensFacing::Front
        );
        assert_eq!(
            LensFacing::from_device_name("HD Pro Webcam C920", "usb-0000:00:14.0-1"),
            LensFacing::External
        );
    }

    #[test]
    fn test_facing_parse() {
        assert_eq!("BACK".parse::<LensFacing>(), Ok(LensFacing::Back));
        assert_eq!("user".parse::<LensFacing>(), Ok(LensFacing::Front));
        assert!("sideways".parse::<LensFacing>().is_err());
    }

    #[test]
    fn test_rotation_normalises() {
        assert_eq!(SensorRotation::from_degrees_int(-90), SensorRotation::Rotate270);
        assert_eq!(SensorRotation::from_degrees_int(450), SensorRotation::Rotate90);
        assert!(SensorRotation::Rotate270.swaps_dimensions());
        assert!(!SensorRotation::Rotate180.swaps_dimensions());
    }

    #[test]
    fn test_pixel_format_fourcc() {
        for format in [
            PixelFormat::Yuyv,
            PixelFormat::Nv12,
            PixelFormat::Gray8,
            PixelFormat::Rgb24,
            PixelFormat::Rgba,
            PixelFormat::Mjpeg,
        ] {
            assert_eq!(PixelFormat::from_fourcc(&format.fourcc()), Some(format));
        }
        assert_eq!(PixelFormat::from_fourcc(b"H264"), None);
    }

    #[test]
    fn test_packed_frame_stride() {
        let frame = CameraFrame::packed(4, 2, PixelFormat::Yuyv, vec![0; 16]);
        assert_eq!(frame.stride, 8);
    }
}
