// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner application

use crate::backends::camera::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera pipeline errors
    Camera(BackendError),
    /// Camera authorization errors
    Permission(PermissionError),
    /// Barcode decoding errors
    Decode(DecodeError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Errors raised while asking the desktop portal for camera access
#[derive(Debug, Clone)]
pub enum PermissionError {
    /// No session bus or no portal implementation
    PortalUnavailable(String),
    /// The portal reports that no camera is present
    NoCamera,
    /// The portal request failed or returned a malformed response
    RequestFailed(String),
}

/// Errors raised while preparing or decoding a frame
#[derive(Debug, Clone)]
pub enum DecodeError {
    /// Pixel format the decoder input cannot be built from
    UnsupportedFormat(String),
    /// Frame dimensions or buffer length are inconsistent
    InvalidImage(String),
    /// The background decode task failed (panicked or was cancelled)
    TaskFailed(String),
}

/// A job was submitted to an executor that has already been shut down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectedExecution;

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Permission(e) => write!(f, "Permission error: {}", e),
            AppError::Decode(e) => write!(f, "Decode error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for PermissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionError::PortalUnavailable(msg) => write!(f, "Portal unavailable: {}", msg),
            PermissionError::NoCamera => write!(f, "No camera present"),
            PermissionError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            DecodeError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
            DecodeError::TaskFailed(msg) => write!(f, "Decode task failed: {}", msg),
        }
    }
}

impl fmt::Display for RejectedExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Executor has been shut down")
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for PermissionError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for RejectedExecution {}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Camera(err)
    }
}

impl From<PermissionError> for AppError {
    fn from(err: PermissionError) -> Self {
        AppError::Permission(err)
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        AppError::Decode(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<zbus::Error> for PermissionError {
    fn from(err: zbus::Error) -> Self {
        PermissionError::RequestFailed(err.to_string())
    }
}
