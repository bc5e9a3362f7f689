// SPDX-License-Identifier: GPL-3.0-only

//! Barcode Scanner - a live camera barcode and QR code scanner
//!
//! The application has two screens: a launcher with a single Scan control and
//! a scanner that shows the camera feed and the most recently decoded value.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Screens, message routing and frame analysis
//! - [`backends`]: Camera capture (V4L2), preview and analysis use cases
//! - [`permission`]: Camera authorization state machine and portal client
//! - [`config`]: User configuration handling
//! - [`terminal`]: ratatui front end
//!
//! # Example
//!
//! ```ignore
//! // Interactive, run via:
//! // barcode-scanner
//! // barcode-scanner decode ticket.png
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod permission;
pub mod terminal;

// Re-export commonly used types
pub use app::frame_processor::{Barcode, BarcodeDetector, BarcodeFormat, InputImage, ValueType};
pub use app::{App, AppServices, Message, ScreenKind};
pub use config::Config;
pub use errors::{AppError, AppResult};
