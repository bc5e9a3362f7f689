// SPDX-License-Identifier: GPL-3.0-only

//! Frame analysis: from a captured frame to decoded barcodes
//!
//! [`analyzer::BarcodeAnalyzer`] is the per-frame callback; it builds an
//! [`InputImage`], hands it to a [`BarcodeScanner`] and publishes the results
//! to the UI thread.

pub mod analyzer;
pub mod input_image;
pub mod tasks;
pub mod types;

pub use analyzer::{BarcodeAnalyzer, ResultPublisher};
pub use input_image::InputImage;
pub use tasks::BarcodeDetector;
pub use types::{Barcode, BarcodeFormat, FrameRegion, ValueType};

use crate::errors::DecodeError;
use futures::future::BoxFuture;

/// Barcode decoding collaborator
pub trait BarcodeScanner: Send + Sync {
    /// Find every barcode in `image`
    ///
    /// An empty list is a normal outcome, not an error.
    fn process(&self, image: InputImage) -> BoxFuture<'static, Result<Vec<Barcode>, DecodeError>>;
}
