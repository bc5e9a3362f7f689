// SPDX-License-Identifier: GPL-3.0-only

//! Barcode scanner implementations

pub mod detector;
mod multi_format;
mod qr_detector;

pub use detector::BarcodeDetector;
