// SPDX-License-Identifier: GPL-3.0-only

//! Barcode detection task
//!
//! Rotates the luma plane upright and downscales it for speed, then runs the
//! QR pass (`rqrr`) and the multi-format pass (`rxing`) over it.

use super::{multi_format, qr_detector};
use crate::app::frame_processor::BarcodeScanner;
use crate::app::frame_processor::input_image::InputImage;
use crate::app::frame_processor::types::Barcode;
use crate::constants::DECODER_MAX_DIMENSION;
use crate::errors::DecodeError;
use futures::FutureExt;
use futures::future::BoxFuture;
use image::{GrayImage, imageops};
use tracing::{debug, trace};

/// Barcode detector for QR codes, 1D retail codes and the other 2D symbologies
///
/// Optimized for real-time processing with frame downscaling.
#[derive(Debug, Clone)]
pub struct BarcodeDetector {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for BarcodeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl BarcodeDetector {
    pub fn new() -> Self {
        Self::with_max_dimension(DECODER_MAX_DIMENSION)
    }

    /// Create a detector with custom max dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    /// Detect barcodes on the calling thread
    pub fn detect_sync(&self, image: &InputImage) -> Vec<Barcode> {
        detect_sync(image, self.max_dimension)
    }
}

impl BarcodeScanner for BarcodeDetector {
    fn process(&self, image: InputImage) -> BoxFuture<'static, Result<Vec<Barcode>, DecodeError>> {
        let max_dim = self.max_dimension;

        // CPU-bound; keep it off the async workers
        async move {
            tokio::task::spawn_blocking(move || detect_sync(&image, max_dim))
                .await
                .map_err(|e| DecodeError::TaskFailed(e.to_string()))
        }
        .boxed()
    }
}

/// Synchronous detection (runs in blocking task)
fn detect_sync(image: &InputImage, max_dimension: u32) -> Vec<Barcode> {
    let start = std::time::Instant::now();

    let upright = image.upright();
    let (width, height) = upright.dimensions();
    let (gray, scale) = downscale(upright, max_dimension);

    trace!(
        proc_width = gray.width(),
        proc_height = gray.height(),
        scale,
        conversion_ms = start.elapsed().as_millis(),
        "Prepared luma image for processing"
    );

    let mut barcodes = qr_detector::detect(&gray, scale, width, height);
    for barcode in multi_format::detect(&gray) {
        // QR codes the first pass already decoded
        let duplicate = barcodes
            .iter()
            .any(|b| b.format == barcode.format && b.raw_value == barcode.raw_value);
        if !duplicate {
            barcodes.push(barcode);
        }
    }

    if !barcodes.is_empty() {
        debug!(
            count = barcodes.len(),
            total_ms = start.elapsed().as_millis(),
            "Barcode detection found codes"
        );
    }

    barcodes
}

/// Shrink so the longest edge fits `max_dimension`; returns the scale applied
fn downscale(image: GrayImage, max_dimension: u32) -> (GrayImage, f32) {
    let (width, height) = image.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return (image, 1.0);
    }

    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let new_width = ((width as f32 / scale) as u32).max(1);
    let new_height = ((height as f32 / scale) as u32).max(1);

    let resized = imageops::resize(&image, new_width, new_height, imageops::FilterType::Triangle);
    (resized, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::frame_processor::types::BarcodeFormat;

    #[test]
    fn test_downscale_keeps_aspect() {
        let image = GrayImage::new(1280, 720);
        let (resized, scale) = downscale(image, 640);
        assert_eq!(resized.dimensions(), (640, 360));
        assert!((scale - 2.0).abs() < f32::EPSILON);

        let image = GrayImage::new(320, 240);
        let (same, scale) = downscale(image, 640);
        assert_eq!(same.dimensions(), (320, 240));
        assert_eq!(scale, 1.0);
    }

    #[test]
    fn test_blank_frame_has_no_codes() {
        let image = InputImage::from_luma(64, 48, vec![255; 64 * 48], 0).unwrap();
        assert!(BarcodeDetector::new().detect_sync(&image).is_empty());
    }

    #[test]
    fn test_detects_product_barcode() {
        let (width, height, luma) = multi_format::tests::ean13_image("4006381333931");
        let image = InputImage::from_luma(width, height, luma, 0).unwrap();

        let barcodes = BarcodeDetector::new().detect_sync(&image);
        assert_eq!(barcodes.len(), 1, "found: {:?}", barcodes);
        assert_eq!(barcodes[0].raw_value, "4006381333931");
        assert_eq!(barcodes[0].format, BarcodeFormat::Ean13);
    }

    #[test]
    fn test_detects_rotated_product_barcode() {
        let (width, height, luma) = multi_format::tests::ean13_image("4006381333931");
        // Rotate the buffer 90° counter-clockwise; the frame then needs 90° clockwise
        let upright = GrayImage::from_raw(width, height, luma).unwrap();
        let sideways = imageops::rotate270(&upright);
        let image = InputImage::from_luma(height, width, sideways.into_raw(), 90).unwrap();

        let barcodes = BarcodeDetector::new().detect_sync(&image);
        assert!(barcodes.iter().any(|b| b.raw_value == "4006381333931"));
    }

    #[tokio::test]
    async fn test_process_runs_off_thread() {
        let image = InputImage::from_luma(32, 32, vec![0; 32 * 32], 90).unwrap();
        let barcodes = BarcodeDetector::new().process(image).await.unwrap();
        assert!(barcodes.is_empty());
    }
}
