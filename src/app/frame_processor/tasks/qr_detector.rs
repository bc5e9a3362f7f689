// SPDX-License-Identifier: GPL-3.0-only

//! QR code pass
//!
//! Runs `rqrr` over the prepared luma image and returns each decoded grid
//! with its location.

use crate::app::frame_processor::types::{Barcode, BarcodeFormat, FrameRegion};
use image::GrayImage;
use tracing::{debug, trace};

/// Decode every QR grid in `gray`
///
/// `scale` maps `gray` back to the upright frame of `width` x `height`.
pub(super) fn detect(gray: &GrayImage, scale: f32, width: u32, height: u32) -> Vec<Barcode> {
    let (proc_width, proc_height) = gray.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        proc_width as usize,
        proc_height as usize,
        |x, y| gray.get_pixel(x as u32, y as u32)[0],
    );
    let grids = prepared.detect_grids();

    let mut barcodes = Vec::with_capacity(grids.len());
    for grid in grids {
        let content = match grid.decode() {
            Ok((meta, content)) => {
                trace!(version = meta.version.0, ecc = meta.ecc_level, "Decoded grid");
                content
            }
            Err(e) => {
                debug!(error = ?e, "Failed to decode QR code");
                continue;
            }
        };

        let region = grid_region(&grid.bounds, scale, width, height);

        debug!(
            content = %content,
            x = region.x,
            y = region.y,
            width = region.width,
            height = region.height,
            "Detected QR code"
        );

        barcodes.push(Barcode::new(content, BarcodeFormat::QrCode, Some(region)));
    }

    barcodes
}

/// Bounding box of the four grid corners, in normalized upright coordinates
fn grid_region(corners: &[rqrr::Point; 4], scale: f32, width: u32, height: u32) -> FrameRegion {
    let xs = corners.iter().map(|p| p.x);
    let ys = corners.iter().map(|p| p.y);
    let min_x = xs.clone().min().unwrap_or(0).max(0) as f32 * scale;
    let max_x = xs.max().unwrap_or(0).max(0) as f32 * scale;
    let min_y = ys.clone().min().unwrap_or(0).max(0) as f32 * scale;
    let max_y = ys.max().unwrap_or(0).max(0) as f32 * scale;

    FrameRegion::from_pixels(
        min_x as u32,
        min_y as u32,
        (max_x - min_x) as u32,
        (max_y - min_y) as u32,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_region_scales_back() {
        let corners = [
            rqrr::Point { x: 10, y: 20 },
            rqrr::Point { x: 60, y: 20 },
            rqrr::Point { x: 60, y: 70 },
            rqrr::Point { x: 10, y: 70 },
        ];
        let region = grid_region(&corners, 2.0, 400, 200);
        assert!((region.x - 0.05).abs() < 0.001);
        assert!((region.y - 0.2).abs() < 0.001);
        assert!((region.width - 0.25).abs() < 0.001);
        assert!((region.height - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_blank_image_has_no_grids() {
        let gray = GrayImage::from_pixel(64, 48, image::Luma([255]));
        assert!(detect(&gray, 1.0, 64, 48).is_empty());
    }
}
