// SPDX-License-Identifier: GPL-3.0-only

//! Multi-format pass
//!
//! Runs `rxing` over the prepared luma image for 1D retail and industrial
//! codes (EAN, UPC, Code 128, ...) and the 2D symbologies other than QR.

use crate::app::frame_processor::types::{Barcode, BarcodeFormat};
use image::GrayImage;
use rxing::BarcodeFormat as RxingFormat;
use tracing::{debug, trace};

/// Decode every barcode `rxing` finds in `gray`
pub(super) fn detect(gray: &GrayImage) -> Vec<Barcode> {
    let results = match rxing::helpers::detect_multiple_in_luma(
        gray.as_raw().clone(),
        gray.width(),
        gray.height(),
    ) {
        Ok(results) => results,
        Err(e) => {
            // Also the normal outcome for a frame without a barcode
            trace!(error = ?e, "Multi-format pass found nothing");
            return Vec::new();
        }
    };

    results
        .into_iter()
        .filter_map(|result| {
            let Some(format) = symbology(result.getBarcodeFormat()) else {
                trace!(format = ?result.getBarcodeFormat(), "Skipping unsupported symbology");
                return None;
            };
            debug!(%format, "Detected barcode");
            Some(Barcode::new(result.getText().to_string(), format, None))
        })
        .collect()
}

fn symbology(format: &RxingFormat) -> Option<BarcodeFormat> {
    let format = match format {
        RxingFormat::QR_CODE => BarcodeFormat::QrCode,
        RxingFormat::AZTEC => BarcodeFormat::Aztec,
        RxingFormat::CODABAR => BarcodeFormat::Codabar,
        RxingFormat::CODE_39 => BarcodeFormat::Code39,
        RxingFormat::CODE_93 => BarcodeFormat::Code93,
        RxingFormat::CODE_128 => BarcodeFormat::Code128,
        RxingFormat::DATA_MATRIX => BarcodeFormat::DataMatrix,
        RxingFormat::EAN_8 => BarcodeFormat::Ean8,
        RxingFormat::EAN_13 => BarcodeFormat::Ean13,
        RxingFormat::ITF => BarcodeFormat::Itf,
        RxingFormat::PDF_417 => BarcodeFormat::Pdf417,
        RxingFormat::UPC_A => BarcodeFormat::UpcA,
        RxingFormat::UPC_E => BarcodeFormat::UpcE,
        _ => return None,
    };
    Some(format)
}
