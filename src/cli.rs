// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands that run without the terminal UI
//!
//! - Listing available cameras
//! - Decoding barcodes from image files
//! - Showing and saving the settings

use barcode_scanner::app::frame_processor::InputImage;
use barcode_scanner::backends::camera::v4l2_utils::enumerate_cameras;
use barcode_scanner::constants::CaptureResolution;
use barcode_scanner::{BarcodeDetector, Config};
use std::path::{Path, PathBuf};

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Path:     {}", camera.path);
        println!("      Driver:   {}", camera.driver);
        println!("      Facing:   {}", camera.facing);
        println!("      Rotation: {}", camera.rotation);
        println!();
    }

    Ok(())
}

/// Decode every barcode found in the given images
///
/// Directories are expanded to the supported images they contain.
pub fn decode_images(
    input: &[PathBuf],
    max_dimension: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let paths = collect_image_paths(input)?;
    if paths.is_empty() {
        return Err("No supported images found".into());
    }

    let detector = BarcodeDetector::with_max_dimension(max_dimension);
    let mut found = 0usize;

    for path in &paths {
        let image = image::open(path)
            .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
        let barcodes = detector.detect_sync(&InputImage::from_dynamic(&image));

        if paths.len() > 1 {
            println!("{}:", path.display());
        }
        if barcodes.is_empty() {
            println!("  no barcode found");
        }
        for barcode in &barcodes {
            println!(
                "  [{}] {} {}",
                barcode.format,
                barcode.value_type.label(),
                barcode.raw_value
            );
        }
        found += barcodes.len();
    }

    if found == 0 {
        return Err("No barcode decoded".into());
    }
    Ok(())
}

/// Print the effective settings and optionally write them to the config file
pub fn show_config(config: &Config, save: bool) -> Result<(), Box<dyn std::error::Error>> {
    match Config::path() {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: none (no config directory)"),
    }
    println!();
    println!("  Lens facing:     {}", config.lens_facing);
    println!("  Device:          {}", config.device_path.as_deref().unwrap_or("auto"));
    println!("  Resolution:      {}", config.capture_resolution.display_name());
    println!("  Pixel format:    {}", config.pixel_format);
    println!("  Capture buffers: {}", config.capture_buffers);
    println!("  Decoder limit:   {} px", config.decoder_max_dimension);
    println!("  Backpressure:    {:?}", config.backpressure);
    println!();

    let presets: Vec<&str> = CaptureResolution::ALL
        .iter()
        .map(CaptureResolution::display_name)
        .collect();
    println!("Available resolutions: {}", presets.join(", "));

    if save {
        let path = config.save()?;
        println!();
        println!("Saved to {}", path.display());
    }
    Ok(())
}

fn collect_image_paths(input: &[PathBuf]) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();

    for path in input {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| is_supported_image(p))
                .collect();
            entries.sort();
            paths.extend(entries);
        } else if path.exists() {
            paths.push(path.clone());
        } else {
            return Err(format!("No such file: {}", path.display()).into());
        }
    }

    Ok(paths)
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            matches!(
                ext.to_lowercase().as_str(),
                "png" | "jpg" | "jpeg" | "bmp" | "gif" | "webp" | "tif" | "tiff" | "pnm" | "pgm"
            )
        })
        .unwrap_or(false)
}
