// SPDX-License-Identifier: GPL-3.0-only

//! Decoder input: a luma plane plus the rotation that makes it upright

use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::errors::DecodeError;
use image::{DynamicImage, GrayImage, Luma, imageops};

/// Where the luma samples live in a frame row
enum LumaLayout {
    /// One byte per pixel (GREY, NV12 Y plane)
    Plane,
    /// YUYV 4:2:2
    Interleaved,
    /// RGB24 / RGBA
    Rgb,
}

/// Grayscale image handed to a barcode scanner
#[derive(Debug, Clone)]
pub struct InputImage {
    luma: GrayImage,
    rotation_degrees: u32,
}

impl InputImage {
    /// Build the decoder input from a captured frame
    ///
    /// `rotation_degrees` is the clockwise rotation that makes the frame
    /// upright. Row stride padding is skipped; only the luma channel is kept.
    pub fn from_frame(frame: &CameraFrame, rotation_degrees: u32) -> Result<Self, DecodeError> {
        let rotation_degrees = check_rotation(rotation_degrees)?;
        let (width, height) = (frame.width, frame.height);
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidImage(format!(
                "empty frame {}x{}",
                width, height
            )));
        }

        let layout = match frame.format {
            PixelFormat::Gray8 | PixelFormat::Nv12 => LumaLayout::Plane,
            PixelFormat::Yuyv => LumaLayout::Interleaved,
            PixelFormat::Rgb24 | PixelFormat::Rgba => LumaLayout::Rgb,
            PixelFormat::Mjpeg => {
                return Err(DecodeError::UnsupportedFormat(
                    "compressed frames must be decoded before analysis".to_string(),
                ));
            }
        };
        let bpp = frame.format.bytes_per_pixel() as usize;

        let row_bytes = width as usize * bpp;
        let stride = if frame.stride == 0 {
            row_bytes
        } else {
            frame.stride as usize
        };
        if stride < row_bytes {
            return Err(DecodeError::InvalidImage(format!(
                "stride {} shorter than row of {} bytes",
                stride, row_bytes
            )));
        }

        // NV12 carries its luma plane first; the chroma plane is ignored
        let required = stride * (height as usize - 1) + row_bytes;
        if frame.data.len() < required {
            return Err(DecodeError::InvalidImage(format!(
                "{} bytes for {}x{} {} (need {})",
                frame.data.len(),
                width,
                height,
                frame.format,
                required
            )));
        }

        let data = &frame.data;
        let luma = match layout {
            LumaLayout::Plane => GrayImage::from_fn(width, height, |x, y| {
                Luma([data[y as usize * stride + x as usize]])
            }),
            // Y0 U Y1 V: luma sits on even bytes
            LumaLayout::Interleaved => GrayImage::from_fn(width, height, |x, y| {
                Luma([data[y as usize * stride + x as usize * 2]])
            }),
            LumaLayout::Rgb => GrayImage::from_fn(width, height, |x, y| {
                let offset = y as usize * stride + x as usize * bpp;
                Luma([rgb_to_luma(data[offset], data[offset + 1], data[offset + 2])])
            }),
        };

        Ok(Self {
            luma,
            rotation_degrees,
        })
    }

    /// Wrap a tightly packed luma plane
    pub fn from_luma(
        width: u32,
        height: u32,
        luma: Vec<u8>,
        rotation_degrees: u32,
    ) -> Result<Self, DecodeError> {
        let rotation_degrees = check_rotation(rotation_degrees)?;
        let len = luma.len();
        let luma = GrayImage::from_raw(width, height, luma).ok_or_else(|| {
            DecodeError::InvalidImage(format!("{} bytes for {}x{} luma", len, width, height))
        })?;
        Ok(Self {
            luma,
            rotation_degrees,
        })
    }

    /// Upright image loaded from a file
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self {
            luma: image.to_luma8(),
            rotation_degrees: 0,
        }
    }

    /// Width of the stored (unrotated) plane
    pub fn width(&self) -> u32 {
        self.luma.width()
    }

    /// Height of the stored (unrotated) plane
    pub fn height(&self) -> u32 {
        self.luma.height()
    }

    pub fn rotation_degrees(&self) -> u32 {
        self.rotation_degrees
    }

    pub fn luma(&self) -> &[u8] {
        self.luma.as_raw()
    }

    /// The plane rotated clockwise by the rotation metadata
    pub fn upright(&self) -> GrayImage {
        match self.rotation_degrees {
            90 => imageops::rotate90(&self.luma),
            180 => imageops::rotate180(&self.luma),
            270 => imageops::rotate270(&self.luma),
            _ => self.luma.clone(),
        }
    }
}

fn check_rotation(degrees: u32) -> Result<u32, DecodeError> {
    match degrees % 360 {
        d @ (0 | 90 | 180 | 270) => Ok(d),
        d => Err(DecodeError::InvalidImage(format!("rotation of {} degrees", d))),
    }
}

/// BT.601 luma in fixed point
fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}
