// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera provider
//!
//! Streams frames from a `/dev/video*` node on a capture thread and fans each
//! frame out to the bound preview and analysis use cases.

use super::CameraProvider;
use super::analysis::ImageAnalysis;
use super::frame_loop::{CaptureThread, StartupSignal, StopSignal};
use super::preview::Preview;
use super::types::*;
use super::v4l2_utils::enumerate_cameras;
use crate::constants::{
    CAPTURE_ERROR_LOG_INTERVAL, CAPTURE_FRAME_TIMEOUT, CAPTURE_STARTUP_TIMEOUT,
    CAPTURE_THREAD_NAME,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Use cases currently attached to a running capture thread
struct BoundSession {
    device: CameraDevice,
    capture: CaptureThread,
    preview: Preview,
    analysis: ImageAnalysis,
}

/// Camera provider backed by V4L2 memory-mapped streaming
pub struct V4l2CameraProvider {
    requested: CameraFormat,
    buffer_count: u32,
    session: Option<BoundSession>,
}

impl V4l2CameraProvider {
    /// Create a provider that will request `requested` from the driver
    pub fn new(requested: CameraFormat, buffer_count: u32) -> Self {
        Self {
            requested,
            buffer_count,
            session: None,
        }
    }
}

impl CameraProvider for V4l2CameraProvider {
    fn acquire(&self) -> BoxFuture<'static, BackendResult<Vec<CameraDevice>>> {
        async {
            let cameras = tokio::task::spawn_blocking(enumerate_cameras)
                .await
                .map_err(|e| BackendError::Other(format!("Enumeration task failed: {}", e)))?;

            if cameras.is_empty() {
                Err(BackendError::DeviceNotFound("No V4L2 capture devices".to_string()))
            } else {
                info!(count = cameras.len(), "Enumerated cameras");
                Ok(cameras)
            }
        }
        .boxed()
    }

    /// Opens and configures the device before returning, so a node that
    /// cannot be streamed fails the bind
    fn bind_to_lifecycle(
        &mut self,
        device: &CameraDevice,
        preview: Preview,
        analysis: ImageAnalysis,
    ) -> BackendResult<()> {
        if self.is_bound() {
            return Err(BackendError::AlreadyBound);
        }
        // Clears a session whose capture thread already ended
        self.unbind_all();

        info!(
            device = %device.name,
            path = %device.path,
            format = %self.requested,
            "Binding camera"
        );

        let capture_device = device.clone();
        let requested = self.requested;
        let buffer_count = self.buffer_count;
        let thread_preview = preview.clone();
        let thread_analysis = analysis.clone();

        let capture = CaptureThread::spawn(
            CAPTURE_THREAD_NAME,
            CAPTURE_STARTUP_TIMEOUT,
            move |stop, startup| {
                let target = CaptureTarget {
                    device: &capture_device,
                    preview: &thread_preview,
                    analysis: &thread_analysis,
                };
                capture_loop(target, requested, buffer_count, stop, startup)
            },
        )?;

        self.session = Some(BoundSession {
            device: device.clone(),
            capture,
            preview,
            analysis,
        });
        Ok(())
    }

    fn unbind_all(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        info!(device = %session.device.name, "Unbinding camera");
        // Wake a producer blocked on backpressure before joining it
        session.analysis.clear_analyzer();
        session.capture.stop();
        session.preview.clear();
    }

    fn is_bound(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.capture.is_running())
    }
}

impl Drop for V4l2CameraProvider {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

/// Where captured frames go
struct CaptureTarget<'a> {
    device: &'a CameraDevice,
    preview: &'a Preview,
    analysis: &'a ImageAnalysis,
}

/// Open `path`, negotiate the format and map the buffers
fn open_stream(
    path: &str,
    requested: CameraFormat,
    buffer_count: u32,
) -> BackendResult<(MmapStream<'static>, v4l::Format, PixelFormat)> {
    let dev = Device::with_path(path)
        .map_err(|e| BackendError::InitializationFailed(format!("{}: {}", path, e)))?;

    let mut format = dev
        .format()
        .map_err(|e| BackendError::InitializationFailed(format!("query format: {}", e)))?;
    format.width = requested.width;
    format.height = requested.height;
    format.fourcc = v4l::FourCC::new(&requested.pixel_format.fourcc());

    // Drivers adjust the request to the closest mode they support
    let format = dev
        .set_format(&format)
        .map_err(|e| BackendError::FormatNotSupported(format!("{}: {}", requested, e)))?;

    let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
        BackendError::FormatNotSupported(String::from_utf8_lossy(&format.fourcc.repr).into_owned())
    })?;

    // The stream keeps its own handle to the device
    let mut stream = MmapStream::with_buffers(&dev, Type::VideoCapture, buffer_count)
        .map_err(|e| BackendError::InitializationFailed(format!("buffer stream: {}", e)))?;
    stream.set_timeout(CAPTURE_FRAME_TIMEOUT);

    Ok((stream, format, pixel_format))
}

/// Main capture loop running in the capture thread
fn capture_loop(
    target: CaptureTarget<'_>,
    requested: CameraFormat,
    buffer_count: u32,
    stop: &StopSignal,
    startup: &mut StartupSignal,
) -> BackendResult<()> {
    let device = target.device;
    let (mut stream, format, pixel_format) = open_stream(&device.path, requested, buffer_count)?;

    info!(
        width = format.width,
        height = format.height,
        fourcc = %pixel_format,
        stride = format.stride,
        "Negotiated capture format"
    );
    startup.ready();

    let mut frame_count: u64 = 0;
    let mut failures: u32 = 0;
    // A timed-out `next` has already requeued the previous buffer; one bare
    // dequeue brings the stream back in step before `next` runs again
    let mut stalled = false;

    while !stop.is_raised() {
        if stalled {
            match CaptureStream::dequeue(&mut stream) {
                Ok(_) => {
                    info!(path = %device.path, "Camera resumed delivering frames");
                    stalled = false;
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => capture_failed(device, &e, &mut failures)?,
            }
            continue;
        }

        let (buf, meta) = match stream.next() {
            Ok(next) => next,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                warn!(
                    path = %device.path,
                    timeout = ?CAPTURE_FRAME_TIMEOUT,
                    "Camera stopped delivering frames"
                );
                stalled = true;
                continue;
            }
            Err(e) => {
                capture_failed(device, &e, &mut failures)?;
                continue;
            }
        };
        failures = 0;

        let used = (meta.bytesused as usize).min(buf.len());
        let captured_at = Instant::now();

        let frame = match pixel_format {
            PixelFormat::Mjpeg => match decode_mjpeg(&buf[..used]) {
                Ok(frame) => frame,
                Err(e) => {
                    debug!(error = %e, "Dropping undecodable MJPEG frame");
                    continue;
                }
            },
            _ => CameraFrame {
                width: format.width,
                height: format.height,
                data: Arc::from(&buf[..used]),
                format: pixel_format,
                stride: format.stride,
                rotation: SensorRotation::None,
                sequence: 0,
                captured_at,
            },
        };

        let frame = CameraFrame {
            sequence: u64::from(meta.sequence),
            rotation: device.rotation,
            captured_at,
            ..frame
        };

        frame_count += 1;
        if frame_count % 300 == 0 {
            debug!(frames = frame_count, stats = ?target.analysis.stats(), "Capture progress");
        }

        target.preview.publish(frame.clone());
        target.analysis.offer(frame);
    }

    info!(frames = frame_count, "V4L2 capture loop ended");
    Ok(())
}

/// Log a failed dequeue; an unplugged device ends the capture
fn capture_failed(
    device: &CameraDevice,
    error: &io::Error,
    failures: &mut u32,
) -> BackendResult<()> {
    if error.raw_os_error() == Some(libc::ENODEV) {
        return Err(BackendError::DeviceNotFound(format!("{} disconnected", device.path)));
    }

    *failures += 1;
    if *failures == 1 || *failures % CAPTURE_ERROR_LOG_INTERVAL == 0 {
        warn!(path = %device.path, error = %error, failures = *failures, "Failed to capture frame");
    } else {
        trace!(error = %error, "Failed to capture frame");
    }
    std::thread::sleep(Duration::from_millis(10));
    Ok(())
}

/// Decode a Motion-JPEG payload into a packed RGB24 frame
fn decode_mjpeg(data: &[u8]) -> Result<CameraFrame, image::ImageError> {
    let rgb = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(CameraFrame::packed(
        width,
        height,
        PixelFormat::Rgb24,
        rgb.into_raw(),
    ))
}
