// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   Scanner screen    │
//! └──────────┬──────────┘
//!            │ bind_to_lifecycle(device, preview, analysis)
//!            ▼
//! ┌─────────────────────┐
//! │ CameraProvider trait│  ← Common interface
//! └──────────┬──────────┘
//!            │
//!            ▼
//!       ┌────────┐
//!       │  V4L2  │  ← Capture thread, one frame at a time
//!       └───┬────┘
//!           ├──────────────► Preview (latest frame)
//!           └──────────────► ImageAnalysis ──► Analyzer on SerialExecutor
//! ```

pub mod analysis;
pub mod executor;
pub mod frame_loop;
pub mod preview;
pub mod types;
pub mod v4l2_provider;
pub mod v4l2_utils;

pub use analysis::{
    AnalysisStats, Analyzer, BackpressureStrategy, ImageAnalysis, ImageAnalysisBuilder,
    ImageProxy,
};
pub use executor::SerialExecutor;
pub use preview::Preview;
pub use types::*;
pub use v4l2_provider::V4l2CameraProvider;

use futures::future::BoxFuture;

/// Camera provider trait
///
/// A provider hands out the list of cameras asynchronously and binds the
/// preview and analysis use cases of one screen to a device. At most one
/// binding is live at a time.
pub trait CameraProvider: Send {
    /// Obtain the available cameras
    ///
    /// Completes off the UI thread. An empty system is reported as
    /// `BackendError::DeviceNotFound`.
    fn acquire(&self) -> BoxFuture<'static, BackendResult<Vec<CameraDevice>>>;

    /// Attach `preview` and `analysis` to `device` and start streaming
    ///
    /// Returns `BackendError::AlreadyBound` if a previous binding is still
    /// live; call [`CameraProvider::unbind_all`] first.
    fn bind_to_lifecycle(
        &mut self,
        device: &CameraDevice,
        preview: Preview,
        analysis: ImageAnalysis,
    ) -> BackendResult<()>;

    /// Stop streaming and detach every bound use case
    fn unbind_all(&mut self);

    /// Whether a binding is live
    fn is_bound(&self) -> bool;
}

/// Criteria for picking one camera out of the acquired list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraSelector {
    /// Required lens direction
    pub facing: LensFacing,
    /// Explicit device node; takes precedence over `facing`
    pub device_path: Option<String>,
}

impl CameraSelector {
    /// Select by lens direction only
    pub fn facing(facing: LensFacing) -> Self {
        Self {
            facing,
            device_path: None,
        }
    }

    /// First camera matching the selector
    pub fn select<'a>(&self, cameras: &'a [CameraDevice]) -> BackendResult<&'a CameraDevice> {
        if let Some(path) = &self.device_path {
            return cameras
                .iter()
                .find(|c| &c.path == path)
                .ok_or_else(|| BackendError::DeviceNotFound(format!("No camera at {}", path)));
        }

        cameras
            .iter()
            .find(|c| c.facing == self.facing)
            .ok_or_else(|| {
                BackendError::DeviceNotFound(format!("No {} camera available", self.facing))
            })
    }
}
