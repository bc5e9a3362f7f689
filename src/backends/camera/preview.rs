// SPDX-License-Identifier: GPL-3.0-only

//! Preview use case: the most recent frame, for the UI to draw

use super::types::CameraFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Latest-frame slot shared between the capture thread and the UI
///
/// The UI redraws at its own pace, so older frames are simply overwritten.
#[derive(Clone, Default)]
pub struct Preview {
    latest: Arc<Mutex<Option<CameraFrame>>>,
    frame_count: Arc<AtomicU64>,
}

impl Preview {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame. Called by the camera pipeline.
    pub fn publish(&self, frame: CameraFrame) {
        let mut latest = match self.latest.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *latest = Some(frame);
        self.frame_count.fetch_add(1, Ordering::Relaxed);
    }

    /// The most recent frame, if any
    pub fn latest(&self) -> Option<CameraFrame> {
        match self.latest.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Forget the current frame (camera unbound)
    pub fn clear(&self) {
        match self.latest.lock() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    /// Total number of frames published since creation
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Preview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preview")
            .field("frame_count", &self.frame_count())
            .finish()
    }
}
