// SPDX-License-Identifier: GPL-3.0-only

//! Platform backends
//!
//! - [`camera`]: V4L2 camera discovery, capture and the preview/analysis use cases
//!
//! Camera access authorization lives in [`crate::permission`].

pub mod camera;
