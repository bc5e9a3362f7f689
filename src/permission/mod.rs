// SPDX-License-Identifier: GPL-3.0-only

//! Camera access authorization
//!
//! [`PermissionGate`] is the scanner screen's permission state machine. It is
//! pure: each transition returns the [`GateAction`] the screen has to perform,
//! so the screen owns all side effects (starting the camera, talking to the
//! authorizer, showing status).
//!
//! ```text
//! Unchecked ──authorized──► Authorized
//!     │
//!     └──not authorized──► Pending ──granted──► Authorized
//!                             ▲  │
//!                             │  └──denied──► Denied
//!                             └────re-request───┘
//! ```

pub mod portal;

pub use portal::PortalAuthorizer;

use crate::constants::CAMERA_ACCESS_REQUEST_CODE;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

/// Identifier pairing a permission request with its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestCode(pub u32);

impl RequestCode {
    /// Request for the camera capability
    pub const CAMERA_ACCESS: RequestCode = RequestCode(CAMERA_ACCESS_REQUEST_CODE);
}

impl std::fmt::Display for RequestCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a permission request
///
/// One grant flag per requested capability; only the camera is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionResult {
    pub request: RequestCode,
    pub grants: Vec<bool>,
}

impl PermissionResult {
    /// Camera access granted
    pub fn granted(request: RequestCode) -> Self {
        Self {
            request,
            grants: vec![true],
        }
    }

    /// Camera access denied
    pub fn denied(request: RequestCode) -> Self {
        Self {
            request,
            grants: vec![false],
        }
    }

    /// Request dismissed without an answer
    pub fn cancelled(request: RequestCode) -> Self {
        Self {
            request,
            grants: Vec::new(),
        }
    }

    /// True when the camera was granted
    ///
    /// An empty grant list means the request was cancelled.
    pub fn is_granted(&self) -> bool {
        self.grants.first().copied().unwrap_or(false)
    }
}

/// Permission state of one scanner screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    /// Not queried yet
    #[default]
    Unchecked,
    /// A request is outstanding
    Pending,
    Authorized,
    Denied,
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionState::Unchecked => write!(f, "unchecked"),
            PermissionState::Pending => write!(f, "waiting for camera access"),
            PermissionState::Authorized => write!(f, "camera access granted"),
            PermissionState::Denied => write!(f, "camera access denied"),
        }
    }
}

/// Side effect requested by a [`PermissionGate`] transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    /// Start the camera pipeline
    StartCamera,
    /// Ask the authorizer for camera access with this request code
    RequestAccess(RequestCode),
    /// Tell the user access was refused
    ReportDenied,
    /// Nothing to do
    None,
}

/// Permission state machine
#[derive(Debug, Default)]
pub struct PermissionGate {
    state: PermissionState,
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PermissionState {
        self.state
    }

    /// Apply the one-time authorization check made at screen creation
    ///
    /// Later calls are ignored.
    pub fn on_create(&mut self, authorized: bool) -> GateAction {
        if self.state != PermissionState::Unchecked {
            debug!(state = ?self.state, "Permission already checked");
            return GateAction::None;
        }

        if authorized {
            info!("Camera access already authorized");
            self.state = PermissionState::Authorized;
            GateAction::StartCamera
        } else {
            info!("Camera access not authorized, requesting");
            self.state = PermissionState::Pending;
            GateAction::RequestAccess(RequestCode::CAMERA_ACCESS)
        }
    }

    /// Apply an authorization result callback
    pub fn on_result(&mut self, result: &PermissionResult) -> GateAction {
        if result.request != RequestCode::CAMERA_ACCESS {
            debug!(request = %result.request, "Ignoring result for foreign request");
            return GateAction::None;
        }
        if self.state != PermissionState::Pending {
            debug!(state = ?self.state, "Ignoring result with no request pending");
            return GateAction::None;
        }

        if result.is_granted() {
            info!("Camera access granted");
            self.state = PermissionState::Authorized;
            GateAction::StartCamera
        } else {
            warn!("Camera access denied");
            self.state = PermissionState::Denied;
            GateAction::ReportDenied
        }
    }

    /// Explicit user request to ask again after a denial
    pub fn re_request(&mut self) -> GateAction {
        if self.state != PermissionState::Denied {
            return GateAction::None;
        }
        info!("Re-requesting camera access");
        self.state = PermissionState::Pending;
        GateAction::RequestAccess(RequestCode::CAMERA_ACCESS)
    }
}

/// Platform authorization collaborator
pub trait CameraAuthorizer: Send + Sync {
    /// Whether the process can use the camera right now, without prompting
    fn check(&self) -> bool;

    /// Ask the user for camera access
    ///
    /// Failures are reported as a denial; the future never errors.
    fn request(&self, request: RequestCode) -> BoxFuture<'static, PermissionResult>;
}
