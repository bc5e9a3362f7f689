// SPDX-License-Identifier: GPL-3.0-only

//! Camera authorization through xdg-desktop-portal
//!
//! The check looks at the device nodes directly. The request goes through the
//! portal's `org.freedesktop.portal.Camera.AccessCamera` method, whose answer
//! arrives as a `Response` signal on a per-request object.

use super::{CameraAuthorizer, PermissionResult, RequestCode};
use crate::errors::PermissionError;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::collections::HashMap;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::{debug, info, warn};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

const PORTAL_DESTINATION: &str = "org.freedesktop.portal.Desktop";
const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
const CAMERA_INTERFACE: &str = "org.freedesktop.portal.Camera";
const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";

/// Portal response codes
const RESPONSE_SUCCESS: u32 = 0;
const RESPONSE_CANCELLED: u32 = 1;

/// Authorizer backed by the desktop portal
#[derive(Debug, Clone, Default)]
pub struct PortalAuthorizer;

impl PortalAuthorizer {
    pub fn new() -> Self {
        Self
    }
}

impl CameraAuthorizer for PortalAuthorizer {
    fn check(&self) -> bool {
        if is_sandboxed() {
            debug!("Running sandboxed, camera access needs the portal");
            return false;
        }
        has_accessible_video_node()
    }

    fn request(&self, request: RequestCode) -> BoxFuture<'static, PermissionResult> {
        async move {
            match access_camera().await {
                Ok(Some(true)) => PermissionResult::granted(request),
                Ok(Some(false)) => PermissionResult::denied(request),
                // Dialog dismissed: no grant for any capability
                Ok(None) => PermissionResult::cancelled(request),
                Err(e) => {
                    warn!(error = %e, "Camera access request failed");
                    PermissionResult::denied(request)
                }
            }
        }
        .boxed()
    }
}

/// Flatpak exposes this file in every sandbox
fn is_sandboxed() -> bool {
    Path::new("/.flatpak-info").exists()
}

/// Whether at least one `/dev/video*` node is readable and writable
fn has_accessible_video_node() -> bool {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return false;
    };

    entries.flatten().any(|entry| {
        entry.file_name().as_bytes().starts_with(b"video") && is_accessible(&entry.path())
    })
}

fn is_accessible(path: &Path) -> bool {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call
    let accessible = unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) } == 0;
    if !accessible {
        debug!(path = %path.display(), "Video node not accessible");
    }
    accessible
}

/// Object path the portal will use for a request made with `token`
fn request_path(unique_name: &str, token: &str) -> String {
    let sender = unique_name.trim_start_matches(':').replace('.', "_");
    format!("{}/request/{}/{}", PORTAL_PATH, sender, token)
}

/// Ask the portal for camera access
///
/// `Ok(None)` means the user dismissed the dialog.
async fn access_camera() -> Result<Option<bool>, PermissionError> {
    let connection = zbus::Connection::session()
        .await
        .map_err(|e| PermissionError::PortalUnavailable(e.to_string()))?;

    let camera = zbus::Proxy::new(
        &connection,
        PORTAL_DESTINATION,
        PORTAL_PATH,
        CAMERA_INTERFACE,
    )
    .await
    .map_err(|e| PermissionError::PortalUnavailable(e.to_string()))?;

    let present: bool = camera
        .get_property("IsCameraPresent")
        .await
        .map_err(|e| PermissionError::PortalUnavailable(e.to_string()))?;
    if !present {
        return Err(PermissionError::NoCamera);
    }

    let unique_name = connection
        .unique_name()
        .map(|name| name.to_string())
        .ok_or_else(|| PermissionError::PortalUnavailable("No unique bus name".to_string()))?;
    let token = format!("scanner_{}", uuid::Uuid::new_v4().simple());
    let expected_path = request_path(&unique_name, &token);

    // Subscribe before calling so a fast response is not missed
    let request = zbus::Proxy::new(
        &connection,
        PORTAL_DESTINATION,
        expected_path.as_str(),
        REQUEST_INTERFACE,
    )
    .await?;
    let mut responses = request.receive_signal("Response").await?;

    let mut options: HashMap<&str, Value> = HashMap::new();
    options.insert("handle_token", Value::new(token.as_str()));

    let handle: OwnedObjectPath = camera.call("AccessCamera", &(options,)).await?;
    if handle.as_str() != expected_path {
        // Old portal versions ignore handle_token
        warn!(
            expected = %expected_path,
            actual = %handle,
            "Portal returned an unexpected request handle"
        );
    }

    info!("Waiting for camera access decision");

    let message = responses.next().await.ok_or_else(|| {
        PermissionError::RequestFailed("Request closed without a response".to_string())
    })?;
    let (code, _results): (u32, HashMap<String, OwnedValue>) = message.body().deserialize()?;

    debug!(code, "Portal response");
    Ok(match code {
        RESPONSE_SUCCESS => Some(true),
        RESPONSE_CANCELLED => None,
        _ => Some(false),
    })
}
