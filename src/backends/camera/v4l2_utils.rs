// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 device discovery
//!
//! Queries `/dev/video*` nodes with raw ioctls to find capture devices and
//! read the sensor location and rotation controls where the driver has them.

use super::types::{CameraDevice, LensFacing, SensorRotation};
use std::fs::File;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use tracing::{debug, trace};

/// VIDIOC_QUERYCAP ioctl number
const VIDIOC_QUERYCAP: libc::c_ulong = 0x80685600;
/// Get control value (v4l2_control: 8 bytes)
const VIDIOC_G_CTRL: libc::c_ulong = 0xC008561B;

const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
const V4L2_CAP_DEVICE_CAPS: u32 = 0x8000_0000;

const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a0000;
const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;

/// Sensor location: 0 = front, 1 = back, 2 = external
pub const V4L2_CID_CAMERA_SENSOR_LOCATION: u32 = V4L2_CID_CAMERA_CLASS_BASE + 34;
/// Sensor mounting rotation in degrees
pub const V4L2_CID_CAMERA_SENSOR_ROTATION: u32 = V4L2_CID_CAMERA_CLASS_BASE + 35;

/// V4L2 capability structure for VIDIOC_QUERYCAP ioctl
#[repr(C)]
struct V4l2Capability {
    driver: [u8; 16],
    card: [u8; 32],
    bus_info: [u8; 32],
    version: u32,
    capabilities: u32,
    device_caps: u32,
    reserved: [u32; 3],
}

/// V4L2 control get structure
#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

fn query_v4l2_cap(fd: RawFd) -> Option<V4l2Capability> {
    let mut cap: V4l2Capability = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCAP as _, &mut cap as *mut V4l2Capability) };
    if result < 0 { None } else { Some(cap) }
}

fn get_control(fd: RawFd, control_id: u32) -> Option<i32> {
    let mut ctrl = V4l2Control {
        id: control_id,
        value: 0,
    };
    let result = unsafe { libc::ioctl(fd, VIDIOC_G_CTRL as _, &mut ctrl as *mut V4l2Control) };
    if result < 0 { None } else { Some(ctrl.value) }
}

/// Decode a NUL-padded C string field
fn c_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).trim().to_string()
}

/// Whether the reported capabilities describe a video capture node
///
/// Drivers that set `V4L2_CAP_DEVICE_CAPS` describe the node itself in
/// `device_caps`; `capabilities` then covers the whole physical device, which
/// would also match its metadata nodes.
fn is_capture_node(capabilities: u32, device_caps: u32) -> bool {
    let caps = if capabilities & V4L2_CAP_DEVICE_CAPS != 0 {
        device_caps
    } else {
        capabilities
    };
    caps & V4L2_CAP_VIDEO_CAPTURE != 0
}

/// Parse the index out of a `videoN` node name
fn video_index(file_name: &str) -> Option<u32> {
    file_name.strip_prefix("video")?.parse().ok()
}

/// Inspect a single device node; `None` if it is not a capture device
pub fn inspect_device(path: &Path) -> Option<CameraDevice> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot open video node");
            return None;
        }
    };
    let fd = file.as_raw_fd();
    let cap = query_v4l2_cap(fd)?;

    if !is_capture_node(cap.capabilities, cap.device_caps) {
        trace!(path = %path.display(), "Not a capture node");
        return None;
    }

    let name = c_string(&cap.card);
    let bus_info = c_string(&cap.bus_info);

    let facing = get_control(fd, V4L2_CID_CAMERA_SENSOR_LOCATION)
        .and_then(LensFacing::from_v4l2_location)
        .unwrap_or_else(|| LensFacing::from_device_name(&name, &bus_info));
    let rotation = get_control(fd, V4L2_CID_CAMERA_SENSOR_ROTATION)
        .map(SensorRotation::from_degrees_int)
        .unwrap_or_default();

    let device = CameraDevice {
        name,
        path: path.to_string_lossy().to_string(),
        driver: c_string(&cap.driver),
        facing,
        rotation,
    };

    debug!(
        path = %device.path,
        name = %device.name,
        driver = %device.driver,
        facing = %device.facing,
        rotation = %device.rotation,
        "Found capture device"
    );
    Some(device)
}

/// Enumerate all V4L2 capture devices, ordered by node index
pub fn enumerate_cameras() -> Vec<CameraDevice> {
    let mut nodes: Vec<(u32, std::path::PathBuf)> = match std::fs::read_dir("/dev") {
        Ok(entries) => entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let index = video_index(&name.to_string_lossy())?;
                Some((index, entry.path()))
            })
            .collect(),
        Err(e) => {
            debug!(error = %e, "Cannot read /dev");
            Vec::new()
        }
    };
    nodes.sort_by_key(|(index, _)| *index);

    nodes
        .iter()
        .filter_map(|(_, path)| inspect_device(path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_index() {
        assert_eq!(video_index("video0"), Some(0));
        assert_eq!(video_index("video12"), Some(12));
        assert_eq!(video_index("video"), None);
        assert_eq!(video_index("vide0"), None);
        assert_eq!(video_index("v4l-subdev0"), None);
    }

    #[test]
    fn test_capture_node_uses_device_caps() {
        // Physical device captures, but this node is metadata only
        assert!(!is_capture_node(
            V4L2_CAP_DEVICE_CAPS | V4L2_CAP_VIDEO_CAPTURE,
            0x0080_0000
        ));
        assert!(is_capture_node(
            V4L2_CAP_DEVICE_CAPS | V4L2_CAP_VIDEO_CAPTURE,
            V4L2_CAP_VIDEO_CAPTURE
        ));
        // Old drivers without device caps
        assert!(is_capture_node(V4L2_CAP_VIDEO_CAPTURE, 0));
    }

    #[test]
    fn test_c_string() {
        let mut field = [0u8; 16];
        field[..5].copy_from_slice(b"uvcvi");
        assert_eq!(c_string(&field), "uvcvi");
        assert_eq!(c_string(b"no-terminator"), "no-terminator");
    }

    #[test]
    fn test_control_ids() {
        assert_eq!(V4L2_CID_CAMERA_SENSOR_LOCATION, 0x009a0922);
        assert_eq!(V4L2_CID_CAMERA_SENSOR_ROTATION, 0x009a0923);
    }
}
