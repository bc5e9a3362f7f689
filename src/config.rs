// SPDX-License-Identifier: GPL-3.0-only

//! Persistent settings
//!
//! Stored as JSON in `$XDG_CONFIG_HOME/barcode-scanner/config.json`. Every
//! field has a default, so older or hand-edited files keep loading.

use crate::backends::camera::{
    BackpressureStrategy, CameraFormat, CameraSelector, LensFacing, PixelFormat,
};
use crate::constants::{
    APP_DIR_NAME, CAPTURE_BUFFER_COUNT, CaptureResolution, DECODER_MAX_DIMENSION,
};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which camera to scan with
    pub lens_facing: LensFacing,
    /// Explicit device node; overrides `lens_facing` when set
    pub device_path: Option<String>,
    /// Requested capture size
    pub capture_resolution: CaptureResolution,
    /// Requested capture pixel format
    pub pixel_format: PixelFormat,
    /// Number of driver buffers to stream with
    pub capture_buffers: u32,
    /// Longest frame edge handed to the decoder
    pub decoder_max_dimension: u32,
    /// Frame handling while the decoder is busy
    pub backpressure: BackpressureStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lens_facing: LensFacing::Back,
            device_path: None,
            capture_resolution: CaptureResolution::default(),
            pixel_format: PixelFormat::Yuyv,
            capture_buffers: CAPTURE_BUFFER_COUNT,
            decoder_max_dimension: DECODER_MAX_DIMENSION,
            backpressure: BackpressureStrategy::KeepOnlyLatest,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location
    ///
    /// A missing or unreadable file yields the defaults; problems are logged.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            warn!("No config directory, using defaults");
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unusable config file");
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing file is not an error
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save to the default location, returning where it was written
    pub fn save(&self) -> AppResult<PathBuf> {
        let path = Self::path()
            .ok_or_else(|| AppError::Config("no config directory".to_string()))?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    fn validate(&self) -> AppResult<()> {
        if self.capture_buffers == 0 {
            return Err(AppError::Config("capture_buffers must be at least 1".to_string()));
        }
        if self.decoder_max_dimension < 64 {
            return Err(AppError::Config(
                "decoder_max_dimension must be at least 64".to_string(),
            ));
        }
        Ok(())
    }

    /// Camera selection criteria
    pub fn selector(&self) -> CameraSelector {
        CameraSelector {
            facing: self.lens_facing,
            device_path: self.device_path.clone(),
        }
    }

    /// Capture format to request from the driver
    pub fn capture_format(&self) -> CameraFormat {
        let (width, height) = self.capture_resolution.dimensions();
        CameraFormat {
            width,
            height,
            pixel_format: self.pixel_format,
        }
    }
}
