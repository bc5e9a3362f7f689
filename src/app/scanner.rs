// SPDX-License-Identifier: GPL-3.0-only

//! Scanner screen
//!
//! Owns one analysis executor and one camera binding for its whole lifetime.
//! Everything asynchronous it starts reports back as a [`Message`] tagged with
//! the screen's [`SessionId`]; messages for another session, or arriving after
//! [`ScannerScreen::destroy`], are ignored.

use crate::app::context::UiContext;
use crate::app::frame_processor::types::link_target;
use crate::app::frame_processor::{BarcodeAnalyzer, BarcodeScanner, ResultPublisher};
use crate::app::state::{DecodedResult, Message, SessionId};
use crate::backends::camera::{
    AnalysisStats, BackendResult, BackpressureStrategy, CameraDevice, CameraProvider,
    CameraSelector, ImageAnalysis, Preview, SerialExecutor,
};
use crate::constants::ANALYSIS_THREAD_NAME;
use crate::errors::{AppError, AppResult};
use crate::permission::{
    CameraAuthorizer, GateAction, PermissionGate, PermissionResult, PermissionState,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Collaborators a scanner screen is built from
pub struct ScannerServices {
    pub authorizer: Arc<dyn CameraAuthorizer>,
    pub scanner: Arc<dyn BarcodeScanner>,
    pub provider: Box<dyn CameraProvider>,
    pub selector: CameraSelector,
    pub backpressure: BackpressureStrategy,
}

pub struct ScannerScreen {
    session: SessionId,
    ctx: UiContext,
    gate: PermissionGate,
    /// Cleared on destroy; checked by everything that reports back
    alive: Arc<AtomicBool>,
    executor: Arc<SerialExecutor>,
    authorizer: Arc<dyn CameraAuthorizer>,
    scanner: Arc<dyn BarcodeScanner>,
    provider: Box<dyn CameraProvider>,
    selector: CameraSelector,
    backpressure: BackpressureStrategy,
    camera: Option<CameraDevice>,
    preview: Option<Preview>,
    analysis: Option<ImageAnalysis>,
    decoded: Option<DecodedResult>,
    status: String,
    destroyed: bool,
}

impl ScannerScreen {
    /// Create the screen and run the one-time authorization check
    pub fn create(ctx: UiContext, services: ScannerServices) -> AppResult<Self> {
        let executor = SerialExecutor::new(ANALYSIS_THREAD_NAME)
            .map_err(|e| AppError::Other(format!("Failed to start analysis thread: {}", e)))?;

        let mut screen = Self {
            session: SessionId::next(),
            ctx,
            gate: PermissionGate::new(),
            alive: Arc::new(AtomicBool::new(true)),
            executor: Arc::new(executor),
            authorizer: services.authorizer,
            scanner: services.scanner,
            provider: services.provider,
            selector: services.selector,
            backpressure: services.backpressure,
            camera: None,
            preview: None,
            analysis: None,
            decoded: None,
            status: String::new(),
            destroyed: false,
        };

        info!(session = %screen.session, "Scanner screen created");

        let authorized = screen.authorizer.check();
        let action = screen.gate.on_create(authorized);
        screen.apply(action);
        Ok(screen)
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Result currently on display
    pub fn decoded(&self) -> Option<&DecodedResult> {
        self.decoded.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn permission_state(&self) -> PermissionState {
        self.gate.state()
    }

    /// Camera the use cases are bound to
    pub fn camera(&self) -> Option<&CameraDevice> {
        self.camera.as_ref()
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn analysis_stats(&self) -> Option<AnalysisStats> {
        self.analysis.as_ref().map(ImageAnalysis::stats)
    }

    pub fn is_camera_bound(&self) -> bool {
        self.provider.is_bound()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Handle a message addressed to this screen
    pub fn update(&mut self, message: Message) {
        if self.destroyed {
            debug!(?message, "Scanner screen destroyed, message ignored");
            return;
        }

        match message {
            Message::PermissionResult { session, result } if session == self.session => {
                self.on_request_permissions_result(result)
            }
            Message::CameraProviderReady { session, result } if session == self.session => {
                self.on_camera_provider_ready(result)
            }
            Message::BarcodeDecoded { session, result } if session == self.session => {
                debug!(text = %result.text, "Displaying decoded result");
                self.decoded = Some(result);
            }
            Message::RequestPermissionAgain => self.request_permission_again(),
            Message::OpenDecodedUrl => self.open_decoded_url(),
            Message::PermissionResult { session, .. }
            | Message::CameraProviderReady { session, .. }
            | Message::BarcodeDecoded { session, .. } => {
                debug!(%session, current = %self.session, "Ignoring message for another session")
            }
            other => debug!(message = ?other, "Not a scanner screen message"),
        }
    }

    /// Authorization callback
    pub fn on_request_permissions_result(&mut self, result: PermissionResult) {
        let action = self.gate.on_result(&result);
        self.apply(action);
    }

    /// Ask for camera access again after a denial
    pub fn request_permission_again(&mut self) {
        let action = self.gate.re_request();
        if action == GateAction::None {
            debug!(state = %self.gate.state(), "Re-request ignored");
        }
        self.apply(action);
    }

    fn apply(&mut self, action: GateAction) {
        match action {
            GateAction::StartCamera => self.start_camera(),
            GateAction::RequestAccess(code) => {
                self.status = "Waiting for camera access...".to_string();
                let session = self.session;
                let request = self.authorizer.request(code);
                self.ctx.spawn(async move {
                    Message::PermissionResult {
                        session,
                        result: request.await,
                    }
                });
            }
            GateAction::ReportDenied => {
                warn!(session = %self.session, "Camera access denied, not starting camera");
                self.status = "Camera access denied".to_string();
            }
            GateAction::None => {}
        }
    }

    /// Acquire the camera provider and bind the use cases once it is ready
    pub fn start_camera(&mut self) {
        if self.destroyed {
            return;
        }

        info!(session = %self.session, "Starting camera");
        self.status = "Starting camera...".to_string();

        let session = self.session;
        let acquire = self.provider.acquire();
        self.ctx.spawn(async move {
            Message::CameraProviderReady {
                session,
                result: acquire.await,
            }
        });
    }

    fn on_camera_provider_ready(&mut self, result: BackendResult<Vec<CameraDevice>>) {
        let bound = result.and_then(|cameras| self.bind_camera_use_cases(&cameras));
        match bound {
            Ok(()) => {
                self.status = match &self.camera {
                    Some(camera) => format!("Scanning with {}", camera.name),
                    None => "Scanning".to_string(),
                };
            }
            Err(e) => {
                error!(session = %self.session, error = %e, "Camera binding failed");
                self.status = format!("Camera unavailable: {}", e);
            }
        }
    }

    /// Bind preview and analysis to the selected camera, replacing any
    /// previous binding
    fn bind_camera_use_cases(&mut self, cameras: &[CameraDevice]) -> BackendResult<()> {
        let device = self.selector.select(cameras)?.clone();

        let preview = Preview::new();
        let analysis = ImageAnalysis::builder()
            .backpressure_strategy(self.backpressure)
            .build();

        let publisher =
            ResultPublisher::new(self.session, self.ctx.sender(), Arc::clone(&self.alive));
        analysis.set_analyzer(
            Arc::clone(&self.executor),
            BarcodeAnalyzer::new(
                Arc::clone(&self.scanner),
                publisher,
                self.ctx.runtime().clone(),
            ),
        );

        self.provider.unbind_all();
        self.preview = None;
        self.analysis = None;
        self.camera = None;

        if let Err(e) = self
            .provider
            .bind_to_lifecycle(&device, preview.clone(), analysis.clone())
        {
            analysis.clear_analyzer();
            return Err(e);
        }

        info!(session = %self.session, device = %device.name, path = %device.path, "Camera bound");
        self.preview = Some(preview);
        self.analysis = Some(analysis);
        self.camera = Some(device);
        Ok(())
    }

    fn open_decoded_url(&mut self) {
        let Some(url) = self.decoded.as_ref().and_then(|d| link_target(&d.text)) else {
            self.status = "Nothing to open".to_string();
            return;
        };

        match open::that_detached(&url) {
            Ok(()) => {
                info!(url = %url, "Opened decoded link");
                self.status = format!("Opened {}", url);
            }
            Err(e) => {
                error!(url = %url, error = %e, "Failed to open decoded link");
                self.status = format!("Could not open link: {}", e);
            }
        }
    }

    /// Release the camera and the analysis executor
    ///
    /// Idempotent. Late completions are ignored from here on.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.alive.store(false, Ordering::SeqCst);

        info!(session = %self.session, "Destroying scanner screen");
        self.executor.shutdown();
        self.provider.unbind_all();
        if let Some(analysis) = self.analysis.take() {
            analysis.clear_analyzer();
            debug!(stats = ?analysis.stats(), "Final analysis stats");
        }
        self.preview = None;
    }
}

impl Drop for ScannerScreen {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for ScannerScreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerScreen")
            .field("session", &self.session)
            .field("permission", &self.gate.state())
            .field("camera", &self.camera)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
