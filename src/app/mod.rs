// SPDX-License-Identifier: GPL-3.0-only

//! Application state and message routing
//!
//! # Architecture
//!
//! - `state`: [`Message`], session ids and the displayed result type
//! - `context`: [`UiContext`], how background work posts messages back
//! - `launcher`: the launcher screen
//! - `scanner`: the scanner screen (permission gate, camera binding, results)
//! - `frame_processor`: per-frame analysis and barcode decoding
//!
//! [`App::update`] is the single entry point for messages; the terminal loop
//! calls it on the UI thread for every key press and every drained completion.

pub mod context;
pub mod frame_processor;
pub mod launcher;
pub mod scanner;
pub mod state;

pub use context::UiContext;
pub use launcher::LauncherScreen;
pub use scanner::{ScannerScreen, ScannerServices};
pub use state::{DecodedResult, Message, ScreenKind, SessionId};

use crate::backends::camera::{BackpressureStrategy, CameraProvider, CameraSelector};
use crate::permission::CameraAuthorizer;
use frame_processor::BarcodeScanner;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Builds a fresh camera provider for each scanner screen
pub type ProviderFactory = Box<dyn Fn() -> Box<dyn CameraProvider> + Send>;

/// Long-lived collaborators shared by every scanner screen
pub struct AppServices {
    pub authorizer: Arc<dyn CameraAuthorizer>,
    pub scanner: Arc<dyn BarcodeScanner>,
    pub provider_factory: ProviderFactory,
    pub selector: CameraSelector,
    pub backpressure: BackpressureStrategy,
}

pub struct App {
    ctx: UiContext,
    services: AppServices,
    screen: ScreenKind,
    launcher: LauncherScreen,
    scanner: Option<ScannerScreen>,
    should_quit: bool,
}

impl App {
    /// Create the app showing `initial`
    pub fn new(ctx: UiContext, services: AppServices, initial: ScreenKind) -> Self {
        let mut app = Self {
            ctx,
            services,
            screen: ScreenKind::Launcher,
            launcher: LauncherScreen::new(),
            scanner: None,
            should_quit: false,
        };
        if initial == ScreenKind::Scanner {
            app.open_scanner();
        }
        app
    }

    pub fn screen(&self) -> ScreenKind {
        self.screen
    }

    pub fn launcher(&self) -> &LauncherScreen {
        &self.launcher
    }

    pub fn scanner(&self) -> Option<&ScannerScreen> {
        self.scanner.as_ref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Route a message to the screen it belongs to
    pub fn update(&mut self, message: Message) {
        match message {
            Message::ScanPressed => {
                if self.screen == ScreenKind::Launcher
                    && self.launcher.activate() == ScreenKind::Scanner
                {
                    self.open_scanner();
                }
            }
            Message::Back => {
                if self.screen == ScreenKind::Scanner {
                    self.close_scanner();
                }
            }
            Message::Quit => {
                info!("Quit requested");
                self.close_scanner();
                self.should_quit = true;
            }
            other => match self.scanner.as_mut() {
                Some(scanner) => scanner.update(other),
                None => debug!(message = ?other, "No scanner screen, message ignored"),
            },
        }
    }

    fn open_scanner(&mut self) {
        // At most one scanner screen exists
        self.close_scanner();

        let services = ScannerServices {
            authorizer: Arc::clone(&self.services.authorizer),
            scanner: Arc::clone(&self.services.scanner),
            provider: (self.services.provider_factory)(),
            selector: self.services.selector.clone(),
            backpressure: self.services.backpressure,
        };

        match ScannerScreen::create(self.ctx.clone(), services) {
            Ok(scanner) => {
                self.scanner = Some(scanner);
                self.screen = ScreenKind::Scanner;
            }
            Err(e) => {
                error!(error = %e, "Failed to open scanner screen");
                self.launcher.set_notice(format!("Cannot open scanner: {}", e));
                self.screen = ScreenKind::Launcher;
            }
        }
    }

    fn close_scanner(&mut self) {
        if let Some(mut scanner) = self.scanner.take() {
            scanner.destroy();
        }
        self.screen = ScreenKind::Launcher;
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.close_scanner();
    }
}
