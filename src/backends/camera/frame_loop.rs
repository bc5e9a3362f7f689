// SPDX-License-Identifier: GPL-3.0-only
//! Capture thread lifecycle
//!
//! A capture body owns its device handles for the life of its thread. It
//! reports through a [`StartupSignal`] once the device is open and streaming
//! can begin, then checks the [`StopSignal`] between frames.

use super::types::{BackendError, BackendResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Stop request shared between a [`CaptureThread`] and its body
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tells [`CaptureThread::spawn`] that the body finished its setup
#[derive(Debug)]
pub struct StartupSignal(Option<SyncSender<BackendResult<()>>>);

impl StartupSignal {
    /// Setup succeeded; `spawn` returns the running thread
    pub fn ready(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(Ok(()));
        }
    }

    /// Hand a setup error to the waiting caller. False once `ready` was sent.
    fn fail(&mut self, error: &BackendError) -> bool {
        match self.0.take() {
            Some(tx) => tx.send(Err(error.clone())).is_ok(),
            None => false,
        }
    }
}

/// A capture body running on its own named thread
///
/// ```ignore
/// let thread = CaptureThread::spawn("capture", timeout, |stop, startup| {
///     let mut stream = open_stream()?;
///     startup.ready();
///     while !stop.is_raised() {
///         publish(stream.next()?);
///     }
///     Ok(())
/// })?;
/// thread.stop();
/// ```
pub struct CaptureThread {
    name: String,
    stop: StopSignal,
    handle: Option<JoinHandle<()>>,
}

impl CaptureThread {
    /// Run `body` on a new thread called `name` and wait for its setup
    ///
    /// Returns the error the body failed with before calling
    /// [`StartupSignal::ready`]. A body that is still setting up after
    /// `startup_timeout` is told to stop and left to finish on its own.
    /// Errors after startup end the thread and are logged.
    pub fn spawn<F>(name: &str, startup_timeout: Duration, body: F) -> BackendResult<Self>
    where
        F: FnOnce(&StopSignal, &mut StartupSignal) -> BackendResult<()> + Send + 'static,
    {
        let stop = StopSignal::default();
        let body_stop = stop.clone();
        let thread_name = name.to_string();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut startup = StartupSignal(Some(ready_tx));
                debug!(thread = %thread_name, "Capture thread running");
                match body(&body_stop, &mut startup) {
                    Ok(()) => debug!(thread = %thread_name, "Capture thread finished"),
                    Err(e) => {
                        if !startup.fail(&e) {
                            warn!(thread = %thread_name, error = %e, "Capture thread failed");
                        }
                    }
                }
            })
            .map_err(|e| BackendError::InitializationFailed(format!("{}: {}", name, e)))?;

        let mut capture = Self {
            name: name.to_string(),
            stop,
            handle: Some(handle),
        };

        match ready_rx.recv_timeout(startup_timeout) {
            Ok(Ok(())) => {
                info!(thread = %name, "Capture thread started");
                Ok(capture)
            }
            Ok(Err(e)) => {
                capture.wait();
                Err(e)
            }
            Err(RecvTimeoutError::Disconnected) => {
                capture.wait();
                Err(BackendError::Other(format!("{} ended during startup", name)))
            }
            Err(RecvTimeoutError::Timeout) => {
                capture.stop.raise();
                // Detach; joining a body stuck in the driver would block the caller
                capture.handle.take();
                Err(BackendError::InitializationFailed(format!(
                    "{} did not start within {:?}",
                    name, startup_timeout
                )))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Raise the stop signal and join the thread
    pub fn stop(&mut self) {
        self.stop.raise();
        self.wait();
    }

    /// Join without raising the stop signal
    pub fn wait(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.join().is_err() {
            warn!(thread = %self.name, "Capture thread panicked");
        } else {
            debug!(thread = %self.name, "Capture thread joined");
        }
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.stop();
    }
}
