// SPDX-License-Identifier: GPL-3.0-only

//! Single-threaded background executor for frame analysis
//!
//! Jobs run one at a time, in submission order, on a dedicated named thread.
//! After [`SerialExecutor::shutdown`] new submissions are refused; jobs that
//! were already queued still run. A job that panics is logged and the worker
//! moves on to the next one.

use crate::errors::RejectedExecution;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A dedicated worker thread that executes jobs sequentially
pub struct SerialExecutor {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SerialExecutor {
    /// Spawn the worker thread
    pub fn new(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let thread_name = name.to_string();

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %thread_name, "Executor thread started");
                // Ends once every sender is gone and the queue is drained
                while let Ok(job) = receiver.recv() {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                        error!(
                            name = %thread_name,
                            panic = panic_message(payload.as_ref()),
                            "Executor job panicked"
                        );
                    }
                }
                debug!(name = %thread_name, "Executor thread exiting");
            })?;

        info!(name, "Started executor");

        Ok(Self {
            name: name.to_string(),
            sender: Mutex::new(Some(sender)),
            thread_handle: Mutex::new(Some(thread_handle)),
        })
    }

    /// Queue a job. Fails once the executor has been shut down; the job is
    /// dropped in that case.
    pub fn execute<F>(&self, job: F) -> Result<(), RejectedExecution>
    where
        F: FnOnce() + Send + 'static,
    {
        // Clone the sender so the job is dropped outside the lock if rejected
        let sender = match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        match sender {
            Some(sender) => sender.send(Box::new(job)).map_err(|_| RejectedExecution),
            None => Err(RejectedExecution),
        }
    }

    /// Refuse further submissions. Does not wait for queued jobs.
    pub fn shutdown(&self) {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if sender.is_some() {
            info!(name = %self.name, "Shutting down executor");
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutdown(&self) -> bool {
        match self.sender.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    /// Shut down and wait for the queued jobs to finish
    ///
    /// Returns immediately when called from the worker thread itself.
    pub fn shutdown_and_wait(&self) {
        self.shutdown();

        let handle = match self.thread_handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let Some(handle) = handle else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            // Joining ourselves would deadlock; the loop ends on its own
            return;
        }

        if let Err(e) = handle.join() {
            warn!(name = %self.name, "Executor thread panicked: {:?}", e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        self.shutdown_and_wait();
    }
}

impl std::fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("name", &self.name)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_jobs_run_in_order_on_one_thread() {
        let executor = SerialExecutor::new("test-serial").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20 {
            let seen = Arc::clone(&seen);
            executor
                .execute(move || {
                    let name = thread::current().name().map(str::to_string);
                    seen.lock().unwrap().push((i, name));
                })
                .unwrap();
        }

        executor.shutdown_and_wait();

        let seen = seen.lock().unwrap();
        let order: Vec<i32> = seen.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
        assert!(
            seen.iter()
                .all(|(_, name)| name.as_deref() == Some("test-serial"))
        );
    }

    #[test]
    fn test_panicking_job_does_not_stop_worker() {
        let executor = SerialExecutor::new("test-panic").unwrap();
        let ran = Arc::new(Mutex::new(Vec::new()));

        executor.execute(|| panic!("decoder blew up")).unwrap();
        for i in 0..3 {
            let ran = Arc::clone(&ran);
            executor.execute(move || ran.lock().unwrap().push(i)).unwrap();
        }

        executor.shutdown_and_wait();
        assert_eq!(*ran.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_rejects_after_shutdown() {
        let executor = SerialExecutor::new("test-reject").unwrap();
        executor.shutdown();

        assert!(executor.is_shutdown());
        assert_eq!(executor.execute(|| {}), Err(RejectedExecution));
    }

    #[test]
    fn test_rejected_job_is_dropped() {
        let executor = SerialExecutor::new("test-drop").unwrap();
        executor.shutdown();

        let marker = Arc::new(());
        let held = Arc::clone(&marker);
        let _ = executor.execute(move || drop(held));

        // The closure (and its captured Arc) must not be retained anywhere
        assert_eq!(Arc::strong_count(&marker), 1);
    }
}
