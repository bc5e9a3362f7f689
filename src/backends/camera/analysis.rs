// SPDX-License-Identifier: GPL-3.0-only

//! Frame-analysis use case
//!
//! The capture thread [`offer`](ImageAnalysis::offer)s every frame. At most one
//! frame is handed to the analyzer at a time, wrapped in an [`ImageProxy`];
//! the next frame is delivered only after that proxy has been released.
//!
//! ```text
//! capture thread ──offer──► ImageAnalysis ──execute──► SerialExecutor ──► Analyzer
//!                                ▲                                          │
//!                                └────────────── ImageProxy::close ◄────────┘
//! ```

use super::executor::SerialExecutor;
use super::types::CameraFrame;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

/// What happens to frames that arrive while the analyzer is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressureStrategy {
    /// Keep a single waiting frame; a newer frame replaces it and the
    /// replaced frame is dropped
    #[default]
    KeepOnlyLatest,
    /// Make the producer wait until the in-flight frame is released
    BlockProducer,
}

/// Receives frames on the analysis executor
///
/// Implementations must release the proxy (explicitly with
/// [`ImageProxy::close`] or by dropping it) or no further frames arrive.
pub trait Analyzer: Send + Sync + 'static {
    fn analyze(&self, image: ImageProxy);
}

impl<F> Analyzer for F
where
    F: Fn(ImageProxy) + Send + Sync + 'static,
{
    fn analyze(&self, image: ImageProxy) {
        self(image)
    }
}

/// Counters describing what happened to offered frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisStats {
    /// Frames handed to the analyzer
    pub delivered: u64,
    /// Frames the analyzer released
    pub released: u64,
    /// Frames discarded without reaching the analyzer
    pub dropped: u64,
}

type AnalysisTarget = (Arc<SerialExecutor>, Arc<dyn Analyzer>);

struct Target {
    executor: Arc<SerialExecutor>,
    analyzer: Arc<dyn Analyzer>,
}

#[derive(Default)]
struct SlotState {
    target: Option<Target>,
    in_flight: bool,
    pending: Option<CameraFrame>,
}

struct AnalysisInner {
    strategy: BackpressureStrategy,
    state: Mutex<SlotState>,
    slot_free: Condvar,
    delivered: AtomicU64,
    released: AtomicU64,
    dropped: AtomicU64,
}

impl AnalysisInner {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn drop_frame(&self, frame: &CameraFrame, reason: &str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        trace!(sequence = frame.sequence, reason, "Dropped analysis frame");
    }
}

/// Hand a frame to the analyzer on its executor. Must be called without the
/// state lock held; a rejected job releases its proxy, which re-enters
/// [`on_release`].
fn dispatch(inner: &Arc<AnalysisInner>, target: AnalysisTarget, frame: CameraFrame) {
    let (executor, analyzer) = target;
    inner.delivered.fetch_add(1, Ordering::Relaxed);

    let proxy = ImageProxy {
        frame,
        released: false,
        owner: Arc::clone(inner),
    };

    if executor.execute(move || analyzer.analyze(proxy)).is_err() {
        debug!("Analysis executor refused frame; released without analysis");
    }
}

fn on_release(inner: &Arc<AnalysisInner>) {
    inner.released.fetch_add(1, Ordering::Relaxed);

    let next = {
        let mut state = inner.lock();
        state.in_flight = false;

        let pending = state.pending.take();
        let target = state
            .target
            .as_ref()
            .map(|t| (Arc::clone(&t.executor), Arc::clone(&t.analyzer)));

        match (pending, target) {
            (Some(frame), Some(target)) => {
                state.in_flight = true;
                Some((target, frame))
            }
            (Some(frame), None) => {
                inner.drop_frame(&frame, "analyzer cleared");
                None
            }
            (None, _) => None,
        }
    };

    match next {
        Some((target, frame)) => dispatch(inner, target, frame),
        None => inner.slot_free.notify_all(),
    }
}

/// Frame-analysis sink with a configurable backpressure strategy
#[derive(Clone)]
pub struct ImageAnalysis {
    inner: Arc<AnalysisInner>,
}

impl ImageAnalysis {
    /// Start building an analysis use case
    pub fn builder() -> ImageAnalysisBuilder {
        ImageAnalysisBuilder::default()
    }

    /// The configured backpressure strategy
    pub fn backpressure_strategy(&self) -> BackpressureStrategy {
        self.inner.strategy
    }

    /// Route delivered frames to `analyzer`, running on `executor`
    pub fn set_analyzer<A: Analyzer>(&self, executor: Arc<SerialExecutor>, analyzer: A) {
        let mut state = self.inner.lock();
        state.target = Some(Target {
            executor,
            analyzer: Arc::new(analyzer),
        });
    }

    /// Detach the analyzer and discard any waiting frame
    ///
    /// A frame already in flight still has to be released by its analyzer.
    pub fn clear_analyzer(&self) {
        let pending = {
            let mut state = self.inner.lock();
            state.target = None;
            state.pending.take()
        };

        if let Some(frame) = pending {
            self.inner.drop_frame(&frame, "analyzer cleared");
        }
        self.inner.slot_free.notify_all();
    }

    /// Offer a newly captured frame. Called by the camera pipeline.
    pub fn offer(&self, frame: CameraFrame) {
        let mut state = self.inner.lock();

        if self.inner.strategy == BackpressureStrategy::BlockProducer {
            while state.in_flight && state.target.is_some() {
                state = match self.inner.slot_free.wait(state) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
        }

        let target = state
            .target
            .as_ref()
            .map(|t| (Arc::clone(&t.executor), Arc::clone(&t.analyzer)));
        let Some(target) = target else {
            drop(state);
            self.inner.drop_frame(&frame, "no analyzer");
            return;
        };

        if state.in_flight {
            // Only reachable with KeepOnlyLatest
            let replaced = state.pending.replace(frame);
            drop(state);
            if let Some(replaced) = replaced {
                self.inner.drop_frame(&replaced, "superseded");
            }
            return;
        }

        state.in_flight = true;
        drop(state);

        dispatch(&self.inner, target, frame);
    }

    /// Snapshot of the delivery counters
    pub fn stats(&self) -> AnalysisStats {
        AnalysisStats {
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            released: self.inner.released.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ImageAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAnalysis")
            .field("strategy", &self.inner.strategy)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Builder for [`ImageAnalysis`]
#[derive(Debug, Default)]
pub struct ImageAnalysisBuilder {
    strategy: BackpressureStrategy,
}

impl ImageAnalysisBuilder {
    pub fn backpressure_strategy(mut self, strategy: BackpressureStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn build(self) -> ImageAnalysis {
        ImageAnalysis {
            inner: Arc::new(AnalysisInner {
                strategy: self.strategy,
                state: Mutex::new(SlotState::default()),
                slot_free: Condvar::new(),
                delivered: AtomicU64::new(0),
                released: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }
}

/// A frame lent to an analyzer
///
/// The frame goes back to the pipeline exactly once: on [`close`](Self::close)
/// or, failing that, when the proxy is dropped. The pixel data itself is
/// shared and may outlive the release.
pub struct ImageProxy {
    frame: CameraFrame,
    released: bool,
    owner: Arc<AnalysisInner>,
}

impl ImageProxy {
    /// The borrowed frame
    pub fn frame(&self) -> &CameraFrame {
        &self.frame
    }

    /// Clockwise rotation needed to show the frame upright
    pub fn rotation_degrees(&self) -> u32 {
        self.frame().rotation.degrees()
    }

    /// Release the frame back to the pipeline
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            trace!(sequence = self.frame.sequence, "Released analysis frame");
            on_release(&self.owner);
        }
    }
}

impl Drop for ImageProxy {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ImageProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageProxy")
            .field("sequence", &self.frame.sequence)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;
    use std::sync::mpsc;
    use std::time::Duration;

    fn frame(sequence: u64) -> CameraFrame {
        CameraFrame::packed(2, 2, PixelFormat::Gray8, vec![0; 4]).with_sequence(sequence)
    }

    fn executor() -> Arc<SerialExecutor> {
        Arc::new(SerialExecutor::new("test-analysis").unwrap())
    }

    #[test]
    fn test_without_analyzer_frames_are_dropped() {
        let analysis = ImageAnalysis::builder().build();
        analysis.offer(frame(1));
        analysis.offer(frame(2));

        assert_eq!(
            analysis.stats(),
            AnalysisStats {
                delivered: 0,
                released: 0,
                dropped: 2
            }
        );
    }

    #[test]
    fn test_keep_only_latest_replaces_waiting_frame() {
        let analysis = ImageAnalysis::builder().build();
        let (held_tx, held_rx) = mpsc::channel::<ImageProxy>();
        let (seq_tx, seq_rx) = mpsc::channel::<u64>();

        analysis.set_analyzer(executor(), move |image: ImageProxy| {
            seq_tx.send(image.frame().sequence).unwrap();
            held_tx.send(image).unwrap();
        });

        analysis.offer(frame(1));
        let first = held_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        // Frame 1 is in flight: 2 waits, 3 replaces 2, 4 replaces 3
        analysis.offer(frame(2));
        analysis.offer(frame(3));
        analysis.offer(frame(4));
        assert_eq!(analysis.stats().dropped, 2);

        first.close();
        let second = held_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        second.close();

        let order: Vec<u64> = seq_rx.try_iter().collect();
        assert_eq!(order, vec![1, 4]);

        let stats = analysis.stats();
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.released, 2);
    }

    #[test]
    fn test_dropping_proxy_releases_once() {
        let analysis = ImageAnalysis::builder().build();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        analysis.set_analyzer(executor(), move |image: ImageProxy| {
            drop(image);
            done_tx.send(()).unwrap();
        });

        for i in 0..5 {
            analysis.offer(frame(i));
            done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        }

        let stats = analysis.stats();
        assert_eq!(stats.delivered, 5);
        assert_eq!(stats.released, 5);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_shut_down_executor_still_releases() {
        let analysis = ImageAnalysis::builder().build();
        let executor = executor();
        analysis.set_analyzer(Arc::clone(&executor), |image: ImageProxy| image.close());
        executor.shutdown();

        analysis.offer(frame(1));
        analysis.offer(frame(2));

        let stats = analysis.stats();
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.released, 2);
    }

    #[test]
    fn test_block_producer_waits_for_release() {
        let analysis = ImageAnalysis::builder()
            .backpressure_strategy(BackpressureStrategy::BlockProducer)
            .build();
        let (held_tx, held_rx) = mpsc::channel::<ImageProxy>();
        analysis.set_analyzer(executor(), move |image: ImageProxy| {
            held_tx.send(image).unwrap();
        });

        analysis.offer(frame(1));
        let first = held_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let producer = {
            let analysis = analysis.clone();
            std::thread::spawn(move || analysis.offer(frame(2)))
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());

        first.close();
        producer.join().unwrap();
        let second = held_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(second.frame().sequence, 2);
        second.close();

        assert_eq!(analysis.stats().dropped, 0);
    }

    #[test]
    fn test_clear_analyzer_discards_pending() {
        let analysis = ImageAnalysis::builder().build();
        let (held_tx, held_rx) = mpsc::channel::<ImageProxy>();
        analysis.set_analyzer(executor(), move |image: ImageProxy| {
            held_tx.send(image).unwrap();
        });

        analysis.offer(frame(1));
        let first = held_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        analysis.offer(frame(2));

        analysis.clear_analyzer();
        first.close();

        assert!(held_rx.recv_timeout(Duration::from_millis(100)).is_err());
        let stats = analysis.stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.dropped, 1);
    }
}
