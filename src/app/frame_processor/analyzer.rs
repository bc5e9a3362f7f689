// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame analysis callback

use super::BarcodeScanner;
use super::input_image::InputImage;
use super::types::Barcode;
use crate::app::state::{DecodedResult, Message, SessionId};
use crate::backends::camera::{Analyzer, ImageProxy};
use crate::errors::DecodeError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, trace, warn};

/// Delivers decoded barcodes to the screen that owns the analysis
///
/// Publishing stops once the screen clears `alive`.
#[derive(Debug, Clone)]
pub struct ResultPublisher {
    session: SessionId,
    sender: UnboundedSender<Message>,
    alive: Arc<AtomicBool>,
}

impl ResultPublisher {
    pub fn new(
        session: SessionId,
        sender: UnboundedSender<Message>,
        alive: Arc<AtomicBool>,
    ) -> Self {
        Self {
            session,
            sender,
            alive,
        }
    }

    /// Post one barcode as the new displayed result; false if nobody listens
    pub fn publish(&self, barcode: Barcode) -> bool {
        if !self.alive.load(Ordering::SeqCst) {
            trace!(session = %self.session, "Screen gone, result dropped");
            return false;
        }
        self.sender
            .send(Message::BarcodeDecoded {
                session: self.session,
                result: DecodedResult::from(barcode),
            })
            .is_ok()
    }
}

/// Publish a decode outcome; failures and empty frames change nothing
pub fn publish_outcome(outcome: Result<Vec<Barcode>, DecodeError>, publisher: &ResultPublisher) {
    match outcome {
        Ok(barcodes) => {
            // In frame order, so the last barcode ends up displayed
            for barcode in barcodes {
                debug!(value_type = %barcode.value_type, "Barcode decoded");
                if !publisher.publish(barcode) {
                    break;
                }
            }
        }
        Err(e) => error!(error = %e, "Barcode decoding failed"),
    }
}

/// Analyzer that decodes barcodes in every delivered frame
///
/// Runs on the screen's analysis executor. Decoding itself is asynchronous on
/// the runtime; the frame stays checked out until it completes.
pub struct BarcodeAnalyzer {
    scanner: Arc<dyn BarcodeScanner>,
    publisher: ResultPublisher,
    runtime: Handle,
}

impl BarcodeAnalyzer {
    pub fn new(
        scanner: Arc<dyn BarcodeScanner>,
        publisher: ResultPublisher,
        runtime: Handle,
    ) -> Self {
        Self {
            scanner,
            publisher,
            runtime,
        }
    }
}

impl Analyzer for BarcodeAnalyzer {
    fn analyze(&self, image: ImageProxy) {
        let input = match InputImage::from_frame(image.frame(), image.rotation_degrees()) {
            Ok(input) => input,
            Err(e) => {
                warn!(
                    sequence = image.frame().sequence,
                    error = %e,
                    "Cannot prepare frame for decoding"
                );
                image.close();
                return;
            }
        };

        let decode = self.scanner.process(input);
        let publisher = self.publisher.clone();

        // If the runtime is gone the task is dropped, and the proxy with it
        self.runtime.spawn(async move {
            publish_outcome(decode.await, &publisher);
            image.close();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn publisher() -> (
        ResultPublisher,
        tokio::sync::mpsc::UnboundedReceiver<Message>,
        Arc<AtomicBool>,
    ) {
        let (tx, rx) = unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        (ResultPublisher::new(SessionId::next(), tx, Arc::clone(&alive)), rx, alive)
    }

    fn decoded_texts(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Message>) -> Vec<String> {
        let mut texts = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::BarcodeDecoded { result, .. } = message {
                texts.push(result.text);
            }
        }
        texts
    }

    #[test]
    fn test_outcome_published_in_order() {
        let (publisher, mut rx, _alive) = publisher();
        publish_outcome(
            Ok(vec![Barcode::qr("A123"), Barcode::qr("B456")]),
            &publisher,
        );
        assert_eq!(decoded_texts(&mut rx), vec!["A123", "B456"]);
    }

    #[test]
    fn test_failure_and_empty_publish_nothing() {
        let (publisher, mut rx, _alive) = publisher();
        publish_outcome(Ok(Vec::new()), &publisher);
        publish_outcome(
            Err(DecodeError::TaskFailed("cancelled".to_string())),
            &publisher,
        );
        assert!(decoded_texts(&mut rx).is_empty());
    }

    #[test]
    fn test_dead_screen_gets_nothing() {
        let (publisher, mut rx, alive) = publisher();
        alive.store(false, Ordering::SeqCst);
        publish_outcome(Ok(vec![Barcode::qr("A123")]), &publisher);
        assert!(decoded_texts(&mut rx).is_empty());
    }
}
