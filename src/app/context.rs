// SPDX-License-Identifier: GPL-3.0-only

//! Handoff from background work to the UI thread

use crate::app::state::Message;
use std::future::Future;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::trace;

/// Runtime handle plus the sending half of the UI message queue
///
/// Anything that finishes off the UI thread reports back by posting a
/// [`Message`]; the UI loop drains the queue between redraws.
#[derive(Debug, Clone)]
pub struct UiContext {
    sender: UnboundedSender<Message>,
    runtime: Handle,
}

impl UiContext {
    /// Create a context and the receiver the UI loop drains
    pub fn new(runtime: Handle) -> (Self, UnboundedReceiver<Message>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender, runtime }, receiver)
    }

    pub fn sender(&self) -> UnboundedSender<Message> {
        self.sender.clone()
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Run `task` on the runtime and post its output to the UI thread
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Message> + Send + 'static,
    {
        let sender = self.sender.clone();
        self.runtime.spawn(async move {
            let message = task.await;
            if sender.send(message).is_err() {
                trace!("UI loop gone, completion dropped");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_posts_completion() {
        let (ctx, mut rx) = UiContext::new(Handle::current());
        ctx.spawn(async { Message::Quit });
        assert!(matches!(rx.recv().await, Some(Message::Quit)));
    }
}
