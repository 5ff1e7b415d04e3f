//! Session side of the event stream.
//!
//! The emitter pushes [`StreamEvent`]s into a bounded channel whose receiver is
//! turned into an SSE body (or printed by the CLI). A watcher task notices when
//! the receiver is dropped, which is how a closed browser tab reaches the session:
//! the [`EventEmitter::disconnected`] token fires and everything derived from it
//! is cancelled.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::download::event::StreamEvent;

pub struct EventEmitter {
    tx: Option<mpsc::Sender<StreamEvent>>,
    disconnected: CancellationToken,
    done: CancellationToken,
}

impl EventEmitter {
    /// Creates an emitter and the receiving half of its stream.
    ///
    /// Must be called inside a tokio runtime.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let disconnected = CancellationToken::new();
        let done = CancellationToken::new();

        let watch_tx = tx.clone();
        let watch_disconnected = disconnected.clone();
        let watch_done = done.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = watch_tx.closed() => {
                    tracing::info!("Client disconnected");
                    watch_disconnected.cancel();
                }
                _ = watch_done.cancelled() => {}
            }
        });

        (
            Self {
                tx: Some(tx),
                disconnected,
                done,
            },
            rx,
        )
    }

    /// Fires once the consumer is gone. Session tokens are children of it.
    pub fn disconnected(&self) -> &CancellationToken {
        &self.disconnected
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.is_cancelled()
    }

    /// Sends one frame. Returns `false` if nobody is listening anymore; that is
    /// not an error for the caller.
    pub async fn emit(&self, event: StreamEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        if self.disconnected.is_cancelled() {
            return false;
        }

        let name = event.name();
        let sent = tokio::select! {
            biased;
            _ = self.disconnected.cancelled() => false,
            res = tx.send(event) => res.is_ok(),
        };
        if !sent {
            tracing::debug!(event = name, "Dropped event for disconnected client");
            self.disconnected.cancel();
        }
        sent
    }

    /// Ends the stream. The receiver sees end-of-stream after the buffered frames.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.done.cancel();
        self.tx.take();
    }
}

impl Drop for EventEmitter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
