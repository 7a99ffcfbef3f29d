//! The event funnel: many producers, one consumer.
//!
//! Every transport pushes translated events through a cloned
//! [`FunnelSender`]; the dispatch loop owns the only [`FunnelReceiver`].
//! Closing is a one-way switch shared by both halves. After it flips,
//! pushes fail with [`FunnelClosed`] and the receiver hands out whatever was
//! already buffered before reporting the end of the stream.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::foundation::event::CanonicalEvent;

/// Default number of events buffered before producers wait.
pub const DEFAULT_FUNNEL_CAPACITY: usize = 1024;

/// Returned when pushing into a closed funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event funnel is closed")]
pub struct FunnelClosed;

/// Creates a funnel buffering up to `capacity` events.
pub fn funnel(capacity: usize) -> (FunnelSender, FunnelReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let closed = CancellationToken::new();
    (
        FunnelSender {
            tx,
            closed: closed.clone(),
        },
        FunnelReceiver { rx, closed },
    )
}

/// Producer half of the funnel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FunnelSender {
    tx: mpsc::Sender<CanonicalEvent>,
    closed: CancellationToken,
}

impl FunnelSender {
    /// Pushes an event, waiting while the funnel is full.
    pub async fn push(&self, event: CanonicalEvent) -> Result<(), FunnelClosed> {
        if self.closed.is_cancelled() {
            return Err(FunnelClosed);
        }
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(FunnelClosed),
            sent = self.tx.send(event) => sent.map_err(|_| FunnelClosed),
        }
    }

    /// Closes the funnel. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Returns `true` once the funnel has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }
}

/// Consumer half of the funnel.
#[derive(Debug)]
pub struct FunnelReceiver {
    rx: mpsc::Receiver<CanonicalEvent>,
    closed: CancellationToken,
}

impl FunnelReceiver {
    /// Waits for the next event.
    ///
    /// Returns `None` once the funnel is closed (or every sender is gone) and
    /// the buffer is empty.
    pub async fn next(&mut self) -> Option<CanonicalEvent> {
        tokio::select! {
            biased;
            event = self.rx.recv() => event,
            _ = self.closed.cancelled() => {
                self.rx.close();
                self.rx.recv().await
            }
        }
    }

    /// Closes the funnel. Idempotent.
    pub fn close(&mut self) {
        self.closed.cancel();
        self.rx.close();
    }

    /// Closes the funnel and throws away everything still buffered.
    ///
    /// Returns the number of discarded events.
    pub fn drain(&mut self) -> usize {
        self.close();
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    /// Returns `true` once the funnel has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
