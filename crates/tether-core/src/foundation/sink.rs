//! The downstream side of the bridge.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::event::BrainEvent;

/// Receives events that passed the dispatch loop.
///
/// `emit` is called from the single dispatch task, one event at a time, so
/// implementations should hand the event off rather than do slow work inline.
pub trait EventSink: Send + Sync {
    /// Delivers one event.
    fn emit(&self, event: BrainEvent);
}

/// A shared sink trait object.
pub type BoxedSink = Arc<dyn EventSink>;

impl<F> EventSink for F
where
    F: Fn(BrainEvent) + Send + Sync,
{
    fn emit(&self, event: BrainEvent) {
        self(event)
    }
}

/// Sink that forwards every event into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<BrainEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that drains it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BrainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: BrainEvent) {
        if self.tx.send(event).is_err() {
            debug!("Brain event receiver dropped, discarding event");
        }
    }
}

/// Sink that keeps every event in memory. Handy in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<BrainEvent>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn events(&self) -> Vec<BrainEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<BrainEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: BrainEvent) {
        self.events.lock().push(event);
    }
}
