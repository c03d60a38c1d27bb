//! Hand-off channel between generation workers and the event loop.
//!
//! Workers only ever push immutable messages; they never see task state.

use super::types::GenerationId;
use crate::llm::Fragment;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Sentinel: the first fragment of this generation follows.
    StreamBegun,
    Fragment(Fragment),
    /// Sentinel: always the last message of a generation, sent exactly once.
    StreamEnded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub generation: GenerationId,
    pub event: RelayEvent,
}

pub(crate) fn channel() -> (UnboundedSender<RelayMessage>, UnboundedReceiver<RelayMessage>) {
    mpsc::unbounded_channel()
}

/// Worker-side sender bound to one generation.
///
/// Dropping it pushes `StreamEnded`, so the sentinel goes out on every exit
/// path: exhaustion, early return, cancellation of the future, or a panic
/// unwinding through the worker.
pub(crate) struct GenerationRelay {
    generation: GenerationId,
    tx: UnboundedSender<RelayMessage>,
    begun: bool,
}

impl GenerationRelay {
    pub(crate) fn new(generation: GenerationId, tx: UnboundedSender<RelayMessage>) -> Self {
        Self {
            generation,
            tx,
            begun: false,
        }
    }

    /// Forwards one fragment, preceded by `StreamBegun` the first time.
    pub(crate) fn fragment(&mut self, fragment: Fragment) {
        if !self.begun {
            self.begun = true;
            self.push(RelayEvent::StreamBegun);
        }
        self.push(RelayEvent::Fragment(fragment));
    }

    fn push(&self, event: RelayEvent) {
        // The receiver lives as long as the coordinator; a failed send only
        // means the application is shutting down.
        let _ = self.tx.send(RelayMessage {
            generation: self.generation,
            event,
        });
    }
}

impl Drop for GenerationRelay {
    fn drop(&mut self) {
        debug!(generation = %self.generation, begun = self.begun, "Generation finished");
        self.push(RelayEvent::StreamEnded);
    }
}
