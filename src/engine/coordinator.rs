//! Task admission, background generation and the poll-based drain.
//!
//! The coordinator is owned by the event loop and is the only writer of the
//! in-flight state. Workers talk to it exclusively through the relay channel,
//! tagging every message with the generation id they were started with.

use super::relay::{self, GenerationRelay, RelayEvent, RelayMessage};
use super::traits::Presenter;
use super::types::{CoordinatorError, DrainReport, GenerationId, StartOutcome};
use crate::llm::{Conversation, Provider};
use crate::prompts::{self, ActionParams};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, instrument, warn};

pub struct TaskCoordinator {
    provider: Option<Arc<dyn Provider>>,
    relay_tx: UnboundedSender<RelayMessage>,
    relay_rx: UnboundedReceiver<RelayMessage>,
    in_flight: Option<GenerationId>,
    last_generation: u64,
}

impl TaskCoordinator {
    pub fn new(provider: Option<Arc<dyn Provider>>) -> Self {
        let (relay_tx, relay_rx) = relay::channel();
        Self {
            provider,
            relay_tx,
            relay_rx,
            in_flight: None,
            last_generation: 0,
        }
    }

    /// Swaps the backend used by future tasks. A running task keeps the one
    /// it was started with.
    pub fn set_provider(&mut self, provider: Option<Arc<dyn Provider>>) {
        self.provider = provider;
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn active_generation(&self) -> Option<GenerationId> {
        self.in_flight
    }

    /// Admits a task and launches its generation in the background.
    ///
    /// Never blocks. Must be called from inside a Tokio runtime.
    #[instrument(skip(self, source_text, params, presenter), fields(chars = source_text.chars().count()))]
    pub fn start_task(
        &mut self,
        action: &str,
        source_text: &str,
        params: &ActionParams,
        presenter: &mut dyn Presenter,
    ) -> Result<StartOutcome, CoordinatorError> {
        let Some(provider) = self.provider.clone() else {
            warn!("Task requested without a configured provider");
            return Err(CoordinatorError::ProviderUnavailable);
        };

        if let Some(active) = self.in_flight {
            debug!(active = %active, "Generation already in flight, ignoring request");
            return Ok(StartOutcome::Busy);
        }

        // Build first: a bad action must leave no trace in task state.
        let conversation = prompts::build_conversation(action, source_text, params)
            .map_err(|e| {
                info!(error = %e, "Prompt could not be built");
                CoordinatorError::from(e)
            })?;

        self.last_generation += 1;
        let generation = GenerationId(self.last_generation);
        self.in_flight = Some(generation);
        presenter.show_loading();

        info!(generation = %generation, provider = provider.name(), "Task admitted");
        tokio::spawn(drive_stream(
            provider,
            conversation,
            GenerationRelay::new(generation, self.relay_tx.clone()),
        ));

        Ok(StartOutcome::Started(generation))
    }

    /// Consumes the messages queued when the pass starts, without waiting
    /// for more. Anything a worker pushes meanwhile waits for the next pass.
    ///
    /// Messages from any generation other than the active one are stale
    /// (their task was cancelled) and are dropped unseen.
    pub fn drain(&mut self, presenter: &mut dyn Presenter) -> DrainReport {
        let mut report = DrainReport::default();
        let pending = self.relay_rx.len();
        for _ in 0..pending {
            let message = match self.relay_rx.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };

            if self.in_flight != Some(message.generation) {
                debug!(generation = %message.generation, event = ?message.event, "Discarding stale message");
                report.discarded += 1;
                continue;
            }

            report.forwarded += 1;
            match message.event {
                RelayEvent::StreamBegun => presenter.begin_stream(),
                RelayEvent::Fragment(text) => presenter.append(&text),
                RelayEvent::StreamEnded => {
                    // State first, so a failing presenter cannot leave us busy.
                    self.in_flight = None;
                    info!(generation = %message.generation, "Stream ended");
                    presenter.end_stream();
                }
            }
        }
        report
    }

    #[cfg(test)]
    pub(crate) fn relay_sender(&self) -> UnboundedSender<RelayMessage> {
        self.relay_tx.clone()
    }

    /// Stops reacting to the running task and withdraws the panel.
    ///
    /// The worker is not interrupted; whatever it still sends is discarded
    /// by `drain` because its generation id is no longer active.
    pub fn cancel(&mut self, presenter: &mut dyn Presenter) {
        if let Some(generation) = self.in_flight.take() {
            info!(generation = %generation, "Task cancelled");
        }
        presenter.withdraw();
    }
}

/// Worker body: pulls fragments from the provider and relays them in order.
///
/// `relay` pushes `StreamEnded` when dropped, which covers normal exhaustion
/// as well as a provider panicking mid-stream.
async fn drive_stream(
    provider: Arc<dyn Provider>,
    conversation: Conversation,
    mut relay: GenerationRelay,
) {
    let mut fragments = provider.generate(conversation);
    while let Some(fragment) = fragments.next().await {
        relay.fragment(fragment);
    }
}
