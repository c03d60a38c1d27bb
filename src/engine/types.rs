//! Shared structs.

use crate::prompts::PromptError;
use std::fmt;
use thiserror::Error;

/// Monotonic tag separating one task's messages from a cancelled task's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationId(pub u64);

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(GenerationId),
    /// Another generation is in flight; nothing was done.
    Busy,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("No AI provider is configured")]
    ProviderUnavailable,
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// What one `drain` pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub forwarded: usize,
    pub discarded: usize,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.forwarded == 0 && self.discarded == 0
    }
}
