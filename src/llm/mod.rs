//! # Provider Clients
//!
//! Everything that talks to a language-model backend lives here:
//! - `stream`: byte-level decoding of the two streaming wire formats
//! - `http`: the shared request/response plumbing and error rendering
//! - `openai`: OpenAI-compatible cloud services (OpenAI, Groq, ...)
//! - `ollama`: a local Ollama daemon, native or OpenAI-compatible endpoint
//!
//! ## Architecture
//!
//! ```text
//! Conversation → Provider::generate → FragmentStream (lazy) → Task Coordinator
//! ```
//!
//! A provider never fails once constructed. Transport and configuration
//! problems surface as a single text fragment at the end of the stream.

pub mod http;
pub mod ollama;
pub mod openai;
pub mod stream;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use stream::{Decoded, StreamDecoder, WireFormat};

use crate::config::{GeneralSettings, ProviderConfig, ProviderKind};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// One incremental unit of generated text.
///
/// Errors are not a separate type at this layer: a provider that fails emits
/// a human-readable fragment and then ends its stream.
pub type Fragment = String;

/// Lazy, finite sequence of fragments produced by one `generate` call.
pub type FragmentStream = BoxStream<'static, Fragment>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Ordered (system, user) pair handed to a provider.
///
/// Only the prompt builder constructs one, so the role order is fixed.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub(crate) fn new(system: String, user: String) -> Self {
        Self {
            messages: vec![
                Message {
                    role: Role::System,
                    content: system,
                },
                Message {
                    role: Role::User,
                    content: user,
                },
            ],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn system(&self) -> &str {
        &self.messages[0].content
    }

    pub fn user(&self) -> &str {
        &self.messages[1].content
    }
}

/// Capability shared by every backend.
///
/// `generate` must hand back a fresh stream on each call and must not start
/// any network activity until the stream is polled.
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, conversation: Conversation) -> FragmentStream;
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Request timeout - the API took too long to respond")]
    Timeout,

    #[error("Connection error - unable to reach the API at {url}")]
    Connect { url: String },

    #[error("{}", describe_status(.status, .body))]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Please provide a valid API key for {provider} in the settings.")]
    MissingApiKey { provider: String },
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() {
            ProviderError::Connect {
                url: e
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "<unknown>".to_string()),
            }
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

fn describe_status(status: &u16, body: &str) -> String {
    match *status {
        401 => "Authentication failed - check your API key".to_string(),
        403 => "Access forbidden - insufficient permissions".to_string(),
        404 => format!("Endpoint or model not found (404): {}", body),
        429 => "Rate limit exceeded - too many requests".to_string(),
        500..=599 => format!("Server error ({}): {}", status, body),
        _ => format!("HTTP error {}: {}", status, body),
    }
}

/// Builds the client for `config`, keyed by its provider kind.
pub fn build_provider(
    config: &ProviderConfig,
    general: &GeneralSettings,
) -> Result<Arc<dyn Provider>, ProviderError> {
    url::Url::parse(&config.api_url).map_err(|e| ProviderError::InvalidUrl {
        url: config.api_url.clone(),
        reason: e.to_string(),
    })?;

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(general.connect_timeout_secs))
        .build()
        .map_err(|e| ProviderError::Client(e.to_string()))?;

    info!(
        provider = %config.provider_name,
        kind = ?config.kind,
        model = %config.model_name,
        "Provider client configured"
    );

    let provider: Arc<dyn Provider> = match config.kind {
        ProviderKind::Ollama => Arc::new(OllamaClient::new(client, config.clone())),
        ProviderKind::OpenAi => Arc::new(OpenAiClient::new(client, config.clone())),
    };
    Ok(provider)
}
