//! Client for a local Ollama daemon.
//!
//! Ollama serves both its native `/api/chat` endpoint (JSON lines) and an
//! OpenAI-compatible `/v1/chat/completions` endpoint (event stream). The wire
//! format is picked from the configured URL. No API key is ever sent.

use super::http::{stream_chat, ChatRequest};
use super::{Conversation, FragmentStream, Provider, WireFormat};
use crate::config::ProviderConfig;
use reqwest::Client;
use tracing::instrument;

pub struct OllamaClient {
    client: Client,
    config: ProviderConfig,
    format: WireFormat,
}

impl OllamaClient {
    pub fn new(client: Client, config: ProviderConfig) -> Self {
        let format = wire_format_for(&config.api_url);
        Self {
            client,
            config,
            format,
        }
    }

    pub fn wire_format(&self) -> WireFormat {
        self.format
    }
}

/// Native endpoints stream JSON lines; everything else is treated as SSE.
pub fn wire_format_for(api_url: &str) -> WireFormat {
    let path = url::Url::parse(api_url)
        .map(|u| u.path().trim_end_matches('/').to_string())
        .unwrap_or_default();
    if path.ends_with("/api/chat") {
        WireFormat::JsonLines
    } else {
        WireFormat::EventStream
    }
}

impl Provider for OllamaClient {
    fn name(&self) -> &str {
        &self.config.provider_name
    }

    #[instrument(skip(self, conversation), fields(provider = %self.config.provider_name))]
    fn generate(&self, conversation: Conversation) -> FragmentStream {
        let body = ChatRequest {
            model: &self.config.model_name,
            messages: conversation.messages(),
            stream: true,
        };
        let request = self.client.post(&self.config.api_url).json(&body);
        stream_chat(request, self.format)
    }
}
