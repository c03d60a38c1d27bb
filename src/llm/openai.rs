//! Client for OpenAI, Groq, or any other OpenAI-compatible cloud service.

use super::http::{error_fragment, stream_chat, ChatRequest};
use super::{Conversation, FragmentStream, Provider, ProviderError, WireFormat};
use crate::config::ProviderConfig;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use tracing::{instrument, warn};

pub struct OpenAiClient {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiClient {
    pub fn new(client: Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }
}

impl Provider for OpenAiClient {
    fn name(&self) -> &str {
        &self.config.provider_name
    }

    #[instrument(skip(self, conversation), fields(provider = %self.config.provider_name))]
    fn generate(&self, conversation: Conversation) -> FragmentStream {
        let api_key = self.config.usable_api_key();
        if api_key.is_none() && self.config.requires_api_key() {
            warn!("API key missing, refusing to contact the provider");
            let err = ProviderError::MissingApiKey {
                provider: self.config.provider_name.clone(),
            };
            return stream::once(async move { error_fragment(&err) }).boxed();
        }

        let body = ChatRequest {
            model: &self.config.model_name,
            messages: conversation.messages(),
            stream: true,
        };
        let mut request = self.client.post(&self.config.api_url).json(&body);
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }

        stream_chat(request, WireFormat::EventStream)
    }
}
