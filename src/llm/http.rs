//! Shared POST-and-stream plumbing for every provider.
//!
//! The request is assembled eagerly but only sent when the returned stream is
//! first polled. Whatever goes wrong afterwards is rendered into one fragment.

use super::stream::{Decoded, StreamDecoder, WireFormat};
use super::{Fragment, FragmentStream, Message, ProviderError};
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, warn};

pub const ERROR_BANNER: &str = "\n--- API request error ---\n";
pub const CONFIG_BANNER: &str = "\n--- Configuration error ---\n";

/// Request body understood by both OpenAI-compatible and Ollama chat endpoints.
#[derive(Serialize, Debug)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
}

/// Renders a provider failure the way the response panel shows it.
pub fn error_fragment(err: &ProviderError) -> Fragment {
    match err {
        ProviderError::MissingApiKey { .. } => format!("{}{}", CONFIG_BANNER, err),
        _ => format!("{}{}", ERROR_BANNER, err),
    }
}

/// Sends `request` on first poll and decodes the body as `format`.
pub fn stream_chat(request: RequestBuilder, format: WireFormat) -> FragmentStream {
    stream::unfold(State::Pending { request, format }, step).boxed()
}

enum State {
    Pending {
        request: RequestBuilder,
        format: WireFormat,
    },
    Streaming {
        body: BoxStream<'static, reqwest::Result<Bytes>>,
        decoder: StreamDecoder,
        queued: VecDeque<Decoded>,
    },
    Done,
}

async fn step(mut state: State) -> Option<(Fragment, State)> {
    loop {
        state = match state {
            State::Done => return None,
            State::Pending { request, format } => match open(request).await {
                Ok(response) => State::Streaming {
                    body: response.bytes_stream().boxed(),
                    decoder: StreamDecoder::new(format),
                    queued: VecDeque::new(),
                },
                Err(err) => {
                    warn!(error = %err, "Provider request failed");
                    return Some((error_fragment(&err), State::Done));
                }
            },
            State::Streaming {
                mut body,
                mut decoder,
                mut queued,
            } => {
                if let Some(item) = queued.pop_front() {
                    return Some(match item {
                        Decoded::Text(text) => (
                            text,
                            State::Streaming {
                                body,
                                decoder,
                                queued,
                            },
                        ),
                        Decoded::Error(message) => {
                            warn!(error = %message, "Provider reported an error mid-stream");
                            (format!("{}{}", ERROR_BANNER, message), State::Done)
                        }
                    });
                }
                if decoder.is_finished() {
                    debug!("Provider stream finished");
                    return None;
                }
                match body.next().await {
                    Some(Ok(chunk)) => queued.extend(decoder.push(&chunk)),
                    Some(Err(e)) => {
                        let err = ProviderError::from(e);
                        warn!(error = %err, "Provider stream interrupted");
                        return Some((error_fragment(&err), State::Done));
                    }
                    None => queued.extend(decoder.finish()),
                }
                State::Streaming {
                    body,
                    decoder,
                    queued,
                }
            }
        };
    }
}

async fn open(request: RequestBuilder) -> Result<Response, ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        });
    }
    Ok(response)
}
