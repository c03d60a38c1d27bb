//! Incremental decoding of streamed chat completions.
//!
//! Network chunks do not respect line boundaries, so the decoder keeps the
//! unterminated tail of the previous chunk and only interprets whole lines.

use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `data: {json}` lines, terminated by a literal `data: [DONE]`.
    EventStream,
    /// One JSON object per line, terminated by `"done": true`.
    JsonLines,
}

/* ---------- wire shapes ---------- */

#[derive(Deserialize, Debug, Default)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize, Debug, Default)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Debug, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct OllamaChunk {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

/* ---------- decoder ---------- */

/// Items recovered from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Text(String),
    /// The upstream reported an error inside a well-formed chunk.
    Error(String),
}

pub struct StreamDecoder {
    format: WireFormat,
    buffer: Vec<u8>,
    finished: bool,
}

impl StreamDecoder {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// True once the terminator was seen or `finish` was called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feeds one network chunk, returning every item completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Decoded> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line, &mut out);
            if self.finished {
                self.buffer.clear();
                break;
            }
        }
        out
    }

    /// Flushes a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Vec<Decoded> {
        let mut out = Vec::new();
        if !self.finished && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode_line(&line, &mut out);
        }
        self.finished = true;
        out
    }

    fn decode_line(&mut self, raw: &[u8], out: &mut Vec<Decoded>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match self.format {
            WireFormat::EventStream => self.decode_event(line, out),
            WireFormat::JsonLines => self.decode_json_line(line, out),
        }
    }

    fn decode_event(&mut self, line: &str, out: &mut Vec<Decoded>) {
        // Comments, `event:` and `id:` fields carry nothing for us.
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if data == "[DONE]" {
            self.finished = true;
            return;
        }
        match serde_json::from_str::<ChatChunk>(data) {
            Ok(chunk) => {
                let content = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content);
                if let Some(content) = content.filter(|c| !c.is_empty()) {
                    out.push(Decoded::Text(content));
                }
            }
            Err(e) => debug!(error = %e, "Skipping malformed event-stream chunk"),
        }
    }

    fn decode_json_line(&mut self, line: &str, out: &mut Vec<Decoded>) {
        match serde_json::from_str::<OllamaChunk>(line) {
            Ok(chunk) => {
                if let Some(error) = chunk.error {
                    out.push(Decoded::Error(error));
                    self.finished = true;
                    return;
                }
                let content = chunk
                    .message
                    .map(|m| m.content)
                    .or(chunk.response)
                    .unwrap_or_default();
                if !content.is_empty() {
                    out.push(Decoded::Text(content));
                }
                if chunk.done {
                    self.finished = true;
                }
            }
            Err(e) => debug!(error = %e, "Skipping malformed JSON line"),
        }
    }
}
