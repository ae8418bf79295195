//! Inference relay for the local Ollama-compatible generate endpoint.
//!
//! Issues one streaming POST to `/api/generate` and re-emits every token
//! fragment from the NDJSON response body as a channel event, in arrival
//! order. The final event carries the accumulated reply, which is exactly
//! what gets persisted as the assistant's turn.

use chatgate_common::config::InferenceConfig;
use chatgate_common::Error;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Events emitted while relaying one generate request.
#[derive(Debug)]
pub enum RelayEvent {
    /// One incremental token fragment, in upstream order.
    Token(String),
    /// Terminal upstream failure. Nothing gets persisted after this.
    Error(Error),
    /// Normal completion with the full accumulated reply, trimmed.
    Done { reply: String },
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// One line of the upstream NDJSON response body.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Buffers raw body bytes and yields one parsed chunk per complete line.
///
/// Lines that fail to parse as JSON are dropped silently (transport
/// artifacts, not errors). Partial lines, including split multi-byte UTF-8
/// sequences, stay buffered until their newline arrives.
#[derive(Debug, Default)]
struct NdjsonDecoder {
    buf: Vec<u8>,
}

impl NdjsonDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<GenerateChunk> {
        self.buf.extend_from_slice(bytes);

        let mut chunks = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice::<GenerateChunk>(line) {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed NDJSON line");
                }
            }
        }
        chunks
    }
}

/// Relay to the local inference service.
pub struct InferenceRelay {
    client: Client,
    endpoint: String,
    model: String,
}

impl InferenceRelay {
    /// Create a relay from the inference configuration.
    ///
    /// No overall request timeout is set: generation streams for as long as
    /// the model keeps producing tokens. Only the connection attempt is
    /// bounded.
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    /// Start one generate request and stream its events.
    ///
    /// The returned receiver yields `Token` events in upstream order,
    /// terminated by exactly one `Done` or `Error` event. Dropping the
    /// receiver stops the relay on its next send and tears down the
    /// upstream connection.
    pub fn stream(&self, prompt: String) -> mpsc::Receiver<RelayEvent> {
        let (tx, rx) = mpsc::channel(32);
        let client = self.client.clone();
        let url = format!("{}/api/generate", self.endpoint);
        let model = self.model.clone();

        tokio::spawn(async move {
            relay_generate(client, url, model, prompt, tx).await;
        });

        rx
    }
}

async fn relay_generate(
    client: Client,
    url: String,
    model: String,
    prompt: String,
    tx: mpsc::Sender<RelayEvent>,
) {
    let request = GenerateRequest {
        model,
        prompt,
        stream: true,
    };

    let response = match client.post(&url).json(&request).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, url = %url, "Inference request failed");
            let _ = tx
                .send(RelayEvent::Error(Error::Upstream(format!(
                    "inference request failed: {e}"
                ))))
                .await;
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        let message = if detail.trim().is_empty() {
            format!("inference server returned status {}", status.as_u16())
        } else {
            detail
        };
        tracing::error!(status = status.as_u16(), "Inference server error");
        let _ = tx.send(RelayEvent::Error(Error::Upstream(message))).await;
        return;
    }

    let mut decoder = NdjsonDecoder::default();
    let mut reply = String::new();
    let mut body = response.bytes_stream();
    let mut done = false;

    'read: while let Some(next) = body.next().await {
        let bytes = match next {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Inference stream read failed");
                let _ = tx
                    .send(RelayEvent::Error(Error::Upstream(format!(
                        "inference stream failed: {e}"
                    ))))
                    .await;
                return;
            }
        };

        for chunk in decoder.push(&bytes) {
            if let Some(token) = chunk.response {
                reply.push_str(&token);
                if tx.send(RelayEvent::Token(token)).await.is_err() {
                    // Client disconnected; drop the upstream connection
                    tracing::debug!("Relay receiver dropped mid-stream");
                    return;
                }
            }
            if chunk.done {
                done = true;
                break 'read;
            }
        }
    }

    if !done {
        tracing::debug!("Upstream closed without done flag");
    }

    let _ = tx
        .send(RelayEvent::Done {
            reply: reply.trim().to_string(),
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_parses_complete_lines() {
        let mut decoder = NdjsonDecoder::default();
        let chunks = decoder.push(b"{\"response\":\"Hel\"}\n{\"response\":\"lo\"}\n");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].response.as_deref(), Some("Hel"));
        assert_eq!(chunks[1].response.as_deref(), Some("lo"));
        assert!(!chunks[0].done);
    }

    #[test]
    fn test_decoder_buffers_partial_line() {
        let mut decoder = NdjsonDecoder::default();
        assert!(decoder.push(b"{\"respon").is_empty());
        let chunks = decoder.push(b"se\":\"hi\"}\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].response.as_deref(), Some("hi"));
    }

    #[test]
    fn test_decoder_skips_malformed_line() {
        let mut decoder = NdjsonDecoder::default();
        let chunks = decoder.push(b"{\"response\":\"a\"}\nnot json\n{\"response\":\"b\"}\n");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].response.as_deref(), Some("a"));
        assert_eq!(chunks[1].response.as_deref(), Some("b"));
    }

    #[test]
    fn test_decoder_handles_split_utf8() {
        // "é" is 0xC3 0xA9; split the pair across two pushes
        let mut decoder = NdjsonDecoder::default();
        assert!(decoder.push(b"{\"response\":\"caf\xc3").is_empty());
        let chunks = decoder.push(b"\xa9\"}\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].response.as_deref(), Some("café"));
    }

    #[test]
    fn test_decoder_skips_blank_lines() {
        let mut decoder = NdjsonDecoder::default();
        let chunks = decoder.push(b"\n\n{\"done\":true}\n");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].done);
        assert!(chunks[0].response.is_none());
    }

    #[test]
    fn test_decoder_done_flag() {
        let mut decoder = NdjsonDecoder::default();
        let chunks = decoder.push(b"{\"response\":\" world\",\"done\":false}\n{\"done\":true}\n");
        assert_eq!(chunks.len(), 2);
        assert!(!chunks[0].done);
        assert!(chunks[1].done);
    }

    #[test]
    fn test_decoder_ignores_unknown_fields() {
        let mut decoder = NdjsonDecoder::default();
        let chunks =
            decoder.push(b"{\"model\":\"llama3\",\"response\":\"x\",\"eval_count\":3}\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].response.as_deref(), Some("x"));
    }

    #[test]
    fn test_relay_trims_endpoint() {
        let relay = InferenceRelay::new(&InferenceConfig {
            endpoint: "http://localhost:11434/".into(),
            model: "llama3".into(),
        });
        assert_eq!(relay.endpoint, "http://localhost:11434");
    }
}
