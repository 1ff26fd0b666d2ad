use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::ChatMessage;
use shared::{CancelToken, Fragment, GenerationParams};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::think_tags::ThinkSplitter;
use crate::{ChatModel, FragmentStream};

/// Fragments buffered between the reader thread and the consumer.
const CHANNEL_DEPTH: usize = 64;

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    think: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f64,
    top_p: f64,
    top_k: u32,
}

/// Streaming response: each line is one of these JSON objects.
#[derive(Debug, Deserialize)]
struct OllamaStreamChunk {
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: Option<String>,
}

pub struct OllamaClient {
    base: String,
    model: String,
    think: bool,
}

impl OllamaClient {
    pub fn new(model: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            model: model.into(),
            think: false,
        }
    }

    /// Ask the server for a separate reasoning channel. Only models that
    /// support it accept the flag.
    pub fn with_thinking(mut self, think: bool) -> Self {
        self.think = think;
        self
    }

    fn request(&self, dialogue: &[ChatMessage], params: &GenerationParams) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.model.clone(),
            messages: dialogue.to_vec(),
            stream: true,
            think: self.think,
            options: OllamaOptions {
                num_predict: params.max_len,
                temperature: params.temperature,
                top_p: params.top_p,
                top_k: params.top_k,
            },
        }
    }
}

impl ChatModel for OllamaClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn stream(
        &self,
        dialogue: &[ChatMessage],
        params: &GenerationParams,
        cancel: CancelToken,
    ) -> Result<FragmentStream> {
        let url = format!("{}/api/chat", self.base.trim_end_matches('/'));
        let req = self.request(dialogue, params);
        let (tx, rx) = sync_channel::<Result<Fragment>>(CHANNEL_DEPTH);

        info!(model = %self.model, turns = dialogue.len(), "starting ollama stream");

        std::thread::Builder::new()
            .name("ollama-stream".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = tx.send(Err(anyhow!("Failed to start async runtime: {}", e)));
                        return;
                    }
                };
                if let Err(e) = rt.block_on(pump(url, req, tx.clone(), cancel)) {
                    let _ = tx.send(Err(e));
                }
            })
            .context("failed to spawn ollama reader thread")?;

        Ok(Box::new(rx.into_iter()))
    }
}

/// Read line-delimited JSON from Ollama and forward fragments until the
/// server is done, the consumer hangs up, or cancellation is requested.
async fn pump(
    url: String,
    req: OllamaChatRequest,
    tx: SyncSender<Result<Fragment>>,
    cancel: CancelToken,
) -> Result<()> {
    let http = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("failed to build HTTP client")?;

    let resp = http.post(&url).json(&req).send().await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow!("ollama error: {} {}", status, body.trim()));
    }

    let mut splitter = ThinkSplitter::new();
    let mut stream = resp.bytes_stream();
    // Raw bytes: a multi-byte character may straddle two chunks.
    let mut buf: Vec<u8> = Vec::new();

    let forward = |frags: Vec<Fragment>| -> bool {
        frags.into_iter().all(|f| tx.send(Ok(f)).is_ok())
    };

    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            debug!("cancellation observed, dropping ollama stream");
            return Ok(());
        }
        let bytes = chunk.map_err(|e| anyhow!("stream read error: {}", e))?;
        buf.extend_from_slice(&bytes);

        while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();

            if line.is_empty() {
                continue;
            }

            let chunk_data: OllamaStreamChunk = serde_json::from_str(&line)
                .map_err(|e| anyhow!("Failed to parse Ollama stream: {}", e))?;

            if let Some(error) = chunk_data.error {
                return Err(anyhow!("ollama error: {}", error));
            }

            if let Some(msg) = &chunk_data.message {
                let mut frags = Vec::new();
                if let Some(thinking) = &msg.thinking {
                    frags.extend(splitter.push_thinking(thinking));
                }
                frags.extend(splitter.push_content(&msg.content));
                if !forward(frags) {
                    debug!("consumer hung up, abandoning ollama stream");
                    return Ok(());
                }
            }

            if chunk_data.done {
                if chunk_data.done_reason.as_deref() == Some("length") {
                    warn!("ollama stopped at the token budget");
                }
                forward(splitter.finish());
                return Ok(());
            }
        }
    }

    forward(splitter.finish());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_generation_params() {
        let client = OllamaClient::new("gpt-oss:20b", "http://localhost:11434").with_thinking(true);
        let params = GenerationParams {
            max_len: 4096,
            temperature: 0.9,
            top_p: 0.95,
            top_k: 0,
        };
        let req = client.request(&[ChatMessage::new("user", "hi")], &params);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "gpt-oss:20b");
        assert_eq!(json["stream"], true);
        assert_eq!(json["think"], true);
        assert_eq!(json["options"]["num_predict"], 4096);
        assert_eq!(json["options"]["top_k"], 0);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_parses_thinking_chunk() {
        let line = r#"{"model":"m","message":{"role":"assistant","content":"","thinking":"hmm"},"done":false}"#;
        let chunk: OllamaStreamChunk = serde_json::from_str(line).unwrap();
        let msg = chunk.message.unwrap();
        assert_eq!(msg.thinking.as_deref(), Some("hmm"));
        assert!(msg.content.is_empty());
        assert!(!chunk.done);
    }

    #[test]
    fn test_parses_error_line() {
        let chunk: OllamaStreamChunk =
            serde_json::from_str(r#"{"error":"model not found"}"#).unwrap();
        assert_eq!(chunk.error.as_deref(), Some("model not found"));
        assert!(chunk.message.is_none());
    }

    #[test]
    fn test_unreachable_server_surfaces_as_stream_error() {
        // Port 9 (discard) is essentially never serving HTTP.
        let client = OllamaClient::new("m", "http://127.0.0.1:9");
        let mut stream = client
            .stream(&[], &GenerationParams::default(), CancelToken::new())
            .unwrap();
        assert!(matches!(stream.next(), Some(Err(_))));
    }
}
