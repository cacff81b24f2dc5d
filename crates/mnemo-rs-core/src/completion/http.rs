//! OpenAI-compatible `/chat/completions` client over reqwest.

use super::{CompletionProvider, CompletionRequest, CompletionStream, LlmError};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt, stream};
use log::{debug, info};
use mnemo_rs_config::ModelConfig;
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

/// Completion provider speaking the chat-completions wire format.
#[derive(Clone)]
pub struct HttpCompletionProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for HttpCompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompletionProvider")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HttpCompletionProvider {
    /// Create a provider for `{base_url}/chat/completions`.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        }
    }

    /// Create a provider reading the bearer key from `api_key_env`.
    pub fn from_env(base_url: &str, api_key_env: &str) -> Result<Self, LlmError> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(api_key_env.to_string()))?;
        info!(
            "configured completion endpoint (base_url={}, api_key_env={})",
            base_url, api_key_env
        );
        Ok(Self::new(base_url, api_key))
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self, LlmError> {
        Self::from_env(&config.base_url, &config.api_key_env)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: &CompletionRequest) -> Result<reqwest::Response, LlmError> {
        debug!(
            "posting completion request (model={}, messages={}, stream={})",
            request.model,
            request.messages.len(),
            request.stream
        );
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| LlmError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let request = request.clone().with_stream(false);
        let body: Value = self
            .send(&request)
            .await?
            .json()
            .await
            .map_err(|err| LlmError::Decode(err.to_string()))?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::Decode("missing choices[0].message.content".to_string()))
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, LlmError> {
        let request = request.clone().with_stream(true);
        let response = self.send(&request).await?;
        let body: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec())),
        );
        Ok(Box::pin(sse_fragments(body)))
    }
}

/// One parsed server-sent-events line.
#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Fragment(String),
    Done,
    Skip,
}

/// Parse a single SSE line into a content fragment.
fn parse_sse_line(line: &str) -> Result<SseLine, LlmError> {
    let line = line.trim_end_matches('\r');
    let Some(payload) = line.strip_prefix("data:") else {
        // Comments, `event:` and `id:` lines carry no content.
        return Ok(SseLine::Skip);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(SseLine::Skip);
    }
    if payload == "[DONE]" {
        return Ok(SseLine::Done);
    }
    let event: Value =
        serde_json::from_str(payload).map_err(|err| LlmError::Decode(err.to_string()))?;
    if let Some(error) = event.get("error") {
        return Err(LlmError::Decode(format!("stream error event: {error}")));
    }
    match event["choices"][0]["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => Ok(SseLine::Fragment(content.to_string())),
        _ => Ok(SseLine::Skip),
    }
}

struct SseState {
    body: ByteStream,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    error: Option<LlmError>,
    done: bool,
}

impl SseState {
    /// Parse complete lines out of the buffer into pending fragments.
    fn drain_lines(&mut self) -> Result<(), LlmError> {
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.parse_line(&line[..line.len() - 1])?;
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        Ok(())
    }

    fn parse_line(&mut self, raw: &[u8]) -> Result<(), LlmError> {
        let line =
            std::str::from_utf8(raw).map_err(|err| LlmError::Decode(err.to_string()))?;
        match parse_sse_line(line)? {
            SseLine::Fragment(fragment) => self.pending.push_back(fragment),
            SseLine::Done => self.done = true,
            SseLine::Skip => {}
        }
        Ok(())
    }
}

/// Turn a raw SSE body into content fragments. Ends on `[DONE]` or end of body.
fn sse_fragments(body: ByteStream) -> impl Stream<Item = Result<String, LlmError>> + Send {
    let state = SseState {
        body,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        error: None,
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if let Some(err) = state.error.take() {
                return Some((Err(err), state));
            }
            if state.done {
                return None;
            }
            let parsed = match state.body.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    state.drain_lines()
                }
                Some(Err(err)) => Err(LlmError::Network(err.to_string())),
                None => {
                    state.done = true;
                    let rest = std::mem::take(&mut state.buffer);
                    state.parse_line(&rest)
                }
            };
            if let Err(err) = parsed {
                state.error = Some(err);
                state.done = true;
            }
        }
    })
}
