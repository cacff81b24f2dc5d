//! Chat-completion client abstraction.

mod http;

use crate::types::ConversationTurn;
use async_trait::async_trait;
use futures_util::Stream;
use serde::Serialize;
use std::pin::Pin;
use thiserror::Error;

pub use http::HttpCompletionProvider;

/// Reply fragments in arrival order.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Errors returned by completion providers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),
    /// Non-success HTTP status.
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    /// Response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
    /// The API key environment variable is unset or empty.
    #[error("missing api key (env={0})")]
    MissingApiKey(String),
    /// The call did not finish in time.
    #[error("timed out after {0}s")]
    Timeout(u64),
}

/// Chat-completion request body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ConversationTurn>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ConversationTurn>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            temperature: None,
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Provider of model replies.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Return the full reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Return reply fragments as they arrive.
    ///
    /// The default yields the blocking reply as a single fragment.
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, LlmError> {
        let reply = self.complete(request).await?;
        Ok(Box::pin(futures_util::stream::once(async move { Ok(reply) })))
    }
}

#[cfg(test)]
mod tests {
    use super::CompletionRequest;
    use crate::types::ConversationTurn;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_serializes_wire_body() {
        let request = CompletionRequest::new(
            "anthropic/claude-3.5-sonnet",
            vec![
                ConversationTurn::system("rules"),
                ConversationTurn::user("hi"),
            ],
        )
        .with_stream(true)
        .with_temperature(0.5);

        let body = serde_json::to_value(&request).expect("json");
        assert_eq!(
            body,
            json!({
                "model": "anthropic/claude-3.5-sonnet",
                "messages": [
                    { "role": "system", "content": "rules" },
                    { "role": "user", "content": "hi" }
                ],
                "stream": true,
                "temperature": 0.5
            })
        );
    }

    #[test]
    fn temperature_is_omitted_when_unset() {
        let body = serde_json::to_value(CompletionRequest::new("m", Vec::new())).expect("json");
        assert_eq!(body, json!({ "model": "m", "messages": [], "stream": false }));
    }
}
