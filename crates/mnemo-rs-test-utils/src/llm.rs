use async_trait::async_trait;
use futures_util::stream;
use mnemo_rs_core::{CompletionProvider, CompletionRequest, CompletionStream, LlmError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Always replies with the same text.
#[derive(Debug, Clone)]
pub struct FixedCompletion {
    reply: String,
}

impl FixedCompletion {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl CompletionProvider for FixedCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
        Ok(self.reply.clone())
    }
}

/// Replies from a script in order and records every request.
#[derive(Debug, Clone, Default)]
pub struct RecordingCompletion {
    replies: Arc<Mutex<Vec<String>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl RecordingCompletion {
    /// Replies are used front to back; the last one repeats once exhausted.
    pub fn new(replies: Vec<impl Into<String>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().map(Into::into).collect())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().push(request.clone());
        let mut replies = self.replies.lock();
        let reply = if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies.first().cloned().unwrap_or_default()
        };
        Ok(reply)
    }
}

/// Streams a fixed list of fragments.
#[derive(Debug, Clone)]
pub struct StreamingCompletion {
    chunks: Vec<String>,
}

impl StreamingCompletion {
    pub fn new(chunks: Vec<impl Into<String>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl CompletionProvider for StreamingCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
        Ok(self.chunks.concat())
    }

    async fn complete_stream(
        &self,
        _request: &CompletionRequest,
    ) -> Result<CompletionStream, LlmError> {
        let chunks: Vec<Result<String, LlmError>> = self.chunks.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// Fails every call with the given error.
#[derive(Debug, Clone)]
pub struct FailingCompletion {
    error: LlmError,
}

impl FailingCompletion {
    pub fn new(error: LlmError) -> Self {
        Self { error }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmError::Network(message.into()))
    }
}

#[async_trait]
impl CompletionProvider for FailingCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
        Err(self.error.clone())
    }
}

/// Replies only after a delay.
#[derive(Debug, Clone)]
pub struct SlowCompletion {
    delay: Duration,
    reply: String,
}

impl SlowCompletion {
    pub fn new(delay: Duration, reply: impl Into<String>) -> Self {
        Self {
            delay,
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl CompletionProvider for SlowCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.clone())
    }
}
