use async_trait::async_trait;
use mnemo_rs_core::{InboundMessage, InboundSource, SourceError};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Inbound source that hands out scripted poll batches and records deliveries.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    batches: Mutex<VecDeque<Result<Vec<InboundMessage>, String>>>,
    delivered: Mutex<Vec<(String, String)>>,
    polls: Mutex<usize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one poll result of `(chat_id, text)` messages.
    pub fn push_batch(&self, messages: Vec<(&str, &str)>) {
        let batch = messages
            .into_iter()
            .map(|(chat_id, text)| InboundMessage {
                chat_id: chat_id.to_string(),
                text: text.to_string(),
            })
            .collect();
        self.batches.lock().push_back(Ok(batch));
    }

    /// Queue one failing poll.
    pub fn push_error(&self, message: impl Into<String>) {
        self.batches.lock().push_back(Err(message.into()));
    }

    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().clone()
    }

    pub fn poll_count(&self) -> usize {
        *self.polls.lock()
    }
}

#[async_trait]
impl InboundSource for ScriptedSource {
    async fn poll(&self) -> Result<Vec<InboundMessage>, SourceError> {
        *self.polls.lock() += 1;
        match self.batches.lock().pop_front() {
            Some(Ok(batch)) => Ok(batch),
            Some(Err(message)) => Err(SourceError(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn deliver(&self, chat_id: &str, text: &str) -> Result<(), SourceError> {
        self.delivered
            .lock()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}
