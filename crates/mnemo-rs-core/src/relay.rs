//! Background relay from an external message source into the dispatcher.

use crate::dispatch::{DispatcherHandle, WeakDispatcherHandle};
use crate::error::CoreError;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Error reported by an inbound source.
#[derive(Debug, Error)]
#[error("inbound source error: {0}")]
pub struct SourceError(pub String);

/// Message received from an external chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: String,
    pub text: String,
}

/// External chat integration polled by the relay.
#[async_trait]
pub trait InboundSource: Send + Sync {
    /// Return messages received since the last poll.
    async fn poll(&self) -> Result<Vec<InboundMessage>, SourceError>;

    /// Send a reply back to a chat.
    async fn deliver(&self, chat_id: &str, text: &str) -> Result<(), SourceError>;
}

/// Session key used for turns coming from `chat_id`.
pub fn relay_session_key(chat_id: &str) -> String {
    format!("relay:{chat_id}")
}

/// Start guard for the polling loop.
pub struct Relay {
    started: AtomicBool,
}

static GLOBAL_RELAY: Relay = Relay::new();

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

impl Relay {
    pub const fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
        }
    }

    /// Process-wide relay instance.
    pub fn global() -> &'static Relay {
        &GLOBAL_RELAY
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Launch the polling loop unless this relay already launched one.
    ///
    /// Returns the loop's task handle on the first call and `None` after.
    /// The loop holds only a weak handle, so it ends once the caller's
    /// dispatcher handles are dropped.
    pub fn start(
        &self,
        source: Arc<dyn InboundSource>,
        dispatcher: &DispatcherHandle,
        poll_interval: Duration,
    ) -> Option<JoinHandle<()>> {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("relay already started; ignoring start request");
            return None;
        }
        info!(
            "starting relay loop (poll_interval_ms={})",
            poll_interval.as_millis()
        );
        Some(tokio::spawn(run_relay(
            source,
            dispatcher.downgrade(),
            poll_interval,
        )))
    }
}

/// Poll `source` and run each message as a turn until the dispatcher closes.
pub async fn run_relay(
    source: Arc<dyn InboundSource>,
    dispatcher: WeakDispatcherHandle,
    poll_interval: Duration,
) {
    while dispatcher.is_alive() {
        match source.poll().await {
            Ok(messages) => {
                for message in messages {
                    let Some(handle) = dispatcher.upgrade() else {
                        info!("dispatcher closed; relay loop exiting");
                        return;
                    };
                    let session = relay_session_key(&message.chat_id);
                    let outcome = match handle.submit(session, message.text).await {
                        Ok(outcome) => outcome,
                        Err(CoreError::DispatcherClosed) => {
                            info!("dispatcher closed; relay loop exiting");
                            return;
                        }
                        Err(err) => {
                            warn!(
                                "relay turn failed (chat_id={}, err={})",
                                message.chat_id, err
                            );
                            continue;
                        }
                    };
                    if let Err(err) = source.deliver(&message.chat_id, &outcome.reply).await {
                        warn!(
                            "failed to deliver relay reply (chat_id={}, err={})",
                            message.chat_id, err
                        );
                    }
                }
            }
            Err(err) => warn!("relay poll failed (err={})", err),
        }
        tokio::time::sleep(poll_interval).await;
    }
    info!("dispatcher closed; relay loop exiting");
}
