//! End-to-end handling of one user turn.

use crate::completion::{CompletionProvider, CompletionRequest, LlmError};
use crate::context::ContextBuilder;
use crate::directive::{Directive, DirectiveExtractor, DirectiveFailure, strip_spans};
use crate::error::CoreError;
use crate::session::SessionContext;
use futures_util::StreamExt;
use log::{debug, info, warn};
use mnemo_rs_config::{MemoryCapturePolicy, MnemoConfig};
use mnemo_rs_memory::{CapturePolicy, MemoryError, MemoryStore};
use std::sync::Arc;
use std::time::Duration;

/// Prefix of the synthetic assistant reply used when the model call fails.
pub const MODEL_FAILURE_PREFIX: &str = "[error] model request failed: ";

/// Request settings applied to every turn.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub stream: bool,
    pub timeout: Duration,
    /// Remove directive spans from the displayed reply.
    pub strip_directives: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&MnemoConfig::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &MnemoConfig) -> Self {
        Self {
            model: config.model.name.clone(),
            temperature: Some(config.model.temperature),
            stream: config.model.stream,
            timeout: Duration::from_secs(config.model.timeout_secs),
            strip_directives: config.context.strip_directives,
        }
    }
}

/// Result of one handled turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Text to show the user.
    pub reply: String,
    /// Directives written to the store.
    pub applied: Vec<Directive>,
    /// Directives whose store write failed.
    pub failures: Vec<DirectiveFailure>,
    /// True when the model call failed and `reply` is a placeholder.
    pub failed: bool,
}

/// Runs turns: context build, model call, directive extraction, history update.
#[derive(Clone)]
pub struct ChatEngine {
    provider: Arc<dyn CompletionProvider>,
    context: ContextBuilder,
    extractor: DirectiveExtractor,
    settings: EngineSettings,
}

impl ChatEngine {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        context: ContextBuilder,
        extractor: DirectiveExtractor,
        settings: EngineSettings,
    ) -> Self {
        Self {
            provider,
            context,
            extractor,
            settings,
        }
    }

    /// Wire an engine from the effective config.
    ///
    /// Fails when a capture pattern does not compile.
    pub fn from_config(
        config: &MnemoConfig,
        store: Arc<dyn MemoryStore>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self, CoreError> {
        let context = ContextBuilder::from_config(store.clone(), &config.context, &config.memory);
        let extractor =
            DirectiveExtractor::with_policy(store, capture_policy(&config.memory.capture)?);
        Ok(Self::new(
            provider,
            context,
            extractor,
            EngineSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Handle one user turn.
    ///
    /// `on_chunk` receives raw reply text as it arrives (the whole reply at
    /// once in blocking mode). Directives are applied only after the full
    /// reply is assembled. A failed model call never returns an error: the
    /// reply becomes a placeholder and no directive runs. Both turns are
    /// appended to `session` in every case, after which the session keeps
    /// only as many turns as the context window sends.
    pub async fn handle_turn(
        &self,
        session: &mut SessionContext,
        input: &str,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> TurnOutcome {
        let messages = self.context.build(session.history(), input);
        let mut request = CompletionRequest::new(self.settings.model.clone(), messages)
            .with_stream(self.settings.stream);
        request.temperature = self.settings.temperature;

        let result = match tokio::time::timeout(
            self.settings.timeout,
            self.request(&request, on_chunk),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.settings.timeout.as_secs())),
        };

        let outcome = match result {
            Ok(reply) => {
                let report = self.extractor.extract(&reply);
                let display = if self.settings.strip_directives && !report.is_empty() {
                    strip_spans(&reply, &report.spans)
                } else {
                    reply.clone()
                };
                session.record_exchange(input, reply);
                TurnOutcome {
                    reply: display,
                    applied: report.applied,
                    failures: report.failures,
                    failed: false,
                }
            }
            Err(err) => {
                warn!("model request failed (model={}, err={})", request.model, err);
                let reply = format!("{MODEL_FAILURE_PREFIX}{err}");
                session.record_exchange(input, reply.clone());
                TurnOutcome {
                    reply,
                    applied: Vec::new(),
                    failures: Vec::new(),
                    failed: true,
                }
            }
        };
        session.retain_recent(self.context.history_window());
        info!(
            "turn handled (failed={}, applied={}, history={})",
            outcome.failed,
            outcome.applied.len(),
            session.len()
        );
        outcome
    }

    async fn request(
        &self,
        request: &CompletionRequest,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, LlmError> {
        if !request.stream {
            let reply = self.provider.complete(request).await?;
            on_chunk(&reply);
            return Ok(reply);
        }
        let mut stream = self.provider.complete_stream(request).await?;
        let mut reply = String::new();
        let mut fragments = 0usize;
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            on_chunk(&fragment);
            reply.push_str(&fragment);
            fragments += 1;
        }
        debug!(
            "stream finished (fragments={}, reply_len={})",
            fragments,
            reply.len()
        );
        Ok(reply)
    }
}

/// Compile the config capture section into the store's policy type.
pub fn capture_policy(config: &MemoryCapturePolicy) -> Result<CapturePolicy, MemoryError> {
    let policy = CapturePolicy::default()
        .deny(&config.deny_patterns)?
        .redact(&config.redact_patterns)?
        .max_value_chars(config.max_value_chars)
        .replacement(config.replacement.clone());
    if config.detect_secrets {
        policy.detect_secrets(config.secret_entropy_threshold)
    } else {
        Ok(policy)
    }
}
