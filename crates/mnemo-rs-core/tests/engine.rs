//! Chat engine integration tests with stub completion providers.

use mnemo_rs_config::MnemoConfig;
use mnemo_rs_core::{
    ChatEngine, CompletionProvider, ContextBuilder, CoreError, Directive, DirectiveExtractor,
    EngineSettings, MODEL_FAILURE_PREFIX, Role, SessionContext,
};
use mnemo_rs_memory::{MemoryStore, SqliteMemoryStore};
use mnemo_rs_test_utils::{
    FailingCompletion, FailingStore, FixedCompletion, RecordingCompletion, SlowCompletion,
    StreamingCompletion,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn settings() -> EngineSettings {
    EngineSettings {
        model: "test-model".to_string(),
        temperature: None,
        stream: false,
        timeout: Duration::from_secs(5),
        strip_directives: false,
    }
}

fn store() -> Arc<SqliteMemoryStore> {
    Arc::new(SqliteMemoryStore::open_in_memory().expect("store"))
}

fn engine(
    provider: Arc<dyn CompletionProvider>,
    store: Arc<dyn MemoryStore>,
    settings: EngineSettings,
) -> ChatEngine {
    ChatEngine::new(
        provider,
        ContextBuilder::new(store.clone()),
        DirectiveExtractor::new(store),
        settings,
    )
}

fn ignore_chunk(_: &str) {}

/// A memorize directive is stored and shows up in the next turn's preamble.
#[tokio::test]
async fn memorized_fact_reaches_next_request() {
    let store = store();
    let provider = Arc::new(RecordingCompletion::new(vec![
        "Nice to meet you. :::MEMORIZE:name:Ada:::",
        "Hello again, Ada.",
    ]));
    let engine = engine(provider.clone(), store.clone(), settings());
    let mut session = SessionContext::new();

    let first = engine
        .handle_turn(&mut session, "I'm Ada", &mut ignore_chunk)
        .await;
    assert_eq!(first.failed, false);
    assert_eq!(
        first.applied,
        vec![Directive::Memorize {
            key: "name".to_string(),
            value: "Ada".to_string(),
        }]
    );
    assert_eq!(first.reply, "Nice to meet you. :::MEMORIZE:name:Ada:::");
    assert_eq!(
        store.list_memory().expect("memory").get("name"),
        Some(&"Ada".to_string())
    );

    engine
        .handle_turn(&mut session, "Who am I?", &mut ignore_chunk)
        .await;
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1];
    assert_eq!(second.model, "test-model");
    assert_eq!(second.messages.len(), 4);
    assert_eq!(second.messages[0].role, Role::System);
    assert!(second.messages[0].content.contains("\"name\": \"Ada\""));
    assert_eq!(second.messages[1].content, "I'm Ada");
    assert_eq!(
        second.messages[2].content,
        "Nice to meet you. :::MEMORIZE:name:Ada:::"
    );
    assert_eq!(second.messages[3].content, "Who am I?");
    assert_eq!(session.len(), 4);
}

#[tokio::test]
async fn notes_and_multiple_directives_apply_in_order() {
    let store = store();
    let provider = Arc::new(FixedCompletion::new(
        ":::MEMORIZE:lang:go::: then :::NOTE:switched languages::: :::MEMORIZE:lang:rust:::",
    ));
    let engine = engine(provider, store.clone(), settings());
    let mut session = SessionContext::new();

    let outcome = engine
        .handle_turn(&mut session, "update", &mut ignore_chunk)
        .await;
    assert_eq!(outcome.applied.len(), 3);
    assert_eq!(
        store.list_memory().expect("memory").get("lang"),
        Some(&"rust".to_string())
    );
    let notes = store.list_notes(None).expect("notes");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content, "switched languages");
}

/// A failed model call yields a placeholder, records both turns, and writes nothing.
#[tokio::test]
async fn model_failure_records_placeholder() {
    let store = store();
    let provider = Arc::new(FailingCompletion::network("connection refused"));
    let engine = engine(provider, store.clone(), settings());
    let mut session = SessionContext::new();

    let outcome = engine
        .handle_turn(&mut session, ":::NOTE:typed by user:::", &mut ignore_chunk)
        .await;
    assert!(outcome.failed);
    assert!(outcome.reply.starts_with(MODEL_FAILURE_PREFIX));
    assert!(outcome.reply.contains("connection refused"));
    assert!(outcome.applied.is_empty());

    assert_eq!(session.len(), 2);
    assert_eq!(session.history()[0].role, Role::User);
    assert_eq!(session.history()[1].role, Role::Assistant);
    assert_eq!(session.history()[1].content, outcome.reply);
    assert!(store.list_notes(None).expect("notes").is_empty());
    assert!(store.list_memory().expect("memory").is_empty());
}

#[tokio::test]
async fn slow_model_times_out() {
    let provider = Arc::new(SlowCompletion::new(Duration::from_secs(5), "late"));
    let mut settings = settings();
    settings.timeout = Duration::from_millis(50);
    let engine = engine(provider, store(), settings);
    let mut session = SessionContext::new();

    let outcome = engine
        .handle_turn(&mut session, "hello", &mut ignore_chunk)
        .await;
    assert!(outcome.failed);
    assert!(outcome.reply.contains("timed out"));
    assert_eq!(session.len(), 2);
}

/// Fragments are forwarded as they arrive and directives split across them still apply.
#[tokio::test]
async fn streamed_fragments_are_forwarded_and_joined() {
    let store = store();
    let fragments = vec!["Sure, ", ":::MEMO", "RIZE:city:Par", "is::: done."];
    let provider = Arc::new(StreamingCompletion::new(fragments.clone()));
    let mut settings = settings();
    settings.stream = true;
    let engine = engine(provider, store.clone(), settings);
    let mut session = SessionContext::new();

    let mut seen = Vec::new();
    let outcome = engine
        .handle_turn(&mut session, "I live in Paris", &mut |chunk: &str| {
            seen.push(chunk.to_string())
        })
        .await;
    assert_eq!(seen, fragments);
    assert_eq!(outcome.reply, "Sure, :::MEMORIZE:city:Paris::: done.");
    assert_eq!(
        store.list_memory().expect("memory").get("city"),
        Some(&"Paris".to_string())
    );
}

#[tokio::test]
async fn blocking_mode_emits_reply_once() {
    let provider = Arc::new(FixedCompletion::new("whole reply"));
    let engine = engine(provider, store(), settings());
    let mut session = SessionContext::new();

    let mut seen = Vec::new();
    engine
        .handle_turn(&mut session, "hi", &mut |chunk: &str| seen.push(chunk.to_string()))
        .await;
    assert_eq!(seen, vec!["whole reply".to_string()]);
}

#[tokio::test]
async fn stripping_hides_directives_but_history_keeps_them() {
    let provider = Arc::new(FixedCompletion::new("Done.:::NOTE:buy milk::: Bye."));
    let mut settings = settings();
    settings.strip_directives = true;
    let engine = engine(provider, store(), settings);
    let mut session = SessionContext::new();

    let outcome = engine
        .handle_turn(&mut session, "remind me", &mut ignore_chunk)
        .await;
    assert_eq!(outcome.reply, "Done. Bye.");
    assert_eq!(session.history()[1].content, "Done.:::NOTE:buy milk::: Bye.");
}

#[tokio::test]
async fn only_recent_history_is_sent() {
    let provider = Arc::new(RecordingCompletion::new(vec!["ok"]));
    let store = store();
    let engine = ChatEngine::new(
        provider.clone(),
        ContextBuilder::new(store.clone()).with_history_window(2),
        DirectiveExtractor::new(store),
        settings(),
    );
    let mut session = SessionContext::new();
    for input in ["one", "two", "three"] {
        engine
            .handle_turn(&mut session, input, &mut ignore_chunk)
            .await;
    }

    let last = provider.last_request().expect("request");
    let contents: Vec<&str> = last
        .messages
        .iter()
        .skip(1)
        .map(|message| message.content.as_str())
        .collect();
    assert_eq!(contents, vec!["two", "ok", "three"]);
}

#[tokio::test]
async fn store_failure_is_reported_not_raised() {
    let provider = Arc::new(FixedCompletion::new("ok :::NOTE:remember this:::"));
    let engine = engine(provider, Arc::new(FailingStore::new("disk full")), settings());
    let mut session = SessionContext::new();

    let outcome = engine
        .handle_turn(&mut session, "hi", &mut ignore_chunk)
        .await;
    assert_eq!(outcome.failed, false);
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].error.contains("disk full"));
}

#[tokio::test]
async fn config_wiring_applies_capture_policy() {
    let mut config = MnemoConfig::default();
    config.model.name = "configured-model".to_string();
    config.model.stream = false;
    config.memory.capture.deny_patterns = vec!["(?i)password".to_string()];
    let store = store();
    let provider = Arc::new(RecordingCompletion::new(vec![
        ":::MEMORIZE:wifi:password hunter2::: :::MEMORIZE:os:linux:::",
    ]));
    let engine =
        ChatEngine::from_config(&config, store.clone(), provider.clone()).expect("engine");
    assert_eq!(engine.settings().model, "configured-model");

    let mut session = SessionContext::new();
    let outcome = engine
        .handle_turn(&mut session, "setup", &mut ignore_chunk)
        .await;
    assert_eq!(
        outcome.applied,
        vec![Directive::Memorize {
            key: "os".to_string(),
            value: "linux".to_string(),
        }]
    );
    let memory = store.list_memory().expect("memory");
    assert_eq!(memory.get("wifi"), None);

    let request = provider.last_request().expect("request");
    assert_eq!(request.model, "configured-model");
    assert_eq!(request.temperature, Some(0.7));
}

#[test]
fn invalid_capture_pattern_fails_engine_setup() {
    let mut config = MnemoConfig::default();
    config.memory.capture.redact_patterns = vec!["(unclosed".to_string()];
    let store = store();
    let result = ChatEngine::from_config(&config, store, Arc::new(FixedCompletion::new("ok")));
    assert!(matches!(result, Err(CoreError::Memory(_))));
}

/// Sessions only keep the turns the context window can still send.
#[tokio::test]
async fn long_session_history_is_capped_at_window() {
    let store = store();
    let provider = Arc::new(RecordingCompletion::new(vec!["ok"]));
    let engine = ChatEngine::new(
        provider.clone(),
        ContextBuilder::new(store.clone()).with_history_window(4),
        DirectiveExtractor::new(store),
        settings(),
    );
    let mut session = SessionContext::new();

    for idx in 0..50 {
        engine
            .handle_turn(&mut session, &format!("turn {idx}"), &mut ignore_chunk)
            .await;
    }
    assert_eq!(session.len(), 4);
    let request = provider.last_request().expect("request");
    assert_eq!(request.messages.len(), 6);
    assert_eq!(request.messages[5].content, "turn 49");
}
