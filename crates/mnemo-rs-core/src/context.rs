//! Per-turn request context assembly.

use crate::types::ConversationTurn;
use log::{debug, warn};
use mnemo_rs_config::{ContextConfig, MemoryConfig};
use mnemo_rs_memory::{MemoryStore, Note};
use std::collections::BTreeMap;
use std::sync::Arc;

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

const DEFAULT_PERSONA: &str = "You are a helpful assistant with a persistent memory. \
The memory and notes below were saved in earlier conversations; use them when they are relevant.";

const DIRECTIVE_GUIDE: &str = "## Saving to memory\n\n\
To remember a fact for future conversations, write this anywhere in your reply:\n\
:::MEMORIZE:<key>:<value>:::\n\
The key ends at the first colon and must not contain ':'. The value must not contain ':::'. \
Writing an existing key replaces its value.\n\n\
To save a free-form note, write:\n\
:::NOTE:<text>:::\n\
The note text must not contain ':::'.";

/// Builds the message list sent to the model for one user turn.
#[derive(Clone)]
pub struct ContextBuilder {
    store: Arc<dyn MemoryStore>,
    persona: Option<String>,
    history_window: usize,
    notes_in_prompt: usize,
}

impl ContextBuilder {
    /// Builder with the default persona, a 10-turn window, and 5 notes.
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self::from_config(
            store,
            &ContextConfig::default(),
            &MemoryConfig::default(),
        )
    }

    pub fn from_config(
        store: Arc<dyn MemoryStore>,
        context: &ContextConfig,
        memory: &MemoryConfig,
    ) -> Self {
        Self {
            store,
            persona: context.persona.clone(),
            history_window: context.history_window,
            notes_in_prompt: memory.notes_in_prompt,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    pub fn with_notes_in_prompt(mut self, notes_in_prompt: usize) -> Self {
        self.notes_in_prompt = notes_in_prompt;
        self
    }

    /// Prior turns included in each request.
    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Render the system preamble from the store's current state.
    ///
    /// A store read failure is logged and rendered as empty memory so the
    /// turn can proceed without it.
    pub fn build_system_prompt(&self) -> String {
        let memory = self.store.list_memory().unwrap_or_else(|err| {
            warn!("failed to read memory for prompt (err={})", err);
            BTreeMap::new()
        });
        let notes = self
            .store
            .list_notes(Some(self.notes_in_prompt))
            .unwrap_or_else(|err| {
                warn!("failed to read notes for prompt (err={})", err);
                Vec::new()
            });

        let persona = self
            .persona
            .as_deref()
            .map(str::trim)
            .filter(|persona| !persona.is_empty())
            .unwrap_or(DEFAULT_PERSONA);

        let sections = [
            persona.to_string(),
            render_memory_section(&memory),
            render_notes_section(&notes),
            DIRECTIVE_GUIDE.to_string(),
        ];
        sections.join(SECTION_SEPARATOR)
    }

    /// Assemble preamble, the most recent history turns, and the new input.
    pub fn build(&self, history: &[ConversationTurn], user_input: &str) -> Vec<ConversationTurn> {
        let skip = history.len().saturating_sub(self.history_window);
        let mut messages = Vec::with_capacity(history.len() - skip + 2);
        messages.push(ConversationTurn::system(self.build_system_prompt()));
        messages.extend(history[skip..].iter().cloned());
        messages.push(ConversationTurn::user(user_input));
        debug!(
            "built request context (history={}, dropped={}, messages={})",
            history.len(),
            skip,
            messages.len()
        );
        messages
    }
}

fn render_memory_section(memory: &BTreeMap<String, String>) -> String {
    let json = serde_json::to_string_pretty(memory).unwrap_or_else(|_| "{}".to_string());
    format!("## Memory\n\n{json}")
}

fn render_notes_section(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "## Recent notes\n\nNo notes yet.".to_string();
    }
    let bullets = notes
        .iter()
        .map(|note| format!("- {}", note.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("## Recent notes\n\n{bullets}")
}

#[cfg(test)]
mod tests {
    use super::ContextBuilder;
    use crate::types::{ConversationTurn, Role};
    use mnemo_rs_memory::{MemoryStore, SqliteMemoryStore};
    use mnemo_rs_test_utils::FailingStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn prompt_renders_sorted_memory_and_recent_notes() {
        let store = Arc::new(SqliteMemoryStore::open_in_memory().expect("store"));
        store.upsert_memory("zeta", "last").expect("upsert");
        store.upsert_memory("alpha", "first").expect("upsert");
        for idx in 0..7 {
            store.add_note(&format!("note {idx}")).expect("note");
        }

        let prompt = ContextBuilder::new(store).build_system_prompt();
        let alpha = prompt.find("\"alpha\": \"first\"").expect("alpha");
        let zeta = prompt.find("\"zeta\": \"last\"").expect("zeta");
        assert!(alpha < zeta);
        assert!(prompt.contains("- note 6\n- note 5"));
        assert!(prompt.contains("- note 2"));
        assert_eq!(prompt.contains("- note 1"), false);
        assert!(prompt.contains(":::MEMORIZE:<key>:<value>:::"));
        assert!(prompt.contains(":::NOTE:<text>:::"));
    }

    #[test]
    fn prompt_reflects_latest_writes() {
        let store = Arc::new(SqliteMemoryStore::open_in_memory().expect("store"));
        let builder = ContextBuilder::new(store.clone());
        assert!(builder.build_system_prompt().contains("## Memory\n\n{}"));

        store.upsert_memory("lang", "rust").expect("upsert");
        assert!(builder.build_system_prompt().contains("\"lang\": \"rust\""));
    }

    #[test]
    fn custom_persona_replaces_default() {
        let store = Arc::new(SqliteMemoryStore::open_in_memory().expect("store"));
        let prompt = ContextBuilder::new(store)
            .with_persona("You are terse.")
            .build_system_prompt();
        assert!(prompt.starts_with("You are terse.\n\n---\n\n## Memory"));
    }

    #[test]
    fn history_is_truncated_to_window() {
        let store = Arc::new(SqliteMemoryStore::open_in_memory().expect("store"));
        let history: Vec<ConversationTurn> = (1..=11)
            .map(|idx| ConversationTurn::user(format!("turn {idx}")))
            .collect();

        let messages = ContextBuilder::new(store).build(&history, "new");
        assert_eq!(messages.len(), 12);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "turn 2");
        assert_eq!(messages[10].content, "turn 11");
        assert_eq!(messages[11], ConversationTurn::user("new"));
        assert!(messages.iter().all(|message| message.content != "turn 1"));
    }

    #[test]
    fn short_history_is_kept_whole() {
        let store = Arc::new(SqliteMemoryStore::open_in_memory().expect("store"));
        let history = vec![
            ConversationTurn::user("hi"),
            ConversationTurn::assistant("hello"),
        ];
        let messages = ContextBuilder::new(store)
            .with_history_window(3)
            .build(&history, "again");
        let roles: Vec<Role> = messages.iter().map(|message| message.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
    }

    #[test]
    fn store_failure_renders_empty_memory() {
        let builder = ContextBuilder::new(Arc::new(FailingStore::new("locked")));
        let prompt = builder.build_system_prompt();
        assert!(prompt.contains("## Memory\n\n{}"));
        assert!(prompt.contains("No notes yet."));
    }
}
