//! Per-conversation history.

use crate::types::ConversationTurn;

/// Conversation history for one session, oldest turn first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    history: Vec<ConversationTurn>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.history.push(turn);
    }

    /// Append a user turn followed by the assistant turn that answered it.
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.push(ConversationTurn::user(user));
        self.history.push(ConversationTurn::assistant(assistant));
    }

    /// Drop the oldest turns so at most `max_turns` remain.
    pub fn retain_recent(&mut self, max_turns: usize) {
        let excess = self.history.len().saturating_sub(max_turns);
        if excess > 0 {
            self.history.drain(..excess);
        }
    }

    /// Forget every turn. Stored memory and notes are untouched.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::SessionContext;
    use crate::types::{ConversationTurn, Role};
    use pretty_assertions::assert_eq;

    #[test]
    fn exchange_appends_in_order_and_clear_resets() {
        let mut session = SessionContext::new();
        session.record_exchange("hi", "hello");
        session.push(ConversationTurn::user("again"));

        let roles: Vec<Role> = session.history().iter().map(|turn| turn.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(session.len(), 3);

        session.clear();
        assert!(session.is_empty());
    }

    #[test]
    fn retain_recent_keeps_newest_turns() {
        let mut session = SessionContext::new();
        for idx in 0..500 {
            session.record_exchange(format!("q{idx}"), format!("a{idx}"));
            session.retain_recent(10);
        }

        assert_eq!(session.len(), 10);
        assert_eq!(session.history()[9].content, "a499");
        assert_eq!(session.history()[0].content, "q495");

        session.retain_recent(0);
        assert!(session.is_empty());
    }
}
