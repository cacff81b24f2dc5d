//! Conversation data types shared across the crate.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Speaker role for a conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System preamble.
    System,
    /// User-authored turn.
    User,
    /// Assistant-authored turn.
    Assistant,
}

impl Role {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// One message in a conversation, serialized as `{ role, content }` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationTurn, Role};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn role_parses_and_formats() {
        assert_eq!("system".parse::<Role>(), Ok(Role::System));
        assert_eq!("assistant".parse::<Role>(), Ok(Role::Assistant));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("tool".parse::<Role>().is_err());
        assert_eq!(Role::System.as_str(), "system");
    }

    #[test]
    fn turn_serializes_as_wire_message() {
        let value = serde_json::to_value(ConversationTurn::assistant("hi")).expect("json");
        assert_eq!(value, json!({ "role": "assistant", "content": "hi" }));
    }
}
