//! Shape checks applied to each config layer before it is merged.
//!
//! Every section is described by a static field table, so an unknown key or a
//! value of the wrong type is reported with the layer it came from.

use crate::ConfigError;
use regex::Regex;
use serde_json::Value;

/// Expected shape of one setting.
enum Kind {
    Text,
    Flag,
    Count,
    Number,
    /// Text restricted to the listed values.
    OneOf(&'static [&'static str]),
    /// List of regular expressions that must compile.
    Patterns,
    Section(&'static [Field]),
}

type Field = (&'static str, Kind);

const MODEL: &[Field] = &[
    ("base_url", Kind::Text),
    ("name", Kind::Text),
    ("api_key_env", Kind::Text),
    ("temperature", Kind::Number),
    ("stream", Kind::Flag),
    ("timeout_secs", Kind::Count),
];

const CAPTURE: &[Field] = &[
    ("deny_patterns", Kind::Patterns),
    ("redact_patterns", Kind::Patterns),
    ("detect_secrets", Kind::Flag),
    ("secret_entropy_threshold", Kind::Number),
    ("max_value_chars", Kind::Count),
    ("replacement", Kind::Text),
];

const MEMORY: &[Field] = &[
    ("provider", Kind::OneOf(&["sqlite", "file"])),
    ("path", Kind::Text),
    ("notes_in_prompt", Kind::Count),
    ("capture", Kind::Section(CAPTURE)),
];

const CONTEXT: &[Field] = &[
    ("persona", Kind::Text),
    ("history_window", Kind::Count),
    ("strip_directives", Kind::Flag),
];

const RELAY: &[Field] = &[
    ("enabled", Kind::Flag),
    ("poll_interval_ms", Kind::Count),
    ("queue_capacity", Kind::Count),
    ("max_sessions", Kind::Count),
];

const ROOT: &[Field] = &[
    ("$schema", Kind::Text),
    ("model", Kind::Section(MODEL)),
    ("memory", Kind::Section(MEMORY)),
    ("context", Kind::Section(CONTEXT)),
    ("relay", Kind::Section(RELAY)),
];

/// Check one layer's raw value. `origin` names the layer in errors.
pub(super) fn check_layer(value: &Value, origin: &str) -> Result<(), ConfigError> {
    check(value, &Kind::Section(ROOT), origin, "")
}

fn check(value: &Value, kind: &Kind, origin: &str, path: &str) -> Result<(), ConfigError> {
    let shape_ok = match kind {
        Kind::Text => value.is_string(),
        Kind::Flag => value.is_boolean(),
        Kind::Count => value.is_u64(),
        Kind::Number => value.is_number(),
        Kind::OneOf(allowed) => {
            let Some(text) = value.as_str() else {
                return Err(rejected(origin, path, "expected a string"));
            };
            if !allowed.contains(&text) {
                let message = format!("{text:?} is not one of {}", allowed.join(", "));
                return Err(rejected(origin, path, &message));
            }
            true
        }
        Kind::Patterns => return check_patterns(value, origin, path),
        Kind::Section(fields) => return check_section(value, fields, origin, path),
    };
    if shape_ok {
        Ok(())
    } else {
        Err(rejected(origin, path, expected(kind)))
    }
}

fn check_section(
    value: &Value,
    fields: &[Field],
    origin: &str,
    path: &str,
) -> Result<(), ConfigError> {
    let Value::Object(map) = value else {
        return Err(rejected(origin, path, "expected an object"));
    };
    for (key, entry) in map {
        let child = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        let Some((_, kind)) = fields.iter().find(|(name, _)| name == key) else {
            return Err(rejected(origin, &child, "not a recognized setting"));
        };
        check(entry, kind, origin, &child)?;
    }
    Ok(())
}

fn check_patterns(value: &Value, origin: &str, path: &str) -> Result<(), ConfigError> {
    let Value::Array(entries) = value else {
        return Err(rejected(origin, path, "expected a list of patterns"));
    };
    for (idx, entry) in entries.iter().enumerate() {
        let slot = format!("{path}[{idx}]");
        let Some(pattern) = entry.as_str() else {
            return Err(rejected(origin, &slot, "expected a string"));
        };
        if let Err(err) = Regex::new(pattern) {
            return Err(rejected(origin, &slot, &format!("bad pattern: {err}")));
        }
    }
    Ok(())
}

fn expected(kind: &Kind) -> &'static str {
    match kind {
        Kind::Text | Kind::OneOf(_) => "expected a string",
        Kind::Flag => "expected true or false",
        Kind::Count => "expected a non-negative integer",
        Kind::Number => "expected a number",
        Kind::Patterns => "expected a list of patterns",
        Kind::Section(_) => "expected an object",
    }
}

fn rejected(origin: &str, path: &str, message: &str) -> ConfigError {
    let path = if path.is_empty() { "<root>" } else { path };
    ConfigError::InvalidField {
        path: format!("{origin}:{path}"),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::check_layer;
    use crate::ConfigError;
    use serde_json::json;

    fn rejected_path(value: serde_json::Value) -> String {
        match check_layer(&value, "test") {
            Err(ConfigError::InvalidField { path, .. }) => path,
            other => panic!("expected a rejected field, got {other:?}"),
        }
    }

    #[test]
    fn accepts_every_known_section() {
        let layer = json!({
            "$schema": "https://example.invalid/mnemo.json",
            "model": { "name": "m", "temperature": 1, "stream": true },
            "memory": { "provider": "file", "capture": { "deny_patterns": ["(?i)token"] } },
            "context": { "history_window": 2 },
            "relay": { "max_sessions": 8 },
        });
        assert!(check_layer(&layer, "test").is_ok());
    }

    #[test]
    fn nested_errors_name_the_full_path() {
        assert_eq!(
            rejected_path(json!({ "relay": { "queue_capacity": -1 } })),
            "test:relay.queue_capacity"
        );
        assert_eq!(
            rejected_path(json!({ "memory": { "capture": { "surprise": 1 } } })),
            "test:memory.capture.surprise"
        );
        assert_eq!(rejected_path(json!([])), "test:<root>");
    }

    #[test]
    fn uncompilable_pattern_is_rejected_with_its_index() {
        assert_eq!(
            rejected_path(json!({ "memory": { "capture": { "redact_patterns": ["ok", "(["] } } })),
            "test:memory.capture.redact_patterns[1]"
        );
    }
}
