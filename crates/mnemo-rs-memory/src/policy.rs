//! Capture policy for values written by reply directives.

use crate::error::MemoryError;
use regex::{Captures, Regex};
use std::collections::HashMap;

/// Runs of key-like characters long enough to be credentials.
const SECRET_TOKEN: &str = r"[A-Za-z0-9+/=_\-]{20,}";

/// Decides what a directive may write to memory.
///
/// Patterns are compiled when the policy is built, so a bad pattern fails
/// construction instead of every later directive.
#[derive(Debug, Clone)]
pub struct CapturePolicy {
    deny: Vec<Regex>,
    redact: Vec<Regex>,
    secrets: Option<SecretScanner>,
    max_value_chars: Option<usize>,
    replacement: String,
}

impl Default for CapturePolicy {
    /// Permissive policy: values are stored as written.
    fn default() -> Self {
        Self {
            deny: Vec::new(),
            redact: Vec::new(),
            secrets: None,
            max_value_chars: None,
            replacement: "[REDACTED]".to_string(),
        }
    }
}

impl CapturePolicy {
    /// Refuse values matching any of `patterns`.
    pub fn deny<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, MemoryError> {
        self.deny.extend(compile_all(patterns)?);
        Ok(self)
    }

    /// Replace every match of `patterns` with the replacement marker.
    pub fn redact<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, MemoryError> {
        self.redact.extend(compile_all(patterns)?);
        Ok(self)
    }

    /// Replace long tokens carrying at least `threshold` bits per character.
    pub fn detect_secrets(mut self, threshold: f32) -> Result<Self, MemoryError> {
        self.secrets = Some(SecretScanner {
            token: compile(SECRET_TOKEN)?,
            threshold,
        });
        Ok(self)
    }

    pub fn max_value_chars(mut self, max_value_chars: Option<usize>) -> Self {
        self.max_value_chars = max_value_chars;
        self
    }

    pub fn replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = replacement.into();
        self
    }

    /// Filter one value. `None` means it must not be stored.
    pub fn apply(&self, value: &str) -> Option<String> {
        if self.deny.iter().any(|pattern| pattern.is_match(value)) {
            return None;
        }
        let mut value = value.to_string();
        for pattern in &self.redact {
            value = pattern
                .replace_all(&value, self.replacement.as_str())
                .into_owned();
        }
        if let Some(secrets) = &self.secrets {
            value = secrets.scrub(&value, &self.replacement);
        }
        if let Some(max) = self.max_value_chars
            && let Some((cut, _)) = value.char_indices().nth(max)
        {
            value.truncate(cut);
        }
        Some(value)
    }
}

#[derive(Debug, Clone)]
struct SecretScanner {
    token: Regex,
    threshold: f32,
}

impl SecretScanner {
    fn scrub(&self, value: &str, replacement: &str) -> String {
        self.token
            .replace_all(value, |caps: &Captures<'_>| {
                let token = &caps[0];
                if bits_per_char(token) >= self.threshold {
                    replacement.to_string()
                } else {
                    token.to_string()
                }
            })
            .into_owned()
    }
}

/// Shannon entropy of the token's character distribution.
fn bits_per_char(token: &str) -> f32 {
    let mut frequencies: HashMap<char, u32> = HashMap::new();
    let mut total = 0u32;
    for ch in token.chars() {
        *frequencies.entry(ch).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    frequencies
        .values()
        .map(|count| {
            let share = *count as f32 / total as f32;
            -share * share.log2()
        })
        .sum()
}

fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>, MemoryError> {
    patterns
        .iter()
        .map(|pattern| compile(pattern.as_ref()))
        .collect()
}

fn compile(pattern: &str) -> Result<Regex, MemoryError> {
    Regex::new(pattern).map_err(|err| MemoryError::Regex(format!("{pattern}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{CapturePolicy, bits_per_char};
    use crate::error::MemoryError;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_policy_keeps_value() {
        let value = CapturePolicy::default().apply("sk-live-0123456789abcdefABCDEF");
        assert_eq!(value, Some("sk-live-0123456789abcdefABCDEF".to_string()));
    }

    #[test]
    fn deny_pattern_skips_value() {
        let policy = CapturePolicy::default()
            .deny(&["(?i)password"])
            .expect("policy");
        assert_eq!(policy.apply("my Password is hunter2"), None);
        assert_eq!(policy.apply("likes tea"), Some("likes tea".to_string()));
    }

    #[test]
    fn redacts_then_truncates_by_chars() {
        let policy = CapturePolicy::default()
            .redact(&["token"])
            .expect("policy")
            .replacement("REDACTED")
            .max_value_chars(Some(5));
        assert_eq!(policy.apply("token-1234"), Some("REDAC".to_string()));

        let short = CapturePolicy::default().max_value_chars(Some(2));
        assert_eq!(short.apply("ăîșțâ"), Some("ăî".to_string()));
        assert_eq!(short.apply("ok"), Some("ok".to_string()));
    }

    #[test]
    fn invalid_pattern_fails_construction() {
        match CapturePolicy::default().deny(&["("]) {
            Err(MemoryError::Regex(message)) => assert!(message.starts_with("(:")),
            other => panic!("expected regex error, got {other:?}"),
        }
    }

    #[test]
    fn secret_scanner_replaces_random_tokens_only() {
        let policy = CapturePolicy::default()
            .detect_secrets(3.7)
            .expect("policy")
            .replacement("[X]");
        assert_eq!(
            policy.apply("key Zq8vLm2Rt5Xw9Kp3Hd7Nf4Bc6"),
            Some("key [X]".to_string())
        );
        assert_eq!(
            policy.apply("aaaaaaaaaaaaaaaaaaaaaaaa"),
            Some("aaaaaaaaaaaaaaaaaaaaaaaa".to_string())
        );
    }

    #[test]
    fn entropy_of_uniform_alphabet() {
        assert_eq!(bits_per_char(""), 0.0);
        assert_eq!(bits_per_char("aaaa"), 0.0);
        assert_eq!(bits_per_char("abcd"), 2.0);
    }
}
