//! Reply directive scanning and application.
//!
//! A reply may carry two kinds of sentinel-delimited directives:
//!
//! - `:::MEMORIZE:<key>:<value>:::` upserts a memory entry. The key ends at the
//!   first `:` after the opener and the value ends at the first `:::` after
//!   that separator, so a value can never contain `:::`.
//! - `:::NOTE:<text>:::` appends a note. The text ends at the first `:::`.
//!
//! Each kind is found by its own left-to-right, non-overlapping scan. Matches
//! are applied in order of their start offset. Malformed directives (no
//! closer, no separator, empty key or text after trimming) are ignored.

use log::{debug, info, warn};
use mnemo_rs_memory::{CapturePolicy, MemoryStore};
use serde::Serialize;
use std::ops::Range;
use std::sync::Arc;

const MEMORIZE_OPEN: &str = ":::MEMORIZE:";
const NOTE_OPEN: &str = ":::NOTE:";
const CLOSE: &str = ":::";

/// Storage side effect requested by a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    Memorize { key: String, value: String },
    Note { text: String },
}

/// Directive located in a reply, with its byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveMatch {
    pub directive: Directive,
    pub span: Range<usize>,
}

/// Directive that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveFailure {
    pub directive: Directive,
    pub error: String,
}

/// Outcome of extracting directives from one reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Directives written to the store, as stored.
    pub applied: Vec<Directive>,
    /// Directives dropped by the capture policy.
    pub denied: Vec<Directive>,
    /// Directives whose store write failed.
    pub failures: Vec<DirectiveFailure>,
    /// Byte spans of every well-formed directive, in start order.
    pub spans: Vec<Range<usize>>,
}

impl ExtractionReport {
    /// True when the reply contained no well-formed directive.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Find every well-formed directive in `reply`, ordered by start offset.
pub fn scan_directives(reply: &str) -> Vec<DirectiveMatch> {
    let mut matches = scan_memorize(reply);
    matches.extend(scan_notes(reply));
    matches.sort_by_key(|found| found.span.start);
    matches
}

fn scan_memorize(reply: &str) -> Vec<DirectiveMatch> {
    let mut matches = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = reply[cursor..].find(MEMORIZE_OPEN) {
        let start = cursor + offset;
        let key_start = start + MEMORIZE_OPEN.len();
        let Some(sep) = reply[key_start..].find(':').map(|idx| key_start + idx) else {
            break;
        };
        let value_start = sep + 1;
        let Some(close) = reply[value_start..]
            .find(CLOSE)
            .map(|idx| value_start + idx)
        else {
            break;
        };
        let end = close + CLOSE.len();
        cursor = end;

        let key = reply[key_start..sep].trim();
        if key.is_empty() {
            debug!("ignoring memorize directive with empty key (offset={})", start);
            continue;
        }
        matches.push(DirectiveMatch {
            directive: Directive::Memorize {
                key: key.to_string(),
                value: reply[value_start..close].trim().to_string(),
            },
            span: start..end,
        });
    }
    matches
}

fn scan_notes(reply: &str) -> Vec<DirectiveMatch> {
    let mut matches = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = reply[cursor..].find(NOTE_OPEN) {
        let start = cursor + offset;
        let text_start = start + NOTE_OPEN.len();
        let Some(close) = reply[text_start..].find(CLOSE).map(|idx| text_start + idx) else {
            break;
        };
        let end = close + CLOSE.len();
        cursor = end;

        let text = reply[text_start..close].trim();
        if text.is_empty() {
            debug!("ignoring empty note directive (offset={})", start);
            continue;
        }
        matches.push(DirectiveMatch {
            directive: Directive::Note {
                text: text.to_string(),
            },
            span: start..end,
        });
    }
    matches
}

/// Remove the given spans from `reply`. Spans may overlap.
pub fn strip_spans(reply: &str, spans: &[Range<usize>]) -> String {
    let mut sorted = spans.to_vec();
    sorted.sort_by_key(|span| span.start);
    let mut out = String::with_capacity(reply.len());
    let mut cursor = 0;
    for span in sorted {
        if span.start > cursor {
            out.push_str(&reply[cursor..span.start]);
        }
        cursor = cursor.max(span.end);
    }
    if cursor < reply.len() {
        out.push_str(&reply[cursor..]);
    }
    out
}

/// Applies reply directives to a memory store.
#[derive(Clone)]
pub struct DirectiveExtractor {
    store: Arc<dyn MemoryStore>,
    policy: CapturePolicy,
}

impl DirectiveExtractor {
    /// Create an extractor with the permissive default capture policy.
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self::with_policy(store, CapturePolicy::default())
    }

    pub fn with_policy(store: Arc<dyn MemoryStore>, policy: CapturePolicy) -> Self {
        Self { store, policy }
    }

    /// Scan `reply` and apply every directive found. Never fails; storage
    /// errors are recorded in the report.
    pub fn extract(&self, reply: &str) -> ExtractionReport {
        let mut report = ExtractionReport::default();
        for found in scan_directives(reply) {
            report.spans.push(found.span.clone());
            match self.apply(&found.directive) {
                Ok(Some(stored)) => report.applied.push(stored),
                Ok(None) => {
                    info!(
                        "directive denied by capture policy (offset={})",
                        found.span.start
                    );
                    report.denied.push(found.directive);
                }
                Err(error) => {
                    warn!(
                        "failed to apply directive (offset={}, err={})",
                        found.span.start, error
                    );
                    report.failures.push(DirectiveFailure {
                        directive: found.directive,
                        error,
                    });
                }
            }
        }
        if !report.is_empty() {
            debug!(
                "extracted directives (applied={}, denied={}, failed={})",
                report.applied.len(),
                report.denied.len(),
                report.failures.len()
            );
        }
        report
    }

    fn apply(&self, directive: &Directive) -> Result<Option<Directive>, String> {
        match directive {
            Directive::Memorize { key, value } => {
                let Some(value) = self.policy.apply(value) else {
                    return Ok(None);
                };
                self.store
                    .upsert_memory(key, &value)
                    .map_err(|err| err.to_string())?;
                Ok(Some(Directive::Memorize {
                    key: key.clone(),
                    value,
                }))
            }
            Directive::Note { text } => {
                let Some(text) = self.policy.apply(text) else {
                    return Ok(None);
                };
                self.store.add_note(&text).map_err(|err| err.to_string())?;
                Ok(Some(Directive::Note { text }))
            }
        }
    }
}
