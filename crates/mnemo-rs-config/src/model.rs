//! Configuration schema for Mnemo.

use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root config for Mnemo.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MnemoConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

impl MnemoConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> MnemoConfigBuilder {
        MnemoConfigBuilder::new()
    }
}

/// Builder for assembling a `MnemoConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct MnemoConfigBuilder {
    config: MnemoConfig,
}

impl MnemoConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: MnemoConfig::default(),
        }
    }

    /// Replace the model configuration.
    pub fn model(mut self, model: ModelConfig) -> Self {
        self.config.model = model;
        self
    }

    /// Replace the memory configuration.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    /// Replace the context configuration.
    pub fn context(mut self, context: ContextConfig) -> Self {
        self.config.context = context;
        self
    }

    /// Replace the relay configuration.
    pub fn relay(mut self, relay: RelayConfig) -> Self {
        self.config.relay = relay;
        self
    }

    /// Finalize and return the built `MnemoConfig`.
    pub fn build(self) -> MnemoConfig {
        self.config
    }
}

/// Completion endpoint and sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Environment variable holding the bearer key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            name: default_model_name(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            stream: default_stream(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model_name() -> String {
    "anthropic/claude-3.5-sonnet".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_stream() -> bool {
    true
}

/// Default model call timeout in seconds.
fn default_timeout_secs() -> u64 {
    60
}

/// Memory backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_provider")]
    pub provider: String,
    #[serde(default)]
    pub path: Option<String>,
    /// Most recent notes rendered into the preamble.
    #[serde(default = "default_notes_in_prompt")]
    pub notes_in_prompt: usize,
    #[serde(default)]
    pub capture: MemoryCapturePolicy,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            provider: default_memory_provider(),
            path: None,
            notes_in_prompt: default_notes_in_prompt(),
            capture: MemoryCapturePolicy::default(),
        }
    }
}

impl MemoryConfig {
    /// Resolve the store location, falling back to `~/.mnemo/memory.{db,jsonl}`.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.path {
            return Some(PathBuf::from(path));
        }
        let file_name = match self.provider.as_str() {
            "file" => "memory.jsonl",
            _ => "memory.db",
        };
        UserDirs::new().map(|dirs| dirs.home_dir().join(".mnemo").join(file_name))
    }
}

/// Default memory provider identifier.
fn default_memory_provider() -> String {
    "sqlite".to_string()
}

fn default_notes_in_prompt() -> usize {
    5
}

/// Capture policy applied to directive values before they are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCapturePolicy {
    #[serde(default)]
    pub deny_patterns: Vec<String>,
    #[serde(default)]
    pub redact_patterns: Vec<String>,
    #[serde(default)]
    pub detect_secrets: bool,
    #[serde(default = "default_secret_entropy_threshold")]
    pub secret_entropy_threshold: f32,
    #[serde(default)]
    pub max_value_chars: Option<usize>,
    #[serde(default = "default_redaction_replacement")]
    pub replacement: String,
}

impl Default for MemoryCapturePolicy {
    fn default() -> Self {
        Self {
            deny_patterns: Vec::new(),
            redact_patterns: Vec::new(),
            detect_secrets: false,
            secret_entropy_threshold: default_secret_entropy_threshold(),
            max_value_chars: None,
            replacement: default_redaction_replacement(),
        }
    }
}

/// Default entropy threshold for identifying secrets.
fn default_secret_entropy_threshold() -> f32 {
    3.7
}

/// Default replacement marker for redacted values.
fn default_redaction_replacement() -> String {
    "[REDACTED]".to_string()
}

/// Prompt assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Replaces the built-in persona preamble when set.
    #[serde(default)]
    pub persona: Option<String>,
    /// Prior turns kept in each request.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Remove applied directives from the displayed reply.
    #[serde(default)]
    pub strip_directives: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            persona: None,
            history_window: default_history_window(),
            strip_directives: false,
        }
    }
}

fn default_history_window() -> usize {
    10
}

/// Background relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Bound of the dispatcher queue shared by the REPL and the relay.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Session histories kept before the idlest one is evicted.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_ms: default_poll_interval_ms(),
            queue_capacity: default_queue_capacity(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_queue_capacity() -> usize {
    64
}

fn default_max_sessions() -> usize {
    256
}
