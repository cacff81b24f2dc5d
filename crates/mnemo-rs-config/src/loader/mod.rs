//! Layered configuration loader with requirement constraints.
//!
//! Discovers configuration layers (system/user/project/etc), validates each
//! against the schema, merges them under optional constraints, and produces a
//! final `MnemoConfig`.

mod discovery;
mod merge;
mod schema;


use crate::{ConfigError, MnemoConfig};
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "mnemo.json5";
/// Default config directory under user or repo roots.
const DEFAULT_CONFIG_DIR: &str = ".mnemo";
/// Marker files/dirs that identify a project root.
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: MnemoConfig,
    /// Layers that contributed, lowest precedence first.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// Immutable requirements constraints.
    Requirements,
    /// System-wide configuration.
    System,
    /// User-specific configuration.
    User,
    /// Project root configuration.
    Project,
    /// Current working directory configuration.
    Cwd,
    /// Repo-local configuration.
    Repo,
    /// Runtime overrides (highest precedence).
    Runtime,
}

impl ConfigLayerSource {
    /// Short name used in logs and error origins.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requirements => "requirements",
            Self::System => "system",
            Self::User => "user",
            Self::Project => "project",
            Self::Cwd => "cwd",
            Self::Repo => "repo",
            Self::Runtime => "runtime",
        }
    }
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to find project and cwd layers.
    pub cwd: PathBuf,
    /// System config path (defaults to `/etc/mnemo/mnemo.json5` on Unix).
    pub system_config_path: Option<PathBuf>,
    /// User config path (defaults to `~/.mnemo/mnemo.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Requirements path whose values lock settings.
    pub requirements_path: Option<PathBuf>,
    /// Runtime override config paths applied last. Each must exist.
    pub runtime_paths: Vec<PathBuf>,
    /// Marker files/dirs used to detect the project root.
    pub project_root_markers: Vec<String>,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: discovery::system_config(),
            user_config_path: discovery::user_config(),
            requirements_path: discovery::system_requirements(),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }

    /// Add a runtime override config path that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl MnemoConfig {
    /// Load a single config from a path (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config from path: {}", path.display());
        let origin = path.display().to_string();
        let value = parse_json5(&read_file(path)?, &origin)?;
        config_from_value(value, &origin)
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value = parse_json5(contents, "inline")?;
        config_from_value(value, "inline")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        info!(
            "loading layered config with defaults (cwd={})",
            cwd.as_ref().display()
        );
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load a layered config stack using explicit layer locations and overrides.
    ///
    /// Layer precedence (low -> high): requirements (constraints), system, user,
    /// project, cwd, repo, runtime overrides. Any leaf present in the
    /// requirements layer cannot be overridden.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = discovery::canonical_or_self(&options.cwd);
        debug!("resolved cwd for config load: {}", cwd.display());
        let mut layers = Vec::new();
        let mut merge_layers = Vec::new();

        let requirements = match &options.requirements_path {
            Some(path) => LoadedLayer::read_if_present(ConfigLayerSource::Requirements, path)?,
            None => None,
        };
        let requirements_value = requirements.map(|layer| {
            layers.push(layer.meta);
            layer.value
        });

        for (source, path) in discovery::candidate_layers(&options, &cwd) {
            if let Some(layer) = LoadedLayer::read_if_present(source, &path)? {
                layers.push(layer.meta.clone());
                merge_layers.push(layer);
            }
        }
        for path in &options.runtime_paths {
            let layer = LoadedLayer::read(ConfigLayerSource::Runtime, path)?;
            layers.push(layer.meta.clone());
            merge_layers.push(layer);
        }

        let mut merged = Value::Object(serde_json::Map::new());
        if let Some(requirements_value) = &requirements_value {
            merge::merge_json_values(&mut merged, requirements_value);
        }
        for layer in merge_layers {
            merge::merge_json_with_constraints(
                &mut merged,
                &layer.value,
                requirements_value.as_ref(),
            );
        }

        let config = config_from_value(merged, "effective")?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.name.trim().is_empty() {
            return Err(out_of_range("model.name", "must not be empty"));
        }
        if self.model.base_url.trim().is_empty() {
            return Err(out_of_range("model.base_url", "must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(out_of_range("model.temperature", "must be between 0 and 2"));
        }
        if self.model.timeout_secs == 0 {
            return Err(out_of_range("model.timeout_secs", "must be positive"));
        }
        if self.relay.queue_capacity == 0 {
            return Err(out_of_range("relay.queue_capacity", "must be positive"));
        }
        if self.relay.max_sessions == 0 {
            return Err(out_of_range("relay.max_sessions", "must be positive"));
        }
        Ok(())
    }
}

fn out_of_range(path: &str, message: &str) -> ConfigError {
    ConfigError::InvalidField {
        path: path.to_string(),
        message: message.to_string(),
    }
}

/// Internal representation of a loaded config layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

impl LoadedLayer {
    /// Read, parse, and shape-check a layer that must exist.
    fn read(source: ConfigLayerSource, path: &Path) -> Result<Self, ConfigError> {
        debug!(
            "loading config layer (source={}, path={})",
            source.as_str(),
            path.display()
        );
        let origin = format!("{}({})", source.as_str(), path.display());
        let value = parse_json5(&read_file(path)?, &origin)?;
        schema::check_layer(&value, &origin)?;
        Ok(Self {
            meta: ConfigLayer {
                source,
                path: path.to_path_buf(),
            },
            value,
        })
    }

    fn read_if_present(source: ConfigLayerSource, path: &Path) -> Result<Option<Self>, ConfigError> {
        if path.is_file() {
            Self::read(source, path).map(Some)
        } else {
            debug!(
                "config layer absent (source={}, path={})",
                source.as_str(),
                path.display()
            );
            Ok(None)
        }
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_json5(contents: &str, origin: &str) -> Result<Value, ConfigError> {
    json5::from_str(contents).map_err(|source| ConfigError::Syntax {
        origin: origin.to_string(),
        source,
    })
}

fn config_from_value(value: Value, origin: &str) -> Result<MnemoConfig, ConfigError> {
    schema::check_layer(&value, origin)?;
    let config: MnemoConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
