//! Locating the files that make up the config stack.

use super::{ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LayeredConfigOptions};
use directories::UserDirs;
use log::debug;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[cfg(unix)]
const SYSTEM_CONFIG_DIR: &str = "/etc/mnemo";
#[cfg(windows)]
const SYSTEM_CONFIG_DIR: &str = "C:\\ProgramData\\mnemo";

const REQUIREMENTS_FILE: &str = "requirements.json5";

/// Machine-wide settings file.
pub(super) fn system_config() -> Option<PathBuf> {
    Some(Path::new(SYSTEM_CONFIG_DIR).join(DEFAULT_CONFIG_FILE))
}

/// Machine-wide locked settings.
pub(super) fn system_requirements() -> Option<PathBuf> {
    Some(Path::new(SYSTEM_CONFIG_DIR).join(REQUIREMENTS_FILE))
}

/// `~/.mnemo/mnemo.json5`, when a home directory is known.
pub(super) fn user_config() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    Some(
        dirs.home_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
    )
}

/// Resolved path when it exists on disk, else the path unchanged.
pub(super) fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Closest directory at or above `cwd` holding one of `markers`.
pub(super) fn project_root(cwd: &Path, markers: &[String]) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|dir| markers.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

/// Optional layers to try, lowest precedence first, each file listed once.
///
/// Requirements and runtime overrides are handled by the loader itself.
pub(super) fn candidate_layers(
    options: &LayeredConfigOptions,
    cwd: &Path,
) -> Vec<(ConfigLayerSource, PathBuf)> {
    let mut layers = Vec::new();
    if let Some(path) = &options.system_config_path {
        layers.push((ConfigLayerSource::System, path.clone()));
    }
    if let Some(path) = &options.user_config_path {
        layers.push((ConfigLayerSource::User, path.clone()));
    }
    let root = project_root(cwd, &options.project_root_markers);
    if let Some(root) = &root {
        layers.push((ConfigLayerSource::Project, root.join(DEFAULT_CONFIG_FILE)));
    } else {
        debug!("no project root above {}; project and repo layers skipped", cwd.display());
    }
    layers.push((ConfigLayerSource::Cwd, cwd.join(DEFAULT_CONFIG_FILE)));
    if let Some(root) = &root {
        layers.push((
            ConfigLayerSource::Repo,
            root.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE),
        ));
    }

    let mut seen = HashSet::new();
    layers.retain(|(source, path)| {
        let first = seen.insert(canonical_or_self(path));
        if !first {
            debug!(
                "config file already listed (source={}, path={})",
                source.as_str(),
                path.display()
            );
        }
        first
    });
    layers
}
