//! Configuration loading and discovery for `sheetsmith.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::SheetConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file searched for on disk
pub const CONFIG_FILENAME: &str = "sheetsmith.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse sheetsmith.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override storage root
    pub root: Option<PathBuf>,
    /// Override log level
    pub log_level: Option<String>,
    /// Force normalization of imported images
    pub normalize: Option<bool>,
}

/// Find sheetsmith.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for sheetsmith.toml
/// 2. Check XDG_CONFIG_HOME/sheetsmith/sheetsmith.toml (or ~/.config/...)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find sheetsmith.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("sheetsmith").join(CONFIG_FILENAME);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find sheetsmith.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a sheetsmith.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the default
/// configuration.
///
/// A relative `storage.root` is resolved against the directory holding the
/// config file it came from.
pub fn load_config(path: Option<&Path>) -> Result<SheetConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(SheetConfig::default()),
    }
}

fn load_config_file(path: &Path) -> Result<SheetConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let mut config: SheetConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    if let Some(root) = project_root(path) {
        config.storage.root = resolve_path(root, &config.storage.root);
    }

    Ok(config)
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut SheetConfig, overrides: &CliOverrides) {
    if let Some(ref root) = overrides.root {
        config.storage.root = root.clone();
    }

    if let Some(ref level) = overrides.log_level {
        config.logging.level = level.clone();
    }

    if let Some(normalize) = overrides.normalize {
        config.import_config.normalize = normalize;
    }
}

/// Get the directory holding a config file.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the config directory.
///
/// If the path is absolute, returns it unchanged.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
