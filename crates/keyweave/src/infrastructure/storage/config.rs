//! JSON-based persistence for the remap table.
//!
//! The file keeps the PascalCase layout earlier versions wrote, so existing
//! files load unchanged:
//!
//! ```json
//! {
//!   "Mappings": [
//!     { "SourceKey": 65, "TargetKey": 66 }
//!   ],
//!   "ShowDebugConsole": false
//! }
//! ```
//!
//! Keys are written as integer virtual-key codes.  When reading, a key may
//! also be given by name (`"CapsLock"`) or as a hex string (`"0x14"`).
//!
//! # Missing fields
//!
//! Both fields are optional: an absent `Mappings` is an empty table and an
//! absent `ShowDebugConsole` is `false`.

use std::path::{Path, PathBuf};

use keyweave_core::{RemapTable, VirtualKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::manage_mappings::TablePersister;

/// File name used when no path is configured.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file does not exist.
    #[error("config file {0} not found")]
    NotFound(PathBuf),

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The JSON content could not be parsed.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The config could not be serialized to JSON.
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level mapping file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct MappingConfig {
    #[serde(default)]
    pub mappings: Vec<KeyMappingEntry>,
    /// Raises the default log level to `debug`.
    #[serde(default)]
    pub show_debug_console: bool,
}

/// One `source → target` row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct KeyMappingEntry {
    pub source_key: VirtualKey,
    pub target_key: VirtualKey,
}

impl MappingConfig {
    /// The table used when no usable config file exists: `A → B`.
    pub fn built_in_default() -> Self {
        Self {
            mappings: vec![KeyMappingEntry {
                source_key: VirtualKey::A,
                target_key: VirtualKey::B,
            }],
            show_debug_console: false,
        }
    }

    /// Builds the remap table; for duplicate sources the last row wins.
    pub fn to_table(&self) -> RemapTable {
        self.mappings
            .iter()
            .map(|entry| (entry.source_key, entry.target_key))
            .collect()
    }

    /// Replaces the rows with `table`, in ascending source order.
    pub fn set_table(&mut self, table: &RemapTable) {
        self.mappings = table
            .iter()
            .map(|(source_key, target_key)| KeyMappingEntry {
                source_key,
                target_key,
            })
            .collect();
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads the mapping file at `path`.
///
/// # Errors
///
/// [`ConfigError::NotFound`] when the file does not exist, [`ConfigError::Io`]
/// for other file-system errors, and [`ConfigError::Parse`] for malformed JSON
/// or unknown key names.
pub fn load_config(path: &Path) -> Result<MappingConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the mapping file, falling back to [`MappingConfig::built_in_default`]
/// with a warning when it is missing or unusable.
pub fn load_or_default(path: &Path) -> MappingConfig {
    match load_config(path) {
        Ok(config) => {
            debug!("loaded {} mappings from {}", config.mappings.len(), path.display());
            config
        }
        Err(e) => {
            warn!("{e}; using built-in default mappings");
            MappingConfig::built_in_default()
        }
    }
}

/// Persists `config` to `path` as pretty-printed JSON.
///
/// Creates the parent directory if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &MappingConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// [`TablePersister`] that rewrites the mapping file, keeping its other
/// settings.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `table`, preserving `ShowDebugConsole` from the existing file.
    ///
    /// A missing file is created.  A file that exists but cannot be parsed is
    /// left untouched and reported, rather than overwritten.
    pub fn save_table(&self, table: &RemapTable) -> Result<(), ConfigError> {
        let mut config = match load_config(&self.path) {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => MappingConfig::default(),
            Err(e) => return Err(e),
        };
        config.set_table(table);
        save_config(&self.path, &config)?;
        debug!("saved {} mappings to {}", table.len(), self.path.display());
        Ok(())
    }
}

impl TablePersister for JsonConfigStore {
    fn persist(&self, table: &RemapTable) -> Result<(), String> {
        self.save_table(table).map_err(|e| e.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
