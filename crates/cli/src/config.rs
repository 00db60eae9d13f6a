//! Configuration file format for `orderflow`.
//!
//! Every section is optional; a missing file means all defaults.
//!
//! # Example
//!
//! ```toml
//! [engine]
//! override_note_prefix = "[ADMIN OVERRIDE]"
//!
//! [logging]
//! filter = "info"
//! format = "json"
//!
//! # Replaces the standard transition table when present.
//! [[transitions]]
//! from = "PLACED"
//! to = "CONFIRMED"
//! role = "restaurant"
//!
//! [[transitions]]
//! from = "CONFIRMED"
//! to = "PICKED_UP"
//! role = "driver"
//! assignment = "claim"
//! ```

use std::path::{Path, PathBuf};

use orderflow_core::{Stage, TableError, Transition, TransitionTable};
use orderflow_engine::{EngineOptions, DEFAULT_OVERRIDE_PREFIX};
use serde::Deserialize;

/// File read when `--config` is not given. Absent means defaults.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "orderflow.toml";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("could not read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid transition table: {0}")]
    Table(#[from] TableError),
}

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Custom transition list. Empty means the standard table.
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EngineSection {
    #[serde(default = "default_override_prefix")]
    pub override_note_prefix: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        EngineSection {
            override_note_prefix: default_override_prefix(),
        }
    }
}

fn default_override_prefix() -> String {
    DEFAULT_OVERRIDE_PREFIX.to_string()
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LoggingSection {
    /// `EnvFilter` directive string, e.g. `info` or `orderflow_engine=debug`.
    pub filter: Option<String>,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Config {
    /// The configured transition table, validated.
    pub fn transition_table(&self) -> Result<TransitionTable, ConfigError> {
        if self.transitions.is_empty() {
            return Ok(TransitionTable::standard());
        }
        Ok(TransitionTable::new(Stage::ALL, self.transitions.iter().copied())?)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            override_note_prefix: self.engine.override_note_prefix.clone(),
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Load the configuration.
///
/// An explicit `path` must exist. Without one, `orderflow.toml` in the
/// working directory is used if present and defaults otherwise.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => read_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                read_config(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}
