// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use surgeon_regions::MapperConfig;
use thiserror::Error;

/// Errors raised while reading the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid for the configuration schema.
    #[error("failed to parse runtime config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Host runtime configuration.
///
/// ```toml
/// handlers = "recipes/handlers"
///
/// [mapper]
/// max_mappings = 64
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Region mapper limits.
    pub mapper: MapperConfig,
    /// Directory holding handler recipes, if any.
    pub handlers: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Parses a configuration document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }
}
