// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Handlers declared as TOML recipes.
//!
//! ```toml
//! name = "camera_icp"
//!
//! [[region]]
//! name = "PERIPHERALS_1"
//! base = 0x40000000
//! size = 0x10000
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::handler::{Handler, RegionDecl};

/// Errors raised while loading handler recipes.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Reading a recipe directory or file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A recipe is not valid TOML for the recipe schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// A recipe parsed but is semantically wrong.
    #[error("invalid recipe {path}: {reason}")]
    InvalidRecipe {
        /// Offending path.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },
    /// Two recipes declare the same handler name.
    #[error("handler {0} declared twice")]
    DuplicateHandler(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecipe {
    name: Option<String>,
    #[serde(default, rename = "region")]
    regions: Vec<RegionDecl>,
}

/// Handler whose region list comes from a recipe file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeHandler {
    name: String,
    regions: Vec<RegionDecl>,
}

impl RecipeHandler {
    /// Parses a single recipe; `path` is only used for error reporting.
    pub fn from_toml(path: &Path, raw: &str) -> Result<Self, CatalogError> {
        let recipe: RawRecipe = toml::from_str(raw).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let invalid =
            |reason: String| CatalogError::InvalidRecipe { path: path.to_path_buf(), reason };

        let name = recipe.name.ok_or_else(|| invalid("missing name".into()))?;
        let mut seen = HashSet::new();
        for region in &recipe.regions {
            if region.size == 0 {
                return Err(invalid(format!("region {} has zero size", region.name)));
            }
            if region.base.checked_add(region.size).is_none() {
                return Err(invalid(format!("region {} overflows the address space", region.name)));
            }
            if !seen.insert(region.name.as_str()) {
                return Err(invalid(format!("region {} declared twice", region.name)));
            }
        }
        Ok(Self { name, regions: recipe.regions })
    }
}

impl Handler for RecipeHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn regions(&self) -> &[RegionDecl] {
        &self.regions
    }
}

/// All recipes found in a directory, keyed by handler name.
#[derive(Debug, Default)]
pub struct HandlerCatalog {
    handlers: BTreeMap<String, RecipeHandler>,
}

impl HandlerCatalog {
    /// Loads every `*.toml` file in `dir`. A missing directory yields an empty catalog.
    pub fn load(dir: &Path) -> Result<Self, CatalogError> {
        let mut handlers = BTreeMap::new();
        if !dir.is_dir() {
            return Ok(Self { handlers });
        }
        for entry in fs::read_dir(dir).map_err(io_error(dir))? {
            let file_path = entry.map_err(io_error(dir))?.path();
            if file_path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
                continue;
            }
            let raw = fs::read_to_string(&file_path).map_err(io_error(&file_path))?;
            let handler = RecipeHandler::from_toml(&file_path, &raw)?;
            let name = handler.name.clone();
            if handlers.insert(name.clone(), handler).is_some() {
                return Err(CatalogError::DuplicateHandler(name));
            }
        }
        Ok(Self { handlers })
    }

    /// Handler names in bootstrap order (sorted).
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Returns the recipe for `name`.
    pub fn get(&self, name: &str) -> Option<&RecipeHandler> {
        self.handlers.get(name)
    }

    /// Number of recipes.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no recipe was found.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Consumes the catalog, yielding handlers in bootstrap order.
    pub fn into_handlers(self) -> impl Iterator<Item = RecipeHandler> {
        self.handlers.into_values()
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CatalogError {
    let path = path.to_path_buf();
    move |source| CatalogError::Io { path, source }
}
