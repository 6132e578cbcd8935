//! Output-cache settings with layered precedence (file, then environment).
//!
//! ```toml
//! enabled = true
//!
//! [defaults]
//! server_seconds = 60
//! client_seconds = 60
//!
//! [operations.items-get]
//! server_seconds = 300
//! include_custom_headers = ["X-Version"]
//! ```
//!
//! Environment variables use the `RTTP_CACHE` prefix with `__` between path
//! segments, e.g. `RTTP_CACHE__DEFAULTS__SERVER_SECONDS=30`.

use std::collections::HashMap;
use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::cache::{CacheOutputOptions, base_key};
use crate::context::Operation;

const ENV_PREFIX: &str = "RTTP_CACHE";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}

impl LoadError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Cache options for every operation of an application.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// When `false`, [`options_for`](Self::options_for) returns nothing and
    /// routes should be registered without a cache layer.
    pub enabled: bool,
    pub defaults: CacheOutputOptions,
    /// Overrides keyed by operation base key (`{type}-{name}`, lowercase).
    pub operations: HashMap<String, CacheOutputOptions>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            defaults: CacheOutputOptions::default(),
            operations: HashMap::new(),
        }
    }
}

impl CacheSettings {
    /// Loads settings from an optional file plus `RTTP_CACHE__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, LoadError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        Self::from_config(builder.build()?)
    }

    pub fn from_config(config: Config) -> Result<Self, LoadError> {
        let raw: CacheSettings = config.try_deserialize()?;
        raw.validated()
    }

    /// Options for `operation`: its override if one exists, the defaults
    /// otherwise. `None` when caching is disabled.
    pub fn options_for(&self, operation: &Operation) -> Option<&CacheOutputOptions> {
        if !self.enabled {
            return None;
        }
        Some(
            self.operations
                .get(&base_key(operation))
                .unwrap_or(&self.defaults),
        )
    }

    fn validated(mut self) -> Result<Self, LoadError> {
        self.operations = self
            .operations
            .into_iter()
            .map(|(key, options)| (key.trim().to_lowercase(), options))
            .collect();

        check_options("defaults", &self.defaults)?;
        for (key, options) in &self.operations {
            if key.is_empty() {
                return Err(LoadError::invalid("operations", "operation key must not be empty"));
            }
            check_options(&format!("operations.{key}"), options)?;
        }
        Ok(self)
    }
}

fn check_options(prefix: &str, options: &CacheOutputOptions) -> Result<(), LoadError> {
    if options.include_custom_headers.iter().any(|h| h.trim().is_empty()) {
        return Err(LoadError::invalid(
            format!("{prefix}.include_custom_headers"),
            "header names must not be empty",
        ));
    }
    if options.key_generator.as_deref().is_some_and(|g| g.trim().is_empty()) {
        return Err(LoadError::invalid(
            format!("{prefix}.key_generator"),
            "generator name must not be empty",
        ));
    }
    Ok(())
}
