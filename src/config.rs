// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Settings for spacey-mf.
//!
//! Layered, later layers winning: built-in defaults, the user file
//! `<config_dir>/spacey/federation.toml`, `SPACEY_MF_*` environment
//! variables, then command-line flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use spacey_federation::{DEFAULT_SHARE_SCOPE, FederationError, Result};

use crate::cli::Cli;

const ENV_PREFIX: &str = "SPACEY_MF_";

/// How reports are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Scope for builds and statements that do not pick one
    pub share_scope: String,

    pub format: OutputFormat,

    /// Exit non-zero when any warning was emitted
    pub deny_warnings: bool,

    /// REPL history entries kept
    pub history_size: usize,

    /// Default log filter when `RUST_LOG` is unset
    pub loglevel: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            share_scope: DEFAULT_SHARE_SCOPE.to_string(),
            format: OutputFormat::Text,
            deny_warnings: false,
            history_size: 1000,
            loglevel: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the user file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(user_config_path().as_deref(), std::env::vars())
    }

    /// Load settings from an optional file and a set of environment variables.
    pub fn load_from(
        path: Option<&Path>,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let mut settings = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            _ => Settings::default(),
        };

        for (key, value) in vars {
            if let Some(key) = key.strip_prefix(ENV_PREFIX) {
                let key = key.to_lowercase().replace('_', "-");
                settings.set(&key, &value)?;
            }
        }

        Ok(settings)
    }

    /// Set a value by its kebab-case key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "share-scope" => self.share_scope = value.to_string(),
            "format" => {
                self.format = match value {
                    "text" => OutputFormat::Text,
                    "json" => OutputFormat::Json,
                    _ => return Err(invalid(key, value)),
                }
            }
            "deny-warnings" => self.deny_warnings = parse_bool(value).ok_or_else(|| invalid(key, value))?,
            "history-size" => self.history_size = value.parse().map_err(|_| invalid(key, value))?,
            "loglevel" => self.loglevel = value.to_string(),
            _ => {
                return Err(FederationError::Config(format!(
                    "Unknown setting '{}'",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Apply command-line flags on top.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(scope) = &cli.share_scope {
            self.share_scope = scope.clone();
        }
        if cli.json {
            self.format = OutputFormat::Json;
        }
        if cli.deny_warnings {
            self.deny_warnings = true;
        }
        if cli.verbose {
            self.loglevel = "debug".to_string();
        } else if cli.quiet {
            self.loglevel = "error".to_string();
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn invalid(key: &str, value: &str) -> FederationError {
    FederationError::Config(format!("Invalid value '{}' for setting '{}'", value, key))
}

/// `<config_dir>/spacey/federation.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("spacey").join("federation.toml"))
}
