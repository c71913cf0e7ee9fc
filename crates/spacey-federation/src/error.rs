// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for share negotiation.

use thiserror::Error;

/// Result type for federation operations.
pub type Result<T> = std::result::Result<T, FederationError>;

/// Errors raised while configuring builds or negotiating shared modules.
#[derive(Error, Debug)]
pub enum FederationError {
    /// A version string could not be parsed
    #[error("Invalid version '{raw}': {reason}")]
    InvalidVersion { raw: String, reason: String },

    /// A version range expression could not be parsed
    #[error("Invalid version range '{raw}': {reason}")]
    InvalidRange { raw: String, reason: String },

    /// No registered version satisfies the required range and there is no fallback
    #[error("No satisfying version of shared module '{key}' in scope '{scope}' (required {required}, available: {available})")]
    NoSatisfyingVersion {
        scope: String,
        key: String,
        required: String,
        available: String,
    },

    /// The singleton instance does not satisfy a strict requirement
    #[error("Singleton '{key}' in scope '{scope}' is {got}, which does not satisfy strict requirement {required}")]
    SingletonVersionConflict {
        scope: String,
        key: String,
        required: String,
        got: String,
    },

    /// Nothing is registered under the key and there is nothing to fall back to
    #[error("Shared module '{key}' is not available in scope '{scope}'")]
    MissingSharedModule { scope: String, key: String },

    /// A build asked for a key it never declared as shared
    #[error("Build '{build}' does not share '{key}'")]
    NotShared { build: String, key: String },

    /// A build was referenced that has not been loaded
    #[error("Build not loaded: {0}")]
    UnknownBuild(String),

    /// A build with this name was already loaded
    #[error("Build already loaded: {0}")]
    DuplicateBuild(String),

    /// Invalid shared-module options
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl FederationError {
    /// Whether this failure happened while negotiating a single request.
    ///
    /// Callers may catch these and substitute a local, unshared copy of the
    /// module. Everything else is a configuration or environment problem.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            FederationError::NoSatisfyingVersion { .. }
                | FederationError::SingletonVersionConflict { .. }
                | FederationError::MissingSharedModule { .. }
        )
    }

    /// Whether this error came from malformed version input.
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            FederationError::InvalidVersion { .. } | FederationError::InvalidRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classes() {
        let missing = FederationError::MissingSharedModule {
            scope: "default".into(),
            key: "react".into(),
        };
        assert!(missing.is_resolution_failure());
        assert!(!missing.is_parse_failure());

        let invalid = FederationError::InvalidRange {
            raw: "^^1".into(),
            reason: "unexpected character".into(),
        };
        assert!(invalid.is_parse_failure());
        assert!(!invalid.is_resolution_failure());

        assert!(!FederationError::Config("bad".into()).is_resolution_failure());
    }

    #[test]
    fn test_error_messages() {
        let err = FederationError::SingletonVersionConflict {
            scope: "default".into(),
            key: "vue".into(),
            required: "^2.6.5".into(),
            got: "3.0.0".into(),
        };
        assert_eq!(
            err.to_string(),
            "Singleton 'vue' in scope 'default' is 3.0.0, which does not satisfy strict requirement ^2.6.5"
        );
    }
}
