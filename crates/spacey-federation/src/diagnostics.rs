// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Diagnostics emitted during negotiation, and where they go.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

use crate::error::FederationError;
use crate::scope::{BuildId, Registration};
use crate::version::{SemVer, VersionRange};

/// How bad a diagnostic is. Warnings never abort a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    VersionMismatch,
    FallbackUsed,
    SingletonVersionConflict,
    NoSatisfyingVersion,
    MissingSharedModule,
    InvalidVersion,
    InvalidRange,
}

impl DiagnosticCode {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticCode::VersionMismatch | DiagnosticCode::FallbackUsed => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::VersionMismatch => "VersionMismatch",
            DiagnosticCode::FallbackUsed => "FallbackUsed",
            DiagnosticCode::SingletonVersionConflict => "SingletonVersionConflict",
            DiagnosticCode::NoSatisfyingVersion => "NoSatisfyingVersion",
            DiagnosticCode::MissingSharedModule => "MissingSharedModule",
            DiagnosticCode::InvalidVersion => "InvalidVersion",
            DiagnosticCode::InvalidRange => "InvalidRange",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single warning or error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Consuming build, when the diagnostic came from a request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Share key, or the raw input for parse failures
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub got: Option<String>,
    pub message: String,
}

impl Diagnostic {
    fn new(code: DiagnosticCode, subject: impl Into<String>, message: String) -> Self {
        Self {
            code,
            severity: code.severity(),
            build: None,
            scope: None,
            subject: subject.into(),
            required: None,
            got: None,
            message,
        }
    }

    /// The chosen instance does not satisfy the consumer's range.
    pub fn version_mismatch(
        build: &BuildId,
        scope: &str,
        key: &str,
        required: &VersionRange,
        got: &Registration,
    ) -> Self {
        let message = format!(
            "{} requires {}@{}, but {} provided by {} is used",
            build,
            key,
            required,
            got.version_label(),
            got.provenance()
        );
        Self {
            build: Some(build.clone()),
            scope: Some(scope.to_string()),
            required: Some(required.to_string()),
            got: Some(got.version_label()),
            ..Self::new(DiagnosticCode::VersionMismatch, key, message)
        }
    }

    /// The consumer registered and used its own copy.
    pub fn fallback_used(build: &BuildId, scope: &str, key: &str, version: Option<&SemVer>) -> Self {
        let label = version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unversioned".to_string());
        let message = format!("{} uses its own {}@{}", build, key, label);
        Self {
            build: Some(build.clone()),
            scope: Some(scope.to_string()),
            got: Some(label),
            ..Self::new(DiagnosticCode::FallbackUsed, key, message)
        }
    }

    /// Diagnostic for a typed failure, if the failure is one the reporter covers.
    pub fn from_error(build: Option<&BuildId>, err: &FederationError) -> Option<Self> {
        let message = err.to_string();
        let diagnostic = match err {
            FederationError::InvalidVersion { raw, .. } => {
                Self::new(DiagnosticCode::InvalidVersion, raw.as_str(), message)
            }
            FederationError::InvalidRange { raw, .. } => {
                Self::new(DiagnosticCode::InvalidRange, raw.as_str(), message)
            }
            FederationError::NoSatisfyingVersion {
                scope,
                key,
                required,
                ..
            } => Self {
                scope: Some(scope.clone()),
                required: Some(required.clone()),
                ..Self::new(DiagnosticCode::NoSatisfyingVersion, key.as_str(), message)
            },
            FederationError::SingletonVersionConflict {
                scope,
                key,
                required,
                got,
            } => Self {
                scope: Some(scope.clone()),
                required: Some(required.clone()),
                got: Some(got.clone()),
                ..Self::new(DiagnosticCode::SingletonVersionConflict, key.as_str(), message)
            },
            FederationError::MissingSharedModule { scope, key } => Self {
                scope: Some(scope.clone()),
                ..Self::new(DiagnosticCode::MissingSharedModule, key.as_str(), message)
            },
            _ => return None,
        };

        Some(Self {
            build: build.cloned(),
            ..diagnostic
        })
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Sink for diagnostics produced by the resolver.
pub trait Reporter: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, diagnostic: &Diagnostic) {
        log_diagnostic(diagnostic);
    }
}

fn log_diagnostic(diagnostic: &Diagnostic) {
    match diagnostic.code {
        DiagnosticCode::FallbackUsed => info!("{}", diagnostic),
        _ if diagnostic.is_warning() => warn!("{}", diagnostic),
        _ => error!("{}", diagnostic),
    }
}

/// Collects diagnostics in emission order.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Mutex<Vec<Diagnostic>>,
    forward: bool,
}

impl DiagnosticLog {
    /// A log that only collects.
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that also forwards every diagnostic to `tracing`.
    pub fn forwarding() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            forward: true,
        }
    }

    /// Copy of everything collected so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.is_warning())
            .cloned()
            .collect()
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .iter()
            .filter(|d| !d.is_warning())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Reporter for DiagnosticLog {
    fn report(&self, diagnostic: &Diagnostic) {
        if self.forward {
            log_diagnostic(diagnostic);
        }
        self.entries.lock().push(diagnostic.clone());
    }
}
