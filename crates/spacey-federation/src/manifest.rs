// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Federation manifests: a set of builds in load order plus the requests to
//! replay against them, and the report produced by running one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::container::{FederationRuntime, LoadTarget};
use crate::descriptor::{FederationOptions, PackageHints, Setting, SharedOptions};
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticLog};
use crate::error::{FederationError, Result};
use crate::scope::{BuildId, RegistrySnapshot};

/// File format of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Toml,
    Json,
}

impl ManifestFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(ManifestFormat::Toml),
            Some("json") => Ok(ManifestFormat::Json),
            other => Err(FederationError::Config(format!(
                "Unsupported manifest extension {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }
}

/// One build, as listed in a manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    pub name: String,
    #[serde(default)]
    pub share_scope: Option<String>,
    #[serde(default)]
    pub runtime: Option<Setting>,
    #[serde(default)]
    pub shared: SharedOptions,
    /// Installed package versions
    #[serde(default)]
    pub packages: BTreeMap<String, String>,
    /// Declared dependency ranges
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl BuildManifest {
    pub fn options(&self) -> FederationOptions {
        FederationOptions {
            name: Some(self.name.clone()),
            share_scope: self.share_scope.clone(),
            runtime: self.runtime.clone(),
            shared: self.shared.clone(),
        }
    }

    pub fn hints(&self) -> PackageHints {
        PackageHints {
            packages: self.packages.clone(),
            dependencies: self.dependencies.clone(),
        }
    }
}

/// A request a build makes for a shared key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub build: String,
    pub share_key: String,
    /// Load the build's own copy when negotiation fails
    #[serde(default)]
    pub allow_local: bool,
}

/// Builds in load order and the requests to run against them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub builds: Vec<BuildManifest>,
    #[serde(default)]
    pub requests: Vec<ShareRequest>,
}

impl Manifest {
    /// Parse manifest text.
    pub fn parse(content: &str, format: ManifestFormat) -> Result<Self> {
        let manifest = match format {
            ManifestFormat::Toml => toml::from_str(content)?,
            ManifestFormat::Json => serde_json::from_str(content)?,
        };
        Ok(manifest)
    }

    /// Read and parse a manifest file; the format follows the extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ManifestFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Load every build, replay every request and report what happened.
    ///
    /// Configuration errors abort the run. A failed request is recorded in
    /// the report and the run continues.
    pub fn run(&self, default_scope: &str) -> Result<RunReport> {
        let log = Arc::new(DiagnosticLog::forwarding());
        let runtime =
            FederationRuntime::with_reporter(log.clone()).with_default_scope(default_scope);

        let mut builds = Vec::with_capacity(self.builds.len());
        for build in &self.builds {
            let container = runtime.load_build(build.name.as_str(), &build.options(), &build.hints())?;
            let config = container.config();
            builds.push(BuildSummary {
                name: build.name.clone(),
                runtime: config.runtime.clone(),
                shares: config.shares.len(),
                eager: config.eager_shares().count(),
            });
        }

        let mut outcomes = Vec::with_capacity(self.requests.len());
        for request in &self.requests {
            let container = runtime.container(&request.build)?;
            let result = if request.allow_local {
                container.consume_or_local(&request.share_key)
            } else {
                container.consume(&request.share_key).map(LoadTarget::Shared)
            };

            let outcome = match result {
                Ok(LoadTarget::Shared(resolution)) => Outcome::Resolved {
                    version: resolution.chosen.version.as_ref().map(|v| v.to_string()),
                    provider: resolution.chosen.provenance().clone(),
                    request: resolution.chosen.factory.request.clone(),
                    satisfied: resolution.satisfied_required_version,
                    used_fallback: resolution.used_fallback,
                },
                Ok(LoadTarget::Local(factory)) => Outcome::Local {
                    request: factory.request,
                },
                Err(err) if err.is_resolution_failure() => Outcome::Failed {
                    code: Diagnostic::from_error(None, &err).map(|d| d.code),
                    error: err.to_string(),
                },
                Err(err) => return Err(err),
            };

            outcomes.push(RequestOutcome {
                build: request.build.clone(),
                share_key: request.share_key.clone(),
                outcome,
            });
        }

        let report = RunReport {
            builds,
            outcomes,
            diagnostics: log.entries(),
            registry: runtime.registry().snapshot(),
        };
        info!(
            "Ran {} requests: {} failed, {} warnings",
            report.outcomes.len(),
            report.failures(),
            report.warning_count()
        );
        Ok(report)
    }
}

/// Per-build summary in a run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSummary {
    pub name: String,
    pub runtime: Option<String>,
    pub shares: usize,
    pub eager: usize,
}

/// How a single request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Outcome {
    #[serde(rename_all = "camelCase")]
    Resolved {
        version: Option<String>,
        provider: BuildId,
        request: String,
        satisfied: bool,
        used_fallback: bool,
    },
    /// Negotiation failed and the build's own copy is loaded unshared
    Local { request: String },
    Failed {
        code: Option<DiagnosticCode>,
        error: String,
    },
}

/// A request and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOutcome {
    pub build: String,
    pub share_key: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Everything a manifest run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub builds: Vec<BuildSummary>,
    pub outcomes: Vec<RequestOutcome>,
    pub diagnostics: Vec<Diagnostic>,
    pub registry: RegistrySnapshot,
}

impl RunReport {
    /// Number of requests that failed outright.
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Failed { .. }))
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_warning()).count()
    }

    pub fn has_warnings(&self) -> bool {
        self.warning_count() > 0
    }
}
