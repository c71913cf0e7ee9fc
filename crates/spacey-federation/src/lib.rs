// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-federation
//!
//! Shared-scope negotiation for module federation.
//!
//! Independently built JavaScript bundles ("builds") declare which
//! dependencies they are willing to share. At runtime each build registers
//! the copies it ships into a named share scope, and every consumer asks the
//! scope for a compatible instance. This crate implements that negotiation:
//!
//! - npm-style version and range parsing on top of `semver`
//! - a process-wide, concurrent share-scope registry
//! - the resolver (highest satisfying version, singletons, strict and
//!   loose version checks, local fallbacks)
//! - option normalization from federation plugin configs
//! - diagnostics, containers and a manifest runner
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_federation::{FederationOptions, FederationRuntime, PackageHints};
//!
//! let runtime = FederationRuntime::new();
//! let options: FederationOptions = serde_json::from_str(
//!     r#"{ "shared": { "react": { "singleton": true, "version": "18.2.0" } } }"#,
//! )?;
//! let shell = runtime.load_build("shell", &options, &PackageHints::default())?;
//! let resolution = shell.consume("react")?;
//! println!("react {} from {}", resolution.chosen.version_label(), resolution.chosen.provenance());
//! ```

#![warn(clippy::all)]

pub mod container;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod manifest;
pub mod resolver;
pub mod scope;
pub mod version;

// Re-exports
pub use container::{Container, FederationRuntime, LoadTarget};
pub use descriptor::{
    BuildConfig, FederationOptions, PackageHints, Setting, ShareDescriptor, SharedConfig,
    SharedItem, SharedOptions,
};
pub use diagnostics::{
    Diagnostic, DiagnosticCode, DiagnosticLog, Reporter, Severity, TracingReporter,
};
pub use error::{FederationError, Result};
pub use manifest::{Manifest, ManifestFormat, Outcome, RunReport};
pub use resolver::{Resolution, Resolver};
pub use scope::{
    BuildId, DEFAULT_SHARE_SCOPE, FactoryRef, Registration, RegistrySnapshot, ShareOffer,
    ShareScopeRegistry,
};
pub use version::{SemVer, VersionRange};

/// Version of the spacey-federation crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
