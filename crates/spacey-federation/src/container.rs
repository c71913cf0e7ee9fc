// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Containers (initialized builds) and the runtime that loads them.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::descriptor::{BuildConfig, FederationOptions, PackageHints, ShareDescriptor};
use crate::diagnostics::{Diagnostic, Reporter, TracingReporter};
use crate::error::{FederationError, Result};
use crate::resolver::{Resolution, Resolver, offer_own_copy};
use crate::scope::{BuildId, DEFAULT_SHARE_SCOPE, FactoryRef, ShareScopeRegistry};

/// What the loading transport should load for a request.
#[derive(Debug, Clone)]
pub enum LoadTarget {
    /// A negotiated shared instance
    Shared(Resolution),
    /// The build's own copy, loaded directly and not shared
    Local(FactoryRef),
}

/// A build that has been loaded into the process.
///
/// Each container remembers what it resolved: once a key is resolved for
/// this consumer the answer does not change, even if better versions are
/// registered later.
pub struct Container {
    config: BuildConfig,
    registry: Arc<ShareScopeRegistry>,
    resolver: Arc<Resolver>,
    resolved: Mutex<BTreeMap<String, Resolution>>,
}

impl Container {
    /// Create a container. Nothing is resolved until [`Container::init`]
    /// or [`Container::consume`].
    pub fn new(
        config: BuildConfig,
        registry: Arc<ShareScopeRegistry>,
        resolver: Arc<Resolver>,
    ) -> Self {
        Self {
            config,
            registry,
            resolver,
            resolved: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn build(&self) -> &BuildId {
        &self.config.build
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Register the build's eager copies, then resolve every eager share,
    /// both in share key order.
    pub fn init(&self) -> Result<Vec<Resolution>> {
        let eager: Vec<&ShareDescriptor> = self.config.eager_shares().collect();
        debug!("Initializing {} ({} eager shares)", self.build(), eager.len());

        for descriptor in &eager {
            offer_own_copy(descriptor, &self.registry);
        }

        eager
            .into_iter()
            .map(|descriptor| self.consume(&descriptor.share_key))
            .collect()
    }

    /// Resolve a shared key for this build.
    pub fn consume(&self, share_key: &str) -> Result<Resolution> {
        let descriptor = self.descriptor(share_key)?;

        let mut resolved = self.resolved.lock();
        if let Some(resolution) = resolved.get(share_key) {
            return Ok(resolution.clone());
        }

        let resolution = self.resolver.resolve(descriptor, &self.registry)?;
        resolved.insert(share_key.to_string(), resolution.clone());
        Ok(resolution)
    }

    /// Resolve a shared key, loading the build's own copy unshared when
    /// negotiation fails and the build ships one.
    pub fn consume_or_local(&self, share_key: &str) -> Result<LoadTarget> {
        match self.consume(share_key) {
            Ok(resolution) => Ok(LoadTarget::Shared(resolution)),
            Err(err) if err.is_resolution_failure() => {
                let descriptor = self.descriptor(share_key)?;
                match &descriptor.fallback {
                    Some(factory) => {
                        warn!(
                            "{} loads its own {} unshared: {}",
                            self.build(),
                            share_key,
                            err
                        );
                        Ok(LoadTarget::Local(factory.clone()))
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Everything this build has resolved so far, by share key.
    pub fn resolved(&self) -> BTreeMap<String, Resolution> {
        self.resolved.lock().clone()
    }

    fn descriptor(&self, share_key: &str) -> Result<&ShareDescriptor> {
        self.config
            .shares
            .get(share_key)
            .ok_or_else(|| FederationError::NotShared {
                build: self.build().to_string(),
                key: share_key.to_string(),
            })
    }
}

/// Owns the registry and every loaded container.
pub struct FederationRuntime {
    registry: Arc<ShareScopeRegistry>,
    reporter: Arc<dyn Reporter>,
    resolver: Arc<Resolver>,
    containers: RwLock<Vec<Arc<Container>>>,
    default_scope: String,
}

impl Default for FederationRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl FederationRuntime {
    /// A runtime with a fresh registry that logs diagnostics via `tracing`.
    pub fn new() -> Self {
        Self::with_reporter(Arc::new(TracingReporter))
    }

    /// A runtime with a fresh registry and a custom diagnostics sink.
    pub fn with_reporter(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            registry: Arc::new(ShareScopeRegistry::new()),
            resolver: Arc::new(Resolver::new(Arc::clone(&reporter))),
            reporter,
            containers: RwLock::new(Vec::new()),
            default_scope: DEFAULT_SHARE_SCOPE.to_string(),
        }
    }

    /// Scope used by builds that do not pick one.
    pub fn with_default_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_scope = scope.into();
        self
    }

    pub fn registry(&self) -> &Arc<ShareScopeRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn default_scope(&self) -> &str {
        &self.default_scope
    }

    /// Normalize a build's options, create its container and resolve its
    /// eager shares before any other build can observe it.
    pub fn load_build(
        &self,
        build: impl Into<BuildId>,
        options: &FederationOptions,
        hints: &PackageHints,
    ) -> Result<Arc<Container>> {
        let build = build.into();
        if self.find(build.as_str()).is_some() {
            return Err(FederationError::DuplicateBuild(build.to_string()));
        }

        let config = options
            .normalize(&build, hints, &self.default_scope)
            .inspect_err(|err| {
                if let Some(diagnostic) = Diagnostic::from_error(Some(&build), err) {
                    self.reporter.report(&diagnostic);
                }
            })?;

        let container = Arc::new(Container::new(
            config,
            Arc::clone(&self.registry),
            Arc::clone(&self.resolver),
        ));
        container.init()?;

        let mut containers = self.containers.write();
        if containers.iter().any(|c| c.build() == &build) {
            return Err(FederationError::DuplicateBuild(build.to_string()));
        }
        containers.push(Arc::clone(&container));

        info!(
            "Loaded {} ({} shared modules)",
            build,
            container.config().shares.len()
        );
        Ok(container)
    }

    /// A loaded container by build name.
    pub fn container(&self, build: &str) -> Result<Arc<Container>> {
        self.find(build)
            .ok_or_else(|| FederationError::UnknownBuild(build.to_string()))
    }

    /// All loaded containers, in load order.
    pub fn containers(&self) -> Vec<Arc<Container>> {
        self.containers.read().clone()
    }

    fn find(&self, build: &str) -> Option<Arc<Container>> {
        self.containers
            .read()
            .iter()
            .find(|c| c.build().as_str() == build)
            .cloned()
    }
}
