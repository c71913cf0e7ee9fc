// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! A registry and diagnostics log that statements run against.

use std::sync::Arc;

use spacey_federation::descriptor::infer_package_name;
use spacey_federation::scope::Registered;
use spacey_federation::{
    BuildId, Diagnostic, DiagnosticLog, FactoryRef, RegistrySnapshot, Resolution, Resolver,
    Result, ShareDescriptor, ShareOffer, ShareScopeRegistry,
};

use crate::statement::{Provide, Resolve, Statement};

/// What a statement produced.
#[derive(Debug)]
pub enum Reply {
    Provided { scope: String, key: String, registered: Registered },
    Resolved { scope: String, key: String, resolution: Resolution },
    Shown { scope: Option<String>, snapshot: RegistrySnapshot },
}

pub struct Session {
    registry: Arc<ShareScopeRegistry>,
    log: Arc<DiagnosticLog>,
    resolver: Resolver,
    default_scope: String,
}

impl Session {
    pub fn new(default_scope: impl Into<String>) -> Self {
        let log = Arc::new(DiagnosticLog::forwarding());
        Self {
            registry: Arc::new(ShareScopeRegistry::new()),
            resolver: Resolver::new(log.clone()),
            log,
            default_scope: default_scope.into(),
        }
    }

    /// Drop every registration and diagnostic.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.default_scope));
    }

    pub fn execute(&self, statement: Statement) -> Result<Reply> {
        match statement {
            Statement::Provide(provide) => Ok(self.provide(provide)),
            Statement::Resolve(resolve) => self.resolve(resolve),
            Statement::Show { scope } => Ok(Reply::Shown {
                scope,
                snapshot: self.registry.snapshot(),
            }),
        }
    }

    /// Diagnostics emitted since the last call.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.log.take()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    fn provide(&self, provide: Provide) -> Reply {
        let scope = provide.scope.unwrap_or_else(|| self.default_scope.clone());
        let registered = self.registry.register(
            &scope,
            &provide.key,
            ShareOffer {
                version: provide.version,
                singleton: provide.singleton,
                eager: provide.eager,
                factory: FactoryRef::new(provide.build, provide.key.clone()),
            },
        );
        Reply::Provided {
            scope,
            key: provide.key,
            registered,
        }
    }

    fn resolve(&self, resolve: Resolve) -> Result<Reply> {
        let build = BuildId::new(resolve.build);
        let scope = resolve.scope.unwrap_or_else(|| self.default_scope.clone());
        let fallback = resolve
            .fallback
            .as_ref()
            .map(|_| FactoryRef::new(build.clone(), resolve.key.clone()));
        let strict_version = resolve
            .strict
            .unwrap_or(fallback.is_some() && !resolve.singleton);

        let descriptor = ShareDescriptor {
            build,
            package_name: infer_package_name(&resolve.key),
            share_key: resolve.key.clone(),
            share_scope: scope.clone(),
            version: resolve.fallback.flatten(),
            required_version: resolve.required,
            singleton: resolve.singleton,
            strict_version,
            eager: false,
            fallback,
        };

        let resolution = self.resolver.resolve(&descriptor, &self.registry)?;
        Ok(Reply::Resolved {
            scope,
            key: resolve.key,
            resolution,
        })
    }
}
