// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Resolution engine.
//!
//! Decides which registered instance a consumer receives for a shared key.
//! The decision is a pure function of the descriptor and a point-in-time
//! view of the registry; the only writes are registering the consumer's
//! fallback, pinning the singleton instance and marking the choice loaded.

use std::sync::Arc;
use tracing::debug;

use crate::descriptor::ShareDescriptor;
use crate::diagnostics::{Diagnostic, Reporter, TracingReporter};
use crate::error::{FederationError, Result};
use crate::scope::{
    EntryView, FactoryRef, Registered, Registration, ShareOffer, ShareScopeRegistry,
};
use crate::version::satisfies;

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The instance the consumer must load
    pub chosen: Arc<Registration>,
    /// Whether `chosen` satisfies the consumer's required range
    pub satisfied_required_version: bool,
    /// Whether the consumer's own copy was registered and used because no
    /// shared instance was acceptable
    pub used_fallback: bool,
    /// Warnings emitted while resolving
    pub warnings: Vec<Diagnostic>,
}

/// Negotiates shared modules against a registry.
pub struct Resolver {
    reporter: Arc<dyn Reporter>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(Arc::new(TracingReporter))
    }
}

impl Resolver {
    /// Create a resolver that sends diagnostics to `reporter`.
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self { reporter }
    }

    /// Resolve `descriptor` against the current contents of `registry`.
    pub fn resolve(
        &self,
        descriptor: &ShareDescriptor,
        registry: &ShareScopeRegistry,
    ) -> Result<Resolution> {
        let view = registry.view(&descriptor.share_scope, &descriptor.share_key);
        let required = descriptor.required_version.as_ref();

        let eligible: Vec<&Arc<Registration>> = view
            .registrations
            .iter()
            .filter(|r| satisfies(required, r.version.as_ref()))
            .collect();

        let singleton = descriptor.singleton || eligible.iter().any(|r| r.singleton);

        debug!(
            "{} resolving {}/{} (required {}, {} registered, {} eligible, singleton {})",
            descriptor.build,
            descriptor.share_scope,
            descriptor.share_key,
            descriptor.required_label(),
            view.registrations.len(),
            eligible.len(),
            singleton
        );

        let result = if singleton {
            self.resolve_singleton(descriptor, registry, &view)
        } else {
            self.resolve_shared(descriptor, registry, &view, &eligible)
        };

        match result {
            Ok(resolution) => {
                registry.mark_loaded(
                    &descriptor.share_scope,
                    &descriptor.share_key,
                    resolution.chosen.seq,
                );
                debug!(
                    "{} got {}/{}@{} from {}",
                    descriptor.build,
                    descriptor.share_scope,
                    descriptor.share_key,
                    resolution.chosen.version_label(),
                    resolution.chosen.provenance()
                );
                Ok(resolution)
            }
            Err(err) => {
                if let Some(diagnostic) = Diagnostic::from_error(Some(&descriptor.build), &err) {
                    self.reporter.report(&diagnostic);
                }
                Err(err)
            }
        }
    }

    /// One logical instance for the key. Once an instance was handed to a
    /// singleton consumer it is the answer for every later one.
    fn resolve_singleton(
        &self,
        descriptor: &ShareDescriptor,
        registry: &ShareScopeRegistry,
        view: &EntryView,
    ) -> Result<Resolution> {
        let chosen = match view.pinned_singleton() {
            Some(pinned) => Arc::clone(pinned),
            None => {
                let (candidate, fallback) = match preferred_singleton(view) {
                    Some(best) => {
                        // A refused candidate must stay unpinned.
                        singleton_satisfied(descriptor, &best)?;
                        (best, None)
                    }
                    None => {
                        let resolution = self.use_fallback(descriptor, registry)?;
                        (Arc::clone(&resolution.chosen), Some(resolution))
                    }
                };

                // Another consumer may have pinned a different instance since the view was taken.
                let chosen = registry.pin_singleton(
                    &descriptor.share_scope,
                    &descriptor.share_key,
                    &candidate,
                );
                if let Some(resolution) = fallback {
                    if resolution.chosen.seq == chosen.seq {
                        return Ok(resolution);
                    }
                }
                chosen
            }
        };

        let satisfied = singleton_satisfied(descriptor, &chosen)?;

        let mut warnings = Vec::new();
        if let (false, Some(required)) = (satisfied, descriptor.required_version.as_ref()) {
            warnings.push(self.emit(Diagnostic::version_mismatch(
                &descriptor.build,
                &descriptor.share_scope,
                &descriptor.share_key,
                required,
                &chosen,
            )));
        }

        Ok(Resolution {
            chosen,
            satisfied_required_version: satisfied,
            used_fallback: false,
            warnings,
        })
    }

    /// Highest acceptable instance, else the consumer's own copy, else a
    /// strict failure or a best-effort pick.
    fn resolve_shared(
        &self,
        descriptor: &ShareDescriptor,
        registry: &ShareScopeRegistry,
        view: &EntryView,
        eligible: &[&Arc<Registration>],
    ) -> Result<Resolution> {
        if let Some(best) = highest(eligible.iter().copied()) {
            return Ok(Resolution {
                chosen: Arc::clone(best),
                satisfied_required_version: true,
                used_fallback: false,
                warnings: Vec::new(),
            });
        }

        if descriptor.fallback.is_some() {
            return self.use_fallback(descriptor, registry);
        }

        if view.is_empty() {
            return Err(missing(descriptor));
        }

        if descriptor.strict_version {
            return Err(no_satisfying_version(descriptor, view));
        }

        // Non-empty view with nothing eligible implies a required range.
        let best = highest(view.registrations.iter()).map(Arc::clone);
        match (best, descriptor.required_version.as_ref()) {
            (Some(chosen), Some(required)) => {
                let warning = self.emit(Diagnostic::version_mismatch(
                    &descriptor.build,
                    &descriptor.share_scope,
                    &descriptor.share_key,
                    required,
                    &chosen,
                ));
                Ok(Resolution {
                    chosen,
                    satisfied_required_version: false,
                    used_fallback: false,
                    warnings: vec![warning],
                })
            }
            _ => Err(missing(descriptor)),
        }
    }

    /// Register the consumer's own copy and use it.
    fn use_fallback(
        &self,
        descriptor: &ShareDescriptor,
        registry: &ShareScopeRegistry,
    ) -> Result<Resolution> {
        let Some(factory) = descriptor.fallback.clone() else {
            return Err(missing(descriptor));
        };

        let chosen = register_own(descriptor, registry, factory).registration;
        let warning = self.emit(Diagnostic::fallback_used(
            &descriptor.build,
            &descriptor.share_scope,
            &descriptor.share_key,
            descriptor.version.as_ref(),
        ));

        Ok(Resolution {
            satisfied_required_version: satisfies(
                descriptor.required_version.as_ref(),
                chosen.version.as_ref(),
            ),
            chosen,
            used_fallback: true,
            warnings: vec![warning],
        })
    }

    fn emit(&self, diagnostic: Diagnostic) -> Diagnostic {
        self.reporter.report(&diagnostic);
        diagnostic
    }
}

/// Highest version; unversioned ranks below every version, and the first
/// registered wins ties.
fn highest<'a, I>(candidates: I) -> Option<&'a Arc<Registration>>
where
    I: IntoIterator<Item = &'a Arc<Registration>>,
{
    let mut best: Option<&'a Arc<Registration>> = None;
    for candidate in candidates {
        match best {
            Some(current) if candidate.version <= current.version => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Offer the build's own copy to the scope under its declared version.
/// Registers nothing when the build ships no copy (`import: false`).
pub fn offer_own_copy(
    descriptor: &ShareDescriptor,
    registry: &ShareScopeRegistry,
) -> Option<Registered> {
    descriptor
        .fallback
        .clone()
        .map(|factory| register_own(descriptor, registry, factory))
}

fn register_own(
    descriptor: &ShareDescriptor,
    registry: &ShareScopeRegistry,
    factory: FactoryRef,
) -> Registered {
    registry.register(
        &descriptor.share_scope,
        &descriptor.share_key,
        ShareOffer {
            version: descriptor.version.clone(),
            singleton: descriptor.singleton,
            eager: descriptor.eager,
            factory,
        },
    )
}

/// Whether a singleton instance satisfies the consumer's range; a strict
/// consumer fails instead of accepting a mismatch.
fn singleton_satisfied(descriptor: &ShareDescriptor, chosen: &Registration) -> Result<bool> {
    let satisfied = satisfies(descriptor.required_version.as_ref(), chosen.version.as_ref());
    match (satisfied, descriptor.required_version.as_ref()) {
        (false, Some(required)) if descriptor.strict_version => {
            Err(FederationError::SingletonVersionConflict {
                scope: descriptor.share_scope.clone(),
                key: descriptor.share_key.clone(),
                required: required.to_string(),
                got: chosen.version_label(),
            })
        }
        _ => Ok(satisfied),
    }
}

/// Singleton candidate when nothing is pinned yet.
///
/// An instance already handed to a non-singleton consumer beats a newer one
/// nobody loaded, so the process keeps a single copy in memory; only when
/// nothing is loaded does the highest registered version win. This is the
/// intended order, not a plain "highest version" pick.
fn preferred_singleton(view: &EntryView) -> Option<Arc<Registration>> {
    let loaded = highest(view.registrations.iter().filter(|r| view.is_loaded(r.seq)));
    loaded
        .or_else(|| highest(view.registrations.iter()))
        .map(Arc::clone)
}

/// Nothing to return. With a range to satisfy (or strict mode) this is
/// reported as an unsatisfied version, otherwise as a missing module.
fn missing(descriptor: &ShareDescriptor) -> FederationError {
    if descriptor.strict_version || descriptor.required_version.is_some() {
        no_satisfying_version(descriptor, &EntryView::default())
    } else {
        FederationError::MissingSharedModule {
            scope: descriptor.share_scope.clone(),
            key: descriptor.share_key.clone(),
        }
    }
}

fn no_satisfying_version(descriptor: &ShareDescriptor, view: &EntryView) -> FederationError {
    let available = if view.is_empty() {
        "none".to_string()
    } else {
        view.registrations
            .iter()
            .map(|r| format!("{} from {}", r.version_label(), r.provenance()))
            .collect::<Vec<_>>()
            .join(", ")
    };

    FederationError::NoSatisfyingVersion {
        scope: descriptor.share_scope.clone(),
        key: descriptor.share_key.clone(),
        required: descriptor.required_label(),
        available,
    }
}
