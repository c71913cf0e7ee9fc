// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Shared scope registry.
//!
//! The registry maps `(scope, share key)` to the module instances builds have
//! offered under that key. It only grows: registrations are never removed,
//! and offering a version that is already present hands back the existing
//! registration. Every registration gets a process-wide sequence number so
//! that "first registered wins" is a property of stored data.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::version::SemVer;

/// Name of the scope used when a build does not pick one.
pub const DEFAULT_SHARE_SCOPE: &str = "default";

/// Identity of an independently built application.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(String);

impl BuildId {
    pub fn new(name: impl Into<String>) -> Self {
        BuildId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildId {
    fn from(name: &str) -> Self {
        BuildId::new(name)
    }
}

impl From<String> for BuildId {
    fn from(name: String) -> Self {
        BuildId(name)
    }
}

/// Handle to a lazily constructed module: which build owns the code and the
/// request that build would load it with. The loading transport turns this
/// into an actual module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactoryRef {
    /// Build that owns the module code
    pub build: BuildId,
    /// Import request inside that build
    pub request: String,
}

impl FactoryRef {
    pub fn new(build: impl Into<BuildId>, request: impl Into<String>) -> Self {
        Self {
            build: build.into(),
            request: request.into(),
        }
    }
}

/// A module instance offered to a shared scope, before it is registered.
#[derive(Debug, Clone)]
pub struct ShareOffer {
    /// Version of the offered module; `None` for unversioned modules
    pub version: Option<SemVer>,
    /// Whether the provider requires a single instance
    pub singleton: bool,
    /// Whether the provider registers at startup
    pub eager: bool,
    /// Where the module comes from
    pub factory: FactoryRef,
}

/// A registered module instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    /// Registration order, unique within a registry
    pub seq: u64,
    /// Version of the module; `None` for unversioned modules
    pub version: Option<SemVer>,
    /// Whether the provider requires a single instance
    pub singleton: bool,
    /// Whether the provider registered at startup
    pub eager: bool,
    /// Lazy constructor for the module
    pub factory: FactoryRef,
}

impl Registration {
    /// Build that contributed this registration.
    pub fn provenance(&self) -> &BuildId {
        &self.factory.build
    }

    /// Version for display purposes.
    pub fn version_label(&self) -> String {
        self.version
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unversioned".to_string())
    }
}

/// Result of [`ShareScopeRegistry::register`].
#[derive(Debug, Clone)]
pub struct Registered {
    /// The canonical registration for the offered version
    pub registration: Arc<Registration>,
    /// `false` when an identical version was already registered
    pub inserted: bool,
}

#[derive(Debug, Default)]
struct ShareEntry {
    registrations: Vec<Arc<Registration>>,
    /// Sequence numbers of registrations handed out to a consumer
    loaded: Vec<u64>,
    /// The instance every singleton consumer receives once one was chosen
    singleton: Option<Arc<Registration>>,
}

/// Point-in-time copy of one registry entry.
#[derive(Debug, Clone, Default)]
pub struct EntryView {
    /// Registrations in registration order
    pub registrations: Vec<Arc<Registration>>,
    loaded: Vec<u64>,
    singleton: Option<Arc<Registration>>,
}

impl EntryView {
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Whether the registration was already handed to a consumer.
    pub fn is_loaded(&self, seq: u64) -> bool {
        self.loaded.contains(&seq)
    }

    /// Instance already fixed for singleton consumers, if any.
    pub fn pinned_singleton(&self) -> Option<&Arc<Registration>> {
        self.singleton.as_ref()
    }
}

/// One named partition of the registry.
#[derive(Debug)]
pub struct ShareScope {
    name: String,
    entries: DashMap<String, ShareEntry>,
}

impl ShareScope {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Share keys with at least one registration, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

/// Process-wide registry of shared module instances.
///
/// Create one per process (or per test) and hand it to every resolver call.
#[derive(Debug, Default)]
pub struct ShareScopeRegistry {
    scopes: DashMap<String, Arc<ShareScope>>,
    next_seq: AtomicU64,
}

impl ShareScopeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a scope, creating it on first reference.
    pub fn scope(&self, name: &str) -> Arc<ShareScope> {
        self.scopes
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Creating share scope '{}'", name);
                Arc::new(ShareScope::new(name))
            })
            .clone()
    }

    /// Register a module instance under `(scope, key)`.
    ///
    /// The read-then-append happens under the entry lock, so concurrent
    /// registrations of distinct versions are all kept. Offering a version
    /// that is already present returns the existing registration.
    pub fn register(&self, scope: &str, key: &str, offer: ShareOffer) -> Registered {
        let share_scope = self.scope(scope);
        let mut entry = share_scope.entries.entry(key.to_string()).or_default();

        if let Some(existing) = entry
            .registrations
            .iter()
            .find(|r| r.version == offer.version)
        {
            debug!(
                "{}/{}@{} already registered by {}",
                scope,
                key,
                existing.version_label(),
                existing.provenance()
            );
            return Registered {
                registration: Arc::clone(existing),
                inserted: false,
            };
        }

        let registration = Arc::new(Registration {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            version: offer.version,
            singleton: offer.singleton,
            eager: offer.eager,
            factory: offer.factory,
        });
        debug!(
            "Registered {}/{}@{} from {} (#{})",
            scope,
            key,
            registration.version_label(),
            registration.provenance(),
            registration.seq
        );
        entry.registrations.push(Arc::clone(&registration));

        Registered {
            registration,
            inserted: true,
        }
    }

    /// Registrations for `(scope, key)` in registration order.
    pub fn lookup(&self, scope: &str, key: &str) -> Vec<Arc<Registration>> {
        self.view(scope, key).registrations
    }

    /// Point-in-time copy of the entry for `(scope, key)`.
    pub fn view(&self, scope: &str, key: &str) -> EntryView {
        let Some(share_scope) = self.scopes.get(scope).map(|s| Arc::clone(s.value())) else {
            return EntryView::default();
        };

        share_scope
            .entries
            .get(key)
            .map(|entry| EntryView {
                registrations: entry.registrations.clone(),
                loaded: entry.loaded.clone(),
                singleton: entry.singleton.clone(),
            })
            .unwrap_or_default()
    }

    /// Record that a registration was handed to a consumer.
    pub fn mark_loaded(&self, scope: &str, key: &str, seq: u64) {
        let share_scope = self.scope(scope);
        let mut entry = share_scope.entries.entry(key.to_string()).or_default();
        if !entry.loaded.contains(&seq) {
            entry.loaded.push(seq);
        }
    }

    /// Fix the singleton instance for `(scope, key)`.
    ///
    /// The first caller wins; later callers get the instance already fixed,
    /// whatever candidate they propose.
    pub fn pin_singleton(
        &self,
        scope: &str,
        key: &str,
        candidate: &Arc<Registration>,
    ) -> Arc<Registration> {
        let share_scope = self.scope(scope);
        let mut entry = share_scope.entries.entry(key.to_string()).or_default();
        match &entry.singleton {
            Some(pinned) => Arc::clone(pinned),
            None => {
                entry.singleton = Some(Arc::clone(candidate));
                Arc::clone(candidate)
            }
        }
    }

    /// Names of all scopes, sorted.
    pub fn scope_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scopes.iter().map(|s| s.key().clone()).collect();
        names.sort();
        names
    }

    /// Total number of registrations across all scopes.
    pub fn len(&self) -> usize {
        self.scopes
            .iter()
            .map(|scope| {
                scope
                    .entries
                    .iter()
                    .map(|e| e.registrations.len())
                    .sum::<usize>()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializable copy of the whole registry.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut scopes = BTreeMap::new();

        for scope in self.scopes.iter() {
            let mut keys = BTreeMap::new();
            for entry in scope.entries.iter() {
                let pinned = entry.singleton.as_ref().map(|r| r.seq);
                let views = entry
                    .registrations
                    .iter()
                    .map(|r| RegistrationView {
                        seq: r.seq,
                        version: r.version.as_ref().map(|v| v.to_string()),
                        singleton: r.singleton,
                        eager: r.eager,
                        provider: r.provenance().clone(),
                        request: r.factory.request.clone(),
                        loaded: entry.loaded.contains(&r.seq),
                        pinned: pinned == Some(r.seq),
                    })
                    .collect();
                keys.insert(entry.key().clone(), views);
            }
            scopes.insert(scope.key().clone(), keys);
        }

        RegistrySnapshot { scopes }
    }
}

/// Serializable registry contents: scope → share key → registrations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub scopes: BTreeMap<String, BTreeMap<String, Vec<RegistrationView>>>,
}

/// One registration as it appears in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationView {
    pub seq: u64,
    pub version: Option<String>,
    pub singleton: bool,
    pub eager: bool,
    pub provider: BuildId,
    pub request: String,
    pub loaded: bool,
    pub pinned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    fn offer(build: &str, version: Option<&str>) -> ShareOffer {
        ShareOffer {
            version: version.map(|v| SemVer::parse(v).unwrap()),
            singleton: false,
            eager: false,
            factory: FactoryRef::new(build, "react"),
        }
    }

    #[test]
    fn test_register_preserves_order() {
        let registry = ShareScopeRegistry::new();
        registry.register("default", "react", offer("a", Some("18.2.0")));
        registry.register("default", "react", offer("b", Some("17.0.2")));
        registry.register("default", "react", offer("c", Some("18.3.1")));

        let versions: Vec<String> = registry
            .lookup("default", "react")
            .iter()
            .map(|r| r.version_label())
            .collect();
        assert_eq!(versions, vec!["18.2.0", "17.0.2", "18.3.1"]);

        let seqs: Vec<u64> = registry
            .lookup("default", "react")
            .iter()
            .map(|r| r.seq)
            .collect();
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_register_dedups_identical_versions() {
        let registry = ShareScopeRegistry::new();
        let first = registry.register("default", "react", offer("a", Some("18.2.0")));
        let second = registry.register("default", "react", offer("b", Some("18.2.0+build.7")));

        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(second.registration.provenance().as_str(), "a");
        assert_eq!(registry.lookup("default", "react").len(), 1);

        let unversioned = registry.register("default", "react", offer("c", None));
        let again = registry.register("default", "react", offer("d", None));
        assert!(unversioned.inserted);
        assert!(!again.inserted);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_scopes_are_isolated() {
        let registry = ShareScopeRegistry::new();
        registry.register("default", "react", offer("a", Some("18.2.0")));
        registry.register("legacy", "react", offer("b", Some("16.14.0")));

        assert_eq!(registry.lookup("default", "react").len(), 1);
        assert_eq!(registry.lookup("legacy", "react").len(), 1);
        assert!(registry.lookup("missing", "react").is_empty());
        assert_eq!(registry.scope_names(), vec!["default", "legacy"]);
        assert_eq!(registry.scope("default").keys(), vec!["react"]);
    }

    #[test]
    fn test_pin_singleton_first_wins() {
        let registry = ShareScopeRegistry::new();
        let a = registry.register("default", "vue", offer("a", Some("3.0.0")));
        let b = registry.register("default", "vue", offer("b", Some("3.1.0")));

        let pinned = registry.pin_singleton("default", "vue", &a.registration);
        assert_eq!(pinned.seq, a.registration.seq);

        let again = registry.pin_singleton("default", "vue", &b.registration);
        assert_eq!(again.seq, a.registration.seq);
        assert_eq!(
            registry.view("default", "vue").pinned_singleton().map(|r| r.seq),
            Some(a.registration.seq)
        );
    }

    #[test]
    fn test_concurrent_registration_loses_nothing() {
        let registry = ShareScopeRegistry::new();

        // Every version is offered twice from different builds.
        (0..128u64).into_par_iter().for_each(|i| {
            let version = format!("1.{}.0", i % 64);
            registry.register(
                "default",
                "lodash",
                ShareOffer {
                    version: Some(SemVer::parse(&version).unwrap()),
                    singleton: false,
                    eager: true,
                    factory: FactoryRef::new(format!("build-{i}"), "lodash"),
                },
            );
        });

        let registrations = registry.lookup("default", "lodash");
        assert_eq!(registrations.len(), 64);

        let mut seqs: Vec<u64> = registrations.iter().map(|r| r.seq).collect();
        seqs.dedup();
        assert_eq!(seqs.len(), 64);
    }

    #[test]
    fn test_snapshot_marks_loaded_and_pinned() {
        let registry = ShareScopeRegistry::new();
        let a = registry.register("default", "vue", offer("host", Some("3.0.0")));
        registry.mark_loaded("default", "vue", a.registration.seq);
        registry.pin_singleton("default", "vue", &a.registration);

        let snapshot = registry.snapshot();
        let views = &snapshot.scopes["default"]["vue"];
        assert_eq!(views.len(), 1);
        assert!(views[0].loaded);
        assert!(views[0].pinned);
        assert_eq!(views[0].provider.as_str(), "host");
        assert_eq!(views[0].version.as_deref(), Some("3.0.0"));
    }
}
