// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Shared-module options and their normalization into descriptors.
//!
//! Options arrive in the shapes a federation plugin config allows (a list of
//! requests, a map of shorthand strings, or a map of option objects). All
//! defaults are computed once here, so the resolver only ever sees a fully
//! populated [`ShareDescriptor`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{FederationError, Result};
use crate::scope::{BuildId, DEFAULT_SHARE_SCOPE, FactoryRef};
use crate::version::{SemVer, VersionRange, looks_like_range};

/// An option that takes either a string or `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setting {
    Flag(bool),
    Value(String),
}

impl Setting {
    pub fn value(value: impl Into<String>) -> Self {
        Setting::Value(value.into())
    }
}

/// Interpretation of an optional [`Setting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice<'a> {
    Unset,
    Disabled,
    Value(&'a str),
}

fn choice<'a>(setting: Option<&'a Setting>, option: &str, key: &str) -> Result<Choice<'a>> {
    match setting {
        None => Ok(Choice::Unset),
        Some(Setting::Flag(false)) => Ok(Choice::Disabled),
        Some(Setting::Flag(true)) => Err(FederationError::Config(format!(
            "'{}' of shared module '{}' must be a string or false",
            option, key
        ))),
        Some(Setting::Value(value)) => Ok(Choice::Value(value.as_str())),
    }
}

/// Options for one shared module, as written in the config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedConfig {
    /// Resolve at build initialization instead of on first use
    pub eager: Option<bool>,
    /// Request for the local fallback; `false` disables it
    pub import: Option<Setting>,
    /// Package used to infer versions
    pub package_name: Option<String>,
    /// Accepted versions; `false` accepts anything
    pub required_version: Option<Setting>,
    /// Lookup key inside the scope
    pub share_key: Option<String>,
    /// Scope the key lives in
    pub share_scope: Option<String>,
    /// Allow only one instance process-wide
    pub singleton: Option<bool>,
    /// Fail instead of warning when the required version is not met
    pub strict_version: Option<bool>,
    /// Version of the local fallback; `false` leaves it unversioned
    pub version: Option<Setting>,
}

/// One entry of the `shared` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SharedItem {
    /// A version requirement or an import request
    Shorthand(String),
    Config(SharedConfig),
}

/// The `shared` option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SharedOptions {
    List(Vec<String>),
    Map(BTreeMap<String, SharedItem>),
}

impl Default for SharedOptions {
    fn default() -> Self {
        SharedOptions::Map(BTreeMap::new())
    }
}

impl SharedOptions {
    /// Expand every shape into `(key, options)` pairs, in key order for maps
    /// and declaration order for lists.
    pub fn entries(&self) -> Vec<(String, SharedConfig)> {
        match self {
            SharedOptions::List(requests) => requests
                .iter()
                .map(|request| (request.clone(), SharedConfig::default()))
                .collect(),
            SharedOptions::Map(items) => items
                .iter()
                .map(|(key, item)| {
                    let config = match item {
                        SharedItem::Shorthand(value) if value != key && looks_like_range(value) => {
                            SharedConfig {
                                required_version: Some(Setting::value(value.as_str())),
                                ..SharedConfig::default()
                            }
                        }
                        SharedItem::Shorthand(value) => SharedConfig {
                            import: Some(Setting::value(value.as_str())),
                            ..SharedConfig::default()
                        },
                        SharedItem::Config(config) => config.clone(),
                    };
                    (key.clone(), config)
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SharedOptions::List(requests) => requests.is_empty(),
            SharedOptions::Map(items) => items.is_empty(),
        }
    }
}

/// The federation-related part of a build's config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FederationOptions {
    /// Container name
    pub name: Option<String>,
    /// Scope for every shared module that does not pick its own
    pub share_scope: Option<String>,
    /// Runtime chunk name, or `false` to embed the runtime
    pub runtime: Option<Setting>,
    pub shared: SharedOptions,
}

/// Package metadata used to fill in versions the config leaves out.
///
/// Typically read from the build's package manifest and lockfile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageHints {
    /// Installed version per package name
    pub packages: BTreeMap<String, String>,
    /// Declared dependency range per package name
    pub dependencies: BTreeMap<String, String>,
}

impl PackageHints {
    fn installed_version(&self, package: &str, key: &str) -> Option<SemVer> {
        let raw = self.packages.get(package)?;
        match SemVer::parse(raw) {
            Ok(version) => Some(version),
            Err(e) => {
                warn!("Ignoring installed version of {} for shared '{}': {}", package, key, e);
                None
            }
        }
    }

    fn required_range(&self, package: &str, key: &str) -> Option<VersionRange> {
        let raw = self.dependencies.get(package)?;
        match VersionRange::parse(raw) {
            Ok(range) => Some(range),
            Err(e) => {
                warn!("Ignoring dependency range of {} for shared '{}': {}", package, key, e);
                None
            }
        }
    }
}

/// Fully normalized options for one shared module of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareDescriptor {
    /// Build consuming (and possibly providing) the module
    pub build: BuildId,
    pub share_key: String,
    pub share_scope: String,
    pub package_name: Option<String>,
    /// Version of the local fallback
    pub version: Option<SemVer>,
    pub required_version: Option<VersionRange>,
    pub singleton: bool,
    pub strict_version: bool,
    pub eager: bool,
    /// The build's own copy, if it ships one
    pub fallback: Option<FactoryRef>,
}

impl ShareDescriptor {
    /// Normalize the options for `key` as declared by `build`.
    pub fn normalize(
        build: &BuildId,
        key: &str,
        config: &SharedConfig,
        hints: &PackageHints,
        default_scope: &str,
    ) -> Result<Self> {
        let share_key = config.share_key.clone().unwrap_or_else(|| key.to_string());
        if share_key.is_empty() {
            return Err(FederationError::Config(format!(
                "shared module '{}' of build '{}' has an empty shareKey",
                key, build
            )));
        }

        let share_scope = config
            .share_scope
            .clone()
            .unwrap_or_else(|| default_scope.to_string());

        let import = match choice(config.import.as_ref(), "import", key)? {
            Choice::Unset => Some(key.to_string()),
            Choice::Disabled => None,
            Choice::Value(request) => Some(request.to_string()),
        };

        let package_name = config
            .package_name
            .clone()
            .or_else(|| infer_package_name(import.as_deref().unwrap_or(key)));

        let version = match choice(config.version.as_ref(), "version", key)? {
            Choice::Unset => package_name
                .as_deref()
                .and_then(|package| hints.installed_version(package, key)),
            Choice::Disabled => None,
            Choice::Value(raw) => Some(SemVer::parse(raw)?),
        };

        let required_version =
            match choice(config.required_version.as_ref(), "requiredVersion", key)? {
                Choice::Unset => package_name
                    .as_deref()
                    .and_then(|package| hints.required_range(package, key)),
                Choice::Disabled => None,
                Choice::Value(raw) => Some(VersionRange::parse(raw)?),
            };

        let singleton = config.singleton.unwrap_or(false);
        let eager = config.eager.unwrap_or(false);
        let fallback = import.map(|request| FactoryRef::new(build.clone(), request));
        let strict_version = config
            .strict_version
            .unwrap_or(fallback.is_some() && !singleton);

        Ok(Self {
            build: build.clone(),
            share_key,
            share_scope,
            package_name,
            version,
            required_version,
            singleton,
            strict_version,
            eager,
            fallback,
        })
    }

    /// Required range for messages; `*` when unconstrained.
    pub fn required_label(&self) -> String {
        self.required_version
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "*".to_string())
    }
}

/// Normalized federation options of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub build: BuildId,
    /// Runtime chunk name; `None` when the runtime is embedded
    pub runtime: Option<String>,
    /// Descriptors by share key
    pub shares: BTreeMap<String, ShareDescriptor>,
}

impl BuildConfig {
    /// Descriptors that resolve at build initialization, in share key order.
    pub fn eager_shares(&self) -> impl Iterator<Item = &ShareDescriptor> {
        self.shares.values().filter(|d| d.eager)
    }
}

impl FederationOptions {
    /// Normalize every shared module of this build.
    ///
    /// `default_scope` applies when neither the build nor the module picks a
    /// scope. Malformed versions and ranges fail here, before any
    /// negotiation happens.
    pub fn normalize(
        &self,
        build: &BuildId,
        hints: &PackageHints,
        default_scope: &str,
    ) -> Result<BuildConfig> {
        let scope = self.share_scope.as_deref().unwrap_or(default_scope);
        let runtime = match choice(self.runtime.as_ref(), "runtime", build.as_str())? {
            Choice::Value(name) => Some(name.to_string()),
            Choice::Unset | Choice::Disabled => None,
        };

        let mut shares = BTreeMap::new();
        for (key, config) in self.shared.entries() {
            let descriptor = ShareDescriptor::normalize(build, &key, &config, hints, scope)?;
            debug!(
                "{} shares {}/{} (required {}, strict {}, singleton {})",
                build,
                descriptor.share_scope,
                descriptor.share_key,
                descriptor.required_label(),
                descriptor.strict_version,
                descriptor.singleton
            );

            if shares.contains_key(&descriptor.share_key) {
                return Err(FederationError::Config(format!(
                    "build '{}' declares shareKey '{}' more than once",
                    build, descriptor.share_key
                )));
            }
            shares.insert(descriptor.share_key.clone(), descriptor);
        }

        Ok(BuildConfig {
            build: build.clone(),
            runtime,
            shares,
        })
    }

    /// Normalize with the standard `"default"` scope.
    pub fn normalize_default(&self, build: &BuildId, hints: &PackageHints) -> Result<BuildConfig> {
        self.normalize(build, hints, DEFAULT_SHARE_SCOPE)
    }
}

/// Package name of a bare module request: `@scope/name/sub` → `@scope/name`,
/// `name/sub` → `name`. Relative, absolute and protocol requests have none.
pub fn infer_package_name(request: &str) -> Option<String> {
    if request.is_empty()
        || request.starts_with('.')
        || request.starts_with('/')
        || request.contains(':')
    {
        return None;
    }

    let name = if let Some(rest) = request.strip_prefix('@') {
        let slash = rest.find('/')?;
        let after_scope = &rest[slash + 1..];
        match after_scope.find('/') {
            Some(sub) => &request[..slash + 2 + sub],
            None => request,
        }
    } else {
        match request.find('/') {
            Some(slash) => &request[..slash],
            None => request,
        }
    };

    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> BuildId {
        BuildId::new("app")
    }

    fn normalize(key: &str, config: SharedConfig) -> Result<ShareDescriptor> {
        ShareDescriptor::normalize(&build(), key, &config, &PackageHints::default(), "default")
    }

    #[test]
    fn test_defaults() {
        let descriptor = normalize("react", SharedConfig::default()).unwrap();
        assert_eq!(descriptor.share_key, "react");
        assert_eq!(descriptor.share_scope, "default");
        assert_eq!(descriptor.package_name.as_deref(), Some("react"));
        assert_eq!(descriptor.fallback, Some(FactoryRef::new("app", "react")));
        assert!(descriptor.strict_version);
        assert!(!descriptor.singleton);
        assert!(!descriptor.eager);
        assert!(descriptor.version.is_none());
        assert!(descriptor.required_version.is_none());
    }

    #[test]
    fn test_strict_version_defaults() {
        let singleton = normalize(
            "vue",
            SharedConfig {
                singleton: Some(true),
                ..SharedConfig::default()
            },
        )
        .unwrap();
        assert!(!singleton.strict_version);

        let no_fallback = normalize(
            "vue",
            SharedConfig {
                import: Some(Setting::Flag(false)),
                ..SharedConfig::default()
            },
        )
        .unwrap();
        assert!(no_fallback.fallback.is_none());
        assert!(!no_fallback.strict_version);

        let explicit = normalize(
            "vue",
            SharedConfig {
                singleton: Some(true),
                strict_version: Some(true),
                ..SharedConfig::default()
            },
        )
        .unwrap();
        assert!(explicit.strict_version);
    }

    #[test]
    fn test_explicit_values_are_validated() {
        let err = normalize(
            "react",
            SharedConfig {
                version: Some(Setting::value("18")),
                ..SharedConfig::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, FederationError::InvalidVersion { .. }));

        let err = normalize(
            "react",
            SharedConfig {
                required_version: Some(Setting::value(">>18")),
                ..SharedConfig::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, FederationError::InvalidRange { .. }));

        let err = normalize(
            "react",
            SharedConfig {
                import: Some(Setting::Flag(true)),
                ..SharedConfig::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, FederationError::Config(_)));
    }

    #[test]
    fn test_versions_inferred_from_hints() {
        let hints = PackageHints {
            packages: BTreeMap::from([
                ("react".to_string(), "18.2.0".to_string()),
                ("lodash".to_string(), "not-a-version".to_string()),
            ]),
            dependencies: BTreeMap::from([
                ("react".to_string(), "^18.0.0".to_string()),
                ("lodash".to_string(), "workspace:*".to_string()),
            ]),
        };

        let react = ShareDescriptor::normalize(
            &build(),
            "react/jsx-runtime",
            &SharedConfig::default(),
            &hints,
            "default",
        )
        .unwrap();
        assert_eq!(react.package_name.as_deref(), Some("react"));
        assert_eq!(react.version, Some(SemVer::new(18, 2, 0)));
        assert_eq!(react.required_version.as_ref().map(|r| r.as_str()), Some("^18.0.0"));

        // Inferred values that do not parse are skipped rather than fatal.
        let lodash =
            ShareDescriptor::normalize(&build(), "lodash", &SharedConfig::default(), &hints, "default")
                .unwrap();
        assert!(lodash.version.is_none());
        assert!(lodash.required_version.is_none());

        // `false` opts out of inference.
        let opted_out = ShareDescriptor::normalize(
            &build(),
            "react",
            &SharedConfig {
                required_version: Some(Setting::Flag(false)),
                version: Some(Setting::Flag(false)),
                ..SharedConfig::default()
            },
            &hints,
            "default",
        )
        .unwrap();
        assert!(opted_out.version.is_none());
        assert!(opted_out.required_version.is_none());
    }

    #[test]
    fn test_shared_shapes_from_json() {
        let options: FederationOptions = serde_json::from_str(
            r#"{
                "name": "shell",
                "shareScope": "apps",
                "runtime": false,
                "shared": {
                    "lodash": "^4.17.0",
                    "utils": "./src/utils",
                    "vue": { "singleton": true, "requiredVersion": "^2.6.5", "import": false }
                }
            }"#,
        )
        .unwrap();

        let config = options
            .normalize(&BuildId::new("shell"), &PackageHints::default(), "default")
            .unwrap();
        assert!(config.runtime.is_none());
        assert_eq!(config.shares.len(), 3);

        let lodash = &config.shares["lodash"];
        assert_eq!(lodash.share_scope, "apps");
        assert_eq!(lodash.required_version.as_ref().map(|r| r.as_str()), Some("^4.17.0"));
        assert_eq!(lodash.fallback.as_ref().map(|f| f.request.as_str()), Some("lodash"));

        let utils = &config.shares["utils"];
        assert_eq!(utils.fallback.as_ref().map(|f| f.request.as_str()), Some("./src/utils"));
        assert!(utils.package_name.is_none());

        let vue = &config.shares["vue"];
        assert!(vue.singleton);
        assert!(vue.fallback.is_none());
        assert!(!vue.strict_version);

        let list: FederationOptions =
            serde_json::from_str(r#"{ "runtime": "federation-runtime", "shared": ["react", "react-dom"] }"#)
                .unwrap();
        let config = list
            .normalize_default(&BuildId::new("remote"), &PackageHints::default())
            .unwrap();
        assert_eq!(config.runtime.as_deref(), Some("federation-runtime"));
        assert_eq!(
            config.shares.keys().collect::<Vec<_>>(),
            vec!["react", "react-dom"]
        );
    }

    #[test]
    fn test_duplicate_share_keys_rejected() {
        let options: FederationOptions = serde_json::from_str(
            r#"{ "shared": { "react": {}, "react-alias": { "shareKey": "react" } } }"#,
        )
        .unwrap();
        let err = options
            .normalize_default(&build(), &PackageHints::default())
            .unwrap_err();
        assert!(matches!(err, FederationError::Config(_)));
    }

    #[test]
    fn test_eager_shares_in_key_order() {
        let options: FederationOptions = serde_json::from_str(
            r#"{ "shared": {
                "zod": { "eager": true },
                "axios": { "eager": true },
                "lodash": {}
            } }"#,
        )
        .unwrap();
        let config = options
            .normalize_default(&build(), &PackageHints::default())
            .unwrap();
        let eager: Vec<&str> = config.eager_shares().map(|d| d.share_key.as_str()).collect();
        assert_eq!(eager, vec!["axios", "zod"]);
    }

    #[test]
    fn test_infer_package_name() {
        assert_eq!(infer_package_name("lodash").as_deref(), Some("lodash"));
        assert_eq!(infer_package_name("lodash/get").as_deref(), Some("lodash"));
        assert_eq!(infer_package_name("@babel/core").as_deref(), Some("@babel/core"));
        assert_eq!(
            infer_package_name("@babel/core/lib/index").as_deref(),
            Some("@babel/core")
        );
        assert_eq!(infer_package_name("./local"), None);
        assert_eq!(infer_package_name("/abs/path"), None);
        assert_eq!(infer_package_name("node:fs"), None);
        assert_eq!(infer_package_name("@scope"), None);
    }
}
