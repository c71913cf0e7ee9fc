//! Manifest Integration Tests
//!
//! Runs manifests from disk and checks the resulting reports.

use spacey_federation::{DiagnosticCode, FederationError, Manifest, Outcome};
use std::io::Write;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_storefront_manifest() {
    let manifest = Manifest::load(fixture("storefront.toml")).unwrap();
    assert_eq!(manifest.builds.len(), 3);

    let report = manifest.run("default").unwrap();

    assert_eq!(report.builds[0].runtime.as_deref(), Some("runtime"));
    assert_eq!(report.builds[0].eager, 3);
    assert_eq!(report.builds[1].runtime, None);
    assert_eq!(report.builds[1].shares, 3);

    let outcomes: Vec<&Outcome> = report.outcomes.iter().map(|o| &o.outcome).collect();
    for resolved in &outcomes[..3] {
        match resolved {
            Outcome::Resolved {
                provider,
                satisfied,
                used_fallback,
                ..
            } => {
                assert_eq!(provider.as_str(), "shell");
                assert!(*satisfied);
                assert!(!*used_fallback);
            }
            other => panic!("expected a shared instance, got {:?}", other),
        }
    }
    assert_eq!(
        outcomes[1],
        &Outcome::Resolved {
            version: Some("4.17.21".into()),
            provider: "shell".into(),
            request: "lodash".into(),
            satisfied: true,
            used_fallback: false,
        }
    );
    assert!(matches!(
        outcomes[3],
        Outcome::Failed {
            code: Some(DiagnosticCode::SingletonVersionConflict),
            ..
        }
    ));
    assert_eq!(
        outcomes[4],
        &Outcome::Local {
            request: "react".into()
        }
    );

    // Eager copies are registered up front, so no build falls back.
    assert_eq!(report.failures(), 1);
    assert_eq!(report.warning_count(), 0);
    assert!(
        report
            .diagnostics
            .iter()
            .all(|d| d.code == DiagnosticCode::SingletonVersionConflict)
    );

    let react = &report.registry.scopes["default"]["react"];
    assert_eq!(react.len(), 1);
    assert!(react[0].pinned);
    assert!(react[0].loaded);
}

#[test]
fn test_json_manifest_from_tempfile() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{
            "builds": [
                {{ "name": "host", "shared": {{ "dayjs": {{ "version": "1.11.10", "eager": true }} }} }},
                {{ "name": "widget", "shared": ["dayjs"] }}
            ],
            "requests": [ {{ "build": "widget", "shareKey": "dayjs" }} ]
        }}"#
    )
    .unwrap();

    let report = Manifest::load(file.path()).unwrap().run("default").unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["outcomes"][0]["status"], "resolved");
    assert_eq!(json["outcomes"][0]["shareKey"], "dayjs");
    assert_eq!(json["outcomes"][0]["version"], "1.11.10");
    assert_eq!(json["outcomes"][0]["usedFallback"], false);
    assert_eq!(json["registry"]["scopes"]["default"]["dayjs"][0]["provider"], "host");
}

#[test]
fn test_bad_manifests_abort() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[[builds]]\nname = \"a\"\n[builds.shared.react]\nversion = \"not-a-version\"").unwrap();

    let manifest = Manifest::load(file.path()).unwrap();
    assert!(matches!(
        manifest.run("default"),
        Err(FederationError::InvalidVersion { .. })
    ));

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[[builds]\nname = ").unwrap();
    assert!(matches!(
        Manifest::load(file.path()),
        Err(FederationError::Toml(_))
    ));

    assert!(matches!(
        Manifest::load(fixture("missing.json")),
        Err(FederationError::Io(_))
    ));
}
