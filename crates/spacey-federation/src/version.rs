// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Version model: semantic versions, npm-style ranges and precedence.
//!
//! Versions wrap [`semver::Version`] but compare by semver *precedence*, so
//! build metadata never influences ordering or equality. Ranges accept the
//! npm dialect that federation configs are written in (`1.x`, `>=1 <2`,
//! `1.2.3 - 2.0.0`, `a || b`) and lower it onto [`semver::VersionReq`].

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{FederationError, Result};

/// A parsed semantic version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemVer(Version);

impl SemVer {
    /// Parse a version string. A leading `v` or `=` is tolerated.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let cleaned = trimmed
            .strip_prefix('=')
            .unwrap_or(trimmed)
            .trim_start_matches(['v', 'V']);

        if cleaned.is_empty() {
            return Err(FederationError::InvalidVersion {
                raw: raw.to_string(),
                reason: "empty version string".into(),
            });
        }

        Version::parse(cleaned)
            .map(SemVer)
            .map_err(|e| FederationError::InvalidVersion {
                raw: raw.to_string(),
                reason: e.to_string(),
            })
    }

    /// Create a release version from its numeric parts.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        SemVer(Version::new(major, minor, patch))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Whether this version carries a prerelease tag.
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// The underlying `semver` value.
    pub fn as_semver(&self) -> &Version {
        &self.0
    }
}

/// Compare two versions by semver precedence, ignoring build metadata.
pub fn compare(a: &SemVer, b: &SemVer) -> Ordering {
    a.0.major
        .cmp(&b.0.major)
        .then(a.0.minor.cmp(&b.0.minor))
        .then(a.0.patch.cmp(&b.0.patch))
        .then_with(|| a.0.pre.cmp(&b.0.pre))
}

impl PartialEq for SemVer {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Equal
    }
}

impl Eq for SemVer {}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl Hash for SemVer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.major.hash(state);
        self.0.minor.hash(state);
        self.0.patch.hash(state);
        self.0.pre.hash(state);
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SemVer {
    type Err = FederationError;

    fn from_str(s: &str) -> Result<Self> {
        SemVer::parse(s)
    }
}

impl TryFrom<String> for SemVer {
    type Error = FederationError;

    fn try_from(value: String) -> Result<Self> {
        SemVer::parse(&value)
    }
}

impl From<SemVer> for String {
    fn from(value: SemVer) -> Self {
        value.to_string()
    }
}

/// A predicate over versions, parsed from an npm-style range expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    raw: String,
    /// `||`-separated alternatives; a version matches if any alternative does
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parse a range expression such as `^1.2.3`, `>=1 <2` or `1.x || 2.x`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: String| FederationError::InvalidRange {
            raw: raw.to_string(),
            reason,
        };

        let mut alternatives = Vec::new();
        for alternative in raw.split("||") {
            let lowered = lower_alternative(alternative).map_err(invalid)?;
            let req = VersionReq::parse(&lowered).map_err(|e| invalid(e.to_string()))?;
            alternatives.push(req);
        }

        Ok(Self {
            raw: raw.trim().to_string(),
            alternatives,
        })
    }

    /// A range that matches every release version.
    pub fn any() -> Self {
        Self {
            raw: "*".into(),
            alternatives: vec![VersionReq::STAR],
        }
    }

    /// Whether `version` satisfies this range.
    pub fn matches(&self, version: &SemVer) -> bool {
        self.alternatives.iter().any(|req| req.matches(&version.0))
    }

    /// The expression this range was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VersionRange {
    type Err = FederationError;

    fn from_str(s: &str) -> Result<Self> {
        VersionRange::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = FederationError;

    fn try_from(value: String) -> Result<Self> {
        VersionRange::parse(&value)
    }
}

impl From<VersionRange> for String {
    fn from(value: VersionRange) -> Self {
        value.raw
    }
}

/// Parse a version string.
pub fn parse(raw: &str) -> Result<SemVer> {
    SemVer::parse(raw)
}

/// Parse a range expression.
pub fn parse_range(raw: &str) -> Result<VersionRange> {
    VersionRange::parse(raw)
}

/// Range check where either side may be absent.
///
/// No range means no constraint. An unversioned candidate never satisfies an
/// actual range.
pub fn satisfies(range: Option<&VersionRange>, version: Option<&SemVer>) -> bool {
    match range {
        None => true,
        Some(range) => version.is_some_and(|v| range.matches(v)),
    }
}

/// Whether a shorthand option string reads as a version requirement rather
/// than an import request.
pub fn looks_like_range(value: &str) -> bool {
    let value = value.trim();
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() || "^=<>~".contains(c) => true,
        Some('v') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => matches!(value, "*" | "x" | "X"),
    }
}

/// Lower one `||` alternative from npm syntax onto `semver::VersionReq` syntax.
fn lower_alternative(alternative: &str) -> std::result::Result<String, String> {
    let alternative = alternative.trim();
    if alternative.is_empty() {
        return Ok("*".into());
    }

    // Hyphen ranges: "1.2.3 - 2.3.4"
    if let Some((low, high)) = alternative.split_once(" - ") {
        let low = lower_comparator(">=", low.trim())?;
        let high = lower_comparator("<=", high.trim())?;
        return Ok(join_comparators([low, high].into_iter().flatten()));
    }

    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;

    for token in alternative.split_whitespace() {
        let token = token.trim_end_matches(',');
        if token.is_empty() {
            continue;
        }

        let split = token
            .find(|c: char| !matches!(c, '<' | '>' | '=' | '^' | '~'))
            .unwrap_or(token.len());
        let (op, version) = token.split_at(split);

        // Operator separated from its version by whitespace: ">= 1.2.3"
        if version.is_empty() {
            if pending_op.is_some() {
                return Err(format!("dangling operator '{}'", op));
            }
            pending_op = Some(op);
            continue;
        }

        let op = match pending_op.take() {
            Some(pending) if op.is_empty() => pending,
            Some(pending) => return Err(format!("dangling operator '{}'", pending)),
            None => op,
        };

        if let Some(comparator) = lower_comparator(op, version)? {
            comparators.push(comparator);
        }
    }

    if let Some(op) = pending_op {
        return Err(format!("operator '{}' has no version", op));
    }

    Ok(join_comparators(comparators))
}

/// Lower a single comparator. Returns `None` for comparators matching anything.
fn lower_comparator(op: &str, version: &str) -> std::result::Result<Option<String>, String> {
    let version = version.trim_start_matches(['v', 'V']);

    // Drop wildcard components: "1.x" -> "1", "1.2.*" -> "1.2"
    let mut parts: Vec<&str> = Vec::new();
    for part in version.split('.') {
        if matches!(part, "x" | "X" | "*") {
            break;
        }
        parts.push(part);
    }
    let partial = parts.join(".");

    if partial.is_empty() {
        return match op {
            "" | "=" | ">=" | "^" | "~" => Ok(None),
            _ => Err(format!("'{}*' can never be satisfied", op)),
        };
    }

    let op = match op {
        "" => "=",
        "~>" => "~",
        other => other,
    };

    Ok(Some(format!("{}{}", op, partial)))
}

fn join_comparators(comparators: impl IntoIterator<Item = String>) -> String {
    let joined: Vec<String> = comparators.into_iter().collect();
    if joined.is_empty() {
        "*".to_string()
    } else {
        joined.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemVer {
        SemVer::parse(s).unwrap()
    }

    fn range(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(v("1.2.3"), SemVer::new(1, 2, 3));
        assert_eq!(v("v1.2.3"), SemVer::new(1, 2, 3));
        assert_eq!(v("=2.0.0"), SemVer::new(2, 0, 0));
        assert!(v("1.0.0-beta.1").is_prerelease());

        assert!(matches!(
            SemVer::parse("1.2"),
            Err(FederationError::InvalidVersion { .. })
        ));
        assert!(matches!(
            SemVer::parse(""),
            Err(FederationError::InvalidVersion { .. })
        ));
        assert!(SemVer::parse("latest").is_err());
    }

    #[test]
    fn test_precedence_ignores_build_metadata() {
        assert_eq!(compare(&v("1.0.0+a"), &v("1.0.0+b")), Ordering::Equal);
        assert_eq!(v("1.0.0+a"), v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-alpha.1"));
        assert!(v("1.0.0-alpha.2") < v("1.0.0-alpha.10"));
        assert!(v("1.0.0-beta") > v("1.0.0-alpha.10"));
        assert!(v("2.0.0") > v("1.99.99"));
        assert!(v("1.10.0") > v("1.9.0"));
    }

    #[test]
    fn test_caret_and_tilde() {
        assert!(range("^4.17.0").matches(&v("4.17.21")));
        assert!(!range("^4.17.0").matches(&v("4.16.0")));
        assert!(!range("^4.17.0").matches(&v("5.0.0")));
        assert!(range("~1.2.0").matches(&v("1.2.9")));
        assert!(!range("~1.2.0").matches(&v("1.3.0")));
        assert!(range("^0.2.3").matches(&v("0.2.9")));
        assert!(!range("^0.2.3").matches(&v("0.3.0")));
    }

    #[test]
    fn test_npm_dialect() {
        // Bare versions are exact, not caret
        assert!(range("1.2.3").matches(&v("1.2.3")));
        assert!(!range("1.2.3").matches(&v("1.2.4")));

        // Wildcards and partials
        assert!(range("1.x").matches(&v("1.9.0")));
        assert!(!range("1.x").matches(&v("2.0.0")));
        assert!(range("1.2.*").matches(&v("1.2.7")));
        assert!(range("*").matches(&v("0.0.1")));
        assert!(range("").matches(&v("3.1.4")));

        // Space-separated comparators, with and without a gap after the operator
        assert!(range(">=1.0.0 <2.0.0").matches(&v("1.5.0")));
        assert!(!range(">=1.0.0 <2.0.0").matches(&v("2.0.0")));
        assert!(range(">= 1.0.0 < 2.0.0").matches(&v("1.0.0")));

        // Hyphen ranges
        assert!(range("1.2.3 - 2.3.4").matches(&v("2.3.4")));
        assert!(!range("1.2.3 - 2.3.4").matches(&v("2.3.5")));

        // Alternatives
        let either = range("^2.6.5 || ^3.0.0");
        assert!(either.matches(&v("2.7.0")));
        assert!(either.matches(&v("3.2.0")));
        assert!(!either.matches(&v("4.0.0")));
    }

    #[test]
    fn test_prerelease_matching() {
        assert!(!range("^1.0.0").matches(&v("1.1.0-beta.1")));
        assert!(range("^1.1.0-beta.0").matches(&v("1.1.0-beta.1")));
    }

    #[test]
    fn test_invalid_ranges() {
        for raw in ["^^1.0.0", "not a range", ">=", "<*", "1.2.3 >="] {
            assert!(
                matches!(
                    VersionRange::parse(raw),
                    Err(FederationError::InvalidRange { .. })
                ),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_satisfies_unversioned() {
        let r = range("^1.0.0");
        assert!(!satisfies(Some(&r), None));
        assert!(satisfies(None, None));
        assert!(satisfies(Some(&r), Some(&v("1.4.0"))));
    }

    #[test]
    fn test_looks_like_range() {
        assert!(looks_like_range("^1.0.0"));
        assert!(looks_like_range("1.0.0"));
        assert!(looks_like_range(">=2"));
        assert!(looks_like_range("*"));
        assert!(looks_like_range("v2.6.5"));
        assert!(!looks_like_range("vue"));
        assert!(!looks_like_range("react"));
        assert!(!looks_like_range("./src/shared"));
        assert!(!looks_like_range("@scope/pkg"));
    }

    #[test]
    fn test_serde_as_strings() {
        let parsed: VersionRange = serde_json::from_str("\"^1.2.3\"").unwrap();
        assert_eq!(parsed.as_str(), "^1.2.3");
        assert_eq!(serde_json::to_string(&v("1.2.3")).unwrap(), "\"1.2.3\"");
        assert!(serde_json::from_str::<SemVer>("\"nope\"").is_err());
    }
}
