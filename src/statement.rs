// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Negotiation statements accepted by `-e` and the REPL.
//!
//! ```text
//! provide <build> <key>@<version|*> [singleton] [eager] [scope=<name>]
//! resolve <build> <key>[@<range>] [singleton] [strict|loose] [fallback=<version|*>] [scope=<name>]
//! show [scope]
//! ```
//!
//! Arguments containing spaces can be wrapped in double quotes, e.g.
//! `resolve app "react@>=17 <19"`.

use spacey_federation::{FederationError, Result, SemVer, VersionRange};

/// Keywords offered by REPL completion.
pub const KEYWORDS: &[&str] = &[
    "provide",
    "resolve",
    "show",
    "singleton",
    "eager",
    "strict",
    "loose",
    "scope=",
    "fallback=",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Provide(Provide),
    Resolve(Resolve),
    Show { scope: Option<String> },
}

/// Register an instance on behalf of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provide {
    pub build: String,
    pub key: String,
    /// `None` for `*` (unversioned)
    pub version: Option<SemVer>,
    pub singleton: bool,
    pub eager: bool,
    pub scope: Option<String>,
}

/// Resolve a key for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolve {
    pub build: String,
    pub key: String,
    pub required: Option<VersionRange>,
    pub singleton: bool,
    /// `None` leaves the default in place
    pub strict: Option<bool>,
    /// Version of the build's own copy; `Some(None)` is an unversioned copy
    pub fallback: Option<Option<SemVer>>,
    pub scope: Option<String>,
}

impl Statement {
    /// Parse a single statement.
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        let Some((verb, args)) = tokens.split_first() else {
            return Err(syntax("empty statement"));
        };

        match verb.as_str() {
            "provide" => parse_provide(args).map(Statement::Provide),
            "resolve" => parse_resolve(args).map(Statement::Resolve),
            "show" => match args {
                [] => Ok(Statement::Show { scope: None }),
                [scope] => Ok(Statement::Show {
                    scope: Some(scope.clone()),
                }),
                _ => Err(syntax("usage: show [scope]")),
            },
            other => Err(syntax(&format!("unknown statement '{}'", other))),
        }
    }

    /// Parse `;`-separated statements, skipping empty ones.
    pub fn parse_all(input: &str) -> Result<Vec<Self>> {
        split_statements(input)
            .into_iter()
            .map(|s| Self::parse(&s))
            .collect()
    }
}

fn parse_provide(args: &[String]) -> Result<Provide> {
    let [build, spec, flags @ ..] = args else {
        return Err(syntax(
            "usage: provide <build> <key>@<version|*> [singleton] [eager] [scope=<name>]",
        ));
    };

    let (key, version) = split_spec(spec);
    let version = match version {
        None => {
            return Err(syntax(&format!(
                "'{}' needs a version, use {}@* for an unversioned module",
                spec, key
            )));
        }
        Some("*") => None,
        Some(raw) => Some(SemVer::parse(raw)?),
    };

    let mut provide = Provide {
        build: build.clone(),
        key: key.to_string(),
        version,
        singleton: false,
        eager: false,
        scope: None,
    };

    for flag in flags {
        match flag.split_once('=') {
            Some(("scope", scope)) => provide.scope = Some(scope.to_string()),
            None if flag == "singleton" => provide.singleton = true,
            None if flag == "eager" => provide.eager = true,
            _ => return Err(syntax(&format!("unknown provide option '{}'", flag))),
        }
    }

    Ok(provide)
}

fn parse_resolve(args: &[String]) -> Result<Resolve> {
    let [build, spec, flags @ ..] = args else {
        return Err(syntax(
            "usage: resolve <build> <key>[@<range>] [singleton] [strict|loose] [fallback=<version>] [scope=<name>]",
        ));
    };

    let (key, range) = split_spec(spec);
    let mut resolve = Resolve {
        build: build.clone(),
        key: key.to_string(),
        required: range.map(VersionRange::parse).transpose()?,
        singleton: false,
        strict: None,
        fallback: None,
        scope: None,
    };

    for flag in flags {
        match flag.split_once('=') {
            Some(("scope", scope)) => resolve.scope = Some(scope.to_string()),
            Some(("fallback", "*")) => resolve.fallback = Some(None),
            Some(("fallback", raw)) => resolve.fallback = Some(Some(SemVer::parse(raw)?)),
            None if flag == "singleton" => resolve.singleton = true,
            None if flag == "strict" => resolve.strict = Some(true),
            None if flag == "loose" => resolve.strict = Some(false),
            _ => return Err(syntax(&format!("unknown resolve option '{}'", flag))),
        }
    }

    Ok(resolve)
}

/// Split `key@version`, keeping the leading `@` of scoped keys.
fn split_spec(spec: &str) -> (&str, Option<&str>) {
    let search_from = usize::from(spec.starts_with('@'));
    match spec[search_from..].find('@') {
        Some(at) => {
            let at = at + search_from;
            (&spec[..at], Some(&spec[at + 1..]))
        }
        None => (spec, None),
    }
}

/// Split on whitespace, keeping double-quoted runs together.
fn tokenize(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in input.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if quoted {
        return Err(syntax("unterminated quote"));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Split on `;` outside double quotes.
fn split_statements(input: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in input.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ';' if !quoted => statements.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    statements.push(current);

    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn syntax(message: &str) -> FederationError {
    FederationError::Config(message.to_string())
}
