// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CLI argument parsing for spacey-mf.

use clap::Parser;
use std::path::PathBuf;

/// spacey-mf - Inspect and replay module federation share negotiation
///
/// Runs a manifest when given one, evaluates statements with `-e`, and
/// starts an interactive session otherwise.
#[derive(Parser, Debug)]
#[command(name = "spacey-mf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Manifest to run (.toml or .json)
    #[arg(value_name = "MANIFEST", conflicts_with = "eval")]
    pub manifest: Option<PathBuf>,

    /// Evaluate `;`-separated statements
    #[arg(short, long, value_name = "STATEMENTS")]
    pub eval: Option<String>,

    /// Print reports as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit with an error if any warning was emitted
    #[arg(long)]
    pub deny_warnings: bool,

    /// Share scope for builds and statements that do not pick one
    #[arg(long, value_name = "NAME")]
    pub share_scope: Option<String>,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        let cli = Cli::parse_from(["spacey-mf"]);
        assert!(cli.manifest.is_none() && cli.eval.is_none());

        let cli = Cli::parse_from(["spacey-mf", "apps.toml", "--deny-warnings"]);
        assert_eq!(cli.manifest, Some(PathBuf::from("apps.toml")));
        assert!(cli.deny_warnings);

        let cli = Cli::parse_from(["spacey-mf", "-e", "show"]);
        assert_eq!(cli.eval.as_deref(), Some("show"));

        assert!(Cli::try_parse_from(["spacey-mf", "apps.toml", "-e", "show"]).is_err());
        assert!(Cli::try_parse_from(["spacey-mf", "-v", "-q"]).is_err());
    }
}
