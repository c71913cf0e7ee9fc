// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! spacey-mf - inspect and replay module federation share negotiation
//!
//! ## Usage
//!
//! - `spacey-mf apps.toml` runs a manifest and prints the report
//! - `spacey-mf -e "provide shell react@18.2.0 singleton; resolve app react@^18"`
//! - `spacey-mf` starts an interactive session

mod cli;
mod config;
mod output;
mod repl;
mod session;
mod statement;

use clap::Parser;
use owo_colors::OwoColorize;
use std::path::Path;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use spacey_federation::{FederationError, Manifest, ManifestFormat, Result};

use cli::Cli;
use config::{OutputFormat, Settings};
use session::Session;
use statement::Statement;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}: failed to load settings", "Error".red().bold());
            output::print_error(&e);
            return ExitCode::FAILURE;
        }
    };
    settings.apply_cli(&cli);

    init_tracing(&settings.loglevel);
    debug!("Settings: {:?}", settings);

    if let Some(statements) = &cli.eval {
        return run_eval(statements, &settings);
    }

    match &cli.manifest {
        Some(path) => match run_manifest(path, &settings).await {
            Ok(code) => code,
            Err(e) => {
                output::print_error(&e);
                ExitCode::FAILURE
            }
        },
        None => run_repl(settings),
    }
}

/// Log to stderr; `RUST_LOG` overrides the configured level.
fn init_tracing(loglevel: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(loglevel));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}

/// Run a manifest and print its report.
async fn run_manifest(path: &Path, settings: &Settings) -> Result<ExitCode> {
    let format = ManifestFormat::from_path(path)?;
    let content = tokio::fs::read_to_string(path).await?;
    let manifest = Manifest::parse(&content, format)?;

    let report = manifest.run(&settings.share_scope)?;

    match settings.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => output::print_report(&report),
    }

    let failed = report.failures() > 0 || (settings.deny_warnings && report.has_warnings());
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Evaluate `;`-separated statements against a fresh session.
fn run_eval(input: &str, settings: &Settings) -> ExitCode {
    let statements = match Statement::parse_all(input) {
        Ok(statements) => statements,
        Err(e) => {
            output::print_error(&e);
            return ExitCode::FAILURE;
        }
    };

    let session = Session::new(settings.share_scope.clone());
    let mut failed = false;

    for statement in statements {
        match session.execute(statement) {
            Ok(reply) => {
                if settings.format == OutputFormat::Text {
                    output::print_reply(&reply);
                }
            }
            Err(e) => {
                output::print_error(&e);
                failed = true;
            }
        }
    }

    let diagnostics = session.take_diagnostics();
    let warned = diagnostics.iter().any(|d| d.is_warning());

    match settings.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "diagnostics": diagnostics,
                "registry": session.snapshot(),
            });
            match serde_json::to_string_pretty(&value) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    output::print_error(&FederationError::from(e));
                    return ExitCode::FAILURE;
                }
            }
        }
        OutputFormat::Text => output::print_diagnostics(&diagnostics),
    }

    if failed || (settings.deny_warnings && warned) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Start the interactive REPL
fn run_repl(settings: Settings) -> ExitCode {
    match repl::Repl::new(settings) {
        Ok(mut repl) => {
            if let Err(e) = repl.run() {
                eprintln!("{}: {:?}", "REPL Error".red().bold(), e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!(
                "{}: Failed to initialize REPL: {:?}",
                "Error".red().bold(),
                e
            );
            ExitCode::FAILURE
        }
    }
}
