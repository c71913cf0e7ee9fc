// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Terminal rendering of replies, reports and errors.

use owo_colors::OwoColorize;
use spacey_federation::scope::RegistrationView;
use spacey_federation::{Diagnostic, Outcome, RegistrySnapshot, RunReport};

use crate::session::Reply;

pub fn print_reply(reply: &Reply) {
    match reply {
        Reply::Provided {
            scope,
            key,
            registered,
        } => {
            let registration = &registered.registration;
            if registered.inserted {
                println!(
                    "{} {}/{}@{} from {} {}",
                    "+".green().bold(),
                    scope.dimmed(),
                    key.cyan(),
                    registration.version_label().yellow(),
                    registration.provenance(),
                    format!("#{}", registration.seq).dimmed()
                );
            } else {
                println!(
                    "{} {}/{}@{} already provided by {}",
                    "=".yellow().bold(),
                    scope.dimmed(),
                    key.cyan(),
                    registration.version_label().yellow(),
                    registration.provenance()
                );
            }
        }
        Reply::Resolved {
            scope,
            key,
            resolution,
        } => {
            let chosen = &resolution.chosen;
            let marker = if resolution.satisfied_required_version {
                "✓".green().bold().to_string()
            } else {
                "!".yellow().bold().to_string()
            };
            let fallback = if resolution.used_fallback {
                " (own copy)".dimmed().to_string()
            } else {
                String::new()
            };
            println!(
                "{} {}/{} -> {} from {}{}",
                marker,
                scope.dimmed(),
                key.cyan(),
                chosen.version_label().yellow(),
                chosen.provenance(),
                fallback
            );
        }
        Reply::Shown { scope, snapshot } => print_snapshot(snapshot, scope.as_deref()),
    }
}

pub fn print_snapshot(snapshot: &RegistrySnapshot, only: Option<&str>) {
    let scopes: Vec<_> = snapshot
        .scopes
        .iter()
        .filter(|(name, _)| only.is_none_or(|o| o == name.as_str()))
        .collect();

    if scopes.is_empty() {
        println!("{}", "(no registrations)".dimmed());
        return;
    }

    for (name, keys) in scopes {
        println!("{}", name.white().bold());
        for (key, registrations) in keys {
            println!("  {}", key.cyan());
            for registration in registrations {
                println!("    {}", format_registration(registration));
            }
        }
    }
}

fn format_registration(view: &RegistrationView) -> String {
    let mut line = format!(
        "{} from {}",
        view.version.as_deref().unwrap_or("unversioned").yellow(),
        view.provider
    );
    let mut tags = Vec::new();
    if view.singleton {
        tags.push("singleton");
    }
    if view.eager {
        tags.push("eager");
    }
    if view.loaded {
        tags.push("loaded");
    }
    if view.pinned {
        tags.push("pinned");
    }
    if !tags.is_empty() {
        line.push_str(&format!(" [{}]", tags.join(", ")).dimmed().to_string());
    }
    line
}

pub fn print_report(report: &RunReport) {
    println!("{}", "Builds:".white().bold());
    for build in &report.builds {
        println!(
            "  {} ({} shared, {} eager{})",
            build.name.cyan(),
            build.shares,
            build.eager,
            build
                .runtime
                .as_deref()
                .map(|r| format!(", runtime {}", r))
                .unwrap_or_default()
        );
    }
    println!();

    if !report.outcomes.is_empty() {
        println!("{}", "Requests:".white().bold());
        for request in &report.outcomes {
            let subject = format!("{} -> {}", request.build, request.share_key.cyan());
            match &request.outcome {
                Outcome::Resolved {
                    version,
                    provider,
                    satisfied,
                    used_fallback,
                    ..
                } => {
                    let marker = if *satisfied {
                        "✓".green().bold().to_string()
                    } else {
                        "!".yellow().bold().to_string()
                    };
                    println!(
                        "  {} {} {} from {}{}",
                        marker,
                        subject,
                        version.as_deref().unwrap_or("unversioned").yellow(),
                        provider,
                        (if *used_fallback { " (own copy)" } else { "" }).dimmed()
                    );
                }
                Outcome::Local { request } => {
                    println!(
                        "  {} {} local {} (not shared)",
                        "~".yellow().bold(),
                        subject,
                        request.dimmed()
                    );
                }
                Outcome::Failed { error, .. } => {
                    println!("  {} {} {}", "✗".red().bold(), subject, error.red());
                }
            }
        }
        println!();
    }

    print_diagnostics(&report.diagnostics);
    print_snapshot(&report.registry, None);
}

pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    println!("{}", "Diagnostics:".white().bold());
    for diagnostic in diagnostics {
        if diagnostic.is_warning() {
            println!("  {} {}", "warning".yellow().bold(), diagnostic);
        } else {
            println!("  {} {}", "error".red().bold(), diagnostic);
        }
    }
    println!();
}

/// Print an error, splitting the kind from the message the way it is displayed.
pub fn print_error(error: &spacey_federation::FederationError) {
    let error_str = error.to_string();

    if let Some(colon_pos) = error_str.find(':') {
        let (error_type, message) = error_str.split_at(colon_pos);
        eprintln!("{}{}", error_type.red().bold(), message);
    } else {
        eprintln!("{}", error_str.red());
    }
}
