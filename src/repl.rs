// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive negotiation session for spacey-mf.

use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use std::borrow::Cow;
use std::path::PathBuf;

use spacey_federation::Manifest;

use crate::config::Settings;
use crate::output;
use crate::session::Session;
use crate::statement::{KEYWORDS, Statement};

const HISTORY_FILE: &str = ".spacey_mf_history";

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    Reset,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let input = input.trim();
        let rest = input.strip_prefix('.')?;

        let parts: Vec<&str> = rest.splitn(2, char::is_whitespace).collect();
        let cmd = parts.first()?.to_lowercase();
        let arg = parts.get(1).copied();

        match cmd.as_str() {
            "help" | "h" | "?" => Some((ReplCommand::Help, arg)),
            "exit" | "quit" | "q" => Some((ReplCommand::Exit, arg)),
            "clear" | "cls" => Some((ReplCommand::Clear, arg)),
            "version" | "v" => Some((ReplCommand::Version, arg)),
            "load" | "l" => Some((ReplCommand::Load, arg)),
            "reset" => Some((ReplCommand::Reset, arg)),
            _ => None,
        }
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <manifest>", "Run a manifest and print its report"),
            (".reset", "Forget every registration"),
        ]
    }
}

/// Completion and hints over statement keywords and dot-commands
struct MfHelper {
    keywords: Vec<String>,
}

impl MfHelper {
    fn new() -> Self {
        let keywords = KEYWORDS
            .iter()
            .copied()
            .chain([".help", ".exit", ".clear", ".version", ".load", ".reset"])
            .map(String::from)
            .collect();

        Self { keywords }
    }
}

fn word_start(line: &str) -> usize {
    line.rfind(|c: char| c.is_whitespace() || c == ';')
        .map(|i| i + 1)
        .unwrap_or(0)
}

impl Completer for MfHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = word_start(&line[..pos]);
        let word = &line[start..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches: Vec<Pair> = self
            .keywords
            .iter()
            .filter(|kw| kw.starts_with(word))
            .map(|kw| Pair {
                display: kw.clone(),
                replacement: kw[word.len()..].to_string(),
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for MfHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }

        let word = &line[word_start(line)..];
        if word.len() < 2 {
            return None;
        }

        self.keywords
            .iter()
            .find(|kw| kw.starts_with(word) && kw.len() > word.len())
            .map(|kw| kw[word.len()..].to_string().dimmed().to_string())
    }
}

impl Highlighter for MfHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.trim_start().starts_with('.') {
            return Cow::Owned(line.magenta().to_string());
        }

        let mut result = String::with_capacity(line.len() * 2);
        let mut word = String::new();
        for c in line.chars() {
            if c.is_whitespace() || c == ';' {
                result.push_str(&highlight_word(&word));
                word.clear();
                result.push(c);
            } else {
                word.push(c);
            }
        }
        result.push_str(&highlight_word(&word));

        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn highlight_word(word: &str) -> String {
    const VERBS: &[&str] = &["provide", "resolve", "show"];
    const FLAGS: &[&str] = &["singleton", "eager", "strict", "loose"];

    if VERBS.contains(&word) {
        word.magenta().bold().to_string()
    } else if FLAGS.contains(&word) {
        word.blue().to_string()
    } else if let Some((name, value)) = word.split_once('=') {
        format!("{}={}", name.blue(), value.yellow())
    } else if let Some(at) = word.get(1..).and_then(|w| w.find('@')) {
        let (key, range) = word.split_at(at + 1);
        format!("{}{}", key.cyan(), range.yellow())
    } else {
        word.to_string()
    }
}

impl Validator for MfHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();

        // Keep reading while a quote is open or the line is continued.
        if input.matches('"').count() % 2 == 1 || input.trim_end().ends_with('\\') {
            return Ok(ValidationResult::Incomplete);
        }

        Ok(ValidationResult::Valid(None))
    }
}

impl Helper for MfHelper {}

/// The interactive REPL
pub struct Repl {
    session: Session,
    settings: Settings,
    editor: Editor<MfHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(settings: Settings) -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(settings.history_size)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(MfHelper::new()));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spacey")
            .join(HISTORY_FILE);

        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        // A missing history file is expected on first run.
        let _ = editor.load_history(&history_path);

        Ok(Self {
            session: Session::new(settings.share_scope.clone()),
            settings,
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "mf>".bright_green().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();

                    if trimmed.is_empty() {
                        continue;
                    }

                    if let Some((cmd, arg)) = ReplCommand::parse(trimmed) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }

                    self.eval_and_print(&trimmed.replace("\\\n", " "));
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);

        println!();
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!(
            "  {} {} {}",
            "spacey-mf".white().bold(),
            "v".dimmed(),
            env!("CARGO_PKG_VERSION").bright_yellow()
        );
        println!(
            "  {} {}",
            "Share scope:".dimmed(),
            self.settings.share_scope.cyan()
        );
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            ".help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => {
                self.print_help();
                CommandResult::Continue
            }
            ReplCommand::Exit => CommandResult::Exit,
            ReplCommand::Clear => {
                print!("\x1B[2J\x1B[H");
                CommandResult::Continue
            }
            ReplCommand::Version => {
                println!();
                println!(
                    "{}: {}",
                    "spacey-mf".bright_cyan().bold(),
                    env!("CARGO_PKG_VERSION").yellow()
                );
                println!("{}: {}", "Rust".dimmed(), env!("CARGO_PKG_RUST_VERSION"));
                println!();
                CommandResult::Continue
            }
            ReplCommand::Load => {
                match arg {
                    Some(path) => self.load_manifest(path),
                    None => eprintln!(
                        "{}: {} {}",
                        "Error".red().bold(),
                        ".load".cyan(),
                        "requires a manifest path".dimmed()
                    ),
                }
                CommandResult::Continue
            }
            ReplCommand::Reset => {
                self.session.reset();
                println!("{}", "Registry cleared".dimmed());
                CommandResult::Continue
            }
        }
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Statements:".white().bold());
        println!();
        println!(
            "  {} <build> <key>@<version|*> [singleton] [eager] [scope=<name>]",
            "provide".magenta()
        );
        println!(
            "  {} <build> <key>[@<range>] [singleton] [strict|loose] [fallback=<version>] [scope=<name>]",
            "resolve".magenta()
        );
        println!("  {} [scope]", "show".magenta());
        println!();
        println!(
            "  {}",
            "Separate statements with ';'. Quote ranges containing spaces.".dimmed()
        );
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();

        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:18} {}", cmd.cyan(), desc.dimmed());
        }

        println!();
    }

    fn load_manifest(&self, path: &str) {
        let result =
            Manifest::load(path.trim()).and_then(|m| m.run(&self.settings.share_scope));
        match result {
            Ok(report) => output::print_report(&report),
            Err(e) => output::print_error(&e),
        }
    }

    fn eval_and_print(&mut self, input: &str) {
        let statements = match Statement::parse_all(input) {
            Ok(statements) => statements,
            Err(e) => {
                output::print_error(&e);
                return;
            }
        };

        for statement in statements {
            match self.session.execute(statement) {
                Ok(reply) => output::print_reply(&reply),
                Err(e) => output::print_error(&e),
            }
        }
        output::print_diagnostics(&self.session.take_diagnostics());
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}
