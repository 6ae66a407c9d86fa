//! CLI command definitions and handlers

mod init;
mod rules;
mod scan;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Parse a score cut-off in [0, 1]
fn parse_score(s: &str) -> Result<f64, String> {
    let v: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err("score must be between 0 and 1".to_string())
    }
}

/// Splinter - score code structure against small-responsibility rules
#[derive(Parser, Debug)]
#[command(name = "splinter")]
#[command(
    version,
    about = "Rule-based structural scoring for code scope trees",
    long_about = "Splinter walks a scope tree (modules, classes, functions, call sites) \
produced by a language front end, runs a registry of independent measurement rules \
against every entity, and reports how far each one strays from its rule's threshold.",
    after_help = "\
Examples:
  splinter scan scope.json                        Scan a scope tree
  splinter scan scope.json -f json -o report.json Machine-readable report
  splinter scan scope.json --fail-on 0.9          Exit code 1 on any critical result
  splinter rules                                  List rules and parameters
  splinter init                                   Write an example splinter.toml"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(
        long,
        global = true,
        default_value = "warn",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    pub log_level: String,

    /// Number of parallel workers (1-64, default: auto)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score a scope tree and report rule violations
    #[command(after_help = "\
Examples:
  splinter scan scope.json                          Text report on stdout
  splinter scan scope.json --format markdown -o r.md
  splinter scan scope.json --warning-threshold 0.2  Report milder results too
  splinter scan scope.json --disable-rule naming-convention
  splinter scan scope.json --entities               Also list per-entity scores")]
    Scan {
        /// Scope tree JSON file
        input: PathBuf,

        /// Output format: text, json, markdown (or md)
        #[arg(long, short = 'f', value_parser = ["text", "json", "markdown", "md"])]
        format: Option<String>,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Config file (default: splinter.toml next to the input)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Report results scoring at or above this (0-1)
        #[arg(long, value_parser = parse_score)]
        warning_threshold: Option<f64>,

        /// Disable a rule for this run (repeatable)
        #[arg(long)]
        disable_rule: Vec<String>,

        /// Exit with code 1 if any result scores at or above this (0-1)
        #[arg(long, value_parser = parse_score)]
        fail_on: Option<f64>,

        /// Stop starting new evaluations after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// List per-entity scores
        #[arg(long)]
        entities: bool,
    },

    /// List registered rules with their effective parameters
    Rules {
        /// Config file to apply before listing
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write an example splinter.toml
    Init {
        /// Directory to write into (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

/// Run the CLI
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Scan {
            input,
            format,
            output,
            config,
            warning_threshold,
            disable_rule,
            fail_on,
            timeout,
            entities,
        } => scan::run(scan::ScanArgs {
            input,
            format,
            output,
            config,
            warning_threshold,
            disable_rules: disable_rule,
            fail_on,
            timeout,
            show_entities: entities,
            workers: cli.workers,
        }),
        Commands::Rules { config } => rules::run(config.as_deref()),
        Commands::Init { path } => init::run(&path),
    }
}
