//! Scan command - score a scope tree and render the report

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use splinter::config::{load_project_config, normalize_rule_name, ProjectConfig};
use splinter::engine::ScanEngine;
use splinter::models::Report;
use splinter::reporters::{self, OutputFormat, RenderOptions};
use splinter::rules::RuleRegistry;
use splinter::scope::load_scope_tree;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::info;

/// Resolved `scan` arguments
#[derive(Debug)]
pub(super) struct ScanArgs {
    pub input: PathBuf,
    pub format: Option<String>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub warning_threshold: Option<f64>,
    pub disable_rules: Vec<String>,
    pub fail_on: Option<f64>,
    pub timeout: Option<u64>,
    pub show_entities: bool,
    pub workers: Option<usize>,
}

/// Run the scan command
pub(super) fn run(args: ScanArgs) -> Result<()> {
    let tree = load_scope_tree(&args.input)
        .with_context(|| format!("Failed to load scope tree from {}", args.input.display()))?;
    info!("Loaded {} scope nodes from {}", tree.len(), args.input.display());

    let config = resolve_config(args.config.as_deref(), &args.input)?;
    let registry = build_registry(&config, &args.disable_rules)?;

    let format_name = args
        .format
        .clone()
        .or_else(|| config.defaults.format.clone())
        .unwrap_or_else(|| "text".to_string());
    let format = OutputFormat::from_str(&format_name)?;
    let options = RenderOptions {
        warning_threshold: args
            .warning_threshold
            .unwrap_or(config.report.warning_threshold),
        show_entities: args.show_entities,
    };
    let workers = args.workers.or(config.defaults.workers).unwrap_or(0);

    let bar = ProgressBar::new(0);
    bar.set_style(create_bar_style());
    bar.set_message("evaluating rules");
    let progress = bar.clone();

    let mut engine = ScanEngine::new(workers).with_progress_callback(Box::new(move |done, total| {
        progress.set_length(total as u64);
        progress.set_position(done as u64);
    }));
    if let Some(secs) = args.timeout {
        engine = engine.with_deadline(Instant::now() + Duration::from_secs(secs));
    }

    let report = engine.scan(&registry, &tree)?;
    bar.finish_and_clear();

    if !report.complete {
        eprintln!(
            "{} scan stopped early, {} of {} evaluations skipped",
            style("warning:").yellow().bold(),
            report.summary.pairs_skipped,
            report.summary.pairs_total
        );
    }

    let output = reporters::report_with_format(&report, format, &options)?;
    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Report written to: {}", style(path.display()).cyan());
        }
        None => println!("{}", output),
    }

    if let Some(threshold) = args.fail_on.or(config.defaults.fail_on) {
        if should_fail(&report, threshold) {
            eprintln!("Failing due to --fail-on={} threshold", threshold);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Explicit `--config`, else the first config file next to the input
fn resolve_config(explicit: Option<&Path>, input: &Path) -> Result<ProjectConfig> {
    match explicit {
        Some(path) => ProjectConfig::load(path),
        None => {
            let dir = input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            Ok(load_project_config(dir))
        }
    }
}

/// Built-in rules with config overrides and CLI disables applied
pub(super) fn build_registry(config: &ProjectConfig, disabled: &[String]) -> Result<RuleRegistry> {
    let mut registry = RuleRegistry::with_builtin_rules();
    for warning in registry.apply_config(config) {
        eprintln!("{} {}", style("config:").yellow(), warning);
    }
    for name in disabled {
        let id = normalize_rule_name(name);
        registry
            .set_enabled(&id, false)
            .with_context(|| format!("Cannot disable rule '{}'", name))?;
    }
    Ok(registry)
}

fn should_fail(report: &Report, threshold: f64) -> bool {
    report.results.iter().any(|r| r.score >= threshold)
}

/// Create bar progress style
fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}
