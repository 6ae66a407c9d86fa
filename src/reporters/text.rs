//! Text (terminal) reporter with colors and formatting

use super::RenderOptions;
use crate::models::{Diagnostic, EntityStatus, Report, Severity};
use anyhow::Result;

/// Severity colors
fn severity_color(severity: &Severity) -> &'static str {
    match severity {
        Severity::Critical => "\x1b[31m", // Red
        Severity::High => "\x1b[91m",     // Light red
        Severity::Medium => "\x1b[33m",   // Yellow
        Severity::Low => "\x1b[34m",      // Blue
        Severity::Info => "\x1b[90m",     // Gray
    }
}

/// Reset ANSI color
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// Severity tag
fn severity_tag(severity: &Severity) -> &'static str {
    match severity {
        Severity::Critical => "[C]",
        Severity::High => "[H]",
        Severity::Medium => "[M]",
        Severity::Low => "[L]",
        Severity::Info => "[I]",
    }
}

/// Render report as formatted terminal output
pub fn render(
    report: &Report,
    diagnostics: &[Diagnostic],
    options: &RenderOptions,
) -> Result<String> {
    let mut out = String::new();
    let summary = &report.summary;

    // Header
    out.push_str(&format!("\n{BOLD}Splinter Scan{RESET}\n"));
    out.push_str(&format!(
        "{DIM}──────────────────────────────────────{RESET}\n"
    ));
    out.push_str(&format!(
        "Project score: {}  Entities: {} scored / {} total  Rules run: {}\n",
        format_score(report.project_score),
        summary.scored_entities,
        summary.nodes,
        summary.results
    ));
    if !report.complete {
        out.push_str(&format!(
            "\x1b[33mPartial scan:{RESET} {} of {} evaluations skipped\n",
            summary.pairs_skipped, summary.pairs_total
        ));
    }
    out.push('\n');

    out.push_str(&format!(
        "{BOLD}DIAGNOSTICS{RESET} ({} at or above {})\n",
        diagnostics.len(),
        percent(options.warning_threshold)
    ));
    if diagnostics.is_empty() {
        out.push_str(&format!("  {DIM}Nothing to report.{RESET}\n"));
    } else {
        out.push_str(&format!(
            "{DIM}  SEV   SCORE  RULE                   LOCATION{RESET}\n"
        ));
        for diag in diagnostics {
            let sev_c = severity_color(&diag.severity);
            out.push_str(&format!(
                "  {sev_c}{}{RESET}  {:>5}  {:<22} {DIM}{}{RESET}\n",
                severity_tag(&diag.severity),
                percent(diag.score),
                diag.rule_id,
                diag.location
            ));
            out.push_str(&format!("              {}\n", diag.message));
        }
    }
    out.push('\n');

    if options.show_entities {
        out.push_str(&format!("{BOLD}ENTITIES{RESET}\n"));
        for entity in &report.entities {
            let indicator = match entity.status {
                EntityStatus::Scored => percent(entity.score),
                EntityStatus::Unscored => "-".to_string(),
                EntityStatus::Malformed => "!".to_string(),
            };
            out.push_str(&format!(
                "  {:>5}  {:<9} {}",
                indicator,
                entity.kind.to_string(),
                entity.name
            ));
            if let Some(compound) = entity.compound_score {
                out.push_str(&format!("  {DIM}(compound {}){RESET}", percent(compound)));
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if !report.failures.is_empty() || !report.malformed.is_empty() {
        out.push_str(&format!("{BOLD}PROBLEMS{RESET}\n"));
        for failure in &report.failures {
            out.push_str(&format!("  \x1b[31m{}{RESET}\n", failure));
        }
        for malformed in &report.malformed {
            out.push_str(&format!("  \x1b[33m{}{RESET}\n", malformed));
        }
        out.push('\n');
    }

    Ok(out)
}

fn percent(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

/// Format score with color
fn format_score(score: f64) -> String {
    let color = if score < 0.2 {
        "\x1b[32m"
    } else if score < 0.5 {
        "\x1b[33m"
    } else {
        "\x1b[31m"
    };
    format!("{color}{BOLD}{}{RESET}", percent(score))
}
