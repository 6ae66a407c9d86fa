//! Markdown reporter for GitHub-flavored Markdown output
//!
//! Generates reports suitable for pull request comments and wikis.

use super::RenderOptions;
use crate::models::{Diagnostic, EntityStatus, Report, Severity};
use anyhow::Result;

/// Render report as GitHub-flavored Markdown
pub fn render(
    report: &Report,
    diagnostics: &[Diagnostic],
    options: &RenderOptions,
) -> Result<String> {
    let mut md = String::new();

    md.push_str(&render_header(report));
    md.push('\n');

    md.push_str(&render_summary(report, diagnostics, options));
    md.push('\n');

    md.push_str(&render_diagnostics(diagnostics));
    md.push('\n');

    if options.show_entities {
        md.push_str(&render_entities(report));
        md.push('\n');
    }

    if !report.failures.is_empty() || !report.malformed.is_empty() {
        md.push_str(&render_problems(report));
        md.push('\n');
    }

    md.push_str(&render_footer(report));

    Ok(md)
}

fn render_header(report: &Report) -> String {
    let status = if report.complete { "" } else { " (partial)" };
    format!(
        "# Splinter Report{}\n\n**Project score: {}**\n",
        status,
        percent(report.project_score)
    )
}

fn render_summary(report: &Report, diagnostics: &[Diagnostic], options: &RenderOptions) -> String {
    let s = &report.summary;
    format!(
        r#"## Summary

| Metric | Value |
|--------|-------|
| Nodes | {} |
| Scored entities | {} |
| Unscored entities | {} |
| Malformed nodes | {} |
| Rule results | {} |
| Evaluation failures | {} |
| Diagnostics (≥ {}) | {} |
"#,
        s.nodes,
        s.scored_entities,
        s.unscored_entities,
        s.malformed_nodes,
        s.results,
        s.failures,
        percent(options.warning_threshold),
        diagnostics.len()
    )
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut md = String::from("## Diagnostics\n\n");

    if diagnostics.is_empty() {
        md.push_str("✅ No results above the warning threshold.\n");
        return md;
    }

    let severity_order = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    for severity in severity_order {
        let group: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .collect();
        if group.is_empty() {
            continue;
        }

        md.push_str(&format!(
            "### {} {} ({})\n\n",
            severity_emoji(&severity),
            capitalize(&severity.to_string()),
            group.len()
        ));
        md.push_str("| Score | Rule | Location | Message |\n");
        md.push_str("|-------|------|----------|---------|\n");
        for diag in &group {
            md.push_str(&format!(
                "| {} | `{}` | `{}` | {} |\n",
                percent(diag.score),
                diag.rule_id,
                diag.location,
                escape_cell(&diag.message)
            ));
        }
        md.push('\n');
    }

    md
}

fn render_entities(report: &Report) -> String {
    let mut md = String::from("## Entities\n\n");
    md.push_str("| Entity | Kind | Score | Compound |\n");
    md.push_str("|--------|------|-------|----------|\n");
    for entity in &report.entities {
        let score = match entity.status {
            EntityStatus::Scored => percent(entity.score),
            EntityStatus::Unscored => "unscored".to_string(),
            EntityStatus::Malformed => "malformed".to_string(),
        };
        let compound = entity.compound_score.map(percent).unwrap_or_default();
        md.push_str(&format!(
            "| `{}` | {} | {} | {} |\n",
            entity.name, entity.kind, score, compound
        ));
    }
    md
}

fn render_problems(report: &Report) -> String {
    let mut md = String::from("## Problems\n\n");
    for failure in &report.failures {
        md.push_str(&format!("- {}\n", escape_cell(&failure.to_string())));
    }
    for malformed in &report.malformed {
        md.push_str(&format!("- {}\n", malformed));
    }
    md
}

fn render_footer(report: &Report) -> String {
    format!("---\n\n*Report fingerprint `{}`*\n", report.fingerprint)
}

fn percent(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}

fn severity_emoji(severity: &Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔴",
        Severity::High => "🟠",
        Severity::Medium => "🟡",
        Severity::Low => "🔵",
        Severity::Info => "ℹ️",
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
    }
}
