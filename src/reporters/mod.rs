//! Output reporters for scan results
//!
//! Supports multiple output formats:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON (report plus diagnostics)
//! - `markdown` - GitHub-flavored Markdown

mod json;
mod markdown;
mod text;

use crate::models::{Diagnostic, Report};
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Default cut-off for reporting a result
pub const DEFAULT_WARNING_THRESHOLD: f64 = 0.5;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(anyhow!(
                "Unknown format '{}'. Valid formats: text, json, markdown",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Knobs shared by every renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Results scoring below this are not reported
    pub warning_threshold: f64,
    /// Also list per-entity scores
    pub show_entities: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            show_entities: false,
        }
    }
}

/// Results at or above `warning_threshold`, worst first
///
/// Ties break on location, then rule id, then node id, so the order is
/// fully determined by the report.
pub fn diagnostics(report: &Report, warning_threshold: f64) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = report
        .results
        .iter()
        .filter(|r| r.score >= warning_threshold)
        .map(Diagnostic::from)
        .collect();

    diagnostics.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.location.cmp(&b.location))
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    diagnostics
}

/// Render a report in the specified format
pub fn report(report: &Report, format: &str, options: &RenderOptions) -> Result<String> {
    let fmt = OutputFormat::from_str(format)?;
    report_with_format(report, fmt, options)
}

/// Render a report using an OutputFormat enum
pub fn report_with_format(
    report: &Report,
    format: OutputFormat,
    options: &RenderOptions,
) -> Result<String> {
    let diagnostics = diagnostics(report, options.warning_threshold);
    match format {
        OutputFormat::Text => text::render(report, &diagnostics, options),
        OutputFormat::Json => json::render(report, &diagnostics),
        OutputFormat::Markdown => markdown::render(report, &diagnostics, options),
    }
}

/// Get the recommended file extension for a format
pub fn file_extension(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Text => "txt",
        OutputFormat::Json => "json",
        OutputFormat::Markdown => "md",
    }
}
