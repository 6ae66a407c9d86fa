//! JSON reporter
//!
//! Outputs the full Report plus the filtered diagnostics as pretty-printed
//! JSON. Useful for machine consumption, piping to jq, or further processing.

use crate::models::{Diagnostic, Report};
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(flatten)]
    report: &'a Report,
    diagnostics: &'a [Diagnostic],
}

/// Render report as JSON
pub fn render(report: &Report, diagnostics: &[Diagnostic]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&JsonOutput {
        report,
        diagnostics,
    })?)
}
