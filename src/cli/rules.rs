//! Rules command - list the registry with effective parameters

use super::scan::build_registry;
use anyhow::Result;
use console::style;
use splinter::config::{load_project_config, ProjectConfig};
use splinter::rules::{format_number, PARAM_EPS, PARAM_THRESHOLD};
use std::path::Path;

/// Run the rules command
pub(super) fn run(config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => ProjectConfig::load(path)?,
        None => load_project_config(Path::new(".")),
    };
    let registry = build_registry(&config, &[])?;

    println!(
        "\n{}  ({} registered)\n",
        style("Rules").bold(),
        registry.len()
    );
    for rule in registry.iter() {
        let status = if rule.is_enabled() {
            style("on ").green()
        } else {
            style("off").dim()
        };
        let kinds: Vec<String> = rule.kinds().iter().map(|k| k.to_string()).collect();
        let extra: Vec<String> = rule
            .parameters()
            .iter()
            .filter(|(k, _)| k.as_str() != PARAM_THRESHOLD && k.as_str() != PARAM_EPS)
            .map(|(k, v)| format!("{}={}", k, format_number(*v)))
            .collect();

        println!(
            "  {} {:<22} threshold={:<4} eps={:<4} {}",
            status,
            style(rule.id()).cyan(),
            format_number(rule.threshold()),
            format_number(rule.eps()),
            style(kinds.join(", ")).dim()
        );
        if !extra.is_empty() {
            println!("      {}", extra.join(" "));
        }
        if !rule.description().is_empty() {
            println!("      {}", rule.description());
        }
    }
    println!();

    Ok(())
}
