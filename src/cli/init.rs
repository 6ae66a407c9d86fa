//! Init command - write an example splinter.toml

use anyhow::{Context, Result};
use console::style;
use splinter::reporters::DEFAULT_WARNING_THRESHOLD;
use splinter::rules::{format_number, RuleRegistry};
use std::fmt::Write as _;
use std::path::Path;

/// Run the init command
pub(super) fn run(path: &Path) -> Result<()> {
    let dir = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;

    if !dir.is_dir() {
        anyhow::bail!("Path is not a directory: {}", dir.display());
    }

    let config_path = dir.join("splinter.toml");
    if config_path.exists() {
        println!(
            "{} Already initialized at {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
        return Ok(());
    }

    std::fs::write(&config_path, example_config())
        .with_context(|| format!("Failed to create {}", config_path.display()))?;
    println!(
        "{} Created {}",
        style("✓").green(),
        style(config_path.display()).cyan()
    );

    println!("\nNext steps:");
    println!("  {} Score a scope tree", style("splinter scan scope.json").cyan());
    println!("  {} Review rule parameters", style("splinter rules").cyan());

    Ok(())
}

/// Example config listing every built-in rule at its default parameters
fn example_config() -> String {
    let mut out = String::from(
        "# Splinter configuration\n\
         # Rule names accept kebab-case, snake_case or PascalCase.\n\n",
    );

    for rule in RuleRegistry::with_builtin_rules().iter() {
        let _ = writeln!(out, "# {}", rule.description());
        let _ = writeln!(out, "[rules.{}]", rule.id());
        for (key, value) in rule.parameters() {
            let _ = writeln!(out, "{} = {}", key, format_number(*value));
        }
        let _ = writeln!(out, "enabled = {}\n", rule.is_enabled());
    }

    let _ = writeln!(out, "[report]");
    let _ = writeln!(out, "# Results scoring below this are not reported (0-1)");
    let _ = writeln!(out, "warning_threshold = {}\n", DEFAULT_WARNING_THRESHOLD);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "format = \"text\"");
    let _ = writeln!(out, "# workers = 8");
    let _ = writeln!(out, "# fail_on = 0.9");
    out
}
