//! Configuration module for splinter
//!
//! This module handles:
//! - Project-level configuration (splinter.toml)
//! - Rule parameter overrides and enable flags
//! - CLI defaults

mod project_config;

pub use project_config::{
    load_project_config, normalize_rule_name, CliDefaults, ProjectConfig, ReportConfig,
    RuleConfigOverride, ThresholdValue, CONFIG_FILE_NAMES,
};
