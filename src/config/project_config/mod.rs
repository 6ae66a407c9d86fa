//! Project-level configuration support
//!
//! Loads per-project configuration from `splinter.toml` or
//! `.splinterrc.json`, searched next to the scanned input.
//!
//! # Configuration Format
//!
//! ```toml
//! # splinter.toml
//!
//! [rules.too-many-calls]
//! threshold = 8
//! eps = 0
//! enabled = true
//!
//! [rules.naming-convention]
//! enabled = false
//!
//! [report]
//! warning_threshold = 0.5
//!
//! [defaults]
//! format = "text"
//! workers = 8
//! fail_on = 0.9
//! ```
//!
//! Applying a configuration is best-effort: unknown rules, unknown
//! parameters and unusable values are reported as warnings and skipped.

use crate::error::ConfigWarning;
use crate::reporters::DEFAULT_WARNING_THRESHOLD;
use crate::rules::RuleRegistry;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// File names searched for, in order
pub const CONFIG_FILE_NAMES: &[&str] = &["splinter.toml", ".splinterrc.json"];

/// Project-level configuration loaded from splinter.toml or similar
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProjectConfig {
    /// Per-rule overrides, keyed by rule name in any common casing
    #[serde(default)]
    pub rules: BTreeMap<String, RuleConfigOverride>,

    /// Reporting options
    #[serde(default)]
    pub report: ReportConfig,

    /// Default CLI flags
    #[serde(default)]
    pub defaults: CliDefaults,
}

/// Configuration override for a specific rule
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuleConfigOverride {
    /// Whether the rule is enabled (default: unchanged)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Parameter overrides (`threshold`, `eps`, or rule-specific keys)
    #[serde(flatten)]
    pub parameters: BTreeMap<String, ThresholdValue>,
}

/// A parameter value as written in the file
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ThresholdValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl ThresholdValue {
    /// Get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ThresholdValue::Integer(v) => Some(*v as f64),
            ThresholdValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ThresholdValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdValue::Integer(v) => write!(f, "{}", v),
            ThresholdValue::Float(v) => write!(f, "{}", v),
            ThresholdValue::Boolean(v) => write!(f, "{}", v),
            ThresholdValue::String(v) => write!(f, "\"{}\"", v),
        }
    }
}

/// Reporting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Results scoring below this are not reported (default: 0.5)
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            warning_threshold: default_warning_threshold(),
        }
    }
}

fn default_warning_threshold() -> f64 {
    DEFAULT_WARNING_THRESHOLD
}

/// Default CLI flags that can be set in project config
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliDefaults {
    /// Default output format (text, json, markdown)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Default number of workers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Exit non-zero when any result scores at or above this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_on: Option<f64>,
}

/// Load project configuration from the directory holding the input.
///
/// Searches for configuration files in this order:
/// 1. `splinter.toml`
/// 2. `.splinterrc.json`
///
/// Returns default configuration if no config file is found or none of the
/// found files parse.
pub fn load_project_config(dir: &Path) -> ProjectConfig {
    for name in CONFIG_FILE_NAMES {
        let path = dir.join(name);
        if !path.exists() {
            continue;
        }
        match ProjectConfig::load(&path) {
            Ok(config) => {
                debug!("Loaded project config from {}", path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {:#}", path.display(), e);
            }
        }
    }

    debug!("No project config found, using defaults");
    ProjectConfig::default()
}

impl ProjectConfig {
    /// Load a configuration file, picking the parser from its extension
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let config = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?
        };
        Ok(config)
    }

    /// Override for a rule, matching any casing of its name
    pub fn rule(&self, name: &str) -> Option<&RuleConfigOverride> {
        let normalized = normalize_rule_name(name);
        self.rules
            .iter()
            .find(|(key, _)| normalize_rule_name(key) == normalized)
            .map(|(_, value)| value)
    }

    /// Apply rule overrides to `registry`, collecting what was skipped
    pub fn apply_to(&self, registry: &mut RuleRegistry) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for (name, rule_config) in &self.rules {
            let id = normalize_rule_name(name);
            if registry.get(&id).is_none() {
                warn!("Config names unknown rule '{}'", name);
                warnings.push(ConfigWarning::UnknownRule(name.clone()));
                continue;
            }

            if let Some(enabled) = rule_config.enabled {
                if registry.set_enabled(&id, enabled).is_ok() {
                    debug!("Rule {} enabled = {}", id, enabled);
                }
            }

            let mut parameters = BTreeMap::new();
            for (key, value) in &rule_config.parameters {
                match value.as_f64() {
                    Some(v) => {
                        parameters.insert(key.clone(), v);
                    }
                    None => warnings.push(ConfigWarning::InvalidValue {
                        rule: id.clone(),
                        key: key.clone(),
                        reason: format!("{} is not a number", value),
                    }),
                }
            }
            if parameters.is_empty() {
                continue;
            }
            match registry.configure(&id, &parameters) {
                Ok(more) => warnings.extend(more),
                Err(_) => warnings.push(ConfigWarning::UnknownRule(id.clone())),
            }
        }

        warnings
    }
}

impl RuleRegistry {
    /// Apply a project configuration; see [`ProjectConfig::apply_to`]
    pub fn apply_config(&mut self, config: &ProjectConfig) -> Vec<ConfigWarning> {
        config.apply_to(self)
    }
}

/// Normalize rule name for config lookup
/// Converts various formats to kebab-case for matching
pub fn normalize_rule_name(name: &str) -> String {
    // TooManyCalls -> too-many-calls
    // too_many_calls -> too-many-calls
    // too-many-calls -> too-many-calls

    let mut result = String::new();
    let chars: Vec<char> = name.trim().chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            // Add hyphen if:
            // 1. Not first char AND previous is lowercase (e.g., tooMany -> too-many)
            // 2. Not first char AND previous is uppercase AND next is lowercase
            //    (e.g., IOCalls -> io-calls)
            let prev_is_lower = i > 0 && chars[i - 1].is_lowercase();
            let is_acronym_end = i > 0
                && chars[i - 1].is_uppercase()
                && i + 1 < chars.len()
                && chars[i + 1].is_lowercase();

            if prev_is_lower || is_acronym_end {
                result.push('-');
            }
            result.extend(c.to_lowercase());
        } else if *c == '_' {
            result.push('-');
        } else {
            result.push(*c);
        }
    }

    // Remove common suffixes
    result.trim_end_matches("-rule").to_string()
}
