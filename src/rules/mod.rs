//! Rule definitions and the rule registry
//!
//! A rule is plain data: an id, the scope kinds it looks at, a parameter map
//! and a measurement closure. New rules are added by registering another
//! record, never by subclassing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      RuleRegistry                           │
//! │  - register(rule): unique ids, registration order kept      │
//! │  - rules_for(node): kind + finer applicability check        │
//! │  - configure(id, params): best-effort parameter overrides   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Rule                               │
//! │  - id, description, message template                        │
//! │  - kinds + optional `only_when` predicate                   │
//! │  - parameters: threshold, eps, extras                       │
//! │  - measure(node) -> raw value | not applicable | error      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod builtin;

pub use builtin::builtin_rules;

use crate::error::{ConfigWarning, MeasureError, RegistryError};
use crate::scope::{NodeView, ScopeKind};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const PARAM_THRESHOLD: &str = "threshold";
pub const PARAM_EPS: &str = "eps";

/// Outcome of measuring one node: a raw value, or `None` when the rule
/// does not apply to this particular node
pub type Measurement = Result<Option<f64>, MeasureError>;

/// Measurement closure shared between worker threads
pub type MeasureFn = Arc<dyn Fn(NodeView<'_>) -> Measurement + Send + Sync>;

/// Finer applicability check on top of the scope-kind match
pub type ApplicabilityFn = Arc<dyn Fn(NodeView<'_>) -> bool + Send + Sync>;

/// An independent, configurable measurement
#[derive(Clone)]
pub struct Rule {
    id: String,
    description: String,
    message: String,
    kinds: Vec<ScopeKind>,
    only_when: Option<ApplicabilityFn>,
    parameters: BTreeMap<String, f64>,
    enabled: bool,
    measure: MeasureFn,
}

impl Rule {
    /// Create a rule with `threshold = 1` and `eps = 0`
    pub fn new<F>(id: impl Into<String>, kinds: &[ScopeKind], measure: F) -> Self
    where
        F: Fn(NodeView<'_>) -> Measurement + Send + Sync + 'static,
    {
        let id = id.into();
        let mut parameters = BTreeMap::new();
        parameters.insert(PARAM_THRESHOLD.to_string(), 1.0);
        parameters.insert(PARAM_EPS.to_string(), 0.0);

        Self {
            message: format!("{{kind}} `{{name}}` violates {} ({{n}})", id),
            description: String::new(),
            id,
            kinds: kinds.to_vec(),
            only_when: None,
            parameters,
            enabled: true,
            measure: Arc::new(measure),
        }
    }

    pub fn with_threshold(self, threshold: f64) -> Self {
        self.with_parameter(PARAM_THRESHOLD, threshold)
    }

    pub fn with_eps(self, eps: f64) -> Self {
        self.with_parameter(PARAM_EPS, eps)
    }

    /// Declare an extra numeric parameter the measurement may read
    pub fn with_parameter(mut self, name: &str, value: f64) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Message template; `{kind}`, `{name}`, `{n}` and `{threshold}` are substituted
    pub fn with_message(mut self, template: impl Into<String>) -> Self {
        self.message = template.into();
        self
    }

    /// Restrict the rule to nodes matching a predicate
    pub fn only_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(NodeView<'_>) -> bool + Send + Sync + 'static,
    {
        self.only_when = Some(Arc::new(predicate));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kinds(&self) -> &[ScopeKind] {
        &self.kinds
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn parameters(&self) -> &BTreeMap<String, f64> {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    pub fn threshold(&self) -> f64 {
        self.parameter(PARAM_THRESHOLD).unwrap_or(1.0)
    }

    pub fn eps(&self) -> f64 {
        self.parameter(PARAM_EPS).unwrap_or(0.0)
    }

    pub fn matches_kind(&self, kind: ScopeKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Kind match plus the optional finer predicate
    pub fn applies_to(&self, node: NodeView<'_>) -> bool {
        self.matches_kind(node.kind) && self.only_when.as_ref().map_or(true, |p| p(node))
    }

    pub fn measure(&self, node: NodeView<'_>) -> Measurement {
        (self.measure)(node)
    }

    /// Fill in the message template for one result
    pub fn render_message(&self, node: NodeView<'_>, raw_value: f64) -> String {
        self.message
            .replace("{kind}", &capitalize(&node.kind.to_string()))
            .replace("{name}", &node.display_name())
            .replace("{n}", &format_number(raw_value))
            .replace("{threshold}", &format_number(self.threshold()))
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("kinds", &self.kinds)
            .field("parameters", &self.parameters)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Integers print without a fractional part
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{:.2}", v)
    }
}

/// Ordered collection of rules with unique ids
///
/// Registration order is the evaluation and report order for rules, so two
/// registries built the same way produce identical reports.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    index: FxHashMap<String, usize>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with every built-in rule
    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::new();
        for rule in builtin_rules() {
            // Built-in ids are distinct
            if let Err(e) = registry.register(rule) {
                warn!("Skipping built-in rule: {}", e);
            }
        }
        registry
    }

    pub fn register(&mut self, rule: Rule) -> Result<(), RegistryError> {
        if self.index.contains_key(rule.id()) {
            return Err(RegistryError::DuplicateRule(rule.id().to_string()));
        }
        debug!("Registering rule: {}", rule.id());
        self.index.insert(rule.id().to_string(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.position(id).map(|i| &self.rules[i])
    }

    /// Registration index of a rule
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn rule_at(&self, position: usize) -> Option<&Rule> {
        self.rules.get(position)
    }

    /// All rules in registration order, enabled or not
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Enabled rules that apply to `node`, in registration order
    pub fn rules_for(&self, node: NodeView<'_>) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|r| r.is_enabled() && r.applies_to(node))
            .collect()
    }

    /// Enabled rules whose kind matches, with their registration index
    pub fn rules_for_kind(&self, kind: ScopeKind) -> impl Iterator<Item = (usize, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.is_enabled() && r.matches_kind(kind))
    }

    /// Override parameters of a registered rule
    ///
    /// Fails only when the rule id is unknown, leaving the registry untouched.
    /// Keys the rule does not declare, and values that are negative or not
    /// finite, are skipped and returned as warnings.
    pub fn configure(
        &mut self,
        id: &str,
        parameters: &BTreeMap<String, f64>,
    ) -> Result<Vec<ConfigWarning>, RegistryError> {
        let position = self
            .position(id)
            .ok_or_else(|| RegistryError::UnknownRule(id.to_string()))?;
        let rule = &mut self.rules[position];

        let mut warnings = Vec::new();
        for (key, value) in parameters {
            if !rule.parameters.contains_key(key) {
                warnings.push(ConfigWarning::UnknownParameter {
                    rule: id.to_string(),
                    key: key.clone(),
                });
                continue;
            }
            if !value.is_finite() || *value < 0.0 {
                warnings.push(ConfigWarning::InvalidValue {
                    rule: id.to_string(),
                    key: key.clone(),
                    reason: format!("{} is not a finite non-negative number", value),
                });
                continue;
            }
            debug!("Rule {}: {} = {}", id, key, value);
            rule.parameters.insert(key.clone(), *value);
        }

        for warning in &warnings {
            warn!("{}", warning);
        }
        Ok(warnings)
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), RegistryError> {
        let position = self
            .position(id)
            .ok_or_else(|| RegistryError::UnknownRule(id.to_string()))?;
        self.rules[position].enabled = enabled;
        Ok(())
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rules.iter()).finish()
    }
}
