//! Error types for the scoring engine
//!
//! Registry errors are configuration-time and fatal only to the call that
//! raised them. Evaluation and malformed-node errors are scan-time: they are
//! recorded in the report and never abort a scan.

use crate::scope::{NodeId, ScopeKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Misuse of the rule registry API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Rule '{0}' is already registered")]
    DuplicateRule(String),

    #[error("Unknown rule '{0}'")]
    UnknownRule(String),
}

/// Why a rule could not measure a node
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasureError {
    #[error("missing attribute '{0}'")]
    MissingAttribute(String),

    #[error("attribute '{key}' is not {expected}")]
    InvalidAttribute { key: String, expected: &'static str },

    #[error("raw value {0} is not a finite number")]
    NonFinite(f64),

    #[error("{0}")]
    Other(String),
}

/// A single (rule, node) pair that failed to evaluate
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Rule '{rule_id}' failed on node {node_id}: {cause}")]
pub struct RuleEvaluationError {
    pub rule_id: String,
    pub node_id: NodeId,
    pub cause: String,
}

/// A node lacking the attributes its kind requires; skipped for every rule
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} node {node_id} is missing required attribute '{missing}'")]
pub struct MalformedScopeNodeError {
    pub node_id: NodeId,
    pub kind: ScopeKind,
    pub missing: String,
}

/// Errors raised while building or loading a scope tree
#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Unknown parent node {0}")]
    UnknownParent(NodeId),

    #[error("A {child} node cannot be nested inside a {parent} node")]
    InvalidNesting { parent: ScopeKind, child: ScopeKind },

    #[error("Failed to parse scope tree: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that prevent a scan from starting at all
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Non-fatal problem found while applying configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    UnknownRule(String),
    UnknownParameter { rule: String, key: String },
    InvalidValue { rule: String, key: String, reason: String },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::UnknownRule(rule) => write!(f, "unknown rule '{}' ignored", rule),
            ConfigWarning::UnknownParameter { rule, key } => {
                write!(f, "rule '{}' has no parameter '{}', ignored", rule, key)
            }
            ConfigWarning::InvalidValue { rule, key, reason } => {
                write!(f, "rule '{}' parameter '{}' ignored: {}", rule, key, reason)
            }
        }
    }
}
