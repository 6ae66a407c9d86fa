//! Splinter - rule-based static scoring engine
//!
//! Walks an already-built scope tree (module → class → function → call site),
//! evaluates a registry of independent measurement rules against every
//! matching node, and aggregates the normalized scores into a deterministic
//! report.
//!
//! ```text
//! ScopeTree ──▶ RuleRegistry ──▶ evaluate() ──▶ Aggregator ──▶ reporters
//!                                   ▲
//!                              ScanEngine (rayon)
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod reporters;
pub mod rules;
pub mod scope;
pub mod scoring;

pub use engine::{CancelToken, ScanEngine, ScanEngineBuilder};
pub use error::{
    ConfigWarning, MalformedScopeNodeError, MeasureError, RegistryError, RuleEvaluationError,
    ScanError, ScopeError,
};
pub use evaluator::{evaluate, normalize, Evaluation, RuleResult};
pub use models::{Diagnostic, EntityScore, EntityStatus, Report, Severity};
pub use rules::{Rule, RuleRegistry};
pub use scope::{Location, NewNode, NodeId, NodeView, ScopeKind, ScopeNode, ScopeTree};
pub use scoring::{Aggregator, Collector};
