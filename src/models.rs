//! Core data models for splinter
//!
//! These models are the structured output of a scan: the report, per-entity
//! scores and the diagnostics the reporters render.

use crate::error::{MalformedScopeNodeError, RuleEvaluationError};
use crate::evaluator::RuleResult;
use crate::scope::{Location, NodeId, ScopeKind};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Severity buckets for diagnostics, derived from the normalized score
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 0.9 => Severity::Critical,
            s if s >= 0.7 => Severity::High,
            s if s >= 0.4 => Severity::Medium,
            s if s >= 0.2 => Severity::Low,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Whether an entity received a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    /// At least one rule produced a score
    Scored,
    /// No rule produced a score; the entity score is 0
    Unscored,
    /// Skipped for every rule because required attributes are missing
    Malformed,
}

/// Aggregate score of one scope node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityScore {
    pub node_id: NodeId,
    pub kind: ScopeKind,
    pub name: String,
    pub location: Location,
    /// Mean of this node's rule scores (0 when unscored)
    pub score: f64,
    pub status: EntityStatus,
    /// Number of rules that produced a score
    pub rules_scored: usize,
    /// Number of rules that failed on this node
    pub rules_failed: usize,
    /// Severity rolled up from function descendants (modules and classes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compound_score: Option<f64>,
}

/// Counters describing one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub nodes: usize,
    pub scored_entities: usize,
    pub unscored_entities: usize,
    pub malformed_nodes: usize,
    pub results: usize,
    pub failures: usize,
    /// (rule, node) pairs selected for evaluation
    pub pairs_total: usize,
    /// Pairs never started because the scan was cancelled
    pub pairs_skipped: usize,
}

/// Deterministic output of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Mean of scored entity scores, one weight per entity
    pub project_score: f64,
    /// False when the scan was cancelled before every pair ran
    pub complete: bool,
    pub summary: ReportSummary,
    /// Ordered by node id, then rule registration order
    pub results: Vec<RuleResult>,
    /// One entry per scope node, in node id order
    pub entities: Vec<EntityScore>,
    pub failures: Vec<RuleEvaluationError>,
    pub malformed: Vec<MalformedScopeNodeError>,
    /// xxh3 digest of the fields above
    pub fingerprint: String,
}

impl Report {
    /// Digest of everything except the fingerprint itself
    pub fn compute_fingerprint(&self) -> String {
        let content = (
            self.project_score,
            self.complete,
            &self.summary,
            &self.results,
            &self.entities,
            &self.failures,
            &self.malformed,
        );
        let bytes = serde_json::to_vec(&content).unwrap_or_default();
        format!("{:016x}", xxh3_64(&bytes))
    }

    pub fn entity(&self, node_id: NodeId) -> Option<&EntityScore> {
        self.entities
            .binary_search_by_key(&node_id, |e| e.node_id)
            .ok()
            .map(|i| &self.entities[i])
    }

    pub fn results_for(&self, node_id: NodeId) -> impl Iterator<Item = &RuleResult> {
        self.results.iter().filter(move |r| r.node_id == node_id)
    }
}

/// One reportable rule result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub rule_id: String,
    pub node_id: NodeId,
    pub kind: ScopeKind,
    pub name: String,
    pub message: String,
    pub location: Location,
    pub raw_value: f64,
    pub threshold: f64,
    pub score: f64,
    pub severity: Severity,
}

impl From<&RuleResult> for Diagnostic {
    fn from(result: &RuleResult) -> Self {
        Self {
            rule_id: result.rule_id.clone(),
            node_id: result.node_id,
            kind: result.kind,
            name: result.name.clone(),
            message: result.message.clone(),
            location: result.location.clone(),
            raw_value: result.raw_value,
            threshold: result.threshold,
            score: result.score,
            severity: Severity::from_score(result.score),
        }
    }
}
