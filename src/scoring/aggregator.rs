//! Aggregation of rule results into a report
//!
//! Results are keyed by `(node id, rule slot)`, so merging two collectors is
//! a map union that is associative, commutative and blind to the order in
//! which pairs were evaluated. Workers each fill their own [`Collector`]; the
//! engine merges them at the join point.

use crate::error::{MalformedScopeNodeError, RuleEvaluationError};
use crate::evaluator::{Evaluation, RuleResult};
use crate::models::{EntityScore, EntityStatus, Report, ReportSummary};
use crate::rules::RuleRegistry;
use crate::scope::{NodeId, ScopeKind, ScopeTree};
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Where a result sorts among the rules of one node
///
/// Registered rules come first in registration order, then results for ids
/// the registry does not know, by id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum RuleSlot {
    Registered(usize),
    Unregistered(String),
}

type PairKey = (NodeId, RuleSlot);

/// Per-worker buffer of evaluation outcomes
#[derive(Debug, Clone, Default)]
pub struct Collector {
    results: BTreeMap<PairKey, RuleResult>,
    failures: BTreeMap<PairKey, RuleEvaluationError>,
    not_applicable: usize,
    skipped: usize,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of the rule registered at `rule_position`
    pub fn record(&mut self, rule_position: usize, evaluation: Evaluation) {
        self.record_in(RuleSlot::Registered(rule_position), evaluation);
    }

    fn record_in(&mut self, slot: RuleSlot, evaluation: Evaluation) {
        match evaluation {
            Evaluation::Scored(result) => {
                insert_result(&mut self.results, (result.node_id, slot), result);
            }
            Evaluation::Failed(error) => {
                insert_failure(&mut self.failures, (error.node_id, slot), error);
            }
            Evaluation::NotApplicable => self.not_applicable += 1,
        }
    }

    /// Count a pair that was never started
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Union of two collectors
    pub fn merge(mut self, other: Collector) -> Collector {
        for (key, result) in other.results {
            insert_result(&mut self.results, key, result);
        }
        for (key, error) in other.failures {
            insert_failure(&mut self.failures, key, error);
        }
        self.not_applicable += other.not_applicable;
        self.skipped += other.skipped;
        self
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Two results for one pair: the worse one stays
fn insert_result(map: &mut BTreeMap<PairKey, RuleResult>, key: PairKey, result: RuleResult) {
    match map.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(result);
        }
        Entry::Occupied(mut slot) => {
            if outranks(&result, slot.get()) {
                slot.insert(result);
            }
        }
    }
}

fn outranks(a: &RuleResult, b: &RuleResult) -> bool {
    a.score
        .total_cmp(&b.score)
        .then_with(|| a.raw_value.total_cmp(&b.raw_value))
        .then_with(|| a.message.cmp(&b.message))
        == Ordering::Greater
}

/// Two failures for one pair: the smallest cause stays
fn insert_failure(
    map: &mut BTreeMap<PairKey, RuleEvaluationError>,
    key: PairKey,
    error: RuleEvaluationError,
) {
    match map.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(error);
        }
        Entry::Occupied(mut slot) => {
            if error.cause < slot.get().cause {
                slot.insert(error);
            }
        }
    }
}

/// Builds reports for one scope tree
pub struct Aggregator<'a> {
    tree: &'a ScopeTree,
    registry: &'a RuleRegistry,
}

impl<'a> Aggregator<'a> {
    pub fn new(tree: &'a ScopeTree, registry: &'a RuleRegistry) -> Self {
        Self { tree, registry }
    }

    /// Aggregate loose rule results, e.g. ones produced outside the engine
    pub fn aggregate(&self, results: impl IntoIterator<Item = RuleResult>) -> Report {
        let mut collector = Collector::new();
        let mut pairs = 0;
        for result in results {
            let slot = match self.registry.position(&result.rule_id) {
                Some(position) => RuleSlot::Registered(position),
                None => RuleSlot::Unregistered(result.rule_id.clone()),
            };
            collector.record_in(slot, Evaluation::Scored(result));
            pairs += 1;
        }
        self.finish(collector, Vec::new(), pairs)
    }

    /// Turn collected outcomes into an immutable report
    pub fn finish(
        &self,
        collector: Collector,
        mut malformed: Vec<MalformedScopeNodeError>,
        pairs_total: usize,
    ) -> Report {
        malformed.sort_by_key(|m| m.node_id);
        malformed.dedup_by_key(|m| m.node_id);

        let node_count = self.tree.len();
        let mut sums = vec![0.0_f64; node_count];
        let mut scored = vec![0usize; node_count];
        let mut failed = vec![0usize; node_count];

        // BTreeMap iteration gives a fixed summation order
        for ((node, _), result) in &collector.results {
            if let Some(i) = index_of(*node, node_count) {
                sums[i] += result.score;
                scored[i] += 1;
            }
        }
        for (node, _) in collector.failures.keys() {
            if let Some(i) = index_of(*node, node_count) {
                failed[i] += 1;
            }
        }

        let mut entities: Vec<EntityScore> = self
            .tree
            .nodes()
            .map(|node| {
                let i = node.id.index();
                let status = if malformed.binary_search_by_key(&node.id, |m| m.node_id).is_ok() {
                    EntityStatus::Malformed
                } else if scored[i] > 0 {
                    EntityStatus::Scored
                } else {
                    EntityStatus::Unscored
                };
                let score = if status == EntityStatus::Scored {
                    sums[i] / scored[i] as f64
                } else {
                    0.0
                };
                EntityScore {
                    node_id: node.id,
                    kind: node.kind,
                    name: node.display_name(),
                    location: node.location.clone(),
                    score,
                    status,
                    rules_scored: scored[i],
                    rules_failed: failed[i],
                    compound_score: None,
                }
            })
            .collect();

        for i in 0..entities.len() {
            if matches!(entities[i].kind, ScopeKind::Module | ScopeKind::Class) {
                let compound = self.compound_score(entities[i].node_id, &entities);
                entities[i].compound_score = compound;
            }
        }

        let scored_entities: Vec<f64> = entities
            .iter()
            .filter(|e| e.status == EntityStatus::Scored)
            .map(|e| e.score)
            .collect();
        let project_score = mean(&scored_entities);

        let results: Vec<RuleResult> = collector.results.into_values().collect();
        let failures: Vec<RuleEvaluationError> = collector.failures.into_values().collect();

        let summary = ReportSummary {
            nodes: node_count,
            scored_entities: scored_entities.len(),
            unscored_entities: entities
                .iter()
                .filter(|e| e.status == EntityStatus::Unscored)
                .count(),
            malformed_nodes: malformed.len(),
            results: results.len(),
            failures: failures.len(),
            pairs_total,
            pairs_skipped: collector.skipped,
        };

        debug!(
            "Aggregated {} results, {} failures, {} not applicable",
            summary.results, summary.failures, collector.not_applicable
        );
        info!(
            "Project score: {:.3} over {} scored entities",
            project_score, summary.scored_entities
        );

        let mut report = Report {
            project_score,
            complete: collector.skipped == 0,
            summary,
            results,
            entities,
            failures,
            malformed,
            fingerprint: String::new(),
        };
        report.fingerprint = report.compute_fingerprint();
        report
    }

    /// `1 - Π(1 - s)` over scored function descendants, in node id order
    fn compound_score(&self, node: NodeId, entities: &[EntityScore]) -> Option<f64> {
        let mut functions: Vec<NodeId> = self
            .tree
            .descendants(node)
            .into_iter()
            .filter(|id| {
                entities.get(id.index()).is_some_and(|e| {
                    e.kind == ScopeKind::Function && e.status == EntityStatus::Scored
                })
            })
            .collect();
        if functions.is_empty() {
            return None;
        }
        functions.sort();

        let clean: f64 = functions
            .iter()
            .map(|id| 1.0 - entities[id.index()].score)
            .product();
        Some((1.0 - clean).clamp(0.0, 1.0))
    }
}

fn index_of(node: NodeId, len: usize) -> Option<usize> {
    let i = node.index();
    (i < len).then_some(i)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
