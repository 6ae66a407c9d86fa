//! Scan engine with parallel evaluation
//!
//! The ScanEngine drives the evaluator over every (rule, node) pair:
//! - Validates nodes and sets malformed ones aside
//! - Pairs each remaining node with the enabled rules for its kind
//! - Evaluates pairs in parallel on a rayon pool, one collector per worker
//! - Merges collectors at the join point and aggregates a report
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      ScanEngine                         │
//! ├─────────────────────────────────────────────────────────┤
//! │  1. Validate nodes (malformed → skipped for all rules)  │
//! │  2. Plan (rule, node) pairs in registry order           │
//! │  3. Evaluate in parallel (rayon fold)                   │
//! │  4. Merge per-worker collectors (rayon reduce)          │
//! │  5. Aggregate into a Report                             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Cancellation and deadlines are checked before each pair starts. A pair
//! that never starts is counted as skipped; the report is still complete in
//! structure, just marked partial.

use crate::error::{MalformedScopeNodeError, ScanError};
use crate::evaluator::evaluate;
use crate::models::Report;
use crate::rules::RuleRegistry;
use crate::scope::{NodeId, ScopeTree};
use crate::scoring::{Aggregator, Collector};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Progress callback: (pairs completed, pairs total)
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Shared flag that stops a running scan from starting new pairs
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Work selected for one scan
#[derive(Debug, Clone, Default)]
pub struct ScanPlan {
    /// (rule registration index, node) pairs, node-major
    pub pairs: Vec<(usize, NodeId)>,
    pub malformed: Vec<MalformedScopeNodeError>,
}

/// Orchestrates rule evaluation over a scope tree
pub struct ScanEngine {
    /// Number of worker threads for parallel execution
    workers: usize,
    /// Progress callback for reporting execution status
    progress_callback: Option<ProgressCallback>,
    cancel: CancelToken,
    /// Pairs are not started after this instant
    deadline: Option<Instant>,
}

impl ScanEngine {
    /// Create a new scan engine
    ///
    /// # Arguments
    /// * `workers` - Number of worker threads (0 = auto-detect)
    pub fn new(workers: usize) -> Self {
        let actual_workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
                .min(16) // Cap at 16 threads
        } else {
            workers
        };

        Self {
            workers: actual_workers,
            progress_callback: None,
            cancel: CancelToken::new(),
            deadline: None,
        }
    }

    /// Set a progress callback
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Share a cancellation token with the caller
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Stop submitting pairs once `deadline` has passed
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Select the (rule, node) pairs a scan will evaluate
    pub fn plan(&self, registry: &RuleRegistry, tree: &ScopeTree) -> ScanPlan {
        let mut plan = ScanPlan::default();
        for node in tree.nodes() {
            if let Err(e) = node.validate() {
                warn!("Skipping node: {}", e);
                plan.malformed.push(e);
                continue;
            }
            plan.pairs.extend(
                registry
                    .rules_for_kind(node.kind)
                    .map(|(position, _)| (position, node.id)),
            );
        }
        plan
    }

    /// Evaluate every applicable rule against every node and aggregate
    pub fn scan(&self, registry: &RuleRegistry, tree: &ScopeTree) -> Result<Report, ScanError> {
        let start = Instant::now();
        let plan = self.plan(registry, tree);
        let total = plan.pairs.len();
        info!(
            "Starting scan: {} rules, {} nodes, {} pairs on {} workers",
            registry.len(),
            tree.len(),
            total,
            self.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;

        let completed = AtomicUsize::new(0);
        let collector = pool.install(|| {
            plan.pairs
                .par_iter()
                .fold(Collector::new, |mut collector, &(position, node_id)| {
                    if self.should_stop() {
                        collector.record_skipped();
                        return collector;
                    }
                    match (registry.rule_at(position), tree.view(node_id)) {
                        (Some(rule), Some(view)) => {
                            collector.record(position, evaluate(rule, view))
                        }
                        _ => collector.record_skipped(),
                    }

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(done, total);
                    }
                    collector
                })
                .reduce(Collector::new, Collector::merge)
        });

        if collector.skipped() > 0 {
            warn!(
                "Scan stopped early: {} of {} pairs skipped",
                collector.skipped(),
                total
            );
        }
        debug!("Evaluation finished in {:?}", start.elapsed());

        let report = Aggregator::new(tree, registry).finish(collector, plan.malformed, total);
        info!(
            "Scan complete: {} results, {} failures in {:?}",
            report.summary.results,
            report.summary.failures,
            start.elapsed()
        );
        Ok(report)
    }

    fn should_stop(&self) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.cancel.cancel();
            return true;
        }
        false
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Builder for ScanEngine with fluent API
#[derive(Default)]
pub struct ScanEngineBuilder {
    workers: usize,
    progress_callback: Option<ProgressCallback>,
    cancel: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl ScanEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of worker threads
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set progress callback
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Build the engine
    pub fn build(self) -> ScanEngine {
        let mut engine = ScanEngine::new(self.workers);
        if let Some(callback) = self.progress_callback {
            engine = engine.with_progress_callback(callback);
        }
        if let Some(token) = self.cancel {
            engine = engine.with_cancel_token(token);
        }
        if let Some(deadline) = self.deadline {
            engine = engine.with_deadline(deadline);
        }
        engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityStatus;
    use crate::rules::Rule;
    use crate::scope::{NewNode, ScopeKind};
    use std::time::Duration;

    fn sample() -> (ScopeTree, RuleRegistry) {
        let mut tree = ScopeTree::new();
        let module = tree.add_root(NewNode::module("app"));
        for (name, calls) in [("small", 1), ("medium", 6), ("large", 30)] {
            let f = tree.add_child(module, NewNode::function(name)).unwrap();
            for i in 0..calls {
                tree.add_child(f, NewNode::call(&format!("callee_{}", i))).unwrap();
            }
        }

        let mut registry = RuleRegistry::new();
        registry
            .register(
                Rule::new("too-many-calls", &[ScopeKind::Function], |node| {
                    Ok(Some(node.children_of_kind(ScopeKind::CallSite).count() as f64))
                })
                .with_threshold(3.0),
            )
            .unwrap();
        (tree, registry)
    }

    #[test]
    fn test_engine_creation() {
        let engine = ScanEngine::new(4);
        assert_eq!(engine.workers(), 4);
    }

    #[test]
    fn test_engine_default_workers() {
        let engine = ScanEngine::new(0);
        assert!(engine.workers() > 0);
        assert!(engine.workers() <= 16);
    }

    #[test]
    fn test_plan_skips_malformed_nodes() {
        let (mut tree, registry) = sample();
        let root = tree.roots()[0];
        tree.add_child(root, NewNode::new(ScopeKind::Function)).unwrap();

        let plan = ScanEngine::new(1).plan(&registry, &tree);
        assert_eq!(plan.pairs.len(), 3);
        assert_eq!(plan.malformed.len(), 1);
    }

    #[test]
    fn test_scan_scores_functions() {
        let (tree, registry) = sample();
        let report = ScanEngine::new(2).scan(&registry, &tree).unwrap();
        assert!(report.complete);
        assert_eq!(report.results.len(), 3);
        let medium = report.results.iter().find(|r| r.name == "medium").unwrap();
        assert!((medium.score - 0.5).abs() < 1e-12);
        // the module has no applicable rule; call sites neither
        let module = report.entity(tree.roots()[0]).unwrap();
        assert_eq!(module.status, EntityStatus::Unscored);
    }

    #[test]
    fn test_worker_count_does_not_change_report() {
        let (tree, registry) = sample();
        let one = ScanEngine::new(1).scan(&registry, &tree).unwrap();
        let many = ScanEngine::new(8).scan(&registry, &tree).unwrap();
        assert_eq!(one, many);
        assert_eq!(one.fingerprint, many.fingerprint);
    }

    #[test]
    fn test_cancelled_scan_is_partial_but_consistent() {
        let (tree, registry) = sample();
        let token = CancelToken::new();
        token.cancel();
        let report = ScanEngineBuilder::new()
            .workers(2)
            .cancel_token(token)
            .build()
            .scan(&registry, &tree)
            .unwrap();
        assert!(!report.complete);
        assert_eq!(report.summary.pairs_skipped, report.summary.pairs_total);
        assert!(report.results.is_empty());
        assert_eq!(report.entities.len(), tree.len());
        assert_eq!(report.project_score, 0.0);
    }

    #[test]
    fn test_expired_deadline_skips_everything() {
        let (tree, registry) = sample();
        let past = Instant::now() - Duration::from_millis(1);
        let engine = ScanEngine::new(1).with_deadline(past);
        let report = engine.scan(&registry, &tree).unwrap();
        assert!(!report.complete);
        assert!(engine.cancel_token().is_cancelled());
    }

    #[test]
    fn test_progress_callback_sees_every_pair() {
        let (tree, registry) = sample();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = Arc::clone(&seen);
        let engine = ScanEngine::new(2).with_progress_callback(Box::new(move |_, total| {
            assert_eq!(total, 3);
            seen_cb.fetch_add(1, Ordering::SeqCst);
        }));
        engine.scan(&registry, &tree).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
