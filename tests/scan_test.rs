//! Library-level scan tests
//!
//! Drives the full pipeline (tree → registry → engine → aggregator →
//! diagnostics) and checks the properties a report must hold regardless of
//! scheduling.

use splinter::reporters::diagnostics;
use splinter::scope::load_scope_tree;
use splinter::{
    Aggregator, CancelToken, EntityStatus, MeasureError, NewNode, NodeId, RegistryError, Report,
    Rule, RuleRegistry, ScanEngine, ScopeKind, ScopeTree,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn billing_tree() -> ScopeTree {
    load_scope_tree(&fixture("billing.json")).expect("load billing fixture")
}

fn score_of(report: &Report, name: &str, rule: &str) -> f64 {
    report
        .results
        .iter()
        .find(|r| r.name == name && r.rule_id == rule)
        .unwrap_or_else(|| panic!("no {} result for {}", rule, name))
        .score
}

#[test]
fn test_fixture_scores_match_rule_definitions() {
    let tree = billing_tree();
    let registry = RuleRegistry::with_builtin_rules();
    let report = ScanEngine::new(2).scan(&registry, &tree).unwrap();

    assert!(report.complete);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert!(report.malformed.is_empty());

    assert_eq!(score_of(&report, "processAll", "naming-convention"), 1.0);
    assert!((score_of(&report, "processAll", "too-many-calls") - 0.5).abs() < 1e-12);
    assert!((score_of(&report, "processAll", "too-many-parameters") - 2.0 / 7.0).abs() < 1e-12);
    assert!((score_of(&report, "create", "too-many-calls") - 1.0 / 6.0).abs() < 1e-12);
    assert!((score_of(&report, "send", "callback-parameters") - 0.5).abs() < 1e-12);
    assert!((score_of(&report, "InvoiceService", "shared-parameters") - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(score_of(&report, "billing", "module-size"), 0.0);

    // callback-parameters only applies when a callable parameter exists
    assert!(!report
        .results
        .iter()
        .any(|r| r.name == "__init__" && r.rule_id == "callback-parameters"));

    for result in &report.results {
        assert!((0.0..=result.max).contains(&result.score));
    }
}

#[test]
fn test_call_sites_are_unscored_entities() {
    let tree = billing_tree();
    let report = ScanEngine::new(1)
        .scan(&RuleRegistry::with_builtin_rules(), &tree)
        .unwrap();

    for entity in &report.entities {
        if entity.kind == ScopeKind::CallSite {
            assert_eq!(entity.status, EntityStatus::Unscored);
            assert_eq!(entity.score, 0.0);
        } else {
            assert_eq!(entity.status, EntityStatus::Scored, "{}", entity.name);
        }
    }
    assert_eq!(report.summary.unscored_entities, 2);
    assert_eq!(report.summary.scored_entities, tree.len() - 2);
}

#[test]
fn test_report_is_identical_across_worker_counts() {
    let tree = billing_tree();
    let registry = RuleRegistry::with_builtin_rules();

    let baseline = ScanEngine::new(1).scan(&registry, &tree).unwrap();
    for workers in [2, 4, 16] {
        let report = ScanEngine::new(workers).scan(&registry, &tree).unwrap();
        assert_eq!(report, baseline, "report differs with {} workers", workers);
        assert_eq!(report.fingerprint, baseline.fingerprint);
    }

    let again = ScanEngine::new(1).scan(&registry, &tree).unwrap();
    assert_eq!(
        serde_json::to_string(&again).unwrap(),
        serde_json::to_string(&baseline).unwrap()
    );
}

#[test]
fn test_failing_rule_does_not_disturb_others() {
    let tree = billing_tree();
    let clean = ScanEngine::new(2)
        .scan(&RuleRegistry::with_builtin_rules(), &tree)
        .unwrap();

    let mut registry = RuleRegistry::with_builtin_rules();
    registry
        .register(Rule::new("explodes", &[ScopeKind::Function], |node| {
            if node.name() == Some("create") {
                panic!("cannot measure create");
            }
            Err(MeasureError::Other("not today".into()))
        }))
        .unwrap();
    let report = ScanEngine::new(4).scan(&registry, &tree).unwrap();

    assert_eq!(report.results, clean.results);
    assert_eq!(report.failures.len(), 5);
    assert!(report.failures.iter().all(|f| f.rule_id == "explodes"));
    assert!(report
        .failures
        .iter()
        .any(|f| f.cause.contains("cannot measure create")));
    assert_eq!(report.project_score, clean.project_score);
    assert!(report.complete);
}

#[test]
fn test_three_entities_average_to_half() {
    let mut tree = ScopeTree::new();
    let module = tree.add_root(NewNode::module("m"));
    tree.add_child(module, NewNode::function("low").with_attribute("x", 2))
        .unwrap();
    tree.add_child(module, NewNode::function("mid").with_attribute("x", 6))
        .unwrap();
    tree.add_child(module, NewNode::function("high").with_attribute("y", 1))
        .unwrap();

    let mut registry = RuleRegistry::new();
    registry
        .register(
            Rule::new("x-count", &[ScopeKind::Function], |node| {
                Ok(node.get_i64("x").map(|v| v as f64))
            })
            .with_threshold(3.0),
        )
        .unwrap();
    registry
        .register(
            Rule::new("y-flag", &[ScopeKind::Function], |node| {
                Ok(node.get_i64("y").map(|v| v as f64))
            })
            .with_threshold(0.0),
        )
        .unwrap();

    let report = ScanEngine::new(3).scan(&registry, &tree).unwrap();
    let scores: Vec<f64> = report
        .entities
        .iter()
        .filter(|e| e.status == EntityStatus::Scored)
        .map(|e| e.score)
        .collect();
    assert_eq!(scores, vec![0.0, 0.5, 1.0]);
    assert!((report.project_score - 0.5).abs() < 1e-12);
    assert_eq!(report.entity(module).unwrap().status, EntityStatus::Unscored);
}

#[test]
fn test_cancelled_scan_is_empty_but_consistent() {
    let tree = billing_tree();
    let token = CancelToken::new();
    token.cancel();
    let report = ScanEngine::new(4)
        .with_cancel_token(token)
        .scan(&RuleRegistry::with_builtin_rules(), &tree)
        .unwrap();

    assert!(!report.complete);
    assert!(report.results.is_empty());
    assert!(report.failures.is_empty());
    assert_eq!(report.summary.pairs_skipped, report.summary.pairs_total);
    assert!(report.summary.pairs_total > 0);
    assert_eq!(report.entities.len(), tree.len());
    assert_eq!(report.fingerprint, report.compute_fingerprint());
}

#[test]
fn test_malformed_nodes_are_listed_and_skipped() {
    let mut tree = ScopeTree::new();
    let module = tree.add_root(NewNode::module("app"));
    let nameless = tree
        .add_child(module, NewNode::new(ScopeKind::Function))
        .unwrap();
    tree.add_child(module, NewNode::function("ok").with_parameters(&["a"]))
        .unwrap();

    let report = ScanEngine::new(2)
        .scan(&RuleRegistry::with_builtin_rules(), &tree)
        .unwrap();

    assert_eq!(report.malformed.len(), 1);
    assert_eq!(report.malformed[0].node_id, nameless);
    assert_eq!(report.malformed[0].missing, "name");
    assert_eq!(report.entity(nameless).unwrap().status, EntityStatus::Malformed);
    assert_eq!(report.results_for(nameless).count(), 0);
    assert!(report.complete);
}

#[test]
fn test_configure_unknown_rule_leaves_registry_unchanged() {
    let mut registry = RuleRegistry::with_builtin_rules();
    let before: Vec<(String, f64)> = registry
        .iter()
        .map(|r| (r.id().to_string(), r.threshold()))
        .collect();

    let mut params = BTreeMap::new();
    params.insert("threshold".to_string(), 1.0);
    assert_eq!(
        registry.configure("no-such-rule", &params),
        Err(RegistryError::UnknownRule("no-such-rule".into()))
    );

    let after: Vec<(String, f64)> = registry
        .iter()
        .map(|r| (r.id().to_string(), r.threshold()))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_reconfigured_threshold_changes_scores() {
    let tree = billing_tree();
    let mut registry = RuleRegistry::with_builtin_rules();
    let mut params = BTreeMap::new();
    params.insert("threshold".to_string(), 3.0);
    assert!(registry.configure("too-many-calls", &params).unwrap().is_empty());

    let report = ScanEngine::new(2).scan(&registry, &tree).unwrap();
    assert!((score_of(&report, "create", "too-many-calls") - 0.75).abs() < 1e-12);
    assert!((score_of(&report, "processAll", "too-many-calls") - 0.85).abs() < 1e-12);
}

#[test]
fn test_aggregation_ignores_result_order() {
    let tree = billing_tree();
    let registry = RuleRegistry::with_builtin_rules();
    let report = ScanEngine::new(2).scan(&registry, &tree).unwrap();

    let aggregator = Aggregator::new(&tree, &registry);
    let forward = aggregator.aggregate(report.results.clone());
    let mut reversed_input = report.results.clone();
    reversed_input.reverse();
    let reversed = aggregator.aggregate(reversed_input);

    assert_eq!(forward, reversed);
    assert_eq!(forward.project_score, report.project_score);
    assert_eq!(forward.results, report.results);
}

#[test]
fn test_diagnostics_worst_first() {
    let tree = billing_tree();
    let report = ScanEngine::new(2)
        .scan(&RuleRegistry::with_builtin_rules(), &tree)
        .unwrap();

    let diags = diagnostics(&report, 0.5);
    let summary: Vec<(&str, &str)> = diags
        .iter()
        .map(|d| (d.name.as_str(), d.rule_id.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("processAll", "naming-convention"),
            ("send", "callback-parameters"),
            ("processAll", "too-many-calls"),
        ]
    );
}

#[test]
fn test_compound_score_rolls_up_functions() {
    let tree = billing_tree();
    let report = ScanEngine::new(2)
        .scan(&RuleRegistry::with_builtin_rules(), &tree)
        .unwrap();

    let module = report.entity(NodeId(0)).unwrap();
    let class = report.entity(NodeId(1)).unwrap();
    let compound_module = module.compound_score.unwrap();
    let compound_class = class.compound_score.unwrap();
    assert!((0.0..=1.0).contains(&compound_module));
    // the module contains every function the class does, plus more
    assert!(compound_module >= compound_class);
    assert!(report.entity(NodeId(2)).unwrap().compound_score.is_none());
}
