//! Metric evaluator: one rule against one node
//!
//! # Normalization
//!
//! ```text
//! n     = rule.measure(node)
//! score = 0                                   if n <= eps
//!       = 1 - clamp(threshold / n, 0, 1)      otherwise
//! ```
//!
//! The score is 0 at or below the floor, rises continuously and
//! monotonically once `n` passes `threshold`, and tends to 1 as `n` grows.
//! The division only happens when `n > eps >= 0`.
//!
//! Anything that goes wrong while measuring (missing attributes, a
//! non-finite raw value, a panic inside the rule) is caught here and turned
//! into a [`RuleEvaluationError`] for that single pair.

use crate::error::{MeasureError, RuleEvaluationError};
use crate::rules::Rule;
use crate::scope::{Location, NodeId, NodeView, ScopeKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Normalization ceiling for every score
pub const SCORE_MAX: f64 = 1.0;

/// Map a raw count onto `[0, SCORE_MAX]`
pub fn normalize(raw_value: f64, threshold: f64, eps: f64) -> f64 {
    if raw_value <= eps.max(0.0) {
        return 0.0;
    }
    let ratio = threshold / raw_value;
    if ratio.is_nan() {
        return 0.0;
    }
    SCORE_MAX - ratio.clamp(0.0, 1.0)
}

/// Score of one rule on one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub node_id: NodeId,
    pub kind: ScopeKind,
    pub name: String,
    pub location: Location,
    /// Raw structural count (n)
    pub raw_value: f64,
    /// Violation severity in `[0, max]`
    pub score: f64,
    pub max: f64,
    pub threshold: f64,
    pub message: String,
}

/// Outcome of evaluating one (rule, node) pair
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Scored(RuleResult),
    NotApplicable,
    Failed(RuleEvaluationError),
}

/// Evaluate `rule` against `node`, never propagating a failure
pub fn evaluate(rule: &Rule, node: NodeView<'_>) -> Evaluation {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        if !rule.applies_to(node) {
            return Ok(None);
        }
        match rule.measure(node)? {
            Some(raw) if !raw.is_finite() => Err(MeasureError::NonFinite(raw)),
            Some(raw) => Ok(Some((raw, rule.render_message(node, raw)))),
            None => Ok(None),
        }
    }));

    match outcome {
        Ok(Ok(Some((raw_value, message)))) => {
            let threshold = rule.threshold();
            let score = normalize(raw_value, threshold, rule.eps());
            Evaluation::Scored(RuleResult {
                rule_id: rule.id().to_string(),
                node_id: node.id,
                kind: node.kind,
                name: node.display_name(),
                location: node.location.clone(),
                raw_value,
                score,
                max: SCORE_MAX,
                threshold,
                message,
            })
        }
        Ok(Ok(None)) => Evaluation::NotApplicable,
        Ok(Err(e)) => {
            debug!("Rule {} failed on node {}: {}", rule.id(), node.id, e);
            Evaluation::Failed(RuleEvaluationError {
                rule_id: rule.id().to_string(),
                node_id: node.id,
                cause: e.to_string(),
            })
        }
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            error!("Rule {} panicked on node {}: {}", rule.id(), node.id, panic_msg);
            Evaluation::Failed(RuleEvaluationError {
                rule_id: rule.id().to_string(),
                node_id: node.id,
                cause: format!("Panic: {}", panic_msg),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{NewNode, ScopeTree};

    fn calls_rule(threshold: f64) -> Rule {
        Rule::new("too-many-calls", &[ScopeKind::Function], |node| {
            Ok(Some(node.get_i64("calls").unwrap_or(0) as f64))
        })
        .with_threshold(threshold)
    }

    fn scored(eval: Evaluation) -> RuleResult {
        match eval {
            Evaluation::Scored(r) => r,
            other => panic!("expected a score, got {:?}", other),
        }
    }

    #[test]
    fn test_worked_examples() {
        let mut tree = ScopeTree::new();
        let six = tree.add_root(NewNode::function("six").with_attribute("calls", 6));
        let two = tree.add_root(NewNode::function("two").with_attribute("calls", 2));
        let rule = calls_rule(3.0);

        let r = scored(evaluate(&rule, tree.view(six).unwrap()));
        assert_eq!(r.raw_value, 6.0);
        assert!((r.score - 0.5).abs() < 1e-12);
        assert_eq!(r.max, 1.0);

        let r = scored(evaluate(&rule, tree.view(two).unwrap()));
        assert_eq!(r.score, 0.0);
    }

    #[test]
    fn test_score_bounds_and_monotonicity() {
        for threshold in [0.0, 0.5, 1.0, 3.0, 10.0, 250.0] {
            let mut previous = 0.0;
            for step in 0..2000 {
                let n = step as f64 * 0.25;
                let score = normalize(n, threshold, 0.0);
                assert!((0.0..=SCORE_MAX).contains(&score), "score {} out of bounds", score);
                assert!(score >= previous, "score decreased at n = {}", n);
                previous = score;
            }
        }
    }

    #[test]
    fn test_floor_and_limit() {
        assert_eq!(normalize(0.0, 3.0, 0.0), 0.0);
        assert_eq!(normalize(2.0, 3.0, 2.0), 0.0);
        assert_eq!(normalize(-4.0, 3.0, 0.0), 0.0);
        assert!(normalize(1e12, 3.0, 0.0) > 0.999_999);
        assert_eq!(normalize(f64::INFINITY, 3.0, 0.0), 1.0);
        // a zero threshold flags any count above the floor
        assert_eq!(normalize(1.0, 0.0, 0.0), 1.0);
    }

    #[test]
    fn test_wrong_kind_is_not_applicable() {
        let mut tree = ScopeTree::new();
        let class = tree.add_root(NewNode::class("C"));
        assert_eq!(
            evaluate(&calls_rule(3.0), tree.view(class).unwrap()),
            Evaluation::NotApplicable
        );
    }

    #[test]
    fn test_measure_returning_none_is_not_applicable() {
        let mut tree = ScopeTree::new();
        let f = tree.add_root(NewNode::function("f"));
        let rule = Rule::new("never", &[ScopeKind::Function], |_| Ok(None));
        assert_eq!(evaluate(&rule, tree.view(f).unwrap()), Evaluation::NotApplicable);
    }

    #[test]
    fn test_measure_error_is_isolated() {
        let mut tree = ScopeTree::new();
        let f = tree.add_root(NewNode::function("f"));
        let rule = Rule::new("needs-attr", &[ScopeKind::Function], |node| {
            node.get_i64("loc")
                .map(|v| Some(v as f64))
                .ok_or_else(|| MeasureError::MissingAttribute("loc".into()))
        });
        match evaluate(&rule, tree.view(f).unwrap()) {
            Evaluation::Failed(e) => {
                assert_eq!(e.rule_id, "needs-attr");
                assert_eq!(e.node_id, f);
                assert!(e.cause.contains("loc"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_panic_is_caught() {
        let mut tree = ScopeTree::new();
        let f = tree.add_root(NewNode::function("f"));
        let rule = Rule::new("boom", &[ScopeKind::Function], |_| panic!("rule exploded"));
        match evaluate(&rule, tree.view(f).unwrap()) {
            Evaluation::Failed(e) => assert!(e.cause.contains("rule exploded")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_raw_value_fails() {
        let mut tree = ScopeTree::new();
        let f = tree.add_root(NewNode::function("f"));
        let rule = Rule::new("nan", &[ScopeKind::Function], |_| Ok(Some(f64::NAN)));
        assert!(matches!(
            evaluate(&rule, tree.view(f).unwrap()),
            Evaluation::Failed(_)
        ));
    }
}
