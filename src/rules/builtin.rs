//! Built-in rules
//!
//! Each rule counts one structural property of a node. The counts are turned
//! into severities by the evaluator, so nothing here knows about scores.

use super::{Measurement, Rule};
use crate::error::MeasureError;
use crate::scope::{NodeView, ScopeKind};
use std::collections::{BTreeMap, BTreeSet};

/// Parameters that never count towards parameter-based rules
static SKIP_PARAMS: &[&str] = &["self", "cls"];

/// Type tags a front end may use for function-valued parameters
static CALLABLE_TYPES: &[&str] = &["callable", "lambda", "function", "closure", "fn"];

/// A parameter as the front end describes it: a bare name, or
/// `{ "name": ..., "type": ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Param {
    name: String,
    type_tag: Option<String>,
}

fn parameters(node: NodeView<'_>) -> Result<Vec<Param>, MeasureError> {
    let list = node
        .attribute("parameters")
        .ok_or_else(|| MeasureError::MissingAttribute("parameters".into()))?
        .as_array()
        .ok_or(MeasureError::InvalidAttribute {
            key: "parameters".into(),
            expected: "a list",
        })?;

    list.iter()
        .map(|p| {
            if let Some(name) = p.as_str() {
                return Ok(Param {
                    name: name.to_string(),
                    type_tag: None,
                });
            }
            let obj = p.as_object().ok_or(MeasureError::InvalidAttribute {
                key: "parameters".into(),
                expected: "a list of names or {name, type} objects",
            })?;
            let name = obj.get("name").and_then(|n| n.as_str()).ok_or(
                MeasureError::InvalidAttribute {
                    key: "parameters".into(),
                    expected: "a list of objects with a 'name'",
                },
            )?;
            Ok(Param {
                name: name.to_string(),
                type_tag: obj
                    .get("type")
                    .and_then(|t| t.as_str())
                    .map(|t| t.to_lowercase()),
            })
        })
        .collect()
}

/// Parameters excluding self/cls
fn meaningful_parameters(node: NodeView<'_>) -> Result<Vec<Param>, MeasureError> {
    Ok(parameters(node)?
        .into_iter()
        .filter(|p| !SKIP_PARAMS.contains(&p.name.as_str()))
        .collect())
}

fn is_callable(param: &Param) -> bool {
    param
        .type_tag
        .as_deref()
        .is_some_and(|t| CALLABLE_TYPES.contains(&t))
}

/// Calls made anywhere in a function's own body
///
/// Call sites nested in other calls count too; nested functions and classes
/// are their own scopes and are not entered. A flattened `calls` list is used
/// when the front end does not emit call-site nodes.
fn count_calls(node: NodeView<'_>) -> Measurement {
    let mut call_sites = 0usize;
    let mut stack: Vec<NodeView<'_>> = node.children().collect();
    while let Some(child) = stack.pop() {
        match child.kind {
            ScopeKind::Function | ScopeKind::Class => continue,
            ScopeKind::CallSite => call_sites += 1,
            ScopeKind::Module => {}
        }
        stack.extend(child.children());
    }
    if call_sites > 0 {
        return Ok(Some(call_sites as f64));
    }
    match node.attribute("calls") {
        None => Ok(Some(0.0)),
        Some(value) => value
            .as_array()
            .map(|calls| Some(calls.len() as f64))
            .ok_or(MeasureError::InvalidAttribute {
                key: "calls".into(),
                expected: "a list",
            }),
    }
}

fn count_parameters(node: NodeView<'_>) -> Measurement {
    Ok(Some(meaningful_parameters(node)?.len() as f64))
}

fn count_callback_parameters(node: NodeView<'_>) -> Measurement {
    let callbacks = parameters(node)?.iter().filter(|p| is_callable(p)).count();
    Ok(Some(callbacks as f64))
}

fn has_callback_parameter(node: NodeView<'_>) -> bool {
    parameters(node)
        .map(|params| params.iter().any(is_callable))
        .unwrap_or(false)
}

fn count_methods(node: NodeView<'_>) -> Measurement {
    Ok(Some(node.children_of_kind(ScopeKind::Function).count() as f64))
}

/// Parameter names that show up in more than one method of a class
fn count_shared_parameters(node: NodeView<'_>) -> Measurement {
    let mut seen_in: BTreeMap<String, usize> = BTreeMap::new();
    for method in node.children_of_kind(ScopeKind::Function) {
        let names: BTreeSet<String> = meaningful_parameters(method)?
            .into_iter()
            .map(|p| p.name)
            .collect();
        for name in names {
            *seen_in.entry(name).or_insert(0) += 1;
        }
    }
    Ok(Some(seen_in.values().filter(|&&n| n >= 2).count() as f64))
}

fn count_module_members(node: NodeView<'_>) -> Measurement {
    let members = node
        .children()
        .filter(|c| matches!(c.kind, ScopeKind::Class | ScopeKind::Function))
        .count();
    Ok(Some(members as f64))
}

/// Naming conventions a front end may tag a node with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NamingConvention {
    SnakeCase,
    PascalCase,
    CamelCase,
    ScreamingSnakeCase,
    Other,
}

impl NamingConvention {
    pub(crate) fn from_tag(tag: &str) -> Self {
        match tag.to_lowercase().replace(['-', '_'], "").as_str() {
            "snakecase" | "snake" => NamingConvention::SnakeCase,
            "pascalcase" | "pascal" | "uppercamelcase" => NamingConvention::PascalCase,
            "camelcase" | "camel" | "lowercamelcase" => NamingConvention::CamelCase,
            "screamingsnakecase" | "screamingcase" | "uppersnakecase" => {
                NamingConvention::ScreamingSnakeCase
            }
            _ => NamingConvention::Other,
        }
    }

    /// Classify a raw identifier; leading underscores are ignored
    ///
    /// Underscore-free capitals (`C`, `IO`) read as PascalCase acronyms.
    pub(crate) fn classify(name: &str) -> Self {
        let name = name.trim_start_matches('_');
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return NamingConvention::Other;
        }
        let has_lower = name.chars().any(|c| c.is_lowercase());
        let has_upper = name.chars().any(|c| c.is_uppercase());
        let has_underscore = name.contains('_');
        let starts_upper = name.chars().next().is_some_and(|c| c.is_uppercase());

        match (has_lower, has_upper, has_underscore) {
            (true, false, _) => NamingConvention::SnakeCase,
            (false, true, false) => NamingConvention::PascalCase,
            (false, true, true) => NamingConvention::ScreamingSnakeCase,
            (true, true, false) if starts_upper => NamingConvention::PascalCase,
            (true, true, false) => NamingConvention::CamelCase,
            (false, false, _) => NamingConvention::SnakeCase,
            _ => NamingConvention::Other,
        }
    }

    fn expected_for(kind: ScopeKind) -> Option<Self> {
        match kind {
            ScopeKind::Module | ScopeKind::Function => Some(NamingConvention::SnakeCase),
            ScopeKind::Class => Some(NamingConvention::PascalCase),
            ScopeKind::CallSite => None,
        }
    }
}

fn count_naming_violations(node: NodeView<'_>) -> Measurement {
    let Some(expected) = NamingConvention::expected_for(node.kind) else {
        return Ok(None);
    };
    let actual = match node.get_str("naming") {
        Some(tag) => NamingConvention::from_tag(tag),
        None => {
            let name = node
                .name()
                .ok_or_else(|| MeasureError::MissingAttribute("name".into()))?;
            NamingConvention::classify(name)
        }
    };
    Ok(Some(if actual == expected { 0.0 } else { 1.0 }))
}

/// Every built-in rule, in registration order
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule::new("too-many-calls", &[ScopeKind::Function], count_calls)
            .with_threshold(10.0)
            .with_description(
                "Functions that call many other functions take on several responsibilities",
            )
            .with_message("{kind} `{name}` makes {n} calls (threshold {threshold})"),
        Rule::new("too-many-parameters", &[ScopeKind::Function], count_parameters)
            .with_threshold(5.0)
            .with_description("Long parameter lists hint at a function doing too much")
            .with_message("{kind} `{name}` takes {n} parameters (threshold {threshold})"),
        Rule::new(
            "callback-parameters",
            &[ScopeKind::Function],
            count_callback_parameters,
        )
        .only_when(has_callback_parameter)
        .with_threshold(1.0)
        .with_description(
            "Several function-valued parameters couple a function to its callers' behavior",
        )
        .with_message("{kind} `{name}` takes {n} callable parameters (threshold {threshold})"),
        Rule::new("too-many-methods", &[ScopeKind::Class], count_methods)
            .with_threshold(10.0)
            .with_description("Classes with many methods carry many responsibilities")
            .with_message("{kind} `{name}` defines {n} methods (threshold {threshold})"),
        Rule::new("shared-parameters", &[ScopeKind::Class], count_shared_parameters)
            .with_threshold(2.0)
            .with_description(
                "Methods passing the same values around suggest a missing abstraction",
            )
            .with_message(
                "{kind} `{name}` shares {n} parameters between methods (threshold {threshold})",
            ),
        Rule::new(
            "naming-convention",
            &[ScopeKind::Module, ScopeKind::Class, ScopeKind::Function],
            count_naming_violations,
        )
        .with_threshold(0.0)
        .with_description("Names should follow the convention for their kind")
        .with_message("{kind} `{name}` does not follow the naming convention for its kind"),
        Rule::new("module-size", &[ScopeKind::Module], count_module_members)
            .with_threshold(15.0)
            .with_description("Modules with many top-level members are hard to keep focused")
            .with_message(
                "{kind} `{name}` has {n} top-level classes and functions (threshold {threshold})",
            ),
    ]
}
