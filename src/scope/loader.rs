//! JSON interchange format for scope trees
//!
//! Front ends hand the engine a nested document, either a single node or an
//! array of roots:
//!
//! ```json
//! {
//!   "kind": "module", "name": "app", "file": "app.py", "line_start": 1, "line_end": 40,
//!   "children": [
//!     { "kind": "function", "name": "run", "line_start": 3, "line_end": 9,
//!       "attributes": { "parameters": ["a", "b"] },
//!       "children": [{ "kind": "call_site", "attributes": { "target": "print" } }] }
//!   ]
//! }
//! ```
//!
//! `file` and the line range are inherited from the parent when omitted.

use super::{Location, NewNode, NodeId, ScopeKind, ScopeTree};
use crate::error::ScopeError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One node of the interchange document
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub kind: ScopeKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub line_start: Option<u32>,
    #[serde(default)]
    pub line_end: Option<u32>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Forest(Vec<NodeSpec>),
    Single(Box<NodeSpec>),
}

impl NodeSpec {
    fn to_new_node(&self, inherited: &Location) -> NewNode {
        let location = Location {
            file: self.file.clone().unwrap_or_else(|| inherited.file.clone()),
            line_start: self.line_start.unwrap_or(inherited.line_start),
            line_end: self
                .line_end
                .or(self.line_start)
                .unwrap_or(inherited.line_end),
        };

        let mut node = NewNode::new(self.kind).with_location(location);
        for (key, value) in &self.attributes {
            node = node.with_attribute(key, value.clone());
        }
        if let Some(name) = &self.name {
            node = node.with_attribute("name", name.as_str());
        }
        node
    }
}

impl ScopeTree {
    /// Build a tree from an interchange document
    pub fn from_json_str(content: &str) -> Result<Self, ScopeError> {
        let roots = match serde_json::from_str::<Document>(content)? {
            Document::Forest(roots) => roots,
            Document::Single(root) => vec![*root],
        };

        let mut tree = ScopeTree::new();
        for spec in &roots {
            let root_node = spec.to_new_node(&Location::default());
            let location = root_node.location.clone();
            let id = tree.add_root(root_node);
            tree.add_specs(id, &spec.children, &location)?;
        }
        debug!("Loaded scope tree with {} nodes", tree.len());
        Ok(tree)
    }

    fn add_specs(
        &mut self,
        parent: NodeId,
        specs: &[NodeSpec],
        inherited: &Location,
    ) -> Result<(), ScopeError> {
        for spec in specs {
            let node = spec.to_new_node(inherited);
            let location = node.location.clone();
            let id = self.add_child(parent, node)?;
            self.add_specs(id, &spec.children, &location)?;
        }
        Ok(())
    }
}

/// Load a scope tree from a JSON file
pub fn load_scope_tree(path: &Path) -> Result<ScopeTree, ScopeError> {
    let content = std::fs::read_to_string(path)?;
    ScopeTree::from_json_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "kind": "module", "name": "app", "file": "app.py", "line_start": 1, "line_end": 40,
        "children": [
            { "kind": "class", "name": "Server", "line_start": 3, "line_end": 30,
              "children": [
                { "kind": "function", "name": "serve", "line_start": 5, "line_end": 12,
                  "attributes": { "parameters": ["self", "port"] },
                  "children": [
                    { "kind": "call_site", "attributes": { "target": "bind" } },
                    { "kind": "call_site", "attributes": { "target": "listen" } }
                  ] }
              ] }
        ]
    }"#;

    #[test]
    fn test_load_single_root() {
        let tree = ScopeTree::from_json_str(SAMPLE).unwrap();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.roots().len(), 1);

        let serve = tree.nodes().find(|n| n.name() == Some("serve")).unwrap();
        assert_eq!(serve.kind, ScopeKind::Function);
        assert_eq!(serve.location, Location::new("app.py", 5, 12));
        assert_eq!(serve.children.len(), 2);
        assert_eq!(serve.get_list("parameters").unwrap().len(), 2);
    }

    #[test]
    fn test_children_inherit_location() {
        let tree = ScopeTree::from_json_str(SAMPLE).unwrap();
        let call = tree
            .nodes()
            .find(|n| n.get_str("target") == Some("bind"))
            .unwrap();
        assert_eq!(call.location.file, PathBuf::from("app.py"));
        assert_eq!(call.location.line_start, 5);
    }

    #[test]
    fn test_load_forest() {
        let json = r#"[
            { "kind": "module", "name": "a", "file": "a.py" },
            { "kind": "module", "name": "b", "file": "b.py",
              "children": [{ "kind": "function", "name": "f" }] }
        ]"#;
        let tree = ScopeTree::from_json_str(json).unwrap();
        assert_eq!(tree.roots().len(), 2);
        let f = tree.nodes().find(|n| n.name() == Some("f")).unwrap();
        assert_eq!(f.location.file, PathBuf::from("b.py"));
    }

    #[test]
    fn test_invalid_nesting_is_an_error() {
        let json = r#"{ "kind": "function", "name": "f",
                        "children": [{ "kind": "module", "name": "m" }] }"#;
        let err = ScopeTree::from_json_str(json).unwrap_err();
        assert!(matches!(err, ScopeError::InvalidNesting { .. }));
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(matches!(
            ScopeTree::from_json_str("{ not json"),
            Err(ScopeError::Parse(_))
        ));
    }
}
