//! Scope model: the entity tree the engine walks
//!
//! Nodes live in an arena owned by [`ScopeTree`]. A node refers to its parent
//! by id only, and the tree exposes no way to detach or re-parent a node, so
//! `parent.children` and `child.parent` always agree and cycles cannot be
//! built. The tree is read-only for the whole duration of a scan.

mod loader;

pub use loader::{load_scope_tree, NodeSpec};

use crate::error::{MalformedScopeNodeError, ScopeError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Identifier of a node, unique within one tree
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kinds of analyzable code entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Module,
    Class,
    Function,
    CallSite,
}

impl ScopeKind {
    /// Attribute every node of this kind must carry
    pub fn required_attribute(&self) -> &'static str {
        match self {
            ScopeKind::CallSite => "target",
            _ => "name",
        }
    }

    fn can_contain(&self, child: ScopeKind) -> bool {
        match child {
            ScopeKind::Module => *self == ScopeKind::Module,
            _ => true,
        }
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeKind::Module => write!(f, "module"),
            ScopeKind::Class => write!(f, "class"),
            ScopeKind::Function => write!(f, "function"),
            ScopeKind::CallSite => write!(f, "call site"),
        }
    }
}

/// Source location of a node
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Location {
    pub file: PathBuf,
    pub line_start: u32,
    pub line_end: u32,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line_start: u32, line_end: u32) -> Self {
        Self {
            file: file.into(),
            line_start,
            line_end,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line_start == 0 {
            write!(f, "{}", self.file.display())
        } else {
            write!(f, "{}:{}", self.file.display(), self.line_start)
        }
    }
}

/// One entity in the scope tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeNode {
    pub id: NodeId,
    pub kind: ScopeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub location: Location,
    /// Rule-neutral facts supplied by the front end
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl ScopeNode {
    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    /// Name for display, falling back to the call target or the id
    pub fn display_name(&self) -> String {
        self.name()
            .or_else(|| self.get_str("target"))
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.attributes.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_list(&self, key: &str) -> Option<&Vec<serde_json::Value>> {
        self.attributes.get(key).and_then(|v| v.as_array())
    }

    /// Check that the node carries what its kind requires
    pub fn validate(&self) -> Result<(), MalformedScopeNodeError> {
        let required = self.kind.required_attribute();
        match self.get_str(required) {
            Some(value) if !value.is_empty() => Ok(()),
            _ => Err(MalformedScopeNodeError {
                node_id: self.id,
                kind: self.kind,
                missing: required.to_string(),
            }),
        }
    }
}

/// Builder-style description of a node before it is inserted
#[derive(Debug, Clone)]
pub struct NewNode {
    pub(crate) kind: ScopeKind,
    pub(crate) location: Location,
    pub(crate) attributes: BTreeMap<String, serde_json::Value>,
}

impl NewNode {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            location: Location::default(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn module(name: &str) -> Self {
        Self::new(ScopeKind::Module).with_attribute("name", name)
    }

    pub fn class(name: &str) -> Self {
        Self::new(ScopeKind::Class).with_attribute("name", name)
    }

    pub fn function(name: &str) -> Self {
        Self::new(ScopeKind::Function).with_attribute("name", name)
    }

    pub fn call(target: &str) -> Self {
        Self::new(ScopeKind::CallSite).with_attribute("target", target)
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn with_parameters(self, params: &[&str]) -> Self {
        let list: Vec<serde_json::Value> = params.iter().map(|p| (*p).into()).collect();
        self.with_attribute("parameters", list)
    }
}

/// Arena of scope nodes forming one or more trees
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScopeTree {
    nodes: Vec<ScopeNode>,
    roots: Vec<NodeId>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level node
    pub fn add_root(&mut self, node: NewNode) -> NodeId {
        let id = self.insert(node, None);
        self.roots.push(id);
        id
    }

    /// Add a node as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, node: NewNode) -> Result<NodeId, ScopeError> {
        let parent_kind = self
            .get(parent)
            .map(|p| p.kind)
            .ok_or(ScopeError::UnknownParent(parent))?;
        if !parent_kind.can_contain(node.kind) {
            return Err(ScopeError::InvalidNesting {
                parent: parent_kind,
                child: node.kind,
            });
        }

        let id = self.insert(node, Some(parent));
        self.nodes[parent.index()].children.push(id);
        Ok(id)
    }

    fn insert(&mut self, node: NewNode, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(ScopeNode {
            id,
            kind: node.kind,
            parent,
            children: Vec::new(),
            location: node.location,
            attributes: node.attributes,
        });
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&ScopeNode> {
        self.nodes.get(id.index())
    }

    /// Borrow a node together with the tree for navigation
    pub fn view(&self, id: NodeId) -> Option<NodeView<'_>> {
        self.get(id).map(|node| NodeView { tree: self, node })
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &ScopeNode> {
        self.nodes.iter()
    }

    /// Depth-first pre-order walk over every root
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.index()].children.iter().rev().copied());
        }
        order
    }

    /// Ids of all descendants of `id` (excluding `id`), pre-order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let Some(node) = self.get(id) else {
            return out;
        };
        let mut stack: Vec<NodeId> = node.children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next.index()].children.iter().rev().copied());
        }
        out
    }
}

/// A node borrowed together with its tree
///
/// Rules measure through this view so they can look at parents and children
/// without holding owning references into the tree.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    tree: &'a ScopeTree,
    node: &'a ScopeNode,
}

impl<'a> NodeView<'a> {
    pub fn node(&self) -> &'a ScopeNode {
        self.node
    }

    pub fn tree(&self) -> &'a ScopeTree {
        self.tree
    }

    pub fn parent(&self) -> Option<NodeView<'a>> {
        self.node.parent.and_then(|p| self.tree.view(p))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeView<'a>> + 'a {
        let tree = self.tree;
        let node = self.node;
        node.children.iter().filter_map(move |c| tree.view(*c))
    }

    pub fn children_of_kind(&self, kind: ScopeKind) -> impl Iterator<Item = NodeView<'a>> + 'a {
        self.children().filter(move |c| c.kind == kind)
    }
}

impl std::ops::Deref for NodeView<'_> {
    type Target = ScopeNode;

    fn deref(&self) -> &Self::Target {
        self.node
    }
}
