//! The three-tier relationship graph (Flow → Connection Reference →
//! Connection) produced by one aggregation run.
//!
//! A graph is assembled through [`GraphBuilder`] and immutable afterwards;
//! consumers (the settings generator, any presentation layer) only ever see
//! read-only views.

use crate::error::{Diagnostic, GraphBuildError};
use crate::parser::ConnectionReferenceUsage;
use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use std::fmt;

/// The tier a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Flow,
    ConnectionReference,
    Connection,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Flow => write!(f, "flow"),
            NodeKind::ConnectionReference => write!(f, "connection-reference"),
            NodeKind::Connection => write!(f, "connection"),
        }
    }
}

/// The deduplication key for nodes: one `(kind, sourceId)` pair maps to at
/// most one node per graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NodeKey {
    pub kind: NodeKind,
    pub source_id: String,
}

impl NodeKey {
    pub fn new(kind: NodeKind, source_id: impl Into<String>) -> Self {
        Self {
            kind,
            source_id: source_id.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.source_id)
    }
}

/// A vertex in the relationship graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipNode {
    pub kind: NodeKind,
    pub source_id: String,
    pub display_name: String,
    /// Synthetic node for a connection reference a flow expects but the
    /// environment does not contain.
    pub placeholder: bool,
    /// For connection-reference nodes: the bound connection id, if any.
    pub bound_connection_id: Option<String>,
}

impl RelationshipNode {
    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.kind, self.source_id.clone())
    }
}

/// How an edge came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeKind {
    /// Both endpoints are real environment records.
    Standard,
    /// The target is a synthetic placeholder connection reference.
    Placeholder,
    /// The flow embeds connection details with no connection reference.
    Inline,
}

/// A Flow→CR or CR→Connection link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipEdge {
    pub from: NodeKey,
    pub to: NodeKey,
    pub kind: EdgeKind,
}

/// The full aggregation result for one run.
///
/// Node order follows insertion order (flows first, in input order), so two
/// runs over the same input sets produce identical graphs.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipGraph {
    nodes: Vec<RelationshipNode>,
    edges: Vec<RelationshipEdge>,
    unresolved: Vec<ConnectionReferenceUsage>,
    diagnostics: Vec<Diagnostic>,
    #[serde(skip)]
    index: AHashMap<NodeKey, usize>,
}

impl RelationshipGraph {
    pub fn nodes(&self) -> &[RelationshipNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[RelationshipEdge] {
        &self.edges
    }

    /// Usages that no resolution tier could match to a known record.
    pub fn unresolved(&self) -> &[ConnectionReferenceUsage] {
        &self.unresolved
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn node(&self, key: &NodeKey) -> Option<&RelationshipNode> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.index.contains_key(key)
    }

    /// All edges leaving the given node, in insertion order.
    pub fn edges_from<'a>(
        &'a self,
        key: &'a NodeKey,
    ) -> impl Iterator<Item = &'a RelationshipEdge> {
        self.edges.iter().filter(move |e| &e.from == key)
    }

    /// All edges arriving at the given node, in insertion order.
    pub fn edges_to<'a>(&'a self, key: &'a NodeKey) -> impl Iterator<Item = &'a RelationshipEdge> {
        self.edges.iter().filter(move |e| &e.to == key)
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &RelationshipNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    pub fn placeholder_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.placeholder).count()
    }
}

/// Builds a [`RelationshipGraph`] while enforcing its invariants: node
/// deduplication by key, edge deduplication, and no dangling edges.
pub(crate) struct GraphBuilder {
    nodes: Vec<RelationshipNode>,
    edges: Vec<RelationshipEdge>,
    unresolved: Vec<ConnectionReferenceUsage>,
    diagnostics: Vec<Diagnostic>,
    index: AHashMap<NodeKey, usize>,
    edge_set: AHashSet<(NodeKey, NodeKey, EdgeKind)>,
}

impl GraphBuilder {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            unresolved: Vec::new(),
            diagnostics: Vec::new(),
            index: AHashMap::new(),
            edge_set: AHashSet::new(),
        }
    }

    /// Inserts a node, or returns the key of the existing node with the same
    /// `(kind, sourceId)`.
    pub(crate) fn add_node(&mut self, node: RelationshipNode) -> NodeKey {
        let key = node.key();
        if !self.index.contains_key(&key) {
            self.index.insert(key.clone(), self.nodes.len());
            self.nodes.push(node);
        }
        key
    }

    /// Inserts an edge between two existing nodes. Duplicate edges are
    /// silently collapsed; a missing endpoint is a construction bug.
    pub(crate) fn add_edge(
        &mut self,
        from: NodeKey,
        to: NodeKey,
        kind: EdgeKind,
    ) -> Result<(), GraphBuildError> {
        if !self.index.contains_key(&from) || !self.index.contains_key(&to) {
            return Err(GraphBuildError::DanglingEdge {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if self.edge_set.insert((from.clone(), to.clone(), kind)) {
            self.edges.push(RelationshipEdge { from, to, kind });
        }
        Ok(())
    }

    pub(crate) fn add_unresolved(&mut self, usage: ConnectionReferenceUsage) {
        self.unresolved.push(usage);
    }

    pub(crate) fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn finish(self) -> RelationshipGraph {
        RelationshipGraph {
            nodes: self.nodes,
            edges: self.edges,
            unresolved: self.unresolved,
            diagnostics: self.diagnostics,
            index: self.index,
        }
    }
}
