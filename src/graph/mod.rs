// Object graph - node table, edge arena, backreference index
#![allow(dead_code)]

mod edge;
mod node;
mod walker;

pub use edge::{Edge, EdgeKind};
pub use node::{EdgeId, Node, NodeKey};
pub use walker::{CascadeFilter, IgnoreSet, ObjectGraphWalker};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// The result of one walk: every reachable identity exactly once, its
/// ordered outgoing edges, and the reverse index answering "what points at
/// this value". Rebuilt from scratch every scan.
#[derive(Debug, Default)]
pub struct ObjectGraph {
    /// Node-to-node connectivity for traversal.
    inner: DiGraph<NodeKey, EdgeId>,

    /// Map from node key to petgraph index.
    node_map: HashMap<NodeKey, NodeIndex>,

    /// Map from node key to node details.
    nodes: HashMap<NodeKey, Node>,

    /// Edge arena; `EdgeId` indexes into it. Includes edges with null or
    /// unmaterialized targets, which have no petgraph counterpart.
    edges: Vec<Edge>,

    /// Backreference index: target key -> edges pointing at it.
    backrefs: HashMap<NodeKey, Vec<EdgeId>>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the node if its identity is unseen. Returns true when newly
    /// created: the caller's cue to enqueue it.
    pub fn ensure_node(&mut self, key: NodeKey, class: &str) -> bool {
        if self.nodes.contains_key(&key) {
            return false;
        }
        let idx = self.inner.add_node(key.clone());
        self.node_map.insert(key.clone(), idx);
        self.nodes.insert(key.clone(), Node::new(key, class));
        true
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn node_mut(&mut self, key: &NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    /// Record an edge: appended to the owner's ordered edge list, mirrored
    /// into petgraph when the target is a materialized node, and indexed
    /// under the target for backreference lookup.
    pub fn add_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId(self.edges.len());
        let owner = edge.owner.clone();
        let target = edge.target.clone();
        let chain_only = edge.chain_only;
        self.edges.push(edge);

        if !chain_only {
            if let Some(node) = self.nodes.get_mut(&owner) {
                node.edges.push(id);
            }
        }
        if let Some(target) = target {
            if !chain_only {
                if let (Some(&from), Some(&to)) =
                    (self.node_map.get(&owner), self.node_map.get(&target))
                {
                    self.inner.add_edge(from, to, id);
                }
            }
            self.backrefs.entry(target).or_default().push(id);
        }
        id
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    /// All recorded edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().enumerate().map(|(i, e)| (EdgeId(i), e))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.nodes.keys()
    }

    /// Traversal edges out of `key`. The petgraph mirror holds exactly the
    /// non-chain edges whose target materialized as a node, so this is the
    /// successor set for propagation-style walks.
    pub fn outgoing(&self, key: &NodeKey) -> Vec<EdgeId> {
        let Some(&idx) = self.node_map.get(key) else {
            return Vec::new();
        };
        self.inner.edges(idx).map(|e| *e.weight()).collect()
    }

    /// Edges pointing at `key`, including map key-to-value chain links.
    pub fn backrefs_of(&self, key: &NodeKey) -> &[EdgeId] {
        self.backrefs
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Effective scope of a node, defaulting to the narrowest when the key
    /// is unknown.
    pub fn effective_scope(&self, key: &NodeKey) -> crate::scope::Scope {
        self.nodes
            .get(key)
            .map(Node::effective_scope)
            .unwrap_or_else(crate::scope::Scope::instance)
    }
}
