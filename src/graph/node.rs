// Node table entries - one per visited identity
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

use crate::heap::ObjectId;
use crate::scope::Scope;

/// Identity of a node: a live object, or a class pseudo-object anchoring
/// static state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKey {
    Object(ObjectId),
    Class(String),
}

impl NodeKey {
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            NodeKey::Object(id) => Some(*id),
            NodeKey::Class(_) => None,
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self, NodeKey::Class(_))
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKey::Object(id) => write!(f, "{id}"),
            NodeKey::Class(name) => write!(f, "class {name}"),
        }
    }
}

/// Index of an edge in the graph's edge arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

/// One visited identity: its class, scope attribution, and ordered
/// outgoing edges. Each live identity is visited exactly once per scan.
#[derive(Debug, Clone)]
pub struct Node {
    pub key: NodeKey,
    pub class: String,
    /// Scope declared for this node (detector hit, root annotation, or
    /// "static" for class pseudo-objects).
    pub own_scope: Option<Scope>,
    /// Broadest scope propagated onto this node from its referrers.
    pub inherited_scope: Option<Scope>,
    pub edges: Vec<EdgeId>,
}

impl Node {
    pub fn new(key: NodeKey, class: impl Into<String>) -> Self {
        Self {
            key,
            class: class.into(),
            own_scope: None,
            inherited_scope: None,
            edges: Vec::new(),
        }
    }

    /// Own scope, else inherited, else the narrowest default.
    pub fn effective_scope(&self) -> Scope {
        self.own_scope
            .clone()
            .or_else(|| self.inherited_scope.clone())
            .unwrap_or_else(Scope::instance)
    }

    /// Whether the effective scope came only from propagation.
    pub fn scope_is_inherited(&self) -> bool {
        self.own_scope.is_none() && self.inherited_scope.is_some()
    }
}
