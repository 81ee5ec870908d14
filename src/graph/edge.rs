// Edge model - one owner-to-value relation, annotated with how the value
// is held
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

use crate::bytecode::PossibleValue;
use crate::heap::{FieldDescriptor, Value};

use super::NodeKey;

/// How an owner holds a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// The raw field value itself.
    DirectValue,
    ArrayItem,
    CollectionItem,
    MapKey,
    MapValue,
    /// Payload of an optional-like wrapper.
    OptionalValue,
    /// Payload of a weak or soft reference.
    ReferenceValue,
    /// Payload of an atomic reference cell.
    AtomicReferenceValue,
    /// Thread-local entry on a running thread.
    ThreadLocal,
    /// Thread-local entry on a waiting thread.
    WaitingThreadLocal,
    /// Thread-local entry on a terminated thread: the value has outlived
    /// its logical owner.
    TerminatedThreadLocal,
    /// Statically inferred candidate never observed live.
    PossibleValue,
}

impl EdgeKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            EdgeKind::DirectValue => "value",
            EdgeKind::ArrayItem => "array item",
            EdgeKind::CollectionItem => "collection item",
            EdgeKind::MapKey => "map key",
            EdgeKind::MapValue => "map value",
            EdgeKind::OptionalValue => "optional value",
            EdgeKind::ReferenceValue => "reference value",
            EdgeKind::AtomicReferenceValue => "atomic reference value",
            EdgeKind::ThreadLocal => "thread-local",
            EdgeKind::WaitingThreadLocal => "waiting thread-local",
            EdgeKind::TerminatedThreadLocal => "terminated thread-local",
            EdgeKind::PossibleValue => "possible value",
        }
    }

    pub fn is_thread_local(&self) -> bool {
        matches!(
            self,
            EdgeKind::ThreadLocal | EdgeKind::WaitingThreadLocal | EdgeKind::TerminatedThreadLocal
        )
    }

    /// Kinds held inside a container rather than directly in a field slot.
    pub fn is_contained(&self) -> bool {
        matches!(
            self,
            EdgeKind::ArrayItem
                | EdgeKind::CollectionItem
                | EdgeKind::MapKey
                | EdgeKind::MapValue
        )
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One directed owner-to-value relation.
#[derive(Debug, Clone)]
pub struct Edge {
    pub owner: NodeKey,
    pub kind: EdgeKind,
    /// Field the relation originates from, when there is one.
    pub field: Option<FieldDescriptor>,
    /// The raw observed value; `Null` for possible-value edges.
    pub value: Value,
    /// Target node when the value materialized as one.
    pub target: Option<NodeKey>,
    /// Observed class of the target, or statically inferred type.
    pub target_class: Option<String>,
    /// Provenance of a possible-value edge.
    pub possible: Option<PossibleValue>,
    /// Backreference-chain link only; excluded from rule evaluation.
    pub chain_only: bool,
}

impl Edge {
    pub fn new(owner: NodeKey, kind: EdgeKind, value: Value) -> Self {
        Self {
            owner,
            kind,
            field: None,
            value,
            target: None,
            target_class: None,
            possible: None,
            chain_only: false,
        }
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.field = Some(field);
        self
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field.as_ref().map(|f| f.name.as_str())
    }

    /// Whether scope propagation should follow this edge. Synthetic closure
    /// captures are excluded to avoid false broadening through incidental
    /// capture chains.
    pub fn propagates_scope(&self) -> bool {
        if self.chain_only || self.kind == EdgeKind::PossibleValue {
            return false;
        }
        !self
            .field
            .as_ref()
            .map(FieldDescriptor::is_closure_capture)
            .unwrap_or(false)
    }

    /// Stable grouping identity: declaring class, field, relation kind.
    pub fn group_identity(&self) -> String {
        match &self.field {
            Some(field) => format!(
                "{}.{}[{}]",
                field.declaring_class,
                field.name,
                self.kind.display_name()
            ),
            None => format!("{}[{}]", self.owner, self.kind.display_name()),
        }
    }
}
