// Runtime value model - what the walker sees through the heap capability
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// Identity key for a live object, stable within one scan. Hosts assign
/// these from identity hashes or tagging; [`MemoryHeap`](super::MemoryHeap)
/// allocates them sequentially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value observed in the heap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    /// Primitive or boxed-immutable content, pre-rendered by the host.
    Primitive(String),
    Object(ObjectId),
}

impl Value {
    pub fn primitive(repr: impl Into<String>) -> Self {
        Value::Primitive(repr.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }
}

/// Structural category of an object, decided by the host from its runtime
/// class. Decomposition during the walk follows the shape, never the
/// declared field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Plain,
    /// Reference array; one edge per non-null element, never expanded.
    Array,
    Collection,
    Map,
    /// Optional-like wrapper with at most one payload.
    Optional,
    /// Weak or soft reference wrapper.
    ReferenceLike,
    /// Atomic reference cell.
    AtomicRef,
    ThreadLocal,
    /// Enums, boxed primitives, strings: recorded but never cascaded.
    Terminal,
}

/// Field visibility modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    PackagePrivate,
    Public,
    Protected,
    Private,
}

/// Reflective description of one declared field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub declaring_class: String,
    pub name: String,
    /// Dotted class name or primitive name.
    pub declared_type: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_final: bool,
    pub is_transient: bool,
    pub is_volatile: bool,
    pub is_synthetic: bool,
    pub annotations: Vec<String>,
}

impl FieldDescriptor {
    pub fn new(
        declaring_class: impl Into<String>,
        name: impl Into<String>,
        declared_type: impl Into<String>,
    ) -> Self {
        Self {
            declaring_class: declaring_class.into(),
            name: name.into(),
            declared_type: declared_type.into(),
            visibility: Visibility::default(),
            is_static: false,
            is_final: false,
            is_transient: false,
            is_volatile: false,
            is_synthetic: false,
            annotations: Vec::new(),
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn with_transient(mut self) -> Self {
        self.is_transient = true;
        self
    }

    pub fn with_volatile(mut self) -> Self {
        self.is_volatile = true;
        self
    }

    pub fn with_synthetic(mut self) -> Self {
        self.is_synthetic = true;
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotations.iter().any(|a| a == name)
    }

    /// Whether this field is a synthetic closure capture (javac `val$x`,
    /// `arg$N`, lambda capture fields). Excluded from scope propagation.
    pub fn is_closure_capture(&self) -> bool {
        self.is_synthetic
            && (self.name.starts_with("val$")
                || self.name.starts_with("arg$")
                || self.declaring_class.contains("$$Lambda"))
    }
}

impl std::fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.declaring_class, self.name)
    }
}

/// Identity of a live thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub u64);

/// Run state of a thread owning a thread-local table. Waiting and
/// terminated owners indicate values outliving their logical owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadState {
    Running,
    Waiting,
    Terminated,
}

/// One live thread as enumerated by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: String,
    pub state: ThreadState,
}
