// Heap access - the host-platform capability seam
#![allow(dead_code)]

mod memory;
mod value;

pub use memory::MemoryHeap;
pub use value::{
    FieldDescriptor, ObjectId, Shape, ThreadId, ThreadInfo, ThreadState, Value, Visibility,
};

use thiserror::Error;

use crate::bytecode::ClassCode;
use crate::scope::Scope;

/// Heap access errors. The walker swallows all of these, skipping only the
/// field or object that failed.
#[derive(Error, Debug)]
pub enum HeapError {
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),
    #[error("unknown class {0}")]
    UnknownClass(String),
    #[error("no field {field} on {class}")]
    UnknownField { class: String, field: String },
    #[error("access denied reading {0}")]
    AccessDenied(String),
    #[error("root enumeration failed: {0}")]
    RootEnumeration(String),
}

/// Universal reflective access to the live heap: field enumeration and
/// reads bypassing access control, container decomposition, thread-local
/// tables. The one unavoidably host-platform-specific piece, so it lives
/// behind this trait.
pub trait Heap: Send + Sync {
    fn class_of(&self, obj: ObjectId) -> Result<String, HeapError>;

    fn shape_of(&self, obj: ObjectId) -> Result<Shape, HeapError>;

    fn superclass(&self, class: &str) -> Option<String>;

    /// Declared instance fields of `class` and its superclasses, ordered
    /// own-class first.
    fn enumerate_fields(&self, class: &str) -> Result<Vec<FieldDescriptor>, HeapError>;

    /// Declared static fields of `class` alone.
    fn static_fields(&self, class: &str) -> Result<Vec<FieldDescriptor>, HeapError>;

    fn read_field(&self, obj: ObjectId, field: &FieldDescriptor) -> Result<Value, HeapError>;

    fn read_static(&self, field: &FieldDescriptor) -> Result<Value, HeapError>;

    /// Array or collection elements, in iteration order.
    fn elements(&self, obj: ObjectId) -> Result<Vec<Value>, HeapError>;

    /// Map entries, in iteration order.
    fn entries(&self, obj: ObjectId) -> Result<Vec<(Value, Value)>, HeapError>;

    /// Payload of an optional, weak/soft reference, or atomic cell.
    fn unwrap_inner(&self, obj: ObjectId) -> Result<Value, HeapError>;

    /// Every live thread in the process.
    fn threads(&self) -> Vec<ThreadInfo>;

    /// The entry for thread-local instance `tl` in `thread`'s table, if the
    /// privileged read finds one.
    fn thread_local_entry(&self, thread: ThreadId, tl: ObjectId) -> Option<Value>;

    /// Short human-readable rendering of a value for report lines.
    fn summarize(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Primitive(repr) => repr.clone(),
            Value::Object(id) => match self.class_of(*id) {
                Ok(class) => format!("{class}{id}"),
                Err(_) => format!("<unreadable{id}>"),
            },
        }
    }
}

/// Sees through interception proxies so proxy and target are not counted
/// as two objects. Identity by default.
pub trait UnwrapHook: Send + Sync {
    fn unwrap(&self, obj: ObjectId) -> ObjectId {
        obj
    }
}

/// The no-proxy environment.
#[derive(Debug, Default)]
pub struct NoProxies;

impl UnwrapHook for NoProxies {}

/// Proxy unwrapping backed by an explicit proxy-to-target table.
#[derive(Debug, Default)]
pub struct TableUnwrap {
    targets: std::collections::HashMap<ObjectId, ObjectId>,
}

impl TableUnwrap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, proxy: ObjectId, target: ObjectId) {
        self.targets.insert(proxy, target);
    }
}

impl UnwrapHook for TableUnwrap {
    fn unwrap(&self, obj: ObjectId) -> ObjectId {
        self.targets.get(&obj).copied().unwrap_or(obj)
    }
}

/// One traversal root: a live object or a class whose statics anchor the
/// walk, optionally pre-scoped by the supplier.
#[derive(Debug, Clone)]
pub struct Root {
    pub target: RootTarget,
    pub scope: Option<Scope>,
}

#[derive(Debug, Clone)]
pub enum RootTarget {
    Object(ObjectId),
    Class(String),
}

impl Root {
    pub fn object(id: ObjectId) -> Self {
        Self {
            target: RootTarget::Object(id),
            scope: None,
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self {
            target: RootTarget::Class(name.into()),
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Supplies the system/root objects for a scan.
pub trait RootSupplier: Send + Sync {
    fn roots(&self) -> Result<Vec<Root>, HeapError>;
}

/// Fixed root list.
#[derive(Debug, Default)]
pub struct StaticRoots {
    roots: Vec<Root>,
}

impl StaticRoots {
    pub fn new(roots: Vec<Root>) -> Self {
        Self { roots }
    }
}

impl RootSupplier for StaticRoots {
    fn roots(&self) -> Result<Vec<Root>, HeapError> {
        Ok(self.roots.clone())
    }
}

/// Supplies the parsed instruction model for a class. Decoding classfile
/// bytes happens host-side, next to the class loader.
pub trait BytecodeSupplier: Send + Sync {
    fn class_code(&self, class: &str) -> Option<ClassCode>;
}

/// The empty supplier: every analyzer degrades to empty results.
#[derive(Debug, Default)]
pub struct NoBytecode;

impl BytecodeSupplier for NoBytecode {
    fn class_code(&self, _class: &str) -> Option<ClassCode> {
        None
    }
}
