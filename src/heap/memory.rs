//! In-memory heap.
//!
//! A complete [`Heap`] implementation over explicitly registered classes,
//! objects, and threads. Hosts use it to snapshot a live process into a
//! walkable form; every test fixture in the crate is built on it.

use std::collections::{HashMap, HashSet};

use crate::bytecode::ClassCode;

use super::{
    FieldDescriptor, Heap, HeapError, ObjectId, Shape, ThreadId, ThreadInfo, ThreadState, Value,
};

#[derive(Debug, Default)]
struct ClassRecord {
    superclass: Option<String>,
    instance_fields: Vec<FieldDescriptor>,
    static_fields: Vec<FieldDescriptor>,
    static_values: HashMap<String, Value>,
    code: Option<ClassCode>,
}

#[derive(Debug)]
struct ObjectRecord {
    class: String,
    shape: Shape,
    fields: Vec<(String, Value)>,
    elements: Vec<Value>,
    entries: Vec<(Value, Value)>,
    inner: Value,
}

#[derive(Debug)]
struct ThreadRecord {
    info: ThreadInfo,
    locals: Vec<(ObjectId, Value)>,
}

/// Snapshot heap with a builder-style registration API.
#[derive(Debug, Default)]
pub struct MemoryHeap {
    next_id: u64,
    classes: HashMap<String, ClassRecord>,
    objects: HashMap<ObjectId, ObjectRecord>,
    threads: Vec<ThreadRecord>,
    /// (class, field) pairs whose reads fail, for failure-path tests.
    denied: HashSet<(String, String)>,
}

impl MemoryHeap {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- registration -----------------------------------------------

    pub fn define_class(&mut self, name: impl Into<String>) -> &mut Self {
        self.classes.entry(name.into()).or_default();
        self
    }

    pub fn set_superclass(&mut self, class: impl Into<String>, superclass: impl Into<String>) {
        self.classes
            .entry(class.into())
            .or_default()
            .superclass = Some(superclass.into());
    }

    /// Register a declared field; routed to the static or instance list by
    /// its modifier.
    pub fn declare_field(&mut self, field: FieldDescriptor) {
        let record = self.classes.entry(field.declaring_class.clone()).or_default();
        if field.is_static {
            record.static_fields.push(field);
        } else {
            record.instance_fields.push(field);
        }
    }

    pub fn register_code(&mut self, code: ClassCode) {
        let name = code.name.clone();
        self.classes.entry(name).or_default().code = Some(code);
    }

    pub fn alloc(&mut self, class: impl Into<String>, shape: Shape) -> ObjectId {
        let class = class.into();
        self.classes.entry(class.clone()).or_default();
        self.next_id += 1;
        let id = ObjectId(self.next_id);
        self.objects.insert(
            id,
            ObjectRecord {
                class,
                shape,
                fields: Vec::new(),
                elements: Vec::new(),
                entries: Vec::new(),
                inner: Value::Null,
            },
        );
        id
    }

    pub fn alloc_plain(&mut self, class: impl Into<String>) -> ObjectId {
        self.alloc(class, Shape::Plain)
    }

    pub fn alloc_map(&mut self, class: impl Into<String>) -> ObjectId {
        self.alloc(class, Shape::Map)
    }

    pub fn alloc_collection(&mut self, class: impl Into<String>) -> ObjectId {
        self.alloc(class, Shape::Collection)
    }

    pub fn alloc_array(&mut self, class: impl Into<String>) -> ObjectId {
        self.alloc(class, Shape::Array)
    }

    pub fn set_field(&mut self, obj: ObjectId, name: impl Into<String>, value: Value) {
        if let Some(record) = self.objects.get_mut(&obj) {
            let name = name.into();
            match record.fields.iter_mut().find(|(n, _)| *n == name) {
                Some((_, v)) => *v = value,
                None => record.fields.push((name, value)),
            }
        }
    }

    pub fn push_element(&mut self, obj: ObjectId, value: Value) {
        if let Some(record) = self.objects.get_mut(&obj) {
            record.elements.push(value);
        }
    }

    pub fn put_entry(&mut self, obj: ObjectId, key: Value, value: Value) {
        if let Some(record) = self.objects.get_mut(&obj) {
            record.entries.push((key, value));
        }
    }

    pub fn set_inner(&mut self, obj: ObjectId, value: Value) {
        if let Some(record) = self.objects.get_mut(&obj) {
            record.inner = value;
        }
    }

    pub fn set_static(&mut self, class: impl Into<String>, name: impl Into<String>, value: Value) {
        self.classes
            .entry(class.into())
            .or_default()
            .static_values
            .insert(name.into(), value);
    }

    pub fn add_thread(&mut self, name: impl Into<String>, state: ThreadState) -> ThreadId {
        let id = ThreadId(self.threads.len() as u64 + 1);
        self.threads.push(ThreadRecord {
            info: ThreadInfo {
                id,
                name: name.into(),
                state,
            },
            locals: Vec::new(),
        });
        id
    }

    pub fn set_thread_local(&mut self, thread: ThreadId, tl: ObjectId, value: Value) {
        if let Some(record) = self.threads.iter_mut().find(|t| t.info.id == thread) {
            record.locals.push((tl, value));
        }
    }

    /// Make every read of `class.field` fail with `AccessDenied`.
    pub fn deny_field(&mut self, class: impl Into<String>, field: impl Into<String>) {
        self.denied.insert((class.into(), field.into()));
    }

    fn object(&self, obj: ObjectId) -> Result<&ObjectRecord, HeapError> {
        self.objects.get(&obj).ok_or(HeapError::UnknownObject(obj))
    }

    fn class(&self, name: &str) -> Result<&ClassRecord, HeapError> {
        self.classes
            .get(name)
            .ok_or_else(|| HeapError::UnknownClass(name.to_string()))
    }

    fn check_denied(&self, field: &FieldDescriptor) -> Result<(), HeapError> {
        if self
            .denied
            .contains(&(field.declaring_class.clone(), field.name.clone()))
        {
            return Err(HeapError::AccessDenied(field.to_string()));
        }
        Ok(())
    }
}

impl Heap for MemoryHeap {
    fn class_of(&self, obj: ObjectId) -> Result<String, HeapError> {
        Ok(self.object(obj)?.class.clone())
    }

    fn shape_of(&self, obj: ObjectId) -> Result<Shape, HeapError> {
        Ok(self.object(obj)?.shape)
    }

    fn superclass(&self, class: &str) -> Option<String> {
        self.classes.get(class)?.superclass.clone()
    }

    fn enumerate_fields(&self, class: &str) -> Result<Vec<FieldDescriptor>, HeapError> {
        let mut fields = Vec::new();
        let mut current = Some(class.to_string());
        while let Some(name) = current {
            let record = self.class(&name)?;
            fields.extend(record.instance_fields.iter().cloned());
            current = record.superclass.clone();
        }
        Ok(fields)
    }

    fn static_fields(&self, class: &str) -> Result<Vec<FieldDescriptor>, HeapError> {
        Ok(self.class(class)?.static_fields.clone())
    }

    fn read_field(&self, obj: ObjectId, field: &FieldDescriptor) -> Result<Value, HeapError> {
        self.check_denied(field)?;
        let record = self.object(obj)?;
        Ok(record
            .fields
            .iter()
            .find(|(n, _)| *n == field.name)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null))
    }

    fn read_static(&self, field: &FieldDescriptor) -> Result<Value, HeapError> {
        self.check_denied(field)?;
        let record = self.class(&field.declaring_class)?;
        Ok(record
            .static_values
            .get(&field.name)
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn elements(&self, obj: ObjectId) -> Result<Vec<Value>, HeapError> {
        Ok(self.object(obj)?.elements.clone())
    }

    fn entries(&self, obj: ObjectId) -> Result<Vec<(Value, Value)>, HeapError> {
        Ok(self.object(obj)?.entries.clone())
    }

    fn unwrap_inner(&self, obj: ObjectId) -> Result<Value, HeapError> {
        Ok(self.object(obj)?.inner.clone())
    }

    fn threads(&self) -> Vec<ThreadInfo> {
        self.threads.iter().map(|t| t.info.clone()).collect()
    }

    fn thread_local_entry(&self, thread: ThreadId, tl: ObjectId) -> Option<Value> {
        self.threads
            .iter()
            .find(|t| t.info.id == thread)?
            .locals
            .iter()
            .find(|(obj, _)| *obj == tl)
            .map(|(_, v)| v.clone())
    }
}

impl super::BytecodeSupplier for MemoryHeap {
    fn class_code(&self, class: &str) -> Option<ClassCode> {
        self.classes.get(class)?.code.clone()
    }
}
