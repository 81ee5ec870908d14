//! Breadth-first object graph walker.
//!
//! Walks the live heap from the supplied roots with an explicit queue (not
//! recursion, to bound depth and allow progress reporting), producing the
//! node table and backreference index. Identity-based visiting guarantees
//! each reachable node is processed exactly once, even over cycles; the
//! queue drains exhaustively in one pass.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info};

use crate::bytecode::{ClassAnalyzer, PossibleValueTable, ProcessCaches};
use crate::heap::{
    BytecodeSupplier, FieldDescriptor, Heap, ObjectId, Root, RootTarget, Shape, ThreadState,
    UnwrapHook, Value,
};
use crate::scope::{Scope, ScopeDetector};

use super::{Edge, EdgeKind, NodeKey, ObjectGraph};

const PROGRESS_INTERVAL: usize = 1000;

/// Classes never materialized as nodes: primitives, known immutable boxed
/// types, language internals, proxy machinery, and this tool's own types.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    exact: HashSet<String>,
    prefixes: Vec<String>,
    markers: Vec<String>,
}

impl IgnoreSet {
    pub fn standard() -> Self {
        let exact = [
            "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
            "java.lang.Boolean", "java.lang.Byte", "java.lang.Character", "java.lang.Short",
            "java.lang.Integer", "java.lang.Long", "java.lang.Float", "java.lang.Double",
            "java.lang.String", "java.lang.Class",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        Self {
            exact,
            prefixes: vec![
                "jdk.internal.".to_string(),
                "sun.".to_string(),
                "heaplint.".to_string(),
            ],
            markers: vec!["$Proxy".to_string(), "CGLIB$$".to_string()],
        }
    }

    pub fn empty() -> Self {
        Self {
            exact: HashSet::new(),
            prefixes: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn add_exact(&mut self, class: impl Into<String>) {
        self.exact.insert(class.into());
    }

    pub fn add_prefix(&mut self, prefix: impl Into<String>) {
        self.prefixes.push(prefix.into());
    }

    pub fn matches(&self, class: &str) -> bool {
        self.exact.contains(class)
            || self.prefixes.iter().any(|p| class.starts_with(p.as_str()))
            || self.markers.iter().any(|m| class.contains(m.as_str()))
    }
}

impl Default for IgnoreSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// In-scope class filter: which classes the walk expands through. Targets
/// of non-cascading classes are still recorded as nodes, and containers
/// held in a cascading owner's field are still decomposed at that field
/// site; what the filter suppresses is the target's own field walk.
#[derive(Debug, Clone, Default)]
pub struct CascadeFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl CascadeFilter {
    /// Cascade through everything not otherwise ignored.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn with_include(mut self, pattern: Regex) -> Self {
        self.include.push(pattern);
        self
    }

    pub fn with_exclude(mut self, pattern: Regex) -> Self {
        self.exclude.push(pattern);
        self
    }

    pub fn is_cascading(&self, class: &str) -> bool {
        if self.exclude.iter().any(|r| r.is_match(class)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|r| r.is_match(class))
    }
}

enum Pending {
    Class(String),
    Object(ObjectId),
}

/// One-shot walker; consumed by [`walk`](ObjectGraphWalker::walk).
pub struct ObjectGraphWalker<'a> {
    heap: &'a dyn Heap,
    unwrap: &'a dyn UnwrapHook,
    scopes: &'a dyn ScopeDetector,
    bytecode: &'a dyn BytecodeSupplier,
    caches: &'a ProcessCaches,
    ignore: IgnoreSet,
    cascade: CascadeFilter,
    graph: ObjectGraph,
    queue: VecDeque<Pending>,
    /// Containers already decomposed at a field site; their own processing
    /// must not decompose them again.
    decomposed: HashSet<ObjectId>,
    /// Classes whose bytecode was already fed to the exposure registry.
    exposure_seen: HashSet<String>,
    scope_memo: HashMap<String, Option<Scope>>,
    possible_memo: HashMap<String, Arc<PossibleValueTable>>,
    processed: usize,
}

impl<'a> ObjectGraphWalker<'a> {
    pub fn new(
        heap: &'a dyn Heap,
        unwrap: &'a dyn UnwrapHook,
        scopes: &'a dyn ScopeDetector,
        bytecode: &'a dyn BytecodeSupplier,
        caches: &'a ProcessCaches,
    ) -> Self {
        Self {
            heap,
            unwrap,
            scopes,
            bytecode,
            caches,
            ignore: IgnoreSet::standard(),
            cascade: CascadeFilter::everything(),
            graph: ObjectGraph::new(),
            queue: VecDeque::new(),
            decomposed: HashSet::new(),
            exposure_seen: HashSet::new(),
            scope_memo: HashMap::new(),
            possible_memo: HashMap::new(),
            processed: 0,
        }
    }

    pub fn with_ignore(mut self, ignore: IgnoreSet) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_cascade(mut self, cascade: CascadeFilter) -> Self {
        self.cascade = cascade;
        self
    }

    /// Run the walk to exhaustion and hand back the graph.
    pub fn walk(mut self, roots: &[Root]) -> ObjectGraph {
        for root in roots {
            self.seed(root);
        }
        while let Some(pending) = self.queue.pop_front() {
            self.processed += 1;
            if self.processed % PROGRESS_INTERVAL == 0 {
                info!(
                    processed = self.processed,
                    queued = self.queue.len(),
                    nodes = self.graph.node_count(),
                    "walk in progress"
                );
            }
            match pending {
                Pending::Class(name) => self.process_class(&name),
                Pending::Object(id) => self.process_object(id),
            }
        }
        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "walk complete"
        );
        self.graph
    }

    fn seed(&mut self, root: &Root) {
        match &root.target {
            RootTarget::Class(name) => self.enqueue_class(name),
            RootTarget::Object(id) => {
                let id = self.unwrap.unwrap(*id);
                let class = match self.heap.class_of(id) {
                    Ok(class) => class,
                    Err(err) => {
                        debug!(%id, %err, "skipping unreadable root");
                        return;
                    }
                };
                if self.ignore.matches(&class) {
                    return;
                }
                if self.materialize_object(id, &class) {
                    self.queue.push_back(Pending::Object(id));
                }
                if let Some(scope) = &root.scope {
                    if let Some(node) = self.graph.node_mut(&NodeKey::Object(id)) {
                        node.own_scope = Some(scope.clone());
                    }
                }
            }
        }
    }

    fn enqueue_class(&mut self, name: &str) {
        if self.ignore.matches(name) {
            return;
        }
        let key = NodeKey::Class(name.to_string());
        if self.graph.ensure_node(key.clone(), name) {
            if let Some(node) = self.graph.node_mut(&key) {
                node.own_scope = Some(Scope::statics());
            }
            self.queue.push_back(Pending::Class(name.to_string()));
        }
    }

    /// Create the node for an object if unseen, detecting its own scope.
    /// Returns true when newly created.
    fn materialize_object(&mut self, id: ObjectId, class: &str) -> bool {
        let key = NodeKey::Object(id);
        if !self.graph.ensure_node(key.clone(), class) {
            return false;
        }
        self.index_exposure(class);
        let scope = self.detect_scope(class);
        if scope.is_some() {
            if let Some(node) = self.graph.node_mut(&key) {
                node.own_scope = scope;
            }
        }
        true
    }

    fn detect_scope(&mut self, class: &str) -> Option<Scope> {
        if let Some(memo) = self.scope_memo.get(class) {
            return memo.clone();
        }
        let detected = self.scopes.detect_scope(class);
        self.scope_memo.insert(class.to_string(), detected.clone());
        detected
    }

    fn process_class(&mut self, name: &str) {
        if let Some(superclass) = self.heap.superclass(name) {
            self.enqueue_class(&superclass);
        }
        // Indexes exposure and memoizes the possible-value table
        self.possible_table(name);

        let fields = match self.heap.static_fields(name) {
            Ok(fields) => fields,
            Err(err) => {
                debug!(class = name, %err, "static field enumeration failed");
                return;
            }
        };
        let owner = NodeKey::Class(name.to_string());
        for field in fields.iter().filter(|f| !f.is_synthetic) {
            match self.heap.read_static(field) {
                Ok(value) => self.decompose_field(&owner, field, value),
                Err(err) => debug!(field = %field, %err, "static read failed, skipping"),
            }
        }
    }

    fn process_object(&mut self, id: ObjectId) {
        let key = NodeKey::Object(id);
        let Some(node) = self.graph.node(&key) else {
            return;
        };
        let class = node.class.clone();

        let shape = match self.heap.shape_of(id) {
            Ok(shape) => shape,
            Err(err) => {
                debug!(%id, %err, "shape probe failed, skipping object");
                return;
            }
        };

        match shape {
            Shape::Plain => self.walk_instance_fields(id, &class),
            Shape::Terminal => {}
            // Containers reached without a field site (roots, nested
            // containers) still get their contents decomposed once.
            _ if !self.decomposed.contains(&id) => {
                self.decompose_container(&key, id, shape, None);
            }
            _ => {}
        }
    }

    fn walk_instance_fields(&mut self, id: ObjectId, class: &str) {
        let owner = NodeKey::Object(id);
        let fields = match self.heap.enumerate_fields(class) {
            Ok(fields) => fields,
            Err(err) => {
                debug!(class, %err, "field enumeration failed, skipping object");
                return;
            }
        };
        for field in &fields {
            if field.is_static {
                continue;
            }
            match self.heap.read_field(id, field) {
                Ok(value) => self.decompose_field(&owner, field, value),
                Err(err) => debug!(field = %field, %err, "field read failed, skipping"),
            }
        }
    }

    /// Record the raw direct-value edge, then decompose the value by its
    /// runtime category, not its declared type.
    fn decompose_field(&mut self, owner: &NodeKey, field: &FieldDescriptor, value: Value) {
        let target =
            self.record_edge(owner.clone(), EdgeKind::DirectValue, Some(field), value.clone());

        if let Some(raw) = value.object() {
            if target.is_some() {
                let id = self.unwrap.unwrap(raw);
                match self.heap.shape_of(id) {
                    Ok(shape) => self.decompose_container(owner, id, shape, Some(field)),
                    Err(err) => debug!(field = %field, %err, "shape probe failed"),
                }
            }
        }

        // Statically provable candidates for values the walk observed null
        // or did not cascade into
        if target.is_none() {
            self.materialize_possible_values(owner, field);
        }
    }

    fn decompose_container(
        &mut self,
        owner: &NodeKey,
        id: ObjectId,
        shape: Shape,
        field: Option<&FieldDescriptor>,
    ) {
        self.decomposed.insert(id);
        match shape {
            Shape::Array | Shape::Collection => {
                let kind = if shape == Shape::Array {
                    EdgeKind::ArrayItem
                } else {
                    EdgeKind::CollectionItem
                };
                let elements = match self.heap.elements(id) {
                    Ok(elements) => elements,
                    Err(err) => {
                        debug!(%id, %err, "element read failed, skipping container");
                        return;
                    }
                };
                for element in elements {
                    if !element.is_null() {
                        self.record_edge(owner.clone(), kind, field, element);
                    }
                }
            }
            Shape::Map => {
                let entries = match self.heap.entries(id) {
                    Ok(entries) => entries,
                    Err(err) => {
                        debug!(%id, %err, "entry read failed, skipping map");
                        return;
                    }
                };
                for (key, value) in entries {
                    let key_target = if key.is_null() {
                        None
                    } else {
                        self.record_edge(owner.clone(), EdgeKind::MapKey, field, key)
                    };
                    let value_target = if value.is_null() {
                        None
                    } else {
                        self.record_edge(owner.clone(), EdgeKind::MapValue, field, value.clone())
                    };
                    // Key-to-value link for later leak-chain reconstruction
                    if let (Some(key_node), Some(value_node)) = (key_target, value_target) {
                        let mut link = Edge::new(key_node, EdgeKind::MapValue, value);
                        link.target = Some(value_node);
                        link.chain_only = true;
                        self.graph.add_edge(link);
                    }
                }
            }
            Shape::Optional => {
                if let Some(inner) = self.read_inner(id) {
                    self.record_edge(owner.clone(), EdgeKind::OptionalValue, field, inner);
                }
            }
            Shape::ReferenceLike => {
                if let Some(inner) = self.read_inner(id) {
                    self.record_edge(owner.clone(), EdgeKind::ReferenceValue, field, inner);
                }
            }
            Shape::AtomicRef => {
                if let Some(inner) = self.read_inner(id) {
                    self.record_edge(owner.clone(), EdgeKind::AtomicReferenceValue, field, inner);
                }
            }
            Shape::ThreadLocal => self.extract_thread_locals(owner, id, field),
            Shape::Plain | Shape::Terminal => {}
        }
    }

    fn read_inner(&mut self, id: ObjectId) -> Option<Value> {
        match self.heap.unwrap_inner(id) {
            Ok(Value::Null) => None,
            Ok(value) => Some(value),
            Err(err) => {
                debug!(%id, %err, "inner read failed, skipping wrapper");
                None
            }
        }
    }

    /// Privileged per-thread extraction of one thread-local instance. The
    /// owning thread's run state classifies the edge; waiting and
    /// terminated entries are the diagnostically interesting ones.
    fn extract_thread_locals(
        &mut self,
        owner: &NodeKey,
        tl: ObjectId,
        field: Option<&FieldDescriptor>,
    ) {
        for thread in self.heap.threads() {
            let Some(value) = self.heap.thread_local_entry(thread.id, tl) else {
                continue;
            };
            let kind = match thread.state {
                ThreadState::Running => EdgeKind::ThreadLocal,
                ThreadState::Waiting => EdgeKind::WaitingThreadLocal,
                ThreadState::Terminated => EdgeKind::TerminatedThreadLocal,
            };
            self.record_edge(owner.clone(), kind, field, value);
        }
    }

    fn materialize_possible_values(&mut self, owner: &NodeKey, field: &FieldDescriptor) {
        let table = self.possible_table(&field.declaring_class);
        let Some(candidates) = table.get(&field.name) else {
            return;
        };
        for candidate in candidates.iter() {
            let mut edge = Edge::new(owner.clone(), EdgeKind::PossibleValue, Value::Null)
                .with_field(field.clone());
            edge.target_class = Some(candidate.candidate_type.clone());
            edge.possible = Some(candidate.clone());
            self.graph.add_edge(edge);
        }
    }

    /// Feed a class's cross-class member references into the process
    /// exposure registry, once per walk. Every materialized class goes
    /// through here, so the index accumulates from ordinary object-rooted
    /// scans, not just class roots.
    fn index_exposure(&mut self, class: &str) {
        if !self.exposure_seen.insert(class.to_string()) {
            return;
        }
        if let Some(code) = self.bytecode.class_code(class) {
            self.caches.exposure().record_class(&code);
        }
    }

    fn possible_table(&mut self, class: &str) -> Arc<PossibleValueTable> {
        if let Some(table) = self.possible_memo.get(class) {
            return Arc::clone(table);
        }
        self.index_exposure(class);
        let table = match self.bytecode.class_code(class) {
            Some(code) => self.caches.possible_values(class, || {
                ClassAnalyzer::new(&code, self.caches.exposure()).possible_values()
            }),
            None => Arc::new(PossibleValueTable::default()),
        };
        self.possible_memo.insert(class.to_string(), Arc::clone(&table));
        table
    }

    /// Record one edge. Non-null, non-ignored object targets are unwrapped,
    /// materialized as nodes, indexed for backreferences, and enqueued when
    /// their class cascades and the identity is unseen. Returns the target
    /// node key when one materialized.
    fn record_edge(
        &mut self,
        owner: NodeKey,
        kind: EdgeKind,
        field: Option<&FieldDescriptor>,
        raw: Value,
    ) -> Option<NodeKey> {
        let mut edge = Edge::new(owner, kind, raw.clone());
        if let Some(field) = field {
            edge = edge.with_field(field.clone());
        }

        let mut materialized = None;
        match raw.object() {
            Some(orig) => {
                let id = self.unwrap.unwrap(orig);
                match self.heap.class_of(id) {
                    Ok(class) => {
                        edge.target_class = Some(class.clone());
                        if !self.ignore.matches(&class) {
                            let newly = self.materialize_object(id, &class);
                            let key = NodeKey::Object(id);
                            edge.target = Some(key.clone());
                            materialized = Some(key);
                            if newly && self.cascade.is_cascading(&class) {
                                self.queue.push_back(Pending::Object(id));
                            }
                        }
                    }
                    Err(err) => {
                        debug!(%id, %err, "target class probe failed");
                    }
                }
            }
            None => {
                // Statically inferred type for unpopulated field slots
                if edge.target_class.is_none() {
                    if let Some(field) = field {
                        edge.target_class = Some(field.declared_type.clone());
                    }
                }
            }
        }
        self.graph.add_edge(edge);
        materialized
    }
}
