//! Walk behavior through the public API: identity, decomposition, filters.

use heaplint::bytecode::{
    ClassCode, Insn, InvokeKind, MemberRef, MethodCode, ProcessCaches,
};
use heaplint::graph::{CascadeFilter, EdgeKind, IgnoreSet, NodeKey, ObjectGraph, ObjectGraphWalker};
use heaplint::heap::{FieldDescriptor, MemoryHeap, NoProxies, Root, Shape, Value};
use heaplint::scope::{MapScopeDetector, Scope};
use regex::Regex;

fn walk(heap: &MemoryHeap, roots: Vec<Root>) -> ObjectGraph {
    let detector = MapScopeDetector::new();
    let caches = ProcessCaches::new();
    let unwrap = NoProxies;
    ObjectGraphWalker::new(heap, &unwrap, &detector, heap, &caches).walk(&roots)
}

#[test]
fn test_shared_object_visited_once_with_all_backrefs() {
    let mut heap = MemoryHeap::new();
    let shared = heap.alloc_plain("com.app.Shared");
    let a = heap.alloc_plain("com.app.A");
    let b = heap.alloc_plain("com.app.B");
    heap.declare_field(FieldDescriptor::new("com.app.A", "held", "com.app.Shared"));
    heap.declare_field(FieldDescriptor::new("com.app.B", "held", "com.app.Shared"));
    heap.set_field(a, "held", Value::Object(shared));
    heap.set_field(b, "held", Value::Object(shared));

    let graph = walk(&heap, vec![Root::object(a), Root::object(b)]);

    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.backrefs_of(&NodeKey::Object(shared)).len(), 2);
}

#[test]
fn test_repeated_walks_are_identical() {
    let mut heap = MemoryHeap::new();
    let holder = heap.alloc_plain("com.app.Holder");
    let list = heap.alloc_collection("java.util.ArrayList");
    let item = heap.alloc_plain("com.app.Item");
    heap.declare_field(FieldDescriptor::new(
        "com.app.Holder",
        "items",
        "java.util.List",
    ));
    heap.set_field(holder, "items", Value::Object(list));
    heap.push_element(list, Value::Object(item));

    let first = walk(&heap, vec![Root::object(holder)]);
    let second = walk(&heap, vec![Root::object(holder)]);

    assert_eq!(first.node_count(), second.node_count());
    assert_eq!(first.edge_count(), second.edge_count());
    let kinds = |g: &ObjectGraph| -> Vec<EdgeKind> { g.edges().map(|(_, e)| e.kind).collect() };
    assert_eq!(kinds(&first), kinds(&second));
}

#[test]
fn test_container_field_decomposed_at_field_site() {
    let mut heap = MemoryHeap::new();
    let holder = heap.alloc_plain("com.app.Holder");
    let map = heap.alloc_map("java.util.HashMap");
    let session = heap.alloc_plain("com.app.Session");
    heap.declare_field(FieldDescriptor::new(
        "com.app.Holder",
        "cache",
        "java.util.Map",
    ));
    heap.set_field(holder, "cache", Value::Object(map));
    heap.put_entry(map, Value::primitive("user-1"), Value::Object(session));

    let graph = walk(&heap, vec![Root::object(holder)]);

    // Entry edges carry the originating field, owned by the composite
    let holder_node = graph.node(&NodeKey::Object(holder)).unwrap();
    let value_edge = holder_node
        .edges
        .iter()
        .map(|&id| graph.edge(id))
        .find(|e| e.kind == EdgeKind::MapValue)
        .unwrap();
    assert_eq!(value_edge.field_name(), Some("cache"));
    assert_eq!(value_edge.target, Some(NodeKey::Object(session)));
}

#[test]
fn test_cascade_exclude_records_but_does_not_descend() {
    let mut heap = MemoryHeap::new();
    let holder = heap.alloc_plain("com.app.Holder");
    let vendor = heap.alloc_plain("com.thirdparty.Widget");
    let hidden = heap.alloc_plain("com.thirdparty.Internals");
    heap.declare_field(FieldDescriptor::new(
        "com.app.Holder",
        "widget",
        "com.thirdparty.Widget",
    ));
    heap.declare_field(FieldDescriptor::new(
        "com.thirdparty.Widget",
        "internals",
        "com.thirdparty.Internals",
    ));
    heap.set_field(holder, "widget", Value::Object(vendor));
    heap.set_field(vendor, "internals", Value::Object(hidden));

    let detector = MapScopeDetector::new();
    let caches = ProcessCaches::new();
    let unwrap = NoProxies;
    let cascade =
        CascadeFilter::everything().with_exclude(Regex::new(r"^com\.thirdparty\.").unwrap());
    let graph = ObjectGraphWalker::new(&heap, &unwrap, &detector, &heap, &caches)
        .with_cascade(cascade)
        .walk(&[Root::object(holder)]);

    // The boundary object is a node, but its fields were never walked
    assert!(graph.contains(&NodeKey::Object(vendor)));
    assert!(!graph.contains(&NodeKey::Object(hidden)));
}

#[test]
fn test_ignore_set_additions_respected() {
    let mut heap = MemoryHeap::new();
    let holder = heap.alloc_plain("com.app.Holder");
    let logger = heap.alloc_plain("org.slf4j.Logger");
    heap.declare_field(FieldDescriptor::new(
        "com.app.Holder",
        "log",
        "org.slf4j.Logger",
    ));
    heap.set_field(holder, "log", Value::Object(logger));

    let detector = MapScopeDetector::new();
    let caches = ProcessCaches::new();
    let unwrap = NoProxies;
    let mut ignore = IgnoreSet::standard();
    ignore.add_prefix("org.slf4j.");
    let graph = ObjectGraphWalker::new(&heap, &unwrap, &detector, &heap, &caches)
        .with_ignore(ignore)
        .walk(&[Root::object(holder)]);

    assert!(!graph.contains(&NodeKey::Object(logger)));
    // The edge still records the observed class
    let edge_id = graph.node(&NodeKey::Object(holder)).unwrap().edges[0];
    assert_eq!(
        graph.edge(edge_id).target_class.as_deref(),
        Some("org.slf4j.Logger")
    );
}

#[test]
fn test_root_scope_annotation_applied() {
    let mut heap = MemoryHeap::new();
    let registry = heap.alloc_plain("com.app.Registry");
    let held = heap.alloc_plain("com.app.Held");
    heap.declare_field(FieldDescriptor::new(
        "com.app.Registry",
        "held",
        "com.app.Held",
    ));
    heap.set_field(registry, "held", Value::Object(held));

    let graph = walk(
        &heap,
        vec![Root::object(registry).with_scope(Scope::singleton())],
    );
    assert_eq!(
        graph.node(&NodeKey::Object(registry)).unwrap().own_scope,
        Some(Scope::singleton())
    );
}

#[test]
fn test_walked_instances_feed_exposure_index() {
    // Holder's cache is only written by a private method; Reflector's
    // bytecode calls it from outside. Walking the two plain instances must
    // be enough for the cross-class call to reach the exposure registry.
    let mut heap = MemoryHeap::new();
    let holder = heap.alloc_plain("com.app.Holder");
    let reflector = heap.alloc_plain("com.app.Reflector");
    heap.register_code(
        ClassCode::new("com.app.Holder").with_method(
            MethodCode::new("mutate", "()V").private().with_instructions(vec![
                Insn::Load(0),
                Insn::New("java.util.HashMap".into()),
                Insn::PutField(MemberRef::new("com.app.Holder", "cache", "Ljava/util/Map;")),
                Insn::Return,
            ]),
        ),
    );
    heap.register_code(
        ClassCode::new("com.app.Reflector").with_method(
            MethodCode::new("poke", "()V").with_instructions(vec![
                Insn::Load(0),
                Insn::Invoke {
                    kind: InvokeKind::Virtual,
                    target: MemberRef::new("com.app.Holder", "mutate", "()V"),
                },
                Insn::Return,
            ]),
        ),
    );

    let detector = MapScopeDetector::new();
    let caches = ProcessCaches::new();
    let unwrap = NoProxies;
    ObjectGraphWalker::new(&heap, &unwrap, &detector, &heap, &caches)
        .walk(&[Root::object(holder), Root::object(reflector)]);

    assert!(caches
        .exposure()
        .is_externally_touched("com.app.Holder", "mutate"));
    assert_eq!(
        caches
            .exposure()
            .external_referencers("com.app.Holder", "mutate"),
        vec!["com.app.Reflector.poke()V".to_string()]
    );
}

#[test]
fn test_optional_and_atomic_wrappers_unwrapped() {
    let mut heap = MemoryHeap::new();
    let holder = heap.alloc_plain("com.app.Holder");
    let optional = heap.alloc("java.util.Optional", Shape::Optional);
    let atomic = heap.alloc(
        "java.util.concurrent.atomic.AtomicReference",
        Shape::AtomicRef,
    );
    let payload = heap.alloc_plain("com.app.Payload");
    let cell_value = heap.alloc_plain("com.app.CellValue");
    heap.declare_field(FieldDescriptor::new(
        "com.app.Holder",
        "maybe",
        "java.util.Optional",
    ));
    heap.declare_field(FieldDescriptor::new(
        "com.app.Holder",
        "cell",
        "java.util.concurrent.atomic.AtomicReference",
    ));
    heap.set_field(holder, "maybe", Value::Object(optional));
    heap.set_field(holder, "cell", Value::Object(atomic));
    heap.set_inner(optional, Value::Object(payload));
    heap.set_inner(atomic, Value::Object(cell_value));

    let graph = walk(&heap, vec![Root::object(holder)]);
    let kinds: Vec<EdgeKind> = graph
        .node(&NodeKey::Object(holder))
        .unwrap()
        .edges
        .iter()
        .map(|&id| graph.edge(id).kind)
        .collect();
    assert!(kinds.contains(&EdgeKind::OptionalValue));
    assert!(kinds.contains(&EdgeKind::AtomicReferenceValue));
    assert!(graph.contains(&NodeKey::Object(payload)));
    assert!(graph.contains(&NodeKey::Object(cell_value)));
}
