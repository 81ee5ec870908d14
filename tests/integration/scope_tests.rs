//! Scope detection and propagation through walked graphs.

use heaplint::bytecode::ProcessCaches;
use heaplint::graph::{Edge, EdgeKind, NodeKey, ObjectGraph, ObjectGraphWalker};
use heaplint::heap::{FieldDescriptor, MemoryHeap, NoProxies, ObjectId, Root, Value};
use heaplint::scope::{MapScopeDetector, Scope, ScopeDetector, ScopePropagator};

fn walk_and_propagate(
    heap: &MemoryHeap,
    detector: &dyn ScopeDetector,
    roots: Vec<Root>,
) -> ObjectGraph {
    let caches = ProcessCaches::new();
    let unwrap = NoProxies;
    let mut graph = ObjectGraphWalker::new(heap, &unwrap, detector, heap, &caches).walk(&roots);
    ScopePropagator::new(detector).propagate(&mut graph);
    graph
}

fn chain_heap() -> (MemoryHeap, [heaplint::heap::ObjectId; 3]) {
    // registry -> service -> worker
    let mut heap = MemoryHeap::new();
    let registry = heap.alloc_plain("com.app.Registry");
    let service = heap.alloc_plain("com.app.Service");
    let worker = heap.alloc_plain("com.app.Worker");
    heap.declare_field(FieldDescriptor::new(
        "com.app.Registry",
        "service",
        "com.app.Service",
    ));
    heap.declare_field(FieldDescriptor::new(
        "com.app.Service",
        "worker",
        "com.app.Worker",
    ));
    heap.set_field(registry, "service", Value::Object(service));
    heap.set_field(service, "worker", Value::Object(worker));
    (heap, [registry, service, worker])
}

#[test]
fn test_detected_scope_reaches_transitive_objects() {
    let (heap, ids) = chain_heap();
    let detector =
        MapScopeDetector::new().with_scope("com.app.Registry", Scope::singleton());
    let graph = walk_and_propagate(&heap, &detector, vec![Root::object(ids[0])]);

    for &id in &ids {
        assert_eq!(
            graph.effective_scope(&NodeKey::Object(id)),
            Scope::singleton()
        );
    }
    // Only the registry's scope is its own
    assert!(!graph
        .node(&NodeKey::Object(ids[0]))
        .unwrap()
        .scope_is_inherited());
    assert!(graph
        .node(&NodeKey::Object(ids[2]))
        .unwrap()
        .scope_is_inherited());
}

#[test]
fn test_propagation_is_root_order_independent() {
    // Two scoped roots sharing a target; result must not depend on which
    // root is listed first.
    let build = |first_root: &str| -> Scope {
        let mut heap = MemoryHeap::new();
        let session_owner = heap.alloc_plain("com.app.SessionHolder");
        let static_owner = heap.alloc_plain("com.app.StaticHolder");
        let shared = heap.alloc_plain("com.app.Shared");
        heap.declare_field(FieldDescriptor::new(
            "com.app.SessionHolder",
            "shared",
            "com.app.Shared",
        ));
        heap.declare_field(FieldDescriptor::new(
            "com.app.StaticHolder",
            "shared",
            "com.app.Shared",
        ));
        heap.set_field(session_owner, "shared", Value::Object(shared));
        heap.set_field(static_owner, "shared", Value::Object(shared));

        let detector = MapScopeDetector::new()
            .with_scope("com.app.SessionHolder", Scope::session())
            .with_scope("com.app.StaticHolder", Scope::statics());

        let roots = if first_root == "session" {
            vec![Root::object(session_owner), Root::object(static_owner)]
        } else {
            vec![Root::object(static_owner), Root::object(session_owner)]
        };
        let graph = walk_and_propagate(&heap, &detector, roots);
        graph.effective_scope(&NodeKey::Object(shared))
    };

    assert_eq!(build("session"), Scope::statics());
    assert_eq!(build("static"), Scope::statics());
}

#[test]
fn test_propagation_ignores_edge_insertion_order() {
    // Same graph, edges inserted in opposite orders; the fixed point must
    // land on the broadest reaching scope either way.
    let effective = |reversed: bool| -> Scope {
        let mut graph = ObjectGraph::new();
        let narrow = NodeKey::Object(ObjectId(1));
        let broad = NodeKey::Object(ObjectId(2));
        let shared = NodeKey::Object(ObjectId(3));
        graph.ensure_node(narrow.clone(), "com.app.SessionHolder");
        graph.ensure_node(broad.clone(), "com.app.StaticHolder");
        graph.ensure_node(shared.clone(), "com.app.Shared");
        graph.node_mut(&narrow).unwrap().own_scope = Some(Scope::session());
        graph.node_mut(&broad).unwrap().own_scope = Some(Scope::statics());

        let link = |graph: &mut ObjectGraph, from: &NodeKey| {
            let mut edge = Edge::new(
                from.clone(),
                EdgeKind::DirectValue,
                Value::Object(ObjectId(3)),
            );
            edge.target = Some(NodeKey::Object(ObjectId(3)));
            graph.add_edge(edge);
        };
        if reversed {
            link(&mut graph, &broad);
            link(&mut graph, &narrow);
        } else {
            link(&mut graph, &narrow);
            link(&mut graph, &broad);
        }

        ScopePropagator::new(&MapScopeDetector::new()).propagate(&mut graph);
        graph.effective_scope(&shared)
    };

    assert_eq!(effective(false), Scope::statics());
    assert_eq!(effective(true), Scope::statics());
}

#[test]
fn test_detector_scope_beats_inherited() {
    let (heap, ids) = chain_heap();
    let detector = MapScopeDetector::new()
        .with_scope("com.app.Registry", Scope::statics())
        .with_scope("com.app.Service", Scope::request());
    let graph = walk_and_propagate(&heap, &detector, vec![Root::object(ids[0])]);

    // Service declares request scope; propagation must not widen it, but
    // the worker below it inherits the service's effective scope.
    assert_eq!(
        graph.effective_scope(&NodeKey::Object(ids[1])),
        Scope::request()
    );
    assert_eq!(
        graph.effective_scope(&NodeKey::Object(ids[2])),
        Scope::request()
    );
}

#[test]
fn test_closure_capture_field_does_not_widen() {
    let mut heap = MemoryHeap::new();
    let task = heap.alloc_plain("com.app.Job$1");
    let captured = heap.alloc_plain("com.app.RequestContext");
    heap.declare_field(
        FieldDescriptor::new("com.app.Job$1", "val$ctx", "com.app.RequestContext")
            .with_synthetic(),
    );
    heap.set_field(task, "val$ctx", Value::Object(captured));

    let detector = MapScopeDetector::new().with_scope("com.app.Job$1", Scope::statics());
    let graph = walk_and_propagate(&heap, &detector, vec![Root::object(task)]);

    assert_eq!(
        graph.effective_scope(&NodeKey::Object(captured)),
        Scope::instance()
    );
}

#[test]
fn test_class_roots_are_static_scoped() {
    let mut heap = MemoryHeap::new();
    let held = heap.alloc_plain("com.app.Held");
    heap.define_class("com.app.Registry");
    heap.declare_field(
        FieldDescriptor::new("com.app.Registry", "held", "com.app.Held").with_static(),
    );
    heap.set_static("com.app.Registry", "held", Value::Object(held));

    let detector = MapScopeDetector::new();
    let graph = walk_and_propagate(&heap, &detector, vec![Root::class("com.app.Registry")]);

    assert_eq!(
        graph.effective_scope(&NodeKey::Class("com.app.Registry".to_string())),
        Scope::statics()
    );
    assert_eq!(
        graph.effective_scope(&NodeKey::Object(held)),
        Scope::statics()
    );
}
