//! Rule evaluation: grouping, scope filters, panic isolation.

use heaplint::bytecode::{ClassCode, Insn, MemberRef, MethodCode, ProcessCaches};
use heaplint::graph::{Edge, EdgeKind, NodeKey, ObjectGraph};
use heaplint::heap::{FieldDescriptor, MemoryHeap, ObjectId, Value};
use heaplint::rules::{
    run_inspections, AnalysisContext, GroupingOptions, Inspection, Predicate, ScopeFilter,
    Severity, Suite,
};
use heaplint::scope::{Scope, ScopeOrder};

fn object(n: u64) -> NodeKey {
    NodeKey::Object(ObjectId(n))
}

/// Holder with `count` map-value entries under one field.
fn many_entries_graph(count: u64) -> ObjectGraph {
    let mut graph = ObjectGraph::new();
    graph.ensure_node(object(1), "com.app.Holder");
    graph.node_mut(&object(1)).unwrap().own_scope = Some(Scope::singleton());
    let field = FieldDescriptor::new("com.app.Holder", "cache", "java.util.Map");
    for n in 2..2 + count {
        graph.ensure_node(object(n), "com.app.Session");
        let mut edge = Edge::new(object(1), EdgeKind::MapValue, Value::Object(ObjectId(n)))
            .with_field(field.clone());
        edge.target = Some(object(n));
        edge.target_class = Some("com.app.Session".into());
        graph.add_edge(edge);
    }
    graph
}

fn run_with(
    graph: &ObjectGraph,
    heap: &MemoryHeap,
    inspections: Vec<Inspection>,
) -> Vec<heaplint::rules::InspectionResult> {
    let caches = ProcessCaches::new();
    let ctx = AnalysisContext {
        heap,
        bytecode: heap,
        caches: &caches,
    };
    run_inspections(
        graph,
        &inspections,
        &ctx,
        &ScopeOrder::standard(),
        &GroupingOptions::default(),
    )
}

#[test]
fn test_many_matches_collapse_to_one_group() {
    let graph = many_entries_graph(1000);
    let heap = MemoryHeap::new();
    let inspection = Inspection::new(
        "HL900",
        "test",
        Severity::Warning,
        "session retained in shared map",
        Predicate::kind_is(EdgeKind::MapValue),
    );

    let results = run_with(&graph, &heap, vec![inspection]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].groups.len(), 1);
    let group = &results[0].groups[0];
    assert_eq!(group.identity, "com.app.Holder.cache[map value]");
    assert_eq!(group.additional, 999);
    assert_eq!(results[0].match_count(), 1000);
}

#[test]
fn test_panicking_predicate_isolated() {
    let graph = many_entries_graph(3);
    let heap = MemoryHeap::new();
    let panicking = Inspection::new(
        "HL901",
        "test",
        Severity::Error,
        "always panics",
        Predicate::new(|_| panic!("boom")),
    );
    let healthy = Inspection::new(
        "HL902",
        "test",
        Severity::Warning,
        "matches everything",
        Predicate::new(|_| true),
    );

    let results = run_with(&graph, &heap, vec![panicking, healthy]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "HL902");
}

#[test]
fn test_disabled_inspection_skipped() {
    let graph = many_entries_graph(1);
    let heap = MemoryHeap::new();
    let inspection = Inspection::new(
        "HL903",
        "test",
        Severity::Info,
        "disabled",
        Predicate::new(|_| true),
    )
    .disabled();

    assert!(run_with(&graph, &heap, vec![inspection]).is_empty());
}

#[test]
fn test_scope_filter_excludes_narrow_owners() {
    let mut graph = many_entries_graph(1);
    let heap = MemoryHeap::new();
    let shared_only = || {
        Inspection::new(
            "HL904",
            "test",
            Severity::Warning,
            "shared scope only",
            Predicate::kind_is(EdgeKind::MapValue),
        )
        .with_scope_filter(ScopeFilter::at_least(Scope::singleton()))
    };

    assert_eq!(run_with(&graph, &heap, vec![shared_only()]).len(), 1);

    graph.node_mut(&object(1)).unwrap().own_scope = Some(Scope::request());
    assert!(run_with(&graph, &heap, vec![shared_only()]).is_empty());
}

#[test]
fn test_results_sorted_by_inspection_id() {
    let graph = many_entries_graph(1);
    let heap = MemoryHeap::new();
    let make = |id: &str| {
        Inspection::new(id, "test", Severity::Info, "x", Predicate::new(|_| true))
    };

    let results = run_with(&graph, &heap, vec![make("HL910"), make("HL905"), make("HL901")]);
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["HL901", "HL905", "HL910"]);
}

#[test]
fn test_analyzer_access_feeds_exposure_index() {
    let mut heap = MemoryHeap::new();
    heap.register_code(ClassCode::new("com.app.Prober").with_method(
        MethodCode::new("peek", "()V").with_instructions(vec![
            Insn::GetStatic(MemberRef::new("com.app.Holder", "cache", "Ljava/util/Map;")),
            Insn::Pop,
            Insn::Return,
        ]),
    ));
    let caches = ProcessCaches::new();
    let ctx = AnalysisContext {
        heap: &heap,
        bytecode: &heap,
        caches: &caches,
    };

    assert!(ctx.with_analyzer("com.app.Prober", |_| ()).is_some());
    assert!(caches
        .exposure()
        .is_externally_touched("com.app.Holder", "cache"));
}

#[test]
fn test_suite_trait_collected_once() {
    struct TinySuite;
    impl Suite for TinySuite {
        fn name(&self) -> &str {
            "tiny"
        }
        fn inspections(&self) -> Vec<Inspection> {
            vec![Inspection::new(
                "HL920",
                "test",
                Severity::Info,
                "tiny",
                Predicate::new(|_| true),
            )]
        }
    }

    let collected = TinySuite.inspections();
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].id, "HL920");
}
