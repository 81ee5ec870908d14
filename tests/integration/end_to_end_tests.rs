//! Full-pipeline scenarios through the Inspector.

use std::sync::Arc;

use anyhow::Result;
use heaplint::bytecode::{ClassCode, Insn, InvokeKind, MemberRef, MethodAccess, MethodCode};
use heaplint::heap::{
    BytecodeSupplier, FieldDescriptor, Heap, MemoryHeap, NoProxies, Root, StaticRoots, Value,
};
use heaplint::rules::CoreSuite;
use heaplint::scope::MapScopeDetector;
use heaplint::{Baseline, Config, Inspector, ReportFormat, Reporter, ScanError};

/// A class holding a static HashMap that a public method mutates: the
/// canonical shared-mutable-cache defect.
fn static_holder_code() -> ClassCode {
    ClassCode::new("com.app.StaticHolder")
        .with_method(
            MethodCode::new("<clinit>", "()V").static_method().with_instructions(vec![
                Insn::New("java.util.HashMap".into()),
                Insn::PutStatic(MemberRef::new(
                    "com.app.StaticHolder",
                    "cache",
                    "Ljava/util/Map;",
                )),
                Insn::Return,
            ]),
        )
        .with_method(
            MethodCode::new("remember", "(Ljava/lang/String;Ljava/lang/Object;)V")
                .with_access(MethodAccess::public())
                .static_method()
                .with_instructions(vec![
                    Insn::GetStatic(MemberRef::new(
                        "com.app.StaticHolder",
                        "cache",
                        "Ljava/util/Map;",
                    )),
                    Insn::Load(0),
                    Insn::Load(1),
                    Insn::Invoke {
                        kind: InvokeKind::Interface,
                        target: MemberRef::new(
                            "java.util.Map",
                            "put",
                            "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
                        ),
                    },
                    Insn::Pop,
                    Insn::Return,
                ]),
        )
}

fn static_holder_heap() -> MemoryHeap {
    let mut heap = MemoryHeap::new();
    heap.register_code(static_holder_code());
    heap.declare_field(
        FieldDescriptor::new("com.app.StaticHolder", "cache", "java.util.Map").with_static(),
    );
    let map = heap.alloc_map("java.util.HashMap");
    heap.set_static("com.app.StaticHolder", "cache", Value::Object(map));
    for n in 0..3 {
        let session = heap.alloc_plain("com.app.Session");
        heap.put_entry(
            map,
            Value::primitive(format!("user-{n}")),
            Value::Object(session),
        );
    }
    heap
}

fn inspector_for(heap: MemoryHeap, roots: Vec<Root>, config: Config) -> Inspector {
    let heap = Arc::new(heap);
    let mut inspector = Inspector::new(
        Arc::clone(&heap) as Arc<dyn Heap>,
        Arc::new(NoProxies),
        Arc::new(MapScopeDetector::new()),
        Arc::new(StaticRoots::new(roots)),
        heap as Arc<dyn BytecodeSupplier>,
        config,
    );
    inspector.register_suite(&CoreSuite);
    inspector
}

#[test]
fn test_static_cache_reported_once_at_static_scope() {
    let inspector = inspector_for(
        static_holder_heap(),
        vec![Root::class("com.app.StaticHolder")],
        Config::default(),
    );
    let scan = inspector.scan().unwrap();

    let result = scan.results.iter().find(|r| r.id == "HL002").unwrap();
    assert_eq!(result.groups.len(), 1);
    let group = &result.groups[0];
    assert_eq!(group.identity, "com.app.StaticHolder.cache[value]");
    assert_eq!(group.scope, "static");
    assert_eq!(group.field.as_deref(), Some("cache"));
    assert!(!group.backrefs.is_empty());
}

#[test]
fn test_repeated_scans_render_identically() {
    let inspector = inspector_for(
        static_holder_heap(),
        vec![Root::class("com.app.StaticHolder")],
        Config::default(),
    );
    let first = inspector.scan().unwrap();
    let second = inspector.scan().unwrap();

    let render = |results: &[heaplint::InspectionResult]| serde_json::to_string(results).unwrap();
    assert_eq!(render(&first.results), render(&second.results));
}

#[test]
fn test_baseline_suppresses_known_findings() -> Result<()> {
    let inspector = inspector_for(
        static_holder_heap(),
        vec![Root::class("com.app.StaticHolder")],
        Config::default(),
    );
    let scan = inspector.scan()?;
    assert!(!scan.results.is_empty());

    let temp = tempfile::TempDir::new()?;
    let path = temp.path().join("baseline.json");
    Baseline::from_results(&scan.results).save(&path)?;

    let baseline = Baseline::load(&path)?;
    let rescan = inspector.scan()?;
    assert!(baseline.filter_new(&rescan.results).is_empty());
    Ok(())
}

#[test]
fn test_json_report_written_to_file() -> Result<()> {
    let inspector = inspector_for(
        static_holder_heap(),
        vec![Root::class("com.app.StaticHolder")],
        Config::default(),
    );
    let scan = inspector.scan()?;

    let temp = tempfile::TempDir::new()?;
    let path = temp.path().join("report.json");
    Reporter::new(ReportFormat::Json, Some(path.clone())).report(&scan.results)?;

    let contents = std::fs::read_to_string(&path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    assert!(value["total_matches"].as_u64().unwrap() >= 1);
    Ok(())
}

#[test]
fn test_config_disables_and_filters() {
    let mut config = Config::default();
    config.rules.disabled.push("HL002".to_string());
    config.walk.exclude.push(r"^com\.app\.Session$".to_string());

    let inspector = inspector_for(
        static_holder_heap(),
        vec![Root::class("com.app.StaticHolder")],
        config,
    );
    let scan = inspector.scan().unwrap();
    assert!(!scan.results.iter().any(|r| r.id == "HL002"));
}

#[test]
fn test_try_scan_reports_contention() {
    // try_scan on an idle inspector succeeds; the error variant is only
    // produced while another scan holds the lock.
    let inspector = inspector_for(
        static_holder_heap(),
        vec![Root::class("com.app.StaticHolder")],
        Config::default(),
    );
    assert!(inspector.try_scan().is_ok());
    assert!(!matches!(
        inspector.try_scan(),
        Err(ScanError::ScanInProgress)
    ));
}

#[test]
fn test_last_result_survives_later_runs() {
    let inspector = inspector_for(
        static_holder_heap(),
        vec![Root::class("com.app.StaticHolder")],
        Config::default(),
    );
    assert!(inspector.last_result().is_none());
    let first = inspector.scan().unwrap();
    let held = inspector.last_result().unwrap();
    assert_eq!(held.stats.nodes, first.stats.nodes);
}
