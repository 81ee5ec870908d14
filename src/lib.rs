//! heaplint - live object-graph and bytecode defect inspection
//!
//! This library walks a process's live object graph and combines it with
//! lightweight bytecode dataflow analysis to find defects that only
//! manifest in a running system: mutable state shared across threads,
//! unsafe collections in long-lived scopes, leaking resources, and
//! improperly scoped closures.
//!
//! # Architecture
//!
//! The inspection pipeline consists of:
//! 1. **Heap Access** - host-supplied capability traits over the live heap
//! 2. **Graph Walk** - BFS over reachable objects, each identity visited once
//! 3. **Scope Propagation** - objects inherit the broadest reaching lifetime
//! 4. **Bytecode Analysis** - provenance-based facts about field usage
//! 5. **Rule Evaluation** - predicate inspections over every reference
//! 6. **Reporting** - grouped findings in terminal or JSON form

/// Install a formatting subscriber for hosts that don't bring their own.
///
/// Honors `RUST_LOG`, defaulting to `info`. Does nothing if a global
/// subscriber is already set.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

pub mod baseline;
pub mod bytecode;
pub mod config;
pub mod engine;
pub mod graph;
pub mod heap;
pub mod report;
pub mod rules;
pub mod scope;

pub use baseline::{Baseline, BaselineError};
pub use bytecode::{ClassAnalyzer, ClassCode, ProcessCaches};
pub use config::{Config, ConfigError};
pub use engine::{Inspector, ScanError, ScanResult};
pub use graph::{Edge, EdgeKind, Node, NodeKey, ObjectGraph, ObjectGraphWalker};
pub use heap::{
    BytecodeSupplier, FieldDescriptor, Heap, HeapError, MemoryHeap, ObjectId, Root, RootSupplier,
    Shape, UnwrapHook, Value,
};
pub use report::{ReportFormat, Reporter};
pub use rules::{
    CoreSuite, Inspection, InspectionResult, Predicate, Reference, Severity, Suite,
};
pub use scope::{MapScopeDetector, Scope, ScopeDetector, ScopeOrder, ScopePropagator};
