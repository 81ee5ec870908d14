//! The built-in inspection suite.
//!
//! Covers the defect families the inspector exists for: shared mutable
//! state, unsafe collections under concurrency, leaking resources, and
//! improperly scoped closures. Hosts register additional suites next to
//! this one.

use crate::graph::EdgeKind;
use crate::heap::Shape;
use crate::scope::Scope;

use super::{Inspection, Predicate, ScopeFilter, Severity, Suite};

/// Mutating calls that make a shared collection a hazard.
const MUTATOR_METHODS: &[&str] = &[
    "add", "addAll", "remove", "removeAll", "removeIf", "clear", "put", "putAll", "putIfAbsent",
    "merge", "set", "sort",
];

pub struct CoreSuite;

impl CoreSuite {
    fn shape_held(shape: Shape) -> Predicate {
        Predicate::kind_is(EdgeKind::DirectValue).and(Predicate::target_shape(shape))
    }

    fn mutated() -> Predicate {
        Predicate::modified_outside_constructor()
            .or(Predicate::field_value_called(MUTATOR_METHODS))
    }

    fn unsafe_shared_collection() -> Inspection {
        Inspection::new(
            "HL001",
            "concurrency",
            Severity::Error,
            "mutable collection shared across threads without a concurrent type",
            Self::shape_held(Shape::Collection)
                .and(Predicate::target_concurrency_safe().not())
                .and(Predicate::field_volatile().not())
                .and(Self::mutated()),
        )
        .with_scope_filter(ScopeFilter::at_least(Scope::singleton()))
    }

    fn unsafe_shared_map() -> Inspection {
        Inspection::new(
            "HL002",
            "concurrency",
            Severity::Error,
            "mutable map shared across threads without a concurrent type",
            Self::shape_held(Shape::Map)
                .and(Predicate::target_concurrency_safe().not())
                .and(Self::mutated()),
        )
        .with_scope_filter(ScopeFilter::at_least(Scope::singleton()))
    }

    fn mutable_static_field() -> Inspection {
        Inspection::new(
            "HL003",
            "shared-state",
            Severity::Warning,
            "static field reassigned after class initialization",
            Predicate::kind_is(EdgeKind::DirectValue)
                .and(Predicate::field_static())
                .and(Predicate::field_final().not())
                .and(Predicate::modified_outside_constructor()),
        )
    }

    fn stale_thread_local() -> Inspection {
        Inspection::new(
            "HL004",
            "resources",
            Severity::Error,
            "thread-local value retained by a thread that no longer runs it",
            Predicate::kind_in(&[
                EdgeKind::WaitingThreadLocal,
                EdgeKind::TerminatedThreadLocal,
            ])
            .and(Predicate::value_present()),
        )
    }

    fn unreleased_resource() -> Inspection {
        Inspection::new(
            "HL005",
            "resources",
            Severity::Warning,
            "closeable resource held by a long-lived owner",
            Predicate::kind_is(EdgeKind::DirectValue)
                .and(
                    Predicate::target_extends("java.lang.AutoCloseable")
                        .or(Predicate::target_extends("java.io.Closeable")),
                )
                .and(Predicate::field_annotated("javax.annotation.WillClose").not()),
        )
        .with_scope_filter(ScopeFilter::at_least(Scope::singleton()))
    }

    fn widening_closure_capture() -> Inspection {
        Inspection::new(
            "HL006",
            "scoping",
            Severity::Warning,
            "closure capture pins an object into a broader lifetime",
            Predicate::field_closure_capture().and(Predicate::value_present()),
        )
        .with_scope_filter(ScopeFilter::at_least(Scope::session()))
    }

    fn exposed_private_field() -> Inspection {
        Inspection::new(
            "HL007",
            "shared-state",
            Severity::Info,
            "private field reached from outside its declaring class",
            Predicate::kind_is(EdgeKind::DirectValue)
                .and(Predicate::field_private())
                .and(Predicate::field_externally_touched()),
        )
    }

    fn possible_unsafe_assignment() -> Inspection {
        Inspection::new(
            "HL008",
            "concurrency",
            Severity::Info,
            "field may be assigned a non-concurrent container",
            Predicate::kind_is(EdgeKind::PossibleValue)
                .and(Predicate::target_concurrency_safe().not())
                .and(
                    Predicate::target_class_contains("Map")
                        .or(Predicate::target_class_contains("List"))
                        .or(Predicate::target_class_contains("Set")),
                ),
        )
        .with_scope_filter(ScopeFilter::at_least(Scope::singleton()))
    }
}

impl Suite for CoreSuite {
    fn name(&self) -> &str {
        "core"
    }

    fn inspections(&self) -> Vec<Inspection> {
        vec![
            Self::unsafe_shared_collection(),
            Self::unsafe_shared_map(),
            Self::mutable_static_field(),
            Self::stale_thread_local(),
            Self::unreleased_resource(),
            Self::widening_closure_capture(),
            Self::exposed_private_field(),
            Self::possible_unsafe_assignment(),
        ]
    }
}
