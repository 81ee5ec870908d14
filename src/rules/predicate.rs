// Predicate combinators over references
#![allow(dead_code)]

use std::sync::Arc;

use crate::graph::EdgeKind;
use crate::heap::{Shape, Value, Visibility};

use super::Reference;

/// Class-name prefixes and markers treated as safe for concurrent use.
const CONCURRENT_PREFIXES: &[&str] = &["java.util.concurrent."];
const CONCURRENT_MARKERS: &[&str] = &["Synchronized", "CopyOnWrite", "Immutable", "Unmodifiable"];

/// A composable boolean over a single reference. Leaves close over the
/// graph, heap and bytecode facts exposed by [`Reference`]; combinators
/// build the rule language on top.
#[derive(Clone)]
pub struct Predicate(Arc<dyn Fn(&Reference<'_>) -> bool + Send + Sync>);

impl Predicate {
    pub fn new(f: impl Fn(&Reference<'_>) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn eval(&self, reference: &Reference<'_>) -> bool {
        (self.0)(reference)
    }

    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::new(move |r| self.eval(r) && other.eval(r))
    }

    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::new(move |r| self.eval(r) || other.eval(r))
    }

    pub fn not(self) -> Predicate {
        Predicate::new(move |r| !self.eval(r))
    }

    // ---- leaves over the relation itself ----

    pub fn kind_is(kind: EdgeKind) -> Predicate {
        Predicate::new(move |r| r.kind() == kind)
    }

    pub fn kind_in(kinds: &[EdgeKind]) -> Predicate {
        let kinds = kinds.to_vec();
        Predicate::new(move |r| kinds.contains(&r.kind()))
    }

    pub fn value_present() -> Predicate {
        Predicate::new(|r| !matches!(r.value(), Value::Null))
    }

    // ---- leaves over the originating field ----

    pub fn field_present() -> Predicate {
        Predicate::new(|r| r.field().is_some())
    }

    pub fn field_static() -> Predicate {
        Predicate::new(|r| r.field().map(|f| f.is_static).unwrap_or(false))
    }

    pub fn field_final() -> Predicate {
        Predicate::new(|r| r.field().map(|f| f.is_final).unwrap_or(false))
    }

    pub fn field_transient() -> Predicate {
        Predicate::new(|r| r.field().map(|f| f.is_transient).unwrap_or(false))
    }

    pub fn field_volatile() -> Predicate {
        Predicate::new(|r| r.field().map(|f| f.is_volatile).unwrap_or(false))
    }

    pub fn field_private() -> Predicate {
        Predicate::new(|r| {
            r.field()
                .map(|f| f.visibility == Visibility::Private)
                .unwrap_or(false)
        })
    }

    pub fn field_closure_capture() -> Predicate {
        Predicate::new(|r| r.field().map(|f| f.is_closure_capture()).unwrap_or(false))
    }

    pub fn field_annotated(annotation: impl Into<String>) -> Predicate {
        let annotation = annotation.into();
        Predicate::new(move |r| {
            r.field()
                .map(|f| f.annotations.iter().any(|a| a == &annotation))
                .unwrap_or(false)
        })
    }

    // ---- leaves over the target value ----

    pub fn target_shape(shape: Shape) -> Predicate {
        Predicate::new(move |r| r.target_shape() == Some(shape))
    }

    pub fn target_class_named(name: impl Into<String>) -> Predicate {
        let name = name.into();
        Predicate::new(move |r| r.target_class() == Some(name.as_str()))
    }

    pub fn target_class_contains(needle: impl Into<String>) -> Predicate {
        let needle = needle.into();
        Predicate::new(move |r| {
            r.target_class()
                .map(|c| c.contains(needle.as_str()))
                .unwrap_or(false)
        })
    }

    pub fn target_extends(name: impl Into<String>) -> Predicate {
        let name = name.into();
        Predicate::new(move |r| r.target_extends(&name))
    }

    /// Whether the target class is, by name, safe to share across
    /// threads.
    pub fn target_concurrency_safe() -> Predicate {
        Predicate::new(|r| {
            let Some(class) = r.target_class() else {
                return false;
            };
            CONCURRENT_PREFIXES.iter().any(|p| class.starts_with(p))
                || CONCURRENT_MARKERS.iter().any(|m| class.contains(m))
        })
    }

    // ---- leaves over bytecode-derived facts ----

    pub fn modified_outside_constructor() -> Predicate {
        Predicate::new(|r| r.modified_outside_constructor())
    }

    pub fn field_value_called(names: &[&str]) -> Predicate {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        Predicate::new(move |r| {
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            r.field_value_called(&refs)
        })
    }

    pub fn field_externally_touched() -> Predicate {
        Predicate::new(|r| r.field_externally_touched())
    }
}

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Predicate(..)")
    }
}
