// Rule engine - named predicates over references, grouped into reports
#![allow(dead_code)]

pub mod builtin;
mod predicate;
mod result;

pub use builtin::CoreSuite;
pub use predicate::Predicate;
pub use result::{GroupingOptions, InspectionResult, MatchGroup};

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bytecode::{ClassAnalyzer, ProcessCaches};
use crate::graph::{Edge, EdgeKind, Node, ObjectGraph};
use crate::heap::{BytecodeSupplier, FieldDescriptor, Heap, Shape, Value};
use crate::scope::{Scope, ScopeOrder};

/// Severity of an inspection finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which effective owner scopes an inspection applies to.
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    pub include: Vec<Scope>,
    pub exclude: Vec<Scope>,
    /// Only scopes at least this broad.
    pub at_least: Option<Scope>,
}

impl ScopeFilter {
    pub fn at_least(scope: Scope) -> Self {
        Self {
            at_least: Some(scope),
            ..Default::default()
        }
    }

    pub fn only(scopes: Vec<Scope>) -> Self {
        Self {
            include: scopes,
            ..Default::default()
        }
    }

    pub fn admits(&self, scope: &Scope, order: &ScopeOrder) -> bool {
        if self.exclude.contains(scope) {
            return false;
        }
        if !self.include.is_empty() && !self.include.contains(scope) {
            return false;
        }
        match &self.at_least {
            Some(floor) => order.at_least(scope, floor),
            None => true,
        }
    }
}

/// One immutable rule: a named predicate over references plus report
/// metadata.
#[derive(Clone)]
pub struct Inspection {
    pub id: String,
    pub category: String,
    pub severity: Severity,
    pub message: String,
    pub scope_filter: Option<ScopeFilter>,
    pub disabled: bool,
    predicate: Predicate,
}

impl Inspection {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        predicate: Predicate,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            severity,
            message: message.into(),
            scope_filter: None,
            disabled: false,
            predicate,
        }
    }

    pub fn with_scope_filter(mut self, filter: ScopeFilter) -> Self {
        self.scope_filter = Some(filter);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl std::fmt::Debug for Inspection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspection")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("severity", &self.severity)
            .field("disabled", &self.disabled)
            .finish()
    }
}

/// A named collection of inspections, registered with the engine. The
/// suite's members are collected once at registration time.
pub trait Suite: Send + Sync {
    fn name(&self) -> &str;
    fn inspections(&self) -> Vec<Inspection>;
}

/// Derived-fact access shared by every predicate evaluation in a scan.
pub struct AnalysisContext<'a> {
    pub heap: &'a dyn Heap,
    pub bytecode: &'a dyn BytecodeSupplier,
    pub caches: &'a ProcessCaches,
}

impl<'a> AnalysisContext<'a> {
    /// Run `f` against the analyzer for `class`; `None` when no bytecode is
    /// available and every structural question degrades to its empty answer.
    /// Every class analyzed here also lands in the exposure registry.
    pub fn with_analyzer<R>(
        &self,
        class: &str,
        f: impl FnOnce(&ClassAnalyzer<'_>) -> R,
    ) -> Option<R> {
        let code = self.bytecode.class_code(class)?;
        self.caches.exposure().record_class(&code);
        let analyzer = ClassAnalyzer::new(&code, self.caches.exposure());
        Some(f(&analyzer))
    }
}

/// The unit of rule evaluation: one edge normalized with its owner node
/// and effective scope.
pub struct Reference<'a> {
    pub edge: &'a Edge,
    pub owner: &'a Node,
    pub scope: Scope,
    graph: &'a ObjectGraph,
    ctx: &'a AnalysisContext<'a>,
}

impl<'a> Reference<'a> {
    pub fn new(
        edge: &'a Edge,
        owner: &'a Node,
        graph: &'a ObjectGraph,
        ctx: &'a AnalysisContext<'a>,
    ) -> Self {
        let scope = owner.effective_scope();
        Self {
            edge,
            owner,
            scope,
            graph,
            ctx,
        }
    }

    pub fn kind(&self) -> EdgeKind {
        self.edge.kind
    }

    pub fn field(&self) -> Option<&FieldDescriptor> {
        self.edge.field.as_ref()
    }

    pub fn value(&self) -> &Value {
        &self.edge.value
    }

    pub fn owner_class(&self) -> &str {
        &self.owner.class
    }

    pub fn target_class(&self) -> Option<&str> {
        self.edge.target_class.as_deref()
    }

    pub fn target_node(&self) -> Option<&Node> {
        self.graph.node(self.edge.target.as_ref()?)
    }

    pub fn target_shape(&self) -> Option<Shape> {
        let id = self.edge.target.as_ref()?.object()?;
        self.ctx.heap.shape_of(id).ok()
    }

    /// Whether the target's class, or any of its superclasses, has the
    /// given name. Tolerant of classes the heap cannot resolve.
    pub fn target_extends(&self, name: &str) -> bool {
        let Some(mut class) = self.edge.target_class.clone() else {
            return false;
        };
        loop {
            if class == name {
                return true;
            }
            match self.ctx.heap.superclass(&class) {
                Some(superclass) => class = superclass,
                None => return false,
            }
        }
    }

    /// Whether the originating field can be written after construction by
    /// code outside its class, per the bytecode closure.
    pub fn modified_outside_constructor(&self) -> bool {
        let Some(field) = self.field() else {
            return false;
        };
        self.ctx
            .with_analyzer(&field.declaring_class, |a| {
                a.modified_outside_initializers(&field.name)
            })
            .unwrap_or(false)
    }

    /// Whether any of `names` is called on the value read from the
    /// originating field, proven by stack provenance.
    pub fn field_value_called(&self, names: &[&str]) -> bool {
        let Some(field) = self.field() else {
            return false;
        };
        self.ctx
            .with_analyzer(&field.declaring_class, |a| {
                !a.calls_on_field(&field.name, names).is_empty()
            })
            .unwrap_or(false)
    }

    /// Whether the originating field is referenced from outside its
    /// declaring class, per the exposure index.
    pub fn field_externally_touched(&self) -> bool {
        let Some(field) = self.field() else {
            return false;
        };
        self.ctx
            .caches
            .exposure()
            .is_externally_touched(&field.declaring_class, &field.name)
    }
}

/// Evaluate every enabled inspection against every reference from the
/// completed scan, returning grouped results in stable order.
pub fn run_inspections(
    graph: &ObjectGraph,
    inspections: &[Inspection],
    ctx: &AnalysisContext<'_>,
    order: &ScopeOrder,
    options: &GroupingOptions,
) -> Vec<InspectionResult> {
    let mut results = Vec::new();
    for inspection in inspections {
        if inspection.disabled {
            continue;
        }
        let mut matches = Vec::new();
        for (id, edge) in graph.edges() {
            if edge.chain_only {
                continue;
            }
            let Some(owner) = graph.node(&edge.owner) else {
                continue;
            };
            let reference = Reference::new(edge, owner, graph, ctx);
            if let Some(filter) = &inspection.scope_filter {
                if !filter.admits(&reference.scope, order) {
                    continue;
                }
            }
            // A predicate failure is isolated to this (inspection, edge)
            // pair; evaluation of everything else continues.
            let hit = catch_unwind(AssertUnwindSafe(|| inspection.predicate().eval(&reference)))
                .unwrap_or_else(|_| {
                    warn!(
                        inspection = %inspection.id,
                        edge = %edge.group_identity(),
                        "predicate panicked, treating as no match"
                    );
                    false
                });
            if hit {
                matches.push(id);
            }
        }
        if !matches.is_empty() {
            results.push(result::group_matches(
                inspection, &matches, graph, ctx, options,
            ));
        }
    }
    results.sort_by(|a, b| a.id.cmp(&b.id));
    results
}
