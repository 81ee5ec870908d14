//! Per-class structural analysis built on the stack simulation and the
//! same-class call graph.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    descriptor_return_class, simulate, ClassCallGraph, ClassCode, ExposureIndex, Insn,
    InvokeKind, MemberRef, MethodCode,
};

/// A statically provable candidate value for a field the runtime walk never
/// observed populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossibleValue {
    pub owner_class: String,
    pub field: String,
    /// Dotted name of the type provably storable into the field.
    pub candidate_type: String,
    /// Method signatures whose stores contribute this candidate.
    pub contributed_by: Vec<String>,
}

/// Field name -> inferred candidates, memoized per class for the process
/// lifetime.
pub type PossibleValueTable = HashMap<String, Vec<PossibleValue>>;

/// A call of a named method whose receiver provably came from a field read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCall {
    /// Signature of the method containing the call.
    pub method: String,
    /// Name of the method invoked on the field's value.
    pub called: String,
}

/// Factory methods whose result is a known immutable wrapper; stores fed by
/// these count as possible values. Derived from JDK idioms.
const FACTORY_METHODS: &[(&str, &str)] = &[
    ("java.util.List", "of"),
    ("java.util.List", "copyOf"),
    ("java.util.Set", "of"),
    ("java.util.Set", "copyOf"),
    ("java.util.Map", "of"),
    ("java.util.Map", "ofEntries"),
    ("java.util.Map", "copyOf"),
    ("java.util.Optional", "of"),
    ("java.util.Optional", "ofNullable"),
    ("java.util.Optional", "empty"),
    ("java.lang.String", "valueOf"),
    ("java.lang.Integer", "valueOf"),
    ("java.lang.Long", "valueOf"),
    ("java.lang.Short", "valueOf"),
    ("java.lang.Byte", "valueOf"),
    ("java.lang.Boolean", "valueOf"),
    ("java.lang.Character", "valueOf"),
    ("java.lang.Double", "valueOf"),
    ("java.lang.Float", "valueOf"),
];

fn is_immutable_factory(target: &MemberRef) -> bool {
    if FACTORY_METHODS
        .iter()
        .any(|(owner, name)| *owner == target.owner && *name == target.name)
    {
        return true;
    }
    target.owner == "java.util.Collections"
        && (target.name.starts_with("unmodifiable")
            || target.name.starts_with("singleton")
            || target.name.starts_with("empty"))
}

/// Answers structural questions about one class's members.
pub struct ClassAnalyzer<'a> {
    code: &'a ClassCode,
    callgraph: ClassCallGraph,
    exposure: &'a ExposureIndex,
}

impl<'a> ClassAnalyzer<'a> {
    pub fn new(code: &'a ClassCode, exposure: &'a ExposureIndex) -> Self {
        Self {
            code,
            callgraph: ClassCallGraph::build(code),
            exposure,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.code.name
    }

    /// Methods containing a store to `field` on this class. Sorted.
    pub fn direct_writers(&self, field: &str) -> Vec<String> {
        let mut writers = BTreeSet::new();
        for method in &self.code.methods {
            let writes = method.instructions.iter().any(|insn| match insn {
                Insn::PutField(r) | Insn::PutStatic(r) => {
                    r.name == field && r.owner == self.code.name
                }
                _ => false,
            });
            if writes {
                writers.insert(method.signature());
            }
        }
        writers.into_iter().collect()
    }

    /// Externally-visible writers: the direct-writer set closed over the
    /// same-class call graph, filtered to methods reachable from outside
    /// the class. Sorted.
    pub fn externally_visible_writers(&self, field: &str) -> Vec<String> {
        let closure = self.callgraph.reaching(self.direct_writers(field));
        let mut visible: Vec<String> = closure
            .into_iter()
            .filter(|sig| {
                self.code
                    .method(sig)
                    .map(|m| self.is_externally_visible(m))
                    .unwrap_or(false)
            })
            .collect();
        visible.sort();
        visible
    }

    /// Whether `field` can be written after construction by code outside
    /// the class.
    pub fn modified_outside_initializers(&self, field: &str) -> bool {
        self.externally_visible_writers(field)
            .iter()
            .any(|sig| !sig.starts_with("<init>") && !sig.starts_with("<clinit>"))
    }

    fn is_externally_visible(&self, method: &MethodCode) -> bool {
        if method.is_constructor() || method.is_class_initializer() {
            return true;
        }
        if !method.access.is_private {
            return true;
        }
        // A private method independently known to be called from outside
        // (reflection sites, registered callbacks) still counts.
        self.exposure
            .is_externally_touched(&self.code.name, &method.name)
    }

    /// Calls of any of `method_names` where the receiver provably came from
    /// a read of `field` earlier in the same flow — not merely an object of
    /// matching declared type.
    pub fn calls_on_field(&self, field: &str, method_names: &[&str]) -> Vec<FieldCall> {
        let mut found = Vec::new();
        for method in &self.code.methods {
            let Some(sim) = simulate(method) else {
                debug!(
                    class = %self.code.name,
                    method = %method.signature(),
                    "simulation degraded, skipping call search"
                );
                continue;
            };
            for (idx, insn) in method.instructions.iter().enumerate() {
                let Insn::Invoke { kind, target } = insn else {
                    continue;
                };
                if matches!(kind, InvokeKind::Static | InvokeKind::Dynamic) {
                    continue;
                }
                if !method_names.contains(&target.name.as_str()) {
                    continue;
                }
                let Ok(argc) = super::descriptor_arg_count(&target.descriptor) else {
                    continue;
                };
                let Some(producers) = sim.operand_producers(idx, argc) else {
                    continue;
                };
                let from_field = producers.iter().any(|&p| {
                    matches!(
                        method.instructions.get(p),
                        Some(Insn::GetField(r) | Insn::GetStatic(r))
                            if r.name == field && r.owner == self.code.name
                    )
                });
                if from_field {
                    found.push(FieldCall {
                        method: method.signature(),
                        called: target.name.clone(),
                    });
                }
            }
        }
        found
    }

    /// Candidate types provably storable into each field: stores whose
    /// value was produced by a construction or a known immutable-wrapper
    /// factory call.
    pub fn possible_values(&self) -> PossibleValueTable {
        let mut table: PossibleValueTable = HashMap::new();
        for method in &self.code.methods {
            let Some(sim) = simulate(method) else {
                continue;
            };
            for (idx, insn) in method.instructions.iter().enumerate() {
                let field = match insn {
                    Insn::PutField(r) | Insn::PutStatic(r) if r.owner == self.code.name => {
                        r.name.clone()
                    }
                    _ => continue,
                };
                // The stored value is on top of the stack at the store
                let Some(producers) = sim.operand_producers(idx, 0) else {
                    continue;
                };
                for &p in producers {
                    let candidate = match method.instructions.get(p) {
                        Some(Insn::New(class)) => Some(class.clone()),
                        Some(Insn::Invoke {
                            kind: InvokeKind::Static,
                            target,
                        }) if is_immutable_factory(target) => Some(
                            descriptor_return_class(&target.descriptor)
                                .unwrap_or_else(|| target.owner.clone()),
                        ),
                        _ => None,
                    };
                    let Some(candidate) = candidate else { continue };
                    let entries = table.entry(field.clone()).or_default();
                    match entries.iter_mut().find(|pv| pv.candidate_type == candidate) {
                        Some(existing) => {
                            if !existing.contributed_by.contains(&method.signature()) {
                                existing.contributed_by.push(method.signature());
                            }
                        }
                        None => entries.push(PossibleValue {
                            owner_class: self.code.name.clone(),
                            field: field.clone(),
                            candidate_type: candidate,
                            contributed_by: vec![method.signature()],
                        }),
                    }
                }
            }
        }
        for entries in table.values_mut() {
            entries.sort_by(|a, b| a.candidate_type.cmp(&b.candidate_type));
        }
        table
    }
}
