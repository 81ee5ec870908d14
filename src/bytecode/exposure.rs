//! Process-lifetime, append-only analysis caches.
//!
//! The Exposure Index accumulates, across every class ever analyzed, which
//! fields and methods are touched from outside their declaring class. The
//! possible-value cache memoizes per-class inference results. Both are
//! monotonic: entries are only added under stable keys, never mutated or
//! removed, so report rendering may read them while a later scan appends.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::analyzer::PossibleValueTable;
use super::{ClassCode, Insn};

/// Registry of members referenced from outside their declaring class.
#[derive(Debug, Default)]
pub struct ExposureIndex {
    /// (owner class, member name) -> referencing "Class.methodSig" entries
    touched: RwLock<HashMap<(String, String), BTreeSet<String>>>,
    analyzed: RwLock<HashSet<String>>,
}

impl ExposureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate every cross-class member reference in `code`. Idempotent
    /// per class name; bytecode is assumed immutable while loaded.
    pub fn record_class(&self, code: &ClassCode) {
        {
            let mut analyzed = self.analyzed.write().unwrap();
            if !analyzed.insert(code.name.clone()) {
                return;
            }
        }
        debug!(class = %code.name, "indexing cross-class exposure");

        let mut touched = self.touched.write().unwrap();
        for method in &code.methods {
            let from = format!("{}.{}", code.name, method.signature());
            for insn in &method.instructions {
                let target = match insn {
                    Insn::GetField(r)
                    | Insn::PutField(r)
                    | Insn::GetStatic(r)
                    | Insn::PutStatic(r) => r,
                    Insn::Invoke { target, .. } => target,
                    _ => continue,
                };
                if target.owner == code.name {
                    continue;
                }
                touched
                    .entry((target.owner.clone(), target.name.clone()))
                    .or_default()
                    .insert(from.clone());
            }
        }
    }

    /// Whether any analyzed class outside `owner` references the member.
    pub fn is_externally_touched(&self, owner: &str, member: &str) -> bool {
        self.touched
            .read()
            .unwrap()
            .contains_key(&(owner.to_string(), member.to_string()))
    }

    /// Referencing sites, sorted for stable report output.
    pub fn external_referencers(&self, owner: &str, member: &str) -> Vec<String> {
        self.touched
            .read()
            .unwrap()
            .get(&(owner.to_string(), member.to_string()))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn analyzed_class_count(&self) -> usize {
        self.analyzed.read().unwrap().len()
    }
}

/// The process-scoped state object: created once, injected everywhere,
/// never reset between scans.
#[derive(Debug, Default)]
pub struct ProcessCaches {
    exposure: ExposureIndex,
    possible: RwLock<HashMap<String, Arc<PossibleValueTable>>>,
}

impl ProcessCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exposure(&self) -> &ExposureIndex {
        &self.exposure
    }

    /// Memoized possible-value table for a class. `compute` runs at most
    /// once per class for the lifetime of the process.
    pub fn possible_values(
        &self,
        class: &str,
        compute: impl FnOnce() -> PossibleValueTable,
    ) -> Arc<PossibleValueTable> {
        if let Some(table) = self.possible.read().unwrap().get(class) {
            return Arc::clone(table);
        }
        let table = Arc::new(compute());
        let mut cache = self.possible.write().unwrap();
        Arc::clone(cache.entry(class.to_string()).or_insert(table))
    }
}
