//! Same-class call graph.
//!
//! Records which methods of a class invoke which other methods of the same
//! class, including synthetic lambda bodies reached through invokedynamic
//! call sites. Used to close seed sets (e.g. direct field writers) over to
//! every method that can reach them.

use std::collections::{HashMap, HashSet};

use super::{ClassCode, Insn, InvokeKind};

/// Caller/callee edges between methods of one class, keyed by signature.
#[derive(Debug, Default)]
pub struct ClassCallGraph {
    /// callee signature -> caller signatures
    callers: HashMap<String, HashSet<String>>,
    /// caller signature -> callee signatures
    callees: HashMap<String, HashSet<String>>,
}

impl ClassCallGraph {
    pub fn build(code: &ClassCode) -> Self {
        let mut graph = Self::default();
        // Lambda implementation methods are matched by name alone: the
        // invokedynamic descriptor describes captures, not the body.
        let by_name: HashMap<&str, Vec<String>> = {
            let mut map: HashMap<&str, Vec<String>> = HashMap::new();
            for m in &code.methods {
                map.entry(m.name.as_str()).or_default().push(m.signature());
            }
            map
        };

        for method in &code.methods {
            let caller = method.signature();
            for insn in &method.instructions {
                let Insn::Invoke { kind, target } = insn else {
                    continue;
                };
                if target.owner != code.name {
                    continue;
                }
                let callees: Vec<String> = match kind {
                    InvokeKind::Dynamic => by_name
                        .get(target.name.as_str())
                        .cloned()
                        .unwrap_or_default(),
                    _ => vec![format!("{}{}", target.name, target.descriptor)],
                };
                for callee in callees {
                    graph
                        .callers
                        .entry(callee.clone())
                        .or_default()
                        .insert(caller.clone());
                    graph
                        .callees
                        .entry(caller.clone())
                        .or_default()
                        .insert(callee);
                }
            }
        }
        graph
    }

    pub fn callers_of(&self, signature: &str) -> impl Iterator<Item = &str> {
        self.callers
            .get(signature)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn callees_of(&self, signature: &str) -> impl Iterator<Item = &str> {
        self.callees
            .get(signature)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// All methods that can reach one of `seeds` through same-class calls,
    /// seeds included. Worklist closure over the reversed edges.
    pub fn reaching(&self, seeds: impl IntoIterator<Item = String>) -> HashSet<String> {
        let mut reached: HashSet<String> = seeds.into_iter().collect();
        let mut worklist: Vec<String> = reached.iter().cloned().collect();

        while let Some(sig) = worklist.pop() {
            for caller in self.callers_of(&sig) {
                if reached.insert(caller.to_string()) {
                    worklist.push(caller.to_string());
                }
            }
        }
        reached
    }
}
