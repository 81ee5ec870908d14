//! Scope propagation.
//!
//! Second pass over a completed walk: every scope-less node inherits the
//! broadest scope that can reach it, so an object only reachable from a
//! singleton is treated as effectively singleton-scoped. A monotone
//! relax-and-requeue fixed point: widening is strict along a finite total
//! order, so it terminates, and the result is independent of traversal
//! order.

use std::collections::VecDeque;

use tracing::debug;

use crate::graph::{NodeKey, ObjectGraph};

use super::ScopeDetector;

pub struct ScopePropagator<'a> {
    detector: &'a dyn ScopeDetector,
}

impl<'a> ScopePropagator<'a> {
    pub fn new(detector: &'a dyn ScopeDetector) -> Self {
        Self { detector }
    }

    pub fn propagate(&self, graph: &mut ObjectGraph) {
        // Seed with every node that carries an own scope
        let mut queue: VecDeque<NodeKey> = graph
            .nodes()
            .filter(|n| n.own_scope.is_some())
            .map(|n| n.key.clone())
            .collect();
        let mut relaxations = 0usize;

        while let Some(key) = queue.pop_front() {
            let Some(node) = graph.node(&key) else {
                continue;
            };
            let owner_scope = node.effective_scope();

            // Successors come from the graph's traversal mirror, which
            // holds exactly the edges with a materialized target.
            for id in graph.outgoing(&key) {
                let edge = graph.edge(id);
                if !edge.propagates_scope() {
                    continue;
                }
                let Some(target) = edge.target.clone() else {
                    continue;
                };
                let Some(target_node) = graph.node(&target) else {
                    continue;
                };
                // Own scopes are declared facts; only inherited ones relax
                if target_node.own_scope.is_some() {
                    continue;
                }
                let current = target_node.effective_scope();
                if self.detector.should_widen(Some(&current), &owner_scope) {
                    if let Some(target_node) = graph.node_mut(&target) {
                        target_node.inherited_scope = Some(owner_scope.clone());
                        relaxations += 1;
                        queue.push_back(target);
                    }
                }
            }
        }
        debug!(relaxations, "scope propagation reached fixed point");
    }
}
