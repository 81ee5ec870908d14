//! Grouped inspection results.
//!
//! Raw matches are per-edge; a singleton map with ten thousand entries
//! would otherwise produce ten thousand lines. Matches collapse by the
//! edge's grouping identity into one representative plus a count, each
//! group annotated with referencing locations from the backreference
//! index and, for purely inherited scopes, a context path back to the
//! nearest scope-owning ancestor.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::graph::{EdgeId, NodeKey, ObjectGraph};

use super::{AnalysisContext, Inspection, Severity};

/// Rendering limits for grouped output.
#[derive(Debug, Clone)]
pub struct GroupingOptions {
    /// Maximum distinct referencing locations listed per group.
    pub max_backrefs: usize,
    /// Maximum hops in the inherited-scope context walk.
    pub context_depth: usize,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self {
            max_backrefs: 5,
            context_depth: 10,
        }
    }
}

/// One collapsed set of matches sharing a grouping identity.
#[derive(Debug, Clone, Serialize)]
pub struct MatchGroup {
    pub identity: String,
    pub scope: String,
    pub owner_class: String,
    pub field: Option<String>,
    pub kind: String,
    /// Rendering of the representative match's value.
    pub value: String,
    /// Matches collapsed into the representative, beyond the first.
    pub additional: usize,
    /// Distinct referencing locations of the representative's target.
    pub backrefs: Vec<String>,
    /// Chain to the nearest scope-owning ancestor, present only when the
    /// owner's scope is purely inherited.
    pub context_path: Option<String>,
}

/// All grouped matches of one inspection in one scan.
#[derive(Debug, Clone, Serialize)]
pub struct InspectionResult {
    pub id: String,
    pub category: String,
    pub severity: Severity,
    pub message: String,
    pub groups: Vec<MatchGroup>,
}

impl InspectionResult {
    /// Total raw matches across all groups.
    pub fn match_count(&self) -> usize {
        self.groups.iter().map(|g| g.additional + 1).sum()
    }
}

pub(super) fn group_matches(
    inspection: &Inspection,
    matches: &[EdgeId],
    graph: &ObjectGraph,
    ctx: &AnalysisContext<'_>,
    options: &GroupingOptions,
) -> InspectionResult {
    let mut grouped: BTreeMap<String, Vec<EdgeId>> = BTreeMap::new();
    for &id in matches {
        grouped
            .entry(graph.edge(id).group_identity())
            .or_default()
            .push(id);
    }

    let groups = grouped
        .into_iter()
        .map(|(identity, ids)| {
            let representative = graph.edge(ids[0]);
            let owner = graph.node(&representative.owner);
            let scope = graph.effective_scope(&representative.owner);
            let backrefs = representative
                .target
                .as_ref()
                .map(|t| referencing_locations(graph, t, options.max_backrefs))
                .unwrap_or_default();
            let context_path = owner
                .filter(|n| n.scope_is_inherited())
                .and_then(|n| context_path(graph, &n.key, options.context_depth));
            MatchGroup {
                identity,
                scope: scope.name().to_string(),
                owner_class: owner.map(|n| n.class.clone()).unwrap_or_default(),
                field: representative.field_name().map(str::to_string),
                kind: representative.kind.display_name().to_string(),
                value: ctx.heap.summarize(&representative.value),
                additional: ids.len() - 1,
                backrefs,
                context_path,
            }
        })
        .collect();

    InspectionResult {
        id: inspection.id.clone(),
        category: inspection.category.clone(),
        severity: inspection.severity,
        message: inspection.message.clone(),
        groups,
    }
}

/// Distinct locations holding a reference to `target`, sorted, capped at
/// `max`.
fn referencing_locations(graph: &ObjectGraph, target: &NodeKey, max: usize) -> Vec<String> {
    let locations: BTreeSet<String> = graph
        .backrefs_of(target)
        .iter()
        .map(|&id| graph.edge(id).group_identity())
        .collect();
    locations.into_iter().take(max).collect()
}

/// Backward walk from a node with a purely inherited scope to the nearest
/// ancestor declaring its own, bounded by `max_depth` hops. Follows the
/// first non-chain backreference at each step; gives up on cycles and dead
/// ends.
fn context_path(graph: &ObjectGraph, start: &NodeKey, max_depth: usize) -> Option<String> {
    let mut seen: HashSet<NodeKey> = HashSet::new();
    let mut hops: Vec<String> = Vec::new();
    let mut current = start.clone();

    for _ in 0..max_depth {
        if !seen.insert(current.clone()) {
            return None;
        }
        let edge = graph
            .backrefs_of(&current)
            .iter()
            .map(|&id| graph.edge(id))
            .find(|e| !e.chain_only)?;
        hops.push(edge.group_identity());
        let owner = graph.node(&edge.owner)?;
        if owner.own_scope.is_some() {
            hops.push(format!("{} ({})", owner.class, owner.effective_scope()));
            return Some(hops.join(" <- "));
        }
        current = edge.owner.clone();
    }
    None
}
