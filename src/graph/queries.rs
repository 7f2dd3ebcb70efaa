use std::collections::{BTreeMap, HashMap, HashSet};

use crate::graph::{BuildReport, InclusionGraph};
use crate::registry::Registry;
use crate::types::*;

/// Summarizes a finished run.
///
/// `unresolved_count` counts placeholder entities, since a run that leaves a
/// reference unresolved without placeholders fails before stats exist.
pub fn collect_stats(
    registry: &Registry,
    graph: &InclusionGraph,
    units: &BTreeMap<String, SourceUnit>,
    report: &BuildReport,
) -> GraphStats {
    let mut entities_by_kind: HashMap<String, u64> = HashMap::new();
    for entity in registry.entities() {
        *entities_by_kind
            .entry(entity.kind.as_str().to_string())
            .or_insert(0) += 1;
    }

    GraphStats {
        entity_count: registry.len() as u64,
        edge_count: graph.edge_count() as u64,
        file_count: units.values().filter(|u| !u.missing).count() as u64,
        missing_file_count: units.values().filter(|u| u.missing).count() as u64,
        unresolved_count: entities_by_kind
            .get(EntityKind::Missing.as_str())
            .copied()
            .unwrap_or(0),
        entities_by_kind,
        unsupported_count: report.unsupported.len() as u64,
        unreferenced_types: unreferenced_types(registry, graph),
    }
}

/// Entities that no inclusion edge points at, excluding services and methods.
///
/// These are the natural roots of a rendered diagram.
pub fn unreferenced_types(registry: &Registry, graph: &InclusionGraph) -> Vec<String> {
    let referenced: HashSet<&str> = graph
        .iter()
        .flat_map(|(_, targets)| targets.keys().map(String::as_str))
        .collect();

    registry
        .entities()
        .into_iter()
        .filter(|e| e.kind.is_type())
        .filter(|e| !referenced.contains(e.alias.as_str()))
        .map(|e| e.qualified_name.clone())
        .collect()
}
