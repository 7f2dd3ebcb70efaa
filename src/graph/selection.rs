use std::collections::{BTreeMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::errors::{ProtoGraphError, Result};
use crate::graph::InclusionGraph;
use crate::registry::Registry;
use crate::resolution::{ReferenceResolver, Resolution};
use crate::types::*;

/// Selection keyword that seeds every declaration of the root file.
pub const SELECT_ROOT_FILE: &str = "*";

/// Selection keyword that renders the import dependency tree instead of entities.
pub const SELECT_IMPORTS: &str = "imports";

/// Splits a selection string into its trimmed, non-empty fragments.
pub fn split_selection(selection: &str) -> Vec<&str> {
    selection
        .split(';')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect()
}

/// Extracts the closure of the inclusion graph reachable from a set of seeds.
pub struct SubgraphSelector<'a> {
    registry: &'a mut Registry,
    resolver: &'a mut ReferenceResolver,
    graph: &'a InclusionGraph,
}

impl<'a> SubgraphSelector<'a> {
    pub fn new(
        registry: &'a mut Registry,
        resolver: &'a mut ReferenceResolver,
        graph: &'a InclusionGraph,
    ) -> Self {
        Self {
            registry,
            resolver,
            graph,
        }
    }

    /// Maps one fragment to exactly one declared entity.
    ///
    /// A fragment matches qualified names it ends with on a component
    /// boundary. Only when nothing matches that way are plain substring
    /// matches considered. Placeholders are never candidates.
    pub fn match_fragment(&self, fragment: &str) -> Result<String> {
        let declared: Vec<&str> = self
            .registry
            .entities()
            .into_iter()
            .filter(|e| e.kind != EntityKind::Missing)
            .map(|e| e.qualified_name.as_str())
            .collect();

        let mut matches: Vec<&str> = declared
            .iter()
            .copied()
            .filter(|name| has_component_suffix(name, fragment))
            .collect();
        if matches.is_empty() {
            matches = declared
                .iter()
                .copied()
                .filter(|name| name.contains(fragment))
                .collect();
        }

        match matches.as_slice() {
            [only] => Ok(only.to_string()),
            _ => Err(ProtoGraphError::AmbiguousSelection {
                fragment: fragment.to_string(),
                candidates: matches.iter().map(|m| m.to_string()).collect(),
            }),
        }
    }

    /// Selects the closure reachable from every fragment of `selection`.
    ///
    /// `*` seeds all messages, enums and services declared in `root`.
    pub fn select(&mut self, selection: &str, root: &str) -> Result<Subgraph> {
        let mut seeds = Vec::new();
        for fragment in split_selection(selection) {
            if fragment == SELECT_ROOT_FILE {
                seeds.extend(
                    self.registry
                        .entities()
                        .into_iter()
                        .filter(|e| e.source == root)
                        .filter(|e| {
                            matches!(
                                e.kind,
                                EntityKind::Message | EntityKind::Enum | EntityKind::Service
                            )
                        })
                        .map(|e| e.qualified_name.clone()),
                );
            } else {
                seeds.push(self.match_fragment(fragment)?);
            }
        }
        debug!(selection, seeds = seeds.len(), "selection seeds");
        Ok(self.expand(seeds))
    }

    /// Breadth-first closure over inclusion edges from `seeds`.
    ///
    /// An RPC seed pulls in its owning service without expanding the whole
    /// service: only that method's request and response edges are carried.
    pub fn expand(&mut self, seeds: Vec<String>) -> Subgraph {
        let mut queue: VecDeque<String> = VecDeque::new();
        let mut edges: BTreeMap<EdgeKey, EdgeTargets> = BTreeMap::new();
        let mut services: Vec<String> = Vec::new();

        for seed in &seeds {
            let Some(entity) = self.registry.get(seed).cloned() else {
                warn!(seed = %seed, "unknown selection seed");
                continue;
            };
            if let (EntityKind::Rpc, Some(signature)) = (entity.kind, &entity.rpc) {
                for target in self.rpc_edges(&entity, signature, &mut edges) {
                    queue.push_back(target);
                }
                services.push(signature.service.clone());
            }
            queue.push_back(seed.clone());
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut included: Vec<String> = Vec::new();

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let Some(entity) = self.registry.get(&name) else {
                warn!(name = %name, "selected entity is not declared");
                continue;
            };
            included.push(name);

            for (key, targets) in self.graph.edges_from(&entity.alias) {
                let mut kept = EdgeTargets::new();
                for (target, count) in targets {
                    match self.registry.qualified_name_for_alias(target) {
                        Some(qualified_name) => {
                            if !visited.contains(qualified_name) {
                                queue.push_back(qualified_name.to_string());
                            }
                            kept.insert(target.clone(), *count);
                        }
                        None => warn!(target = %target, field = %key.field, "skipping edge to unknown alias"),
                    }
                }
                if !kept.is_empty() {
                    edges.insert(key.clone(), kept);
                }
            }
        }

        for service in services {
            if visited.insert(service.clone()) {
                included.push(service);
            }
        }

        let mut entities: Vec<Entity> = included
            .iter()
            .filter_map(|name| self.registry.get(name).cloned())
            .collect();
        entities.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));

        Subgraph {
            entities,
            edges,
            roots: seeds,
        }
    }

    /// Carries the `_request`/`_response` edges of one method and returns the
    /// qualified names they point at.
    fn rpc_edges(
        &mut self,
        rpc: &Entity,
        signature: &RpcSignature,
        edges: &mut BTreeMap<EdgeKey, EdgeTargets>,
    ) -> Vec<String> {
        let Some(service_alias) = self.registry.get(&signature.service).map(|s| s.alias.clone())
        else {
            warn!(service = %signature.service, "rpc without a declared service");
            return Vec::new();
        };

        let mut targets = Vec::new();
        for (suffix, reference) in [("_request", &signature.request), ("_response", &signature.response)] {
            let field = format!("{}{}", rpc.name, suffix);
            let key = EdgeKey::new(&service_alias, &field);
            if let Some(recorded) = self.graph.targets(&service_alias, &field) {
                edges.insert(key.clone(), recorded.clone());
            }

            match self
                .resolver
                .resolve(self.registry, &signature.service, reference)
            {
                Ok(Resolution::Entity(qualified_name)) => {
                    if let Some(target) = self.registry.get(&qualified_name) {
                        edges
                            .entry(key)
                            .or_default()
                            .entry(target.alias.clone())
                            .or_insert(1);
                    }
                    targets.push(qualified_name);
                }
                Ok(Resolution::Scalar) => {}
                Err(e) => warn!(rpc = %rpc.qualified_name, error = %e, "rpc type reference failed"),
            }
        }
        targets
    }
}
