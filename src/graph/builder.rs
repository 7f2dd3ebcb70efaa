use std::collections::{BTreeMap, HashSet};

use tracing::{debug, error, warn};

use crate::errors::{ProtoGraphError, Result};
use crate::registry::Registry;
use crate::render::{BodyRow, EntityBody, FieldKind, NodeRenderer};
use crate::resolution::{ReferenceResolver, Resolution};
use crate::schema::*;
use crate::types::*;

/// Joins a namespace and a short name into a qualified name.
fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

// ============================================================================
// Inclusion graph
// ============================================================================

/// Directed, field-labelled edges between entity aliases.
///
/// Recording the same (owner, field, target) triple twice increments its
/// count instead of adding a second edge.
#[derive(Debug, Clone, Default)]
pub struct InclusionGraph {
    edges: BTreeMap<EdgeKey, EdgeTargets>,
}

impl InclusionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one reference from `owner.field` to `target`.
    pub fn record(&mut self, owner: &str, field: &str, target: &str) {
        *self
            .edges
            .entry(EdgeKey::new(owner, field))
            .or_default()
            .entry(target.to_string())
            .or_insert(0) += 1;
    }

    /// Targets recorded for one edge key.
    pub fn targets(&self, owner: &str, field: &str) -> Option<&EdgeTargets> {
        self.edges.get(&EdgeKey::new(owner, field))
    }

    /// All edges whose owner is `owner`, ordered by field name.
    pub fn edges_from<'a>(
        &'a self,
        owner: &'a str,
    ) -> impl Iterator<Item = (&'a EdgeKey, &'a EdgeTargets)> + 'a {
        self.edges
            .range(EdgeKey::new(owner, "")..)
            .take_while(move |(key, _)| key.owner == owner)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EdgeKey, &EdgeTargets)> {
        self.edges.iter()
    }

    /// Number of distinct edge keys.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Number of distinct (owner, field, target) triples.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }
}

// ============================================================================
// Pass 1: declarations
// ============================================================================

/// Declares every message, enum, service and RPC method of `file`.
///
/// Nested declarations are qualified by their parent's qualified name. When a
/// qualified name is already taken the first declaration wins; the rejected
/// duplicates are returned.
pub fn declare_file(registry: &mut Registry, source: &str, file: &SchemaFile) -> Vec<ProtoGraphError> {
    let mut duplicates = Vec::new();
    let package = file.package_name();

    for element in &file.elements {
        match element {
            FileElement::Message(message) => {
                declare_message(registry, source, package, None, message, &mut duplicates)
            }
            FileElement::Enum(decl) => {
                if let Err(e) =
                    declare_entity(registry, source, package, None, &decl.name, EntityKind::Enum, None)
                {
                    duplicates.push(e);
                }
            }
            FileElement::Service(service) => {
                declare_service(registry, source, package, service, &mut duplicates)
            }
            FileElement::Extend(_) | FileElement::Option(_) | FileElement::Comment(_) => {}
        }
    }

    for duplicate in &duplicates {
        warn!(source, error = %duplicate, "ignoring duplicate declaration");
    }
    duplicates
}

fn declare_entity(
    registry: &mut Registry,
    source: &str,
    namespace: &str,
    parent: Option<&str>,
    name: &str,
    kind: EntityKind,
    rpc: Option<RpcSignature>,
) -> Result<String> {
    let qualified_name = qualify(namespace, name);
    let alias = registry.get_or_create_alias(name, &qualified_name);
    registry.declare(Entity {
        qualified_name: qualified_name.clone(),
        name: name.to_string(),
        kind,
        alias,
        source: source.to_string(),
        parent: parent.map(str::to_string),
        artifact: None,
        rpc,
    })?;
    Ok(qualified_name)
}

fn declare_message(
    registry: &mut Registry,
    source: &str,
    namespace: &str,
    parent: Option<&str>,
    message: &Message,
    duplicates: &mut Vec<ProtoGraphError>,
) {
    let qualified_name = match declare_entity(
        registry,
        source,
        namespace,
        parent,
        &message.name,
        EntityKind::Message,
        None,
    ) {
        Ok(name) => name,
        Err(e) => {
            duplicates.push(e);
            return;
        }
    };

    // Element order, so the builder meets nested bodies in the same order.
    for element in &message.elements {
        match element {
            MessageElement::Message(nested) => declare_message(
                registry,
                source,
                &qualified_name,
                Some(&qualified_name),
                nested,
                duplicates,
            ),
            MessageElement::Enum(nested) => {
                if let Err(e) = declare_entity(
                    registry,
                    source,
                    &qualified_name,
                    Some(&qualified_name),
                    &nested.name,
                    EntityKind::Enum,
                    None,
                ) {
                    duplicates.push(e);
                }
            }
            _ => {}
        }
    }
}

fn declare_service(
    registry: &mut Registry,
    source: &str,
    namespace: &str,
    service: &Service,
    duplicates: &mut Vec<ProtoGraphError>,
) {
    let service_name = match declare_entity(
        registry,
        source,
        namespace,
        None,
        &service.name,
        EntityKind::Service,
        None,
    ) {
        Ok(name) => name,
        Err(e) => {
            duplicates.push(e);
            return;
        }
    };

    for rpc in service.rpcs() {
        let signature = RpcSignature {
            service: service_name.clone(),
            request: rpc.request_type.clone(),
            response: rpc.response_type.clone(),
            client_streaming: rpc.client_streaming,
            server_streaming: rpc.server_streaming,
        };
        if let Err(e) = declare_entity(
            registry,
            source,
            &service_name,
            Some(&service_name),
            &rpc.name,
            EntityKind::Rpc,
            Some(signature),
        ) {
            duplicates.push(e);
        }
    }
}

// ============================================================================
// Pass 2/3: bodies, edges and artifacts
// ============================================================================

/// Diagnostics collected while building edges.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Resolution failures, in the order they were met.
    pub errors: Vec<ProtoGraphError>,
    /// Constructs that were recognized but not modelled.
    pub unsupported: Vec<ProtoGraphError>,
    /// Number of duplicate declarations rejected during the walk.
    pub duplicates: usize,
}

/// Walks declaration bodies, resolves every type reference and records the
/// resulting inclusion edges.
///
/// A failed reference is recorded and the builder moves on to the next
/// sibling, so one run reports every unresolved name.
pub struct GraphBuilder<'a> {
    registry: &'a mut Registry,
    resolver: &'a mut ReferenceResolver,
    graph: &'a mut InclusionGraph,
    renderer: &'a dyn NodeRenderer,
    report: BuildReport,
    /// Qualified names whose body has been processed.
    built: HashSet<String>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        registry: &'a mut Registry,
        resolver: &'a mut ReferenceResolver,
        graph: &'a mut InclusionGraph,
        renderer: &'a dyn NodeRenderer,
    ) -> Self {
        Self {
            registry,
            resolver,
            graph,
            renderer,
            report: BuildReport::default(),
            built: HashSet::new(),
        }
    }

    /// Processes every top-level declaration of one file.
    pub fn build_file(&mut self, source: &str, file: &SchemaFile) {
        let package = file.package_name();
        debug!(source, package, "building edges");

        for element in &file.elements {
            match element {
                FileElement::Message(message) => self.build_message(source, package, message),
                FileElement::Enum(decl) => self.build_enum(source, package, decl),
                FileElement::Service(service) => self.build_service(source, package, service),
                FileElement::Extend(extend) => {
                    self.unsupported(&format!("extend {}", extend.target), package)
                }
                FileElement::Option(_) | FileElement::Comment(_) => {}
            }
        }
    }

    /// Renders placeholders created along the way and returns the diagnostics.
    pub fn finish(mut self) -> BuildReport {
        let placeholders: Vec<Entity> = self
            .registry
            .entities()
            .into_iter()
            .filter(|e| e.kind == EntityKind::Missing && e.artifact.is_none())
            .cloned()
            .collect();
        for placeholder in placeholders {
            let artifact = self.renderer.render_entity(&placeholder, &EntityBody::default());
            self.registry.set_artifact(&placeholder.qualified_name, artifact);
        }
        self.report
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// Returns a copy of the entity if this body is its winning declaration.
    ///
    /// A duplicate that lost to an earlier declaration, in another file or
    /// earlier in the same one, has no body of its own.
    fn owned(&mut self, qualified_name: &str, source: &str, kind: EntityKind) -> Option<Entity> {
        let entity = self
            .registry
            .get(qualified_name)
            .filter(|e| e.source == source && e.kind == kind)
            .cloned()?;
        if !self.built.insert(qualified_name.to_string()) {
            debug!(name = qualified_name, source, "skipping duplicate body");
            return None;
        }
        Some(entity)
    }

    fn build_message(&mut self, source: &str, namespace: &str, message: &Message) {
        let qualified_name = qualify(namespace, &message.name);
        let Some(entity) = self.owned(&qualified_name, source, EntityKind::Message) else {
            return;
        };

        let mut body = EntityBody::default();
        for element in &message.elements {
            match element {
                MessageElement::Field(field) => {
                    let row = self.field_row(&entity, field, None);
                    body.rows.push(row);
                }
                MessageElement::Map(map) => {
                    let kind = self.link(&entity, &map.name, &map.value_type);
                    body.rows.push(BodyRow::Map {
                        key_type: map.key_type.clone(),
                        value_type: map.value_type.clone(),
                        name: map.name.clone(),
                        number: map.number,
                        kind,
                    });
                }
                MessageElement::Oneof(oneof) => {
                    for inner in &oneof.elements {
                        match inner {
                            OneofElement::Field(field) => {
                                let row = self.field_row(&entity, field, Some(&oneof.name));
                                body.rows.push(row);
                            }
                            OneofElement::Group(group) => {
                                self.unsupported(&format!("group {}", group.name), &qualified_name)
                            }
                            OneofElement::Option(_) | OneofElement::Comment(_) => {}
                        }
                    }
                }
                MessageElement::Message(nested) => {
                    self.build_message(source, &qualified_name, nested)
                }
                MessageElement::Enum(nested) => self.build_enum(source, &qualified_name, nested),
                MessageElement::Group(group) => {
                    self.unsupported(&format!("group {}", group.name), &qualified_name)
                }
                MessageElement::Extend(extend) => {
                    self.unsupported(&format!("extend {}", extend.target), &qualified_name)
                }
                MessageElement::Reserved(_)
                | MessageElement::Extensions(_)
                | MessageElement::Option(_)
                | MessageElement::Comment(_) => {}
            }
        }

        self.attach(&entity, &body);
    }

    fn build_enum(&mut self, source: &str, namespace: &str, decl: &EnumDecl) {
        let qualified_name = qualify(namespace, &decl.name);
        let Some(entity) = self.owned(&qualified_name, source, EntityKind::Enum) else {
            return;
        };

        let rows = decl
            .elements
            .iter()
            .filter_map(|element| match element {
                EnumElement::Value(value) => Some(BodyRow::EnumValue {
                    name: value.name.clone(),
                    number: value.number,
                }),
                _ => None,
            })
            .collect();
        self.attach(&entity, &EntityBody { rows });
    }

    fn build_service(&mut self, source: &str, namespace: &str, service: &Service) {
        let qualified_name = qualify(namespace, &service.name);
        let Some(entity) = self.owned(&qualified_name, source, EntityKind::Service) else {
            return;
        };

        let mut body = EntityBody::default();
        for rpc in service.rpcs() {
            let request_kind = self.link(&entity, &format!("{}_request", rpc.name), &rpc.request_type);
            let response_kind =
                self.link(&entity, &format!("{}_response", rpc.name), &rpc.response_type);
            body.rows.push(BodyRow::Rpc {
                name: rpc.name.clone(),
                request: rpc.request_type.clone(),
                response: rpc.response_type.clone(),
                client_streaming: rpc.client_streaming,
                server_streaming: rpc.server_streaming,
                request_kind,
                response_kind,
            });
        }

        self.attach(&entity, &body);
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn field_row(&mut self, owner: &Entity, field: &Field, oneof: Option<&str>) -> BodyRow {
        let kind = self.link(owner, &field.name, &field.type_name);
        BodyRow::Field {
            label: field.label.as_str().to_string(),
            type_name: field.type_name.clone(),
            name: field.name.clone(),
            number: field.number,
            kind,
            oneof: oneof.map(str::to_string),
        }
    }

    /// Resolves `reference` in the owner's scope and records the edge.
    fn link(&mut self, owner: &Entity, field: &str, reference: &str) -> FieldKind {
        match self
            .resolver
            .resolve(self.registry, &owner.qualified_name, reference)
        {
            Ok(Resolution::Scalar) => FieldKind::Scalar,
            Ok(Resolution::Entity(target)) => match self.registry.get(&target) {
                Some(entity) => {
                    let kind = FieldKind::from(entity.kind);
                    let alias = entity.alias.clone();
                    self.graph.record(&owner.alias, field, &alias);
                    kind
                }
                None => FieldKind::Unresolved,
            },
            Err(e) => {
                error!(owner = %owner.qualified_name, field, error = %e, "type reference failed");
                self.report.errors.push(e);
                FieldKind::Unresolved
            }
        }
    }

    fn attach(&mut self, entity: &Entity, body: &EntityBody) {
        let artifact = self.renderer.render_entity(entity, body);
        self.registry.set_artifact(&entity.qualified_name, artifact);
    }

    fn unsupported(&mut self, construct: &str, scope: &str) {
        warn!(construct, scope, "skipping unsupported construct");
        self.report.unsupported.push(ProtoGraphError::UnsupportedConstruct {
            construct: construct.to_string(),
            scope: scope.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_repeated_triples() {
        let mut graph = InclusionGraph::new();
        graph.record("Foo_100", "x", "Bar_101");
        graph.record("Foo_100", "x", "Bar_101");
        graph.record("Foo_100", "y", "Baz_102");

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.targets("Foo_100", "x").and_then(|t| t.get("Bar_101")), Some(&2));
    }

    #[test]
    fn test_edges_from_stops_at_owner_boundary() {
        let mut graph = InclusionGraph::new();
        graph.record("A_100", "a", "X_1");
        graph.record("A_1000", "b", "X_1");
        graph.record("A_100", "c", "X_1");

        let fields: Vec<&str> = graph.edges_from("A_100").map(|(k, _)| k.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "c"]);
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("", "Foo"), "Foo");
        assert_eq!(qualify("a.b", "Foo"), "a.b.Foo");
    }
}
