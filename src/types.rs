use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Built-in scalar type names. References to these never produce an edge.
pub const SCALAR_TYPES: &[&str] = &[
    "double", "float", "int32", "int64", "uint32", "uint64", "sint32", "sint64", "fixed32",
    "fixed64", "sfixed32", "sfixed64", "bool", "string", "bytes",
];

/// Returns `true` if `name` is one of the built-in scalar types.
pub fn is_scalar_type(name: &str) -> bool {
    SCALAR_TYPES.contains(&name)
}

/// Kinds of entities in the schema graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Message,
    Enum,
    Service,
    Rpc,
    Missing,
}

#[allow(clippy::should_implement_trait)]
impl EntityKind {
    /// Returns the string representation of this entity kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Message => "message",
            EntityKind::Enum => "enum",
            EntityKind::Service => "service",
            EntityKind::Rpc => "rpc",
            EntityKind::Missing => "missing",
        }
    }

    /// Parses a string into an `EntityKind`, returning `None` for unrecognized values.
    pub fn from_str(s: &str) -> Option<EntityKind> {
        match s {
            "message" => Some(EntityKind::Message),
            "enum" => Some(EntityKind::Enum),
            "service" => Some(EntityKind::Service),
            "rpc" => Some(EntityKind::Rpc),
            "missing" => Some(EntityKind::Missing),
            _ => None,
        }
    }

    /// Whether entities of this kind may be the target of a field type reference.
    pub fn is_type(&self) -> bool {
        matches!(self, EntityKind::Message | EntityKind::Enum)
    }
}

/// Raw request/response signature of an RPC method, plus its owning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcSignature {
    pub service: String,
    pub request: String,
    pub response: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
}

/// A declared message, enum, service, RPC method or synthesized missing placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub qualified_name: String,
    pub name: String,
    pub kind: EntityKind,
    pub alias: String,
    pub source: String,
    pub parent: Option<String>,
    /// Rendered fragment attached once the entity body has been processed.
    pub artifact: Option<String>,
    pub rpc: Option<RpcSignature>,
}

impl Entity {
    /// Namespace part of the qualified name: everything before the short name.
    pub fn namespace(&self) -> &str {
        namespace_of(&self.qualified_name, &self.name)
    }
}

/// Strips `.short` from the end of `qualified`, returning the enclosing namespace.
///
/// Returns an empty string when `qualified` has no namespace.
pub fn namespace_of<'a>(qualified: &'a str, short: &str) -> &'a str {
    match qualified.strip_suffix(short) {
        Some(rest) => rest.strip_suffix('.').unwrap_or(rest),
        None => "",
    }
}

/// Returns `true` if `namespace` is a whole-component prefix of `scope`.
///
/// The empty namespace is a prefix of every scope.
pub fn is_scope_prefix(namespace: &str, scope: &str) -> bool {
    if namespace.is_empty() || namespace == scope {
        return true;
    }
    scope
        .strip_prefix(namespace)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Returns `true` if `qualified` ends with `suffix` on a component boundary.
pub fn has_component_suffix(qualified: &str, suffix: &str) -> bool {
    if qualified == suffix {
        return true;
    }
    qualified
        .strip_suffix(suffix)
        .is_some_and(|rest| rest.ends_with('.'))
}

/// Schema dialect declared by a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Syntax {
    #[default]
    Proto2,
    Proto3,
    Editions(String),
}

impl Syntax {
    pub fn as_str(&self) -> &str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
            Syntax::Editions(edition) => edition,
        }
    }
}

/// One schema file reached by the import walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub identifier: String,
    pub package: String,
    pub syntax: Syntax,
    /// Import names in statement order, as written.
    pub imports: Vec<String>,
    pub missing: bool,
    pub weak: bool,
}

impl SourceUnit {
    /// A unit for an import target that could not be opened.
    pub fn missing(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            package: String::new(),
            syntax: Syntax::default(),
            imports: Vec::new(),
            missing: true,
            weak: false,
        }
    }
}

/// Key of an inclusion edge: owning entity alias plus field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub owner: String,
    pub field: String,
}

impl EdgeKey {
    pub fn new(owner: &str, field: &str) -> Self {
        Self {
            owner: owner.to_string(),
            field: field.to_string(),
        }
    }
}

/// Counting set of target aliases for one edge key.
pub type EdgeTargets = BTreeMap<String, u32>;

/// A subset of entities and inclusion edges produced by selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subgraph {
    pub entities: Vec<Entity>,
    pub edges: BTreeMap<EdgeKey, EdgeTargets>,
    /// Qualified names of the seeds the subgraph was grown from.
    pub roots: Vec<String>,
}

impl Subgraph {
    /// Returns `true` if an entity with the given qualified name is part of the subgraph.
    pub fn contains(&self, qualified_name: &str) -> bool {
        self.entities
            .iter()
            .any(|e| e.qualified_name == qualified_name)
    }
}

/// Toggles consumed by a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Tolerate non-root imports that cannot be opened.
    pub allow_missing_imports: bool,
    /// Materialize unresolved references as placeholder entities.
    pub show_missing_types: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            allow_missing_imports: true,
            show_missing_types: true,
        }
    }
}

/// Statistics about one finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub entity_count: u64,
    pub edge_count: u64,
    pub file_count: u64,
    pub missing_file_count: u64,
    pub entities_by_kind: HashMap<String, u64>,
    pub unresolved_count: u64,
    pub unsupported_count: u64,
    /// Messages and enums no edge points at, sorted by qualified name.
    pub unreferenced_types: Vec<String>,
}
