//! Rendering of entities and documents.
//!
//! The graph builder hands each processed entity to a [`NodeRenderer`] and
//! attaches the returned fragment to the entity. Document assembly and the
//! external Graphviz invocation live in the submodules.

/// Graphviz DOT output.
pub mod dot;

/// Invocation of the external `dot` tool.
pub mod graphviz;

pub use dot::{render_graph, render_imports, stable_id, DocumentHeader, DotRenderer, Grouping};

use crate::types::{Entity, EntityKind};

/// What a field's type resolved to, used to style rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Message,
    Enum,
    Missing,
    Unresolved,
}

impl From<EntityKind> for FieldKind {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Message => FieldKind::Message,
            EntityKind::Enum => FieldKind::Enum,
            EntityKind::Missing => FieldKind::Missing,
            EntityKind::Service | EntityKind::Rpc => FieldKind::Unresolved,
        }
    }
}

/// One row of an entity body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyRow {
    Field {
        label: String,
        type_name: String,
        name: String,
        number: u32,
        kind: FieldKind,
        /// Name of the enclosing `oneof`, if any.
        oneof: Option<String>,
    },
    Map {
        key_type: String,
        value_type: String,
        name: String,
        number: u32,
        kind: FieldKind,
    },
    EnumValue {
        name: String,
        number: i64,
    },
    Rpc {
        name: String,
        request: String,
        response: String,
        client_streaming: bool,
        server_streaming: bool,
        request_kind: FieldKind,
        response_kind: FieldKind,
    },
}

/// Structured body of an entity as seen by the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityBody {
    pub rows: Vec<BodyRow>,
}

/// Produces the fragment attached to an entity once its body is processed.
pub trait NodeRenderer {
    fn render_entity(&self, entity: &Entity, body: &EntityBody) -> String;
}
