//! Graphviz DOT output: per-entity HTML-like table labels plus document
//! assembly for inclusion graphs and import trees.

use std::collections::BTreeMap;
use std::fmt::Write;

use sha2::{Digest, Sha256};

use super::{BodyRow, EntityBody, FieldKind, NodeRenderer};
use crate::registry::Registry;
use crate::types::*;

const HEADER_MESSAGE: &str = "#3b6ea5";
const HEADER_ENUM: &str = "#4f8a3c";
const HEADER_SERVICE: &str = "#8a5a9c";
const MISSING: &str = "#cc0000";
const MISSING_FILL: &str = "#ffecec";

/// Stable Graphviz identifier derived from an arbitrary name.
pub fn stable_id(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    format!("N{}", &hex::encode(digest)[..16])
}

/// Escapes text for use inside an HTML-like label.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes text for use inside a double-quoted DOT string.
fn escape_quoted(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn kind_color(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Message => HEADER_MESSAGE,
        FieldKind::Enum => HEADER_ENUM,
        FieldKind::Missing | FieldKind::Unresolved => MISSING,
        FieldKind::Scalar => "#000000",
    }
}

fn type_cell(type_name: &str, kind: FieldKind) -> String {
    format!(
        "<font color=\"{}\">{}</font>",
        kind_color(kind),
        escape_html(type_name)
    )
}

/// Renders entities as HTML-like tables with one port per field.
///
/// Field ports are named `po_<field>`, which is what edges attach to.
#[derive(Debug, Clone, Default)]
pub struct DotRenderer;

impl DotRenderer {
    pub fn new() -> Self {
        Self
    }

    fn table(&self, entity: &Entity, color: &str, title: &str, columns: usize, rows: &str) -> String {
        format!(
            "    {alias} [shape=plaintext, label=<\n      <table border=\"0\" cellborder=\"1\" cellspacing=\"0\" cellpadding=\"3\">\n        <tr><td colspan=\"{columns}\" port=\"header\" bgcolor=\"{color}\"><font color=\"#ffffff\"><b>{title}</b><br/>{qualified}</font></td></tr>\n{rows}      </table>>];\n",
            alias = entity.alias,
            title = escape_html(title),
            qualified = escape_html(&entity.qualified_name),
        )
    }

    fn message(&self, entity: &Entity, body: &EntityBody) -> String {
        let mut rows = String::new();
        for row in &body.rows {
            match row {
                BodyRow::Field {
                    label,
                    type_name,
                    name,
                    number,
                    kind,
                    oneof,
                } => {
                    let label = match oneof {
                        Some(group) => format!("oneof {group}"),
                        None => label.clone(),
                    };
                    let _ = writeln!(
                        rows,
                        "        <tr><td align=\"left\">{}</td><td align=\"left\">{}</td><td align=\"left\" port=\"po_{}\">{}</td><td align=\"right\">{}</td></tr>",
                        escape_html(&label),
                        type_cell(type_name, *kind),
                        name,
                        escape_html(name),
                        number
                    );
                }
                BodyRow::Map {
                    key_type,
                    value_type,
                    name,
                    number,
                    kind,
                } => {
                    let _ = writeln!(
                        rows,
                        "        <tr><td align=\"left\">map</td><td align=\"left\">{}, {}</td><td align=\"left\" port=\"po_{}\">{}</td><td align=\"right\">{}</td></tr>",
                        escape_html(key_type),
                        type_cell(value_type, *kind),
                        name,
                        escape_html(name),
                        number
                    );
                }
                BodyRow::EnumValue { .. } | BodyRow::Rpc { .. } => {}
            }
        }
        self.table(entity, HEADER_MESSAGE, &entity.name, 4, &rows)
    }

    fn enumeration(&self, entity: &Entity, body: &EntityBody) -> String {
        let mut rows = String::new();
        for row in &body.rows {
            if let BodyRow::EnumValue { name, number } = row {
                let _ = writeln!(
                    rows,
                    "        <tr><td align=\"left\">{}</td><td align=\"right\">{}</td></tr>",
                    escape_html(name),
                    number
                );
            }
        }
        self.table(entity, HEADER_ENUM, &format!("enum {}", entity.name), 2, &rows)
    }

    fn service(&self, entity: &Entity, body: &EntityBody) -> String {
        let mut rows = String::new();
        for row in &body.rows {
            if let BodyRow::Rpc {
                name,
                request,
                response,
                client_streaming,
                server_streaming,
                request_kind,
                response_kind,
            } = row
            {
                let stream = |flag: bool| if flag { "stream " } else { "" };
                let _ = writeln!(
                    rows,
                    "        <tr><td align=\"left\" port=\"po_{name}_request\">{}{}</td><td>{}</td><td align=\"left\" port=\"po_{name}_response\">{}{}</td></tr>",
                    stream(*client_streaming),
                    type_cell(request, *request_kind),
                    escape_html(name),
                    stream(*server_streaming),
                    type_cell(response, *response_kind),
                );
            }
        }
        self.table(entity, HEADER_SERVICE, &format!("service {}", entity.name), 3, &rows)
    }

    fn missing(&self, entity: &Entity) -> String {
        format!(
            "    {} [shape=box, style=\"dashed,filled\", color=\"{MISSING}\", fillcolor=\"{MISSING_FILL}\", fontcolor=\"{MISSING}\", label=\"{} (missing)\"];\n",
            entity.alias,
            escape_quoted(&entity.name)
        )
    }
}

impl NodeRenderer for DotRenderer {
    fn render_entity(&self, entity: &Entity, body: &EntityBody) -> String {
        match entity.kind {
            EntityKind::Message => self.message(entity, body),
            EntityKind::Enum => self.enumeration(entity, body),
            EntityKind::Service => self.service(entity, body),
            EntityKind::Missing => self.missing(entity),
            // Methods are drawn as rows of their service.
            EntityKind::Rpc => String::new(),
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Values printed in the comment block at the top of a document.
#[derive(Debug, Clone, Copy)]
pub struct DocumentHeader<'a> {
    pub source: &'a str,
    pub package: &'a str,
    pub selection: Option<&'a str>,
}

/// How entity nodes are arranged in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping<'a> {
    /// All nodes at top level.
    Flat,
    /// One cluster per source unit; the named unit is left unwrapped.
    BySource { unwrapped: Option<&'a str> },
}

fn document_header(out: &mut String, header: &DocumentHeader<'_>) {
    let comment = |text: &str| text.replace("*/", "* /");
    let _ = writeln!(out, "/*");
    let _ = writeln!(out, "    generated by protograph {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "    source:    {}", comment(header.source));
    let _ = writeln!(out, "    package:   {}", comment(header.package));
    if let Some(selection) = header.selection {
        let _ = writeln!(out, "    selection: {}", comment(selection));
    }
    let _ = writeln!(out, "*/");
    let _ = writeln!(out, "digraph protograph {{");
    let _ = writeln!(
        out,
        "    graph [rankdir=LR, fontname=\"Helvetica\", fontsize=10, nodesep=0.4];"
    );
    let _ = writeln!(out, "    node [fontname=\"Helvetica\", fontsize=10];");
    let _ = writeln!(out, "    edge [fontname=\"Helvetica\", fontsize=9];");
}

fn edge_style(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Enum => "[style=dashed, color=\"#4f8a3c\", arrowhead=diamond]",
        EntityKind::Missing => "[style=dotted, color=\"#cc0000\", arrowhead=odot]",
        _ => "[style=solid, color=\"#3b6ea5\"]",
    }
}

/// Assembles a full inclusion-graph document.
///
/// Entities without an artifact (RPC methods) contribute no node. Each edge
/// is styled by the kind of its target.
pub fn render_graph<'e>(
    header: &DocumentHeader<'_>,
    entities: &[&Entity],
    edges: impl IntoIterator<Item = (&'e EdgeKey, &'e EdgeTargets)>,
    registry: &Registry,
    grouping: Grouping<'_>,
) -> String {
    let mut out = String::new();
    document_header(&mut out, header);

    let _ = writeln!(out, "\n    // nodes");
    match grouping {
        Grouping::Flat => {
            for entity in entities {
                if let Some(artifact) = &entity.artifact {
                    out.push_str(artifact);
                }
            }
        }
        Grouping::BySource { unwrapped } => {
            let mut groups: BTreeMap<&str, Vec<&Entity>> = BTreeMap::new();
            for &entity in entities.iter().filter(|e| e.artifact.is_some()) {
                groups.entry(entity.source.as_str()).or_default().push(entity);
            }
            for (source, members) in groups {
                let artifacts = members.iter().filter_map(|e| e.artifact.as_deref());
                if Some(source) == unwrapped {
                    let _ = writeln!(out, "    // {}", source.replace('\n', " "));
                    artifacts.for_each(|a| out.push_str(a));
                    continue;
                }
                let short = source.rsplit(['/', '\\']).next().unwrap_or(source);
                let _ = writeln!(out, "    subgraph cluster_{} {{", &stable_id(source)[1..13]);
                let _ = writeln!(
                    out,
                    "        label=\"{}\"; tooltip=\"{}\"; style=dashed; color=\"#999999\"; fontcolor=\"#666666\";",
                    escape_quoted(short),
                    escape_quoted(source)
                );
                artifacts.for_each(|a| out.push_str(a));
                let _ = writeln!(out, "    }}");
            }
        }
    }

    let _ = writeln!(out, "\n    // connections");
    for (key, targets) in edges {
        for target in targets.keys() {
            let style = registry
                .entity_by_alias(target)
                .map(|e| edge_style(e.kind))
                .unwrap_or_else(|| edge_style(EntityKind::Missing));
            let _ = writeln!(
                out,
                "    {}:po_{}:e -> {} {};",
                key.owner, key.field, target, style
            );
        }
    }

    let _ = writeln!(out, "}}");
    out
}

/// Assembles the import dependency tree: one node per unit, one edge per import.
pub fn render_imports(header: &DocumentHeader<'_>, units: &BTreeMap<String, SourceUnit>) -> String {
    let mut out = String::new();
    document_header(&mut out, header);

    let _ = writeln!(out, "\n    // nodes");
    for unit in units.values() {
        let label = escape_quoted(&unit.identifier.replace('\n', " "));
        if unit.missing {
            let _ = writeln!(
                out,
                "    {} [shape=box, style=dashed, color=\"{MISSING}\", fontcolor=\"{MISSING}\", label=\"{} (missing)\"];",
                stable_id(&unit.identifier),
                label
            );
        } else {
            let package = if unit.package.is_empty() {
                String::new()
            } else {
                format!("\\n{}", escape_quoted(&unit.package))
            };
            let _ = writeln!(
                out,
                "    {} [shape=box, style=rounded, label=\"{}{}\"];",
                stable_id(&unit.identifier),
                label,
                package
            );
        }
    }

    let _ = writeln!(out, "\n    // imports");
    for unit in units.values() {
        for import in &unit.imports {
            let style = match units.get(import) {
                Some(target) if target.weak => " [style=dashed]",
                _ => "",
            };
            let _ = writeln!(
                out,
                "    {} -> {}{};",
                stable_id(&unit.identifier),
                stable_id(import),
                style
            );
        }
    }

    let _ = writeln!(out, "}}");
    out
}
