//! Declaration tree for Protocol Buffers schema files.
//!
//! The tree is produced by [`parse_schema`] and consumed by the graph builder.
//! Every body is a closed sum type so consumers handle each construct
//! explicitly.

mod lexer;
mod parser;

pub use lexer::{tokenize, Token};
pub use parser::parse_schema;

use crate::types::Syntax;

/// A parsed schema file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaFile {
    pub syntax: Syntax,
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub elements: Vec<FileElement>,
}

impl SchemaFile {
    /// Top-level messages in declaration order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.elements.iter().filter_map(|e| match e {
            FileElement::Message(m) => Some(m),
            _ => None,
        })
    }

    /// Top-level enums in declaration order.
    pub fn enums(&self) -> impl Iterator<Item = &EnumDecl> {
        self.elements.iter().filter_map(|e| match e {
            FileElement::Enum(e) => Some(e),
            _ => None,
        })
    }

    /// Services in declaration order.
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.elements.iter().filter_map(|e| match e {
            FileElement::Service(s) => Some(s),
            _ => None,
        })
    }

    pub fn package_name(&self) -> &str {
        self.package.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportModifier {
    #[default]
    None,
    Weak,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub modifier: ImportModifier,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileElement {
    Message(Message),
    Enum(EnumDecl),
    Service(Service),
    Extend(Extend),
    Option(OptionDecl),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    pub name: String,
    /// Constant as written, aggregates included.
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldLabel {
    #[default]
    None,
    Optional,
    Required,
    Repeated,
}

impl FieldLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldLabel::None => "",
            FieldLabel::Optional => "optional",
            FieldLabel::Required => "required",
            FieldLabel::Repeated => "repeated",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub label: FieldLabel,
    pub type_name: String,
    pub name: String,
    pub number: u32,
    /// Text between the brackets of `[...]`, if any.
    pub options: Option<String>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapField {
    pub key_type: String,
    pub value_type: String,
    pub name: String,
    pub number: u32,
    pub options: Option<String>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Oneof {
    pub name: String,
    pub elements: Vec<OneofElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OneofElement {
    Field(Field),
    Option(OptionDecl),
    Comment(String),
    Group(Group),
}

/// A proto2 group: a field and a nested message declared together.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub label: FieldLabel,
    pub name: String,
    pub number: u32,
    pub elements: Vec<MessageElement>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservedItem {
    Range { start: i64, end: Option<i64> },
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extend {
    pub target: String,
    pub elements: Vec<MessageElement>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub name: String,
    pub elements: Vec<MessageElement>,
    pub line: u32,
}

impl Message {
    /// Nested messages in declaration order.
    pub fn nested_messages(&self) -> impl Iterator<Item = &Message> {
        self.elements.iter().filter_map(|e| match e {
            MessageElement::Message(m) => Some(m),
            _ => None,
        })
    }

    /// Nested enums in declaration order.
    pub fn nested_enums(&self) -> impl Iterator<Item = &EnumDecl> {
        self.elements.iter().filter_map(|e| match e {
            MessageElement::Enum(e) => Some(e),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageElement {
    Field(Field),
    Map(MapField),
    Oneof(Oneof),
    Enum(EnumDecl),
    Message(Message),
    Reserved(Vec<ReservedItem>),
    Extensions(Vec<ReservedItem>),
    Option(OptionDecl),
    Comment(String),
    Group(Group),
    Extend(Extend),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub elements: Vec<EnumElement>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnumElement {
    Value(EnumValue),
    Option(OptionDecl),
    Reserved(Vec<ReservedItem>),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub number: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub name: String,
    pub elements: Vec<ServiceElement>,
    pub line: u32,
}

impl Service {
    /// RPC methods in declaration order.
    pub fn rpcs(&self) -> impl Iterator<Item = &Rpc> {
        self.elements.iter().filter_map(|e| match e {
            ServiceElement::Rpc(r) => Some(r),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceElement {
    Rpc(Rpc),
    Option(OptionDecl),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rpc {
    pub name: String,
    pub request_type: String,
    pub response_type: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub options: Vec<OptionDecl>,
    pub line: u32,
}
