use thiserror::Error;

/// Errors that can occur while loading, resolving, selecting or rendering a schema graph.
#[derive(Error, Debug)]
pub enum ProtoGraphError {
    #[error("file error: {message} (path: {path})")]
    File { message: String, path: String },

    #[error("parse error: {message} (path: {path}, line: {line:?})")]
    Parse {
        message: String,
        path: String,
        line: Option<u32>,
    },

    #[error("duplicate declaration of '{qualified_name}' (path: {path})")]
    DuplicateDeclaration {
        qualified_name: String,
        path: String,
    },

    #[error("unresolved type reference '{reference}' (scope: {scope})")]
    UnresolvedReference { scope: String, reference: String },

    #[error("ambiguous type reference '{reference}' (scope: {scope}, candidates: {candidates:?})")]
    AmbiguousReference {
        scope: String,
        reference: String,
        candidates: Vec<String>,
    },

    #[error("selection '{fragment}' must match exactly one entity, found {}: {candidates:?}", .candidates.len())]
    AmbiguousSelection {
        fragment: String,
        candidates: Vec<String>,
    },

    #[error("missing import '{name}' (imported by: {importer:?}): {message}")]
    MissingImport {
        name: String,
        importer: Option<String>,
        message: String,
    },

    #[error("unsupported construct '{construct}' in {scope}")]
    UnsupportedConstruct { construct: String, scope: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("render error: {message}")]
    Render { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results using `ProtoGraphError`.
pub type Result<T> = std::result::Result<T, ProtoGraphError>;
