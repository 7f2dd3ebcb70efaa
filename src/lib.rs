pub mod config;
pub mod errors;
pub mod graph;
pub mod pipeline;
pub mod registry;
pub mod render;
pub mod resolution;
pub mod schema;
pub mod types;
pub mod walker;
