/// Declaration pass and inclusion edge construction.
pub mod builder;

/// Subgraph extraction from selection fragments.
pub mod selection;

/// Aggregate queries over a finished run.
pub mod queries;

pub use builder::{declare_file, BuildReport, GraphBuilder, InclusionGraph};
pub use queries::{collect_stats, unreferenced_types};
pub use selection::{split_selection, SubgraphSelector};
