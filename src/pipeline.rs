//! One run of the engine: walk imports, build the inclusion graph, then
//! render the whole graph, a selection or the import tree.
//!
//! Also holds the batch front end that expands directory, glob and
//! `list:` inputs into independent runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::config::{should_include_file, ProtoGraphConfig};
use crate::errors::{ProtoGraphError, Result};
use crate::graph::selection::SELECT_IMPORTS;
use crate::graph::{collect_stats, BuildReport, GraphBuilder, InclusionGraph, SubgraphSelector};
use crate::registry::Registry;
use crate::render::graphviz::{run_dot, ImageFormat};
use crate::render::{render_graph, render_imports, DocumentHeader, DotRenderer, Grouping, NodeRenderer};
use crate::resolution::ReferenceResolver;
use crate::types::*;
use crate::walker::{is_blob, FsLoader, ImportWalker, SourceLoader};

/// Prefix marking an input that names a file listing one schema per line.
pub const LIST_PREFIX: &str = "list:";

/// The engine state after a successful build.
///
/// Selections may be run repeatedly against one build; a failed selection
/// leaves the build untouched.
pub struct ProtoGraph {
    root: String,
    registry: Registry,
    resolver: ReferenceResolver,
    graph: InclusionGraph,
    units: BTreeMap<String, SourceUnit>,
    report: BuildReport,
}

impl ProtoGraph {
    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    /// Builds the graph for `root` (a file name or inline schema text) with
    /// the DOT renderer.
    pub fn load(root: &str, loader: &dyn SourceLoader, options: RunOptions) -> Result<Self> {
        Self::load_with_renderer(root, loader, options, &DotRenderer::new())
    }

    /// Builds the graph for `root`, rendering entity fragments with `renderer`.
    ///
    /// Fails with the first resolution error when missing types are not
    /// shown; every failure is logged before that.
    pub fn load_with_renderer(
        root: &str,
        loader: &dyn SourceLoader,
        options: RunOptions,
        renderer: &dyn NodeRenderer,
    ) -> Result<Self> {
        let mut registry = Registry::new();
        let walk = ImportWalker::new(loader, &mut registry, options).walk(root)?;

        let mut resolver = ReferenceResolver::new(options.show_missing_types);
        let mut graph = InclusionGraph::new();
        let mut builder = GraphBuilder::new(&mut registry, &mut resolver, &mut graph, renderer);
        for (identifier, file) in &walk.files {
            builder.build_file(identifier, file);
        }
        let mut report = builder.finish();

        if !report.errors.is_empty() {
            error!(
                root = %walk.root,
                count = report.errors.len(),
                "unresolved type references"
            );
            return Err(report.errors.remove(0));
        }
        report.duplicates = walk.duplicates.len();

        info!(
            root = %walk.root,
            entities = registry.len(),
            edges = graph.edge_count(),
            "graph built"
        );
        Ok(Self {
            root: walk.root,
            registry,
            resolver,
            graph,
            units: walk.units,
            report,
        })
    }

    /// Builds the graph for a schema file on disk.
    ///
    /// Imports are looked up next to the file first. The root is identified
    /// by its file name so that imports naming it again are recognized.
    pub fn open(path: &Path, config: &ProtoGraphConfig) -> Result<Self> {
        let root_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ProtoGraphError::File {
                message: "not a file".to_string(),
                path: path.display().to_string(),
            })?;
        let loader = FsLoader::from_config(root_dir, config);
        Self::load(&name, &loader, config.run_options())
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Identifier of the root unit.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn graph(&self) -> &InclusionGraph {
        &self.graph
    }

    /// Every unit reached by the import walk, with its dependency list.
    pub fn source_units(&self) -> &BTreeMap<String, SourceUnit> {
        &self.units
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Package declared by the root unit.
    pub fn package(&self) -> &str {
        self.units
            .get(&self.root)
            .map(|u| u.package.as_str())
            .unwrap_or("")
    }

    pub fn stats(&self) -> GraphStats {
        collect_stats(&self.registry, &self.graph, &self.units, &self.report)
    }

    // -------------------------------------------------------------------------
    // Selection and rendering
    // -------------------------------------------------------------------------

    /// Extracts the subgraph reachable from `selection`.
    pub fn select(&mut self, selection: &str) -> Result<Subgraph> {
        SubgraphSelector::new(&mut self.registry, &mut self.resolver, &self.graph)
            .select(selection, &self.root)
    }

    /// Renders the whole graph, one cluster per unit with the root unwrapped.
    pub fn render_whole(&self) -> String {
        let header = DocumentHeader {
            source: &self.root,
            package: self.package(),
            selection: None,
        };
        render_graph(
            &header,
            &self.registry.entities(),
            self.graph.iter(),
            &self.registry,
            Grouping::BySource {
                unwrapped: Some(self.root.as_str()),
            },
        )
    }

    /// Renders the subgraph reachable from `selection` without clusters.
    pub fn render_selection(&mut self, selection: &str) -> Result<String> {
        let subgraph = self.select(selection)?;
        let header = DocumentHeader {
            source: &self.root,
            package: self.package(),
            selection: Some(selection),
        };
        let entities: Vec<&Entity> = subgraph.entities.iter().collect();
        Ok(render_graph(
            &header,
            &entities,
            subgraph.edges.iter(),
            &self.registry,
            Grouping::Flat,
        ))
    }

    /// Renders the import dependency tree.
    pub fn render_imports(&self) -> String {
        let header = DocumentHeader {
            source: &self.root,
            package: self.package(),
            selection: Some(SELECT_IMPORTS),
        };
        render_imports(&header, &self.units)
    }

    /// Renders according to `selection`: nothing or empty for the whole
    /// graph, `imports` for the import tree, anything else as fragments.
    pub fn render(&mut self, selection: Option<&str>) -> Result<String> {
        match selection.map(str::trim) {
            None | Some("") => Ok(self.render_whole()),
            Some(SELECT_IMPORTS) => Ok(self.render_imports()),
            Some(selection) => self.render_selection(selection),
        }
    }
}

// ============================================================================
// Batch front end
// ============================================================================

/// Result of one input of a batch.
#[derive(Debug)]
pub struct RunOutcome {
    pub input: String,
    pub result: Result<PathBuf>,
}

fn has_glob_chars(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

/// Expands an input into the schema roots it names.
///
/// - `list:<file>`: one root per non-empty, non-`#` line of the file.
/// - a directory: every file below it accepted by the include/exclude patterns.
/// - a glob pattern: every match.
/// - anything else (including inline schema text): itself.
pub fn expand_inputs(input: &str, config: &ProtoGraphConfig) -> Result<Vec<String>> {
    if is_blob(input) {
        return Ok(vec![input.to_string()]);
    }

    if let Some(list) = input.strip_prefix(LIST_PREFIX) {
        let contents = fs::read_to_string(list).map_err(|e| ProtoGraphError::File {
            message: format!("failed to read list: {e}"),
            path: list.to_string(),
        })?;
        return Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect());
    }

    let path = Path::new(input);
    if path.is_dir() {
        let mut files = Vec::new();
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(path)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            if should_include_file(&relative, config) {
                files.push(entry.path().to_string_lossy().to_string());
            }
        }
        files.sort();
        debug!(dir = input, count = files.len(), "directory input expanded");
        return Ok(files);
    }

    if has_glob_chars(input) {
        let pattern = glob::glob(input).map_err(|e| ProtoGraphError::File {
            message: format!("invalid pattern: {e}"),
            path: input.to_string(),
        })?;
        let mut files: Vec<String> = pattern
            .filter_map(|entry| entry.ok())
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(ProtoGraphError::File {
                message: "pattern matched no files".to_string(),
                path: input.to_string(),
            });
        }
        return Ok(files);
    }

    Ok(vec![input.to_string()])
}

/// Output file name for a root and selection, without directory.
///
/// `a/b/c.proto` with selection `Foo;*` becomes `c_Foo__.dot`.
pub fn output_file_name(root: &str, selection: Option<&str>) -> String {
    let stem = Path::new(root)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| root.to_string());
    match selection.map(str::trim).filter(|s| !s.is_empty()) {
        Some(selection) => {
            let sanitized: String = selection
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
                .collect();
            format!("{stem}_{sanitized}.dot")
        }
        None => format!("{stem}.dot"),
    }
}

/// Builds, renders and writes one root, then runs Graphviz when configured.
///
/// `output` overrides the generated file name (a `.dot` extension is added
/// when missing).
pub fn render_to_file(
    input: &str,
    selection: Option<&str>,
    config: &ProtoGraphConfig,
    output: Option<&str>,
) -> Result<PathBuf> {
    let mut protograph = if is_blob(input) {
        let loader = FsLoader::from_config(".", config);
        ProtoGraph::load(input, &loader, config.run_options())?
    } else {
        ProtoGraph::open(Path::new(input), config)?
    };
    let document = protograph.render(selection)?;

    let file_name = match output {
        Some(name) if name.ends_with(".dot") => name.to_string(),
        Some(name) => format!("{name}.dot"),
        None => output_file_name(protograph.root(), selection),
    };
    let target = Path::new(&config.output_dir).join(file_name);
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&target, document)?;
    info!(output = %target.display(), "wrote diagram");

    if config.generate_svg {
        run_dot(&config.dot_command, &target, ImageFormat::Svg)?;
    }
    if config.generate_png {
        run_dot(&config.dot_command, &target, ImageFormat::Png)?;
    }
    Ok(target)
}

/// Runs every root named by `input` independently.
///
/// A failing root is recorded and the batch moves on. The output override
/// only applies when the input names a single root.
pub fn run_batch(
    input: &str,
    selection: Option<&str>,
    config: &ProtoGraphConfig,
    output: Option<&str>,
) -> Result<Vec<RunOutcome>> {
    let roots = expand_inputs(input, config)?;
    let output = if roots.len() == 1 { output } else { None };

    Ok(roots
        .into_iter()
        .map(|root| {
            let result = render_to_file(&root, selection, config, output);
            if let Err(e) = &result {
                error!(input = %root.lines().next().unwrap_or(""), error = %e, "run failed");
            }
            RunOutcome {
                input: root,
                result,
            }
        })
        .collect())
}
