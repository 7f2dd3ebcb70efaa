//! Import walk: loads the root schema, then every file it transitively
//! imports, declaring each file's entities exactly once.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::ProtoGraphConfig;
use crate::errors::{ProtoGraphError, Result};
use crate::graph::declare_file;
use crate::registry::Registry;
use crate::schema::{parse_schema, ImportModifier, SchemaFile};
use crate::types::{RunOptions, SourceUnit};

/// Returns `true` if `name` is schema text rather than a file name.
pub fn is_blob(name: &str) -> bool {
    name.matches('\n').count() > 1
}

/// Identifier for schema text passed inline.
pub fn blob_identifier(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("blob_{}", &hex::encode(digest)[..16])
}

// ============================================================================
// Loaders
// ============================================================================

/// Fetches schema text by import name.
pub trait SourceLoader {
    fn load(&self, name: &str) -> Result<String>;
}

/// Loads schema files from disk.
///
/// A name is looked up relative to the root directory, then as given, then
/// under each import path. `mapping` substitutes names before the lookup; a
/// mapped value that is schema text is returned as is.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    root_dir: PathBuf,
    import_paths: Vec<PathBuf>,
    mapping: BTreeMap<String, String>,
}

impl FsLoader {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Loader rooted at `root_dir` with the config's import paths and mapping.
    pub fn from_config(root_dir: impl Into<PathBuf>, config: &ProtoGraphConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            import_paths: config.import_paths.iter().map(PathBuf::from).collect(),
            mapping: config.import_mapping.clone(),
        }
    }

    pub fn with_import_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.import_paths.push(path.into());
        self
    }

    pub fn with_mapping(mut self, name: &str, replacement: &str) -> Self {
        self.mapping.insert(name.to_string(), replacement.to_string());
        self
    }

    /// Candidate paths for `name`, in lookup order.
    pub fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let path = Path::new(name);
        if path.is_absolute() {
            return vec![path.to_path_buf()];
        }
        let mut candidates = vec![self.root_dir.join(path), path.to_path_buf()];
        candidates.extend(self.import_paths.iter().map(|dir| dir.join(path)));
        candidates
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, name: &str) -> Result<String> {
        let name = match self.mapping.get(name) {
            Some(replacement) => {
                debug!(name, replacement = %replacement.lines().next().unwrap_or(""), "import mapped");
                if is_blob(replacement) {
                    return Ok(replacement.clone());
                }
                replacement.as_str()
            }
            None => name,
        };

        for candidate in self.candidates(name) {
            if candidate.is_file() {
                return fs::read_to_string(&candidate).map_err(|e| ProtoGraphError::File {
                    message: format!("failed to read: {e}"),
                    path: candidate.display().to_string(),
                });
            }
        }

        Err(ProtoGraphError::File {
            message: "not found in root directory or import paths".to_string(),
            path: name.to_string(),
        })
    }
}

/// Serves schema text from memory; used for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: &str, content: &str) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&mut self, name: &str, content: &str) {
        self.files.insert(name.to_string(), content.to_string());
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, name: &str) -> Result<String> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| ProtoGraphError::File {
                message: "not found".to_string(),
                path: name.to_string(),
            })
    }
}

// ============================================================================
// Walker
// ============================================================================

/// Everything the walk produced.
#[derive(Debug)]
pub struct WalkResult {
    /// Identifier of the root unit.
    pub root: String,
    pub units: BTreeMap<String, SourceUnit>,
    /// Parsed files in completion order: every file follows the files it imports.
    pub files: Vec<(String, SchemaFile)>,
    /// Declarations rejected because their qualified name was already taken.
    pub duplicates: Vec<ProtoGraphError>,
}

/// Depth-first import walk with a visited set keyed by identifier.
///
/// A file's declarations are recorded before its imports are followed, and a
/// unit is marked visited before recursion, so import cycles terminate.
pub struct ImportWalker<'a> {
    loader: &'a dyn SourceLoader,
    registry: &'a mut Registry,
    options: RunOptions,
    units: BTreeMap<String, SourceUnit>,
    files: Vec<(String, SchemaFile)>,
    duplicates: Vec<ProtoGraphError>,
    depth: usize,
}

impl<'a> ImportWalker<'a> {
    pub fn new(loader: &'a dyn SourceLoader, registry: &'a mut Registry, options: RunOptions) -> Self {
        Self {
            loader,
            registry,
            options,
            units: BTreeMap::new(),
            files: Vec::new(),
            duplicates: Vec::new(),
            depth: 0,
        }
    }

    /// Walks from `root`, which is a file name or inline schema text.
    ///
    /// A root that cannot be loaded is always fatal.
    pub fn walk(mut self, root: &str) -> Result<WalkResult> {
        let root_id = self.identifier(root);
        self.visit(root, None)?;
        info!(
            root = %root_id,
            files = self.files.len(),
            missing = self.units.values().filter(|u| u.missing).count(),
            "import walk complete"
        );
        Ok(WalkResult {
            root: root_id,
            units: self.units,
            files: self.files,
            duplicates: self.duplicates,
        })
    }

    fn identifier(&self, name: &str) -> String {
        if is_blob(name) {
            blob_identifier(name)
        } else {
            name.to_string()
        }
    }

    /// Loads, parses and declares one unit, then follows its imports.
    ///
    /// Returns `false` when the unit is missing.
    fn visit(&mut self, name: &str, importer: Option<&str>) -> Result<bool> {
        let identifier = self.identifier(name);
        if let Some(unit) = self.units.get(&identifier) {
            return Ok(!unit.missing);
        }

        let content = if is_blob(name) {
            name.to_string()
        } else {
            match self.loader.load(name) {
                Ok(content) => content,
                Err(e) if self.depth > 0 && self.options.allow_missing_imports => {
                    warn!(import = name, importer = importer.unwrap_or(""), error = %e, "import not found");
                    self.units
                        .insert(identifier.clone(), SourceUnit::missing(&identifier));
                    return Ok(false);
                }
                Err(e) => {
                    return Err(ProtoGraphError::MissingImport {
                        name: name.to_string(),
                        importer: importer.map(str::to_string),
                        message: e.to_string(),
                    })
                }
            }
        };

        let file = parse_schema(&identifier, &content)?;
        debug!(unit = %identifier, package = file.package_name(), depth = self.depth, "loaded");

        self.units.insert(
            identifier.clone(),
            SourceUnit {
                identifier: identifier.clone(),
                package: file.package_name().to_string(),
                syntax: file.syntax.clone(),
                imports: file.imports.iter().map(|i| i.path.clone()).collect(),
                missing: false,
                weak: false,
            },
        );
        let duplicates = declare_file(self.registry, &identifier, &file);
        self.duplicates.extend(duplicates);

        for import in &file.imports {
            self.depth += 1;
            let result = self.visit(&import.path, Some(&identifier));
            self.depth -= 1;
            result?;

            if import.modifier == ImportModifier::Weak {
                if let Some(unit) = self.units.get_mut(&import.path) {
                    unit.weak = true;
                }
            }
        }

        self.files.push((identifier, file));
        Ok(true)
    }
}
