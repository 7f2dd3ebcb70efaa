use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::errors::{ProtoGraphError, Result};
use crate::types::RunOptions;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "protograph.json";

/// Configuration for protograph runs.
///
/// Controls import lookup, missing-symbol tolerance, input discovery and
/// output generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtoGraphConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Tolerate imports that cannot be opened (the root file is always required).
    pub allow_missing_imports: bool,
    /// Draw unresolved type references as placeholder nodes instead of failing.
    pub show_missing_types: bool,
    /// Directory receiving generated `.dot` files.
    pub output_dir: String,
    /// Extra directories searched for imports.
    pub import_paths: Vec<String>,
    /// Import name to replacement path (or inline schema text).
    pub import_mapping: BTreeMap<String, String>,
    /// Glob patterns for files picked up from directory inputs.
    pub include: Vec<String>,
    /// Glob patterns for files skipped in directory inputs.
    pub exclude: Vec<String>,
    /// Run Graphviz to produce an `.svg` next to each `.dot`.
    pub generate_svg: bool,
    /// Run Graphviz to produce a `.png` next to each `.dot`.
    pub generate_png: bool,
    /// Graphviz executable.
    pub dot_command: String,
}

impl Default for ProtoGraphConfig {
    fn default() -> Self {
        Self {
            version: 1,
            allow_missing_imports: true,
            show_missing_types: true,
            output_dir: "generated".to_string(),
            import_paths: Vec::new(),
            import_mapping: BTreeMap::new(),
            include: vec!["**/*.proto".to_string()],
            exclude: vec![
                "vendor/**".to_string(),
                "**/vendor/**".to_string(),
                "target/**".to_string(),
                ".git/**".to_string(),
            ],
            generate_svg: false,
            generate_png: false,
            dot_command: "dot".to_string(),
        }
    }
}

impl ProtoGraphConfig {
    /// Toggles consumed by the core.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            allow_missing_imports: self.allow_missing_imports,
            show_missing_types: self.show_missing_types,
        }
    }
}

/// Wraps a failure touching `path` as a `Config` error.
fn config_error(action: &str, path: &Path, err: impl std::fmt::Display) -> ProtoGraphError {
    ProtoGraphError::Config {
        message: format!("cannot {action} {}: {err}", path.display()),
    }
}

/// Reads `protograph.json`-style settings from `config_path`.
///
/// An absent file yields the defaults; keys missing from the file take their
/// default values.
pub fn load_config(config_path: &Path) -> Result<ProtoGraphConfig> {
    if !config_path.is_file() {
        return Ok(ProtoGraphConfig::default());
    }
    let text = fs::read_to_string(config_path).map_err(|e| config_error("read", config_path, e))?;
    serde_json::from_str(&text).map_err(|e| config_error("parse", config_path, e))
}

/// Writes `config` as pretty JSON, replacing `config_path` atomically.
///
/// Missing parent directories are created. The document goes to a `.tmp`
/// sibling first and is renamed over the target.
pub fn save_config(config_path: &Path, config: &ProtoGraphConfig) -> Result<()> {
    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| config_error("create directory", dir, e))?;
    }

    let mut json =
        serde_json::to_string_pretty(config).map_err(|e| config_error("serialize", config_path, e))?;
    json.push('\n');

    let staged = config_path.with_extension("tmp");
    fs::write(&staged, json).map_err(|e| config_error("write", &staged, e))?;
    fs::rename(&staged, config_path).map_err(|e| config_error("replace", config_path, e))
}

/// Determines whether a file found under a directory input should be
/// processed, based on the include and exclude glob patterns.
///
/// Exclude patterns take precedence.
pub fn should_include_file(file_path: &str, config: &ProtoGraphConfig) -> bool {
    let match_opts = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let matches = |patterns: &[String]| {
        patterns.iter().any(|p| {
            Pattern::new(p)
                .map(|pattern| pattern.matches_with(file_path, match_opts))
                .unwrap_or(false)
        })
    };

    !matches(&config.exclude) && matches(&config.include)
}
