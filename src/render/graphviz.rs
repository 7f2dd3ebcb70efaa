use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::errors::{ProtoGraphError, Result};

/// Image formats the external tool is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Svg,
    Png,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Svg => "svg",
            ImageFormat::Png => "png",
        }
    }
}

/// Runs `dot_command -T<format> <dot_file> -o <image>` next to the DOT file.
///
/// Returns the path of the produced image.
pub fn run_dot(dot_command: &str, dot_file: &Path, format: ImageFormat) -> Result<PathBuf> {
    let image = dot_file.with_extension(format.as_str());
    debug!(command = dot_command, input = %dot_file.display(), "invoking graphviz");

    let output = Command::new(dot_command)
        .arg(format!("-T{}", format.as_str()))
        .arg(dot_file)
        .arg("-o")
        .arg(&image)
        .output()
        .map_err(|e| ProtoGraphError::Render {
            message: format!("failed to run '{dot_command}': {e}"),
        })?;

    if !output.status.success() {
        return Err(ProtoGraphError::Render {
            message: format!(
                "'{dot_command}' exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    info!(image = %image.display(), "rendered image");
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_is_render_error() {
        let err = run_dot(
            "protograph-no-such-dot-binary",
            Path::new("graph.dot"),
            ImageFormat::Svg,
        )
        .unwrap_err();
        assert!(matches!(err, ProtoGraphError::Render { .. }), "got: {err:?}");
    }
}
