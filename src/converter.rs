//! External document converter
//!
//! Turning EPUB or HTML into raw Markdown is delegated to an external tool.
//! The [`Converter`] trait is the seam; [`Pandoc`] is the implementation
//! used by the CLI.

use crate::ConvertError;
use std::path::Path;
use std::process::Command;

/// Produces raw Markdown from a source document
pub trait Converter {
    /// Short tool name used in logs and error messages
    fn name(&self) -> &str;

    /// Tool name and version for the metadata header, if it can be determined
    fn version(&self) -> Option<String>;

    /// Convert `source` to Markdown. Must not modify the source file.
    fn convert(&self, source: &Path) -> Result<String, ConvertError>;
}

/// Pandoc command-line converter
#[derive(Debug, Clone)]
pub struct Pandoc {
    program: String,
}

impl Default for Pandoc {
    fn default() -> Self {
        Self {
            program: "pandoc".to_string(),
        }
    }
}

impl Pandoc {
    /// Use a specific pandoc binary
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the pandoc binary can be executed
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

impl Converter for Pandoc {
    fn name(&self) -> &str {
        "pandoc"
    }

    fn version(&self) -> Option<String> {
        let output = Command::new(&self.program).arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }

    fn convert(&self, source: &Path) -> Result<String, ConvertError> {
        log::debug!("Running {} on {}", self.program, source.display());

        let output = Command::new(&self.program)
            .arg(source)
            .args([
                "-t",
                "markdown",
                "--markdown-headings=atx",
                "--wrap=none",
                "--strip-comments",
            ])
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ConvertError::ConverterMissing(self.program.clone()),
                _ => ConvertError::Io(e),
            })?;

        if !output.status.success() {
            return Err(ConvertError::ConverterFailed {
                tool: self.name().to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| ConvertError::InvalidUtf8(source.to_path_buf()))
    }
}
