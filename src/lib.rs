//! Book to Markdown conversion tuned for knowledge-base uploads
//!
//! This crate provides:
//! - Artifact analysis and a 0-100 optimization score for converted Markdown
//! - A quality pre-check that spots documents whose structure was lost
//! - Conditional cleanup: heading promotion, artifact stripping, navigation
//!   removal and whitespace normalisation
//! - Batch conversion of EPUB/HTML folders through an external converter

pub mod artifacts;
pub mod batch;
pub mod cleaner;
pub mod config;
pub mod converter;
pub mod headings;
pub mod logging;
pub mod metadata;
pub mod precheck;
pub mod rules;

pub use artifacts::{analyze, analyze_with_weights, ArtifactKind, ArtifactReport};
pub use batch::{process_folder, BatchOptions, BatchSummary, ConversionResult};
pub use cleaner::{clean, optimize, OptimizeReport, Optimized};
pub use config::{OptimizerConfig, ScoreWeights};
pub use converter::{Converter, Pandoc};
pub use metadata::BookMetadata;
pub use precheck::{precheck, PrecheckResult, Severity};

use log::{debug, warn};
use std::path::{Path, PathBuf};

/// High-level result of processing a single book
#[derive(Debug)]
pub struct BookProcessResult {
    /// Pre-check outcome on the raw converter output, when enabled
    pub precheck: Option<PrecheckResult>,
    /// Final Markdown with metadata header
    pub markdown: String,
    pub report: OptimizeReport,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Convert a book with `converter` and optimize the result
///
/// This function will:
/// 1. Run the external converter on `path`
/// 2. Pre-check the raw Markdown, if `config.enable_precheck` is set
/// 3. Clean it if its score is below the optimization threshold
///
/// A failed pre-check is logged and reported. With `config.strict_precheck`
/// it stops processing with [`ConvertError::PrecheckFailed`].
pub fn process_book<C: Converter, P: AsRef<Path>>(
    converter: &C,
    path: P,
    meta: &BookMetadata,
    config: &OptimizerConfig,
) -> Result<BookProcessResult, ConvertError> {
    let start = std::time::Instant::now();
    let path = path.as_ref();

    debug!("Converting {} with {}", path.display(), converter.name());
    let raw = converter.convert(path)?;

    let check = if config.enable_precheck {
        let check = precheck(&raw, config);
        for issue in &check.issues {
            warn!("{:?}: {}", issue.severity, issue.message);
        }
        if !check.passed {
            warn!(
                "Pre-check failed for {} (score {:.1}%, threshold {:.1}%)",
                path.display(),
                check.score,
                config.quality_threshold
            );
            if config.strict_precheck {
                return Err(ConvertError::PrecheckFailed(Box::new(check)));
            }
        }
        Some(check)
    } else {
        None
    };

    let optimized = optimize(&raw, meta, config);

    Ok(BookProcessResult {
        precheck: check,
        markdown: optimized.text,
        report: optimized.report,
        processing_time_ms: start.elapsed().as_millis() as u64,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Converter '{0}' is not installed or not in PATH")]
    ConverterMissing(String),
    #[error("{tool} exited with {status}: {stderr}")]
    ConverterFailed {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("Converter output for {0} is not valid UTF-8")]
    InvalidUtf8(PathBuf),
    #[error("Input folder {0} does not exist")]
    InputNotFound(PathBuf),
    #[error("Quality pre-check failed (score {:.1}%)", .0.score)]
    PrecheckFailed(Box<PrecheckResult>),
    #[error("Invalid configuration: {0}")]
    Config(String),
}
