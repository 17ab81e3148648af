//! Batch conversion of a folder of books
//!
//! Files are processed one at a time in file-name order:
//! convert -> pre-check -> optimize -> write. A failure only affects the
//! file it happened on; the batch keeps going and reports a summary.

use crate::cleaner::OptimizeReport;
use crate::config::OptimizerConfig;
use crate::converter::Converter;
use crate::metadata::BookMetadata;
use crate::precheck::PrecheckResult;
use crate::{process_book, ConvertError};
use log::{error, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Options for a batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Source extensions to pick up, lowercase without the dot
    pub extensions: Vec<String>,
    pub config: OptimizerConfig,
    /// Copy the source file to the output folder when conversion fails
    pub fallback_copy: bool,
}

impl BatchOptions {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            extensions: vec!["epub".to_string(), "html".to_string(), "htm".to_string()],
            config: OptimizerConfig::default(),
            fallback_copy: false,
        }
    }
}

/// Outcome for one source file
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub source: PathBuf,
    /// Written Markdown file, or the fallback copy
    pub output: Option<PathBuf>,
    pub success: bool,
    pub error: Option<String>,
    pub precheck: Option<PrecheckResult>,
    pub report: Option<OptimizeReport>,
}

impl ConversionResult {
    fn failed(source: &Path, err: impl ToString) -> Self {
        Self {
            source: source.to_path_buf(),
            output: None,
            success: false,
            error: Some(err.to_string()),
            precheck: None,
            report: None,
        }
    }
}

/// Aggregated batch outcome
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub results: Vec<ConversionResult>,
    pub successful: usize,
    pub failed: usize,
    /// Bytes written across all successful outputs
    pub total_output_bytes: u64,
}

impl BatchSummary {
    fn push(&mut self, result: ConversionResult) {
        if result.success {
            self.successful += 1;
            if let Some(report) = &result.report {
                self.total_output_bytes += report.after_size as u64;
            }
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }
}

/// List source files directly inside `dir`, sorted by file name
pub fn find_sources(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, ConvertError> {
    if !dir.is_dir() {
        return Err(ConvertError::InputNotFound(dir.to_path_buf()));
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                extensions.iter().any(|wanted| *wanted == ext)
            })
            .unwrap_or(false);
        if matches {
            sources.push(entry.into_path());
        }
    }

    Ok(sources)
}

/// Process a folder, deriving metadata from each file name
pub fn process_folder<C: Converter>(
    converter: &C,
    options: &BatchOptions,
) -> Result<BatchSummary, ConvertError> {
    process_folder_with(converter, options, |path| BookMetadata::from_file_stem(path))
}

/// Process a folder with a custom metadata provider
pub fn process_folder_with<C, F>(
    converter: &C,
    options: &BatchOptions,
    metadata: F,
) -> Result<BatchSummary, ConvertError>
where
    C: Converter,
    F: Fn(&Path) -> BookMetadata,
{
    let sources = find_sources(&options.input_dir, &options.extensions)?;
    fs::create_dir_all(&options.output_dir)?;

    info!(
        "Found {} file(s) to convert in {} with {}",
        sources.len(),
        options.input_dir.display(),
        converter.name()
    );

    let converter_version = converter.version();
    let mut summary = BatchSummary::default();

    for (idx, source) in sources.iter().enumerate() {
        info!(
            "[{}/{}] Processing {}",
            idx + 1,
            sources.len(),
            source.display()
        );
        let meta = metadata(source).with_converter(converter_version.clone());
        let result = process_file(converter, source, &meta, options);
        if result.success {
            info!("Conversion successful: {}", source.display());
        } else {
            error!(
                "Conversion failed: {}: {}",
                source.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        summary.push(result);
    }

    info!(
        "Batch complete: {} successful, {} failed",
        summary.successful, summary.failed
    );
    Ok(summary)
}

/// Convert, check, optimize and write one file
pub fn process_file<C: Converter>(
    converter: &C,
    source: &Path,
    meta: &BookMetadata,
    options: &BatchOptions,
) -> ConversionResult {
    let book = match process_book(converter, source, meta, &options.config) {
        Ok(book) => book,
        Err(ConvertError::PrecheckFailed(check)) => {
            let mut result = ConversionResult::failed(source, "quality pre-check failed");
            result.precheck = Some(*check);
            return result;
        }
        Err(err) => return conversion_failed(source, err, options),
    };

    let output = output_path(&options.output_dir, source);

    if let Err(err) = fs::write(&output, &book.markdown) {
        let mut result = ConversionResult::failed(source, ConvertError::Io(err));
        result.precheck = book.precheck;
        return result;
    }

    info!(
        "Wrote {} ({:.1} KB, {} headings, score {:.1}% -> {:.1}%, {} ms)",
        output.display(),
        book.report.after_size as f64 / 1024.0,
        book.report.heading_count,
        book.report.before_score,
        book.report.after_score,
        book.processing_time_ms
    );

    ConversionResult {
        source: source.to_path_buf(),
        output: Some(output),
        success: true,
        error: None,
        precheck: book.precheck,
        report: Some(book.report),
    }
}

fn conversion_failed(source: &Path, err: ConvertError, options: &BatchOptions) -> ConversionResult {
    let mut result = ConversionResult::failed(source, &err);

    if options.fallback_copy {
        if let Some(name) = source.file_name() {
            let target = options.output_dir.join(name);
            match fs::copy(source, &target) {
                Ok(_) => {
                    warn!("Copied original to {}", target.display());
                    result.output = Some(target);
                }
                Err(copy_err) => warn!("Fallback copy failed: {}", copy_err),
            }
        }
    }

    result
}

/// `<output_dir>/<source stem>.md`
pub fn output_path(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}.md", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("out"), Path::new("/books/My Book.epub")),
            PathBuf::from("out/My Book.md")
        );
    }

    #[test]
    fn test_find_sources_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.epub", "a.EPUB", "c.txt", "d.html"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.epub")).unwrap();

        let options = BatchOptions::new(dir.path(), dir.path().join("out"));
        let found = find_sources(dir.path(), &options.extensions).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.EPUB", "b.epub", "d.html"]);
    }

    #[test]
    fn test_missing_input_dir() {
        let err = find_sources(Path::new("/no/such/dir/here"), &[]).unwrap_err();
        assert!(matches!(err, ConvertError::InputNotFound(_)));
    }
}
