//! Integration tests for book-to-markdown

use book_to_markdown::artifacts::count_headings;
use book_to_markdown::batch::{process_folder, process_folder_with, BatchOptions};
use book_to_markdown::metadata::split_front_matter;
use book_to_markdown::{
    analyze, clean, optimize, process_book, ArtifactKind, BookMetadata, ConvertError, Converter,
    OptimizerConfig,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Converter returning canned Markdown keyed by file name
struct FakeConverter {
    outputs: HashMap<String, String>,
}

impl FakeConverter {
    fn new(outputs: &[(&str, &str)]) -> Self {
        Self {
            outputs: outputs
                .iter()
                .map(|(name, md)| (name.to_string(), md.to_string()))
                .collect(),
        }
    }
}

impl Converter for FakeConverter {
    fn name(&self) -> &str {
        "fake"
    }

    fn version(&self) -> Option<String> {
        Some("fake 1.0".to_string())
    }

    fn convert(&self, source: &Path) -> Result<String, ConvertError> {
        let name = source.file_name().unwrap().to_string_lossy().into_owned();
        self.outputs
            .get(&name)
            .cloned()
            .ok_or(ConvertError::ConverterFailed {
                tool: "fake".to_string(),
                status: "exit status: 1".to_string(),
                stderr: format!("cannot read {}", name),
            })
    }
}

fn clean_document() -> String {
    "# Chapter One\n\nPlain prose with a [link](https://example.com).\n\n## Details\n\nMore prose.\n"
        .to_string()
}

fn messy_document() -> String {
    let mut text = String::from("[**CHAPTER 1**]{.calibre3}\n\n");
    for i in 0..20 {
        text.push_str(&format!(
            "Paragraph {} with [styled]{{.calibre9}} text and [[Doe {}](#ref{}){{.biblioref}}].\n\n",
            i,
            2000 + i,
            i
        ));
    }
    text.push_str("```{=html}\n<div></div>\n```\n");
    text
}

// ============================================================================
// Score properties
// ============================================================================

#[test]
fn test_score_bounds() {
    let inputs = [
        String::new(),
        "\n\n\n".to_string(),
        clean_document(),
        messy_document(),
        "```{=html}\n".repeat(500),
        "[x]{.calibre1}\n".repeat(500),
    ];
    for input in &inputs {
        let score = analyze(input).score;
        assert!((0.0..=100.0).contains(&score), "score {} out of range", score);
    }
    assert_eq!(analyze("").score, 100.0);
}

#[test]
fn test_adding_an_inline_artifact_never_raises_score() {
    let mut base = String::from("# Title\n\n");
    base.push_str(&"A line of prose.\n".repeat(200));
    base.push_str("Last line.\n");

    let additions = [
        " [[Roe 1999](#r){.biblioref}]",
        " ![a](b.png){.c}",
        " [span]{.x}",
        " [next](#ch9.xhtml#p1)",
    ];
    let before = analyze(&base);
    assert_eq!(before.score, 100.0);

    let mut text = base.clone();
    let mut previous = before.score;
    for addition in additions {
        // append to the last line so the line count is unchanged
        text = text.replacen("Last line.", &format!("Last line.{}", addition), 1);
        let report = analyze(&text);
        assert_eq!(report.line_count, before.line_count);
        assert!(report.score < previous, "{} did not lower the score", addition);
        previous = report.score;
    }
}

#[test]
fn test_artifact_zero_fixed_point() {
    let text = clean_document();
    let report = analyze(&text);
    assert_eq!(report.total(), 0);
    assert_eq!(report.score, 100.0);

    let meta = BookMetadata {
        title: Some("Clean".to_string()),
        ..BookMetadata::default()
    };
    let optimized = optimize(&text, &meta, &OptimizerConfig::default());
    assert!(!optimized.report.cleaned);
    let (front, body) = split_front_matter(&optimized.text);
    assert!(front.unwrap().contains("title: \"Clean\""));
    assert_eq!(body.strip_prefix('\n').unwrap(), text);
}

// ============================================================================
// Threshold branching
// ============================================================================

#[test]
fn test_exact_threshold_skips_cleanup() {
    // 15 legacy markers at a flat point each: exactly 85.0
    let text = "[Heading]{.calibre2}\n".repeat(15);
    let config = OptimizerConfig::default();
    assert_eq!(analyze(&text).score, 85.0);

    let optimized = optimize(&text, &BookMetadata::default(), &config);
    assert!(!optimized.report.cleaned);
    assert_eq!(optimized.text, text);
}

#[test]
fn test_just_below_threshold_cleans() {
    let text = "[Heading]{.calibre2}\n".repeat(15);
    let config = OptimizerConfig {
        optimization_threshold: 85.0 + 1e-9,
        ..OptimizerConfig::default()
    };
    let optimized = optimize(&text, &BookMetadata::default(), &config);
    assert!(optimized.report.cleaned);
    assert!(optimized.text.starts_with("#### Heading\n"));
    assert_eq!(optimized.report.heading_count, 15);
}

// ============================================================================
// Cleanup behaviour
// ============================================================================

#[test]
fn test_heading_promotion_levels() {
    assert_eq!(clean("[**CHAPTER 1**]{.calibre3}\n"), "# CHAPTER 1\n");
    assert_eq!(clean("[Getting Started]{.calibre7}\n"), "#### Getting Started\n");
    let forty = "Building Reliable Systems From the Start";
    assert_eq!(
        clean(&format!("[**{}**]{{.calibre5}}\n", forty)),
        format!("## {}\n", forty)
    );
}

#[test]
fn test_navigation_section_removed() {
    let mut text = String::from("# My Book\n\nOpening words.\n\n## Pages\n\n");
    for page in 1..=50 {
        text.push_str(&format!("{}. [{}](#page_{})\n", page, page, page));
    }
    text.push_str("\n# Chapter 1\n\nIt begins.\n");
    let headings_before = count_headings(&text);

    let cleaned = clean(&text);
    assert!(!cleaned.contains("## Pages"));
    assert!(!cleaned.contains("#page_"));
    assert_eq!(count_headings(&cleaned), headings_before - 1);
    assert_eq!(cleaned, "# My Book\n\nOpening words.\n\n# Chapter 1\n\nIt begins.\n");
}

#[test]
fn test_guide_and_landmarks_sections_removed() {
    let text = "\
# My Book

## Guide

-   [Cover](#cover.xhtml)
-   [Text](#ch01.xhtml#start)
-   [Index](#index.xhtml)

## Landmarks

1.  [Cover](cover.xhtml)
2.  [Table of Contents](toc.xhtml)
3.  [Start of Content](ch01.xhtml#start)
4.  [Index](index.xhtml)

# Chapter 1

It begins in [chapter two](#ch02.xhtml).
";
    let cleaned = clean(text);
    assert_eq!(
        cleaned,
        "# My Book\n\n# Chapter 1\n\nIt begins in chapter two.\n"
    );
}

#[test]
fn test_cleanup_is_idempotent() {
    let inputs = [
        messy_document(),
        clean_document(),
        "> ::: {}\n> q\n\n\n\n##   \n# [Intro]\ntext   \n".to_string(),
        "\\\\'escaped\\'\n".to_string(),
        format!("{}deep{}\n", "[".repeat(12), "]{.s}".repeat(12)),
        "# [2.1 ]Scope\n<div class=\"x\">drop</div><span>keep</span> [\\[7\\]](#n7){.noteref}\n"
            .to_string(),
    ];
    for input in &inputs {
        let once = clean(input);
        assert_eq!(clean(&once), once, "not idempotent for {:?}", input);
    }
}

#[test]
fn test_messy_document_scores_100_after_cleanup() {
    let optimized = optimize(
        &messy_document(),
        &BookMetadata::default(),
        &OptimizerConfig::default(),
    );
    assert!(optimized.report.cleaned);
    assert!(optimized.report.before_score < 85.0);
    assert_eq!(optimized.report.after_score, 100.0);
    assert_eq!(optimized.report.artifacts_found[&ArtifactKind::Citation], 20);
    assert!(optimized.text.starts_with("# CHAPTER 1\n"));
    assert!(optimized.text.contains("Paragraph 0 with styled text and [Doe 2000]."));
    assert!(!optimized.text.contains("<div>"));
}

// ============================================================================
// Batch orchestration
// ============================================================================

#[test]
fn test_process_folder_writes_outputs_and_summary() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("alpha.epub"), "binary").unwrap();
    fs::write(input.path().join("beta.epub"), "binary").unwrap();
    fs::write(input.path().join("broken.epub"), "binary").unwrap();
    fs::write(input.path().join("notes.txt"), "ignored").unwrap();

    let messy = messy_document();
    let clean_doc = clean_document();
    let converter = FakeConverter::new(&[("alpha.epub", &messy), ("beta.epub", &clean_doc)]);
    let options = BatchOptions::new(input.path(), output.path());

    let summary = process_folder(&converter, &options).unwrap();
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.results.len(), 3);

    let names: Vec<String> = summary
        .results
        .iter()
        .map(|r| r.source.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["alpha.epub", "beta.epub", "broken.epub"]);

    let alpha = fs::read_to_string(output.path().join("alpha.md")).unwrap();
    assert!(alpha.contains("title: \"alpha\""));
    assert!(alpha.contains("converter: \"fake 1.0\""));
    assert!(alpha.contains("# CHAPTER 1"));
    assert_eq!(analyze(&alpha).score, 100.0);

    let beta = fs::read_to_string(output.path().join("beta.md")).unwrap();
    assert!(beta.ends_with(&clean_doc));

    let broken = &summary.results[2];
    assert!(!broken.success);
    assert!(broken.error.as_ref().unwrap().contains("cannot read broken.epub"));
    assert!(!output.path().join("broken.md").exists());

    let written: u64 = [alpha.len(), beta.len()].iter().map(|n| *n as u64).sum();
    assert_eq!(summary.total_output_bytes, written);

    // sources are never touched
    assert_eq!(fs::read_to_string(input.path().join("alpha.epub")).unwrap(), "binary");
}

#[test]
fn test_fallback_copy_on_conversion_failure() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("odd.epub"), "original bytes").unwrap();

    let converter = FakeConverter::new(&[]);
    let mut options = BatchOptions::new(input.path(), output.path());
    options.fallback_copy = true;

    let summary = process_folder(&converter, &options).unwrap();
    assert_eq!(summary.failed, 1);
    let copied = output.path().join("odd.epub");
    assert_eq!(summary.results[0].output.as_deref(), Some(copied.as_path()));
    assert_eq!(fs::read_to_string(copied).unwrap(), "original bytes");
}

#[test]
fn test_strict_precheck_skips_structureless_documents() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("flat.html"), "<p>x</p>").unwrap();

    let flat = "Just text without any structure.\n".repeat(200);
    let converter = FakeConverter::new(&[("flat.html", &flat)]);

    let mut options = BatchOptions::new(input.path(), output.path());
    let lenient = process_folder(&converter, &options).unwrap();
    assert_eq!(lenient.successful, 1);
    assert!(!lenient.results[0].precheck.as_ref().unwrap().passed);

    options.config.strict_precheck = true;
    fs::remove_file(output.path().join("flat.md")).unwrap();
    let strict = process_folder(&converter, &options).unwrap();
    assert_eq!(strict.failed, 1);
    assert!(strict.results[0].precheck.as_ref().unwrap().has_critical());
    assert!(!output.path().join("flat.md").exists());
}

#[test]
fn test_custom_metadata_provider() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("x.epub"), "").unwrap();

    let doc = clean_document();
    let converter = FakeConverter::new(&[("x.epub", &doc)]);
    let options = BatchOptions::new(input.path(), output.path());

    let summary = process_folder_with(&converter, &options, |_| BookMetadata {
        title: Some("Deep Work".to_string()),
        author: Some("Cal Newport".to_string()),
        ..BookMetadata::default()
    }
    .with_year("2016-01-05"))
    .unwrap();
    assert_eq!(summary.successful, 1);

    let written = fs::read_to_string(output.path().join("x.md")).unwrap();
    assert!(written.starts_with("---\ntitle: \"Deep Work\"\nauthor: \"Cal Newport\"\nyear: \"2016\"\n"));
}

#[test]
fn test_process_book() {
    let doc = messy_document();
    let converter = FakeConverter::new(&[("book.epub", &doc)]);
    let result = process_book(
        &converter,
        "/library/book.epub",
        &BookMetadata::default(),
        &OptimizerConfig::default(),
    )
    .unwrap();
    assert!(result.report.cleaned);
    let check = result.precheck.unwrap();
    assert!(check.issues.iter().any(|i| i.message.contains("legacy heading")));
    assert!(result.markdown.starts_with("# CHAPTER 1"));
}

#[test]
fn test_process_book_respects_precheck_settings() {
    let flat = "Just text without any structure.\n".repeat(200);
    let converter = FakeConverter::new(&[("flat.epub", &flat)]);
    let mut config = OptimizerConfig::default();

    config.enable_precheck = false;
    let unchecked = process_book(&converter, "flat.epub", &BookMetadata::default(), &config).unwrap();
    assert!(unchecked.precheck.is_none());

    config.enable_precheck = true;
    config.strict_precheck = true;
    let err = process_book(&converter, "flat.epub", &BookMetadata::default(), &config).unwrap_err();
    match err {
        ConvertError::PrecheckFailed(check) => assert!(check.has_critical()),
        other => panic!("unexpected error: {}", other),
    }
}
