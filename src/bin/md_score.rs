//! CLI tool for scoring (and optionally cleaning) a converted Markdown file

use book_to_markdown::artifacts::{analyze_with_weights, count_headings};
use book_to_markdown::cleaner::optimize;
use book_to_markdown::logging;
use book_to_markdown::precheck::precheck;
use book_to_markdown::{BookMetadata, OptimizerConfig};
use clap::Parser;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(
    name = "md-score",
    version,
    about = "Report conversion artifacts and the optimization score of a Markdown file"
)]
struct Args {
    /// Markdown file to analyze
    file: PathBuf,

    /// Run the conditional cleanup and report before/after statistics
    #[arg(long)]
    clean: bool,

    /// Write the cleaned Markdown here instead of stdout (implies --clean)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML file with thresholds and weights
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    logging::init(logging::level_for_verbosity(args.verbose));

    let config = match &args.config {
        Some(path) => OptimizerConfig::from_toml_file(path).unwrap_or_else(|e| fail(&e, args.json)),
        None => OptimizerConfig::default(),
    };

    let text = fs::read_to_string(&args.file).unwrap_or_else(|e| fail(&e, args.json));

    if args.clean || args.output.is_some() {
        let meta = BookMetadata::from_file_stem(&args.file);
        let optimized = optimize(&text, &meta, &config);

        if let Some(output) = &args.output {
            fs::write(output, &optimized.text).unwrap_or_else(|e| fail(&e, args.json));
        }

        if args.json {
            println!("{}", json!({ "report": optimized.report }));
        } else {
            let report = &optimized.report;
            println!("Markdown Cleanup");
            println!("================");
            println!("File: {}", args.file.display());
            println!();
            println!(
                "Score: {:.1}% -> {:.1}% ({})",
                report.before_score,
                report.after_score,
                if report.cleaned {
                    "cleaned"
                } else {
                    "already optimal, metadata only"
                }
            );
            println!(
                "Size: {} -> {} bytes ({:.1}% reduction)",
                report.before_size,
                report.after_size,
                report.reduction_percent()
            );
            println!("Headings: {}", report.heading_count);
            match &args.output {
                Some(output) => println!("Written to: {}", output.display()),
                None => {
                    println!();
                    println!("--- Markdown Output ---");
                    println!();
                    println!("{}", optimized.text);
                }
            }
        }
        return;
    }

    let report = analyze_with_weights(&text, &config.weights);
    let check = precheck(&text, &config);
    let headings = count_headings(&text);

    if args.json {
        println!(
            "{}",
            json!({
                "file": args.file,
                "score": report.score,
                "line_count": report.line_count,
                "heading_count": headings,
                "artifacts": report.counts,
                "precheck": check,
                "would_clean": report.score < config.optimization_threshold,
            })
        );
        return;
    }

    println!("Markdown Artifact Analysis");
    println!("==========================");
    println!("File: {}", args.file.display());
    println!();
    println!("Lines: {}", report.line_count);
    println!("Headings: {}", headings);
    println!("Total artifacts: {}", report.total());
    for (kind, count) in report.found() {
        println!("  - {}: {}", kind, count);
    }
    println!();
    println!("Optimization score: {:.1}%", report.score);
    println!(
        "Threshold: {:.1}% - {}",
        config.optimization_threshold,
        if report.score >= config.optimization_threshold {
            "SKIP cleanup"
        } else {
            "RUN cleanup"
        }
    );
    println!();
    println!(
        "Pre-check: {} (quality threshold {:.1}%)",
        if check.passed { "PASSED" } else { "FAILED" },
        config.quality_threshold
    );
    for issue in &check.issues {
        println!("  [{:?}] {}", issue.severity, issue.message);
    }

    if !check.passed {
        process::exit(2);
    }
}

fn fail<E: std::fmt::Display, T>(e: &E, json: bool) -> T {
    if json {
        println!("{}", json!({ "error": e.to_string() }));
    } else {
        eprintln!("Error: {}", e);
    }
    process::exit(1)
}
