//! CLI tool for batch EPUB/HTML to Markdown conversion

use book_to_markdown::batch::{process_folder, BatchOptions};
use book_to_markdown::logging;
use book_to_markdown::{Converter, OptimizerConfig, Pandoc};
use clap::Parser;
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(
    name = "book2md",
    version,
    about = "Convert a folder of EPUB/HTML books to cleaned-up Markdown"
)]
struct Args {
    /// Folder containing the books to convert
    input_dir: PathBuf,

    /// Output folder for Markdown files
    #[arg(default_value = "md processed books")]
    output_dir: PathBuf,

    /// TOML file with thresholds and weights
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip cleanup for documents scoring at or above this value
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum score for the quality pre-check
    #[arg(long)]
    quality_threshold: Option<f64>,

    /// Disable the quality pre-check
    #[arg(long)]
    no_precheck: bool,

    /// Skip files that fail the pre-check
    #[arg(long)]
    strict: bool,

    /// Copy the original file to the output folder when conversion fails
    #[arg(long)]
    fallback_copy: bool,

    /// Pandoc binary to use
    #[arg(long, default_value = "pandoc")]
    pandoc: String,

    /// Print the batch summary as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    logging::init(logging::level_for_verbosity(args.verbose));

    let mut config = match &args.config {
        Some(path) => match OptimizerConfig::from_toml_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => OptimizerConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.optimization_threshold = threshold;
    }
    if let Some(threshold) = args.quality_threshold {
        config.quality_threshold = threshold;
    }
    if args.no_precheck {
        config.enable_precheck = false;
    }
    if args.strict {
        config.strict_precheck = true;
    }

    let pandoc = Pandoc::with_program(args.pandoc.clone());
    if !pandoc.is_available() {
        eprintln!("Error: Pandoc is not installed or not in PATH.");
        eprintln!("Please install Pandoc from: https://pandoc.org/installing.html");
        process::exit(1);
    }
    if let Some(version) = pandoc.version() {
        log::info!("Using {}", version);
    }

    let mut options = BatchOptions::new(&args.input_dir, &args.output_dir);
    options.config = config;
    options.fallback_copy = args.fallback_copy;

    let summary = match process_folder(&pandoc, &options) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("{}", "=".repeat(60));
        println!("Conversion complete!");
        println!("Successful: {}", summary.successful);
        if summary.failed > 0 {
            println!("Failed: {}", summary.failed);
            for result in summary.results.iter().filter(|r| !r.success) {
                println!(
                    "  {}: {}",
                    result.source.display(),
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        println!(
            "Total output: {:.1} KB",
            summary.total_output_bytes as f64 / 1024.0
        );
        println!("Output folder: {}", options.output_dir.display());
    }

    if summary.failed > 0 {
        process::exit(2);
    }
}
