//! Conditional cleanup of converted Markdown
//!
//! Documents that already score at or above the optimization threshold are
//! left untouched apart from the metadata header. Everything else runs
//! through the rewrite rules in [`crate::rules`] and is re-scored so the
//! improvement can be reported.

use crate::artifacts::{analyze_with_weights, count_headings, normalize_newlines, ArtifactKind};
use crate::config::OptimizerConfig;
use crate::metadata::{inject_header, split_front_matter, BookMetadata};
use crate::rules::RULES;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// Upper bound on full rule passes before giving up on reaching a fixed point
const MAX_PASSES: usize = 8;

/// Before/after statistics for one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizeReport {
    pub before_score: f64,
    pub after_score: f64,
    /// Input size in bytes
    pub before_size: usize,
    /// Output size in bytes, metadata header included
    pub after_size: usize,
    /// ATX headings in the output body
    pub heading_count: usize,
    pub artifacts_found: BTreeMap<ArtifactKind, usize>,
    pub artifacts_remaining: BTreeMap<ArtifactKind, usize>,
    /// Whether the rewrite rules ran
    pub cleaned: bool,
}

impl OptimizeReport {
    /// Size reduction as a percentage of the input (negative when it grew)
    pub fn reduction_percent(&self) -> f64 {
        if self.before_size == 0 {
            return 0.0;
        }
        (self.before_size as f64 - self.after_size as f64) / self.before_size as f64 * 100.0
    }
}

/// Optimized document text plus its report
#[derive(Debug, Clone)]
pub struct Optimized {
    pub text: String,
    pub report: OptimizeReport,
}

/// Run every rewrite rule, repeating until the text stops changing.
///
/// The result is a fixed point of the rule set: cleaning it again returns
/// identical text.
pub fn clean(text: &str) -> String {
    let mut current = normalize_newlines(text).into_owned();

    for pass in 1..=MAX_PASSES {
        let next = run_rules(&current);
        if next == current {
            debug!("Cleanup stable after {} pass(es)", pass);
            return next;
        }
        current = next;
    }

    warn!(
        "Cleanup did not stabilise after {} passes; keeping last result",
        MAX_PASSES
    );
    current
}

fn run_rules(text: &str) -> String {
    let mut text = text.to_string();

    for rule in RULES {
        let next = (rule.apply)(&text);
        if next != text {
            debug!(
                "{:?}/{}: {} -> {} bytes",
                rule.stage,
                rule.name,
                text.len(),
                next.len()
            );
            text = next;
        }
    }

    text
}

/// Analyze, conditionally clean, and add the metadata header.
///
/// A score at or above `config.optimization_threshold` keeps the document
/// verbatim, front matter included. Existing front matter survives cleanup
/// and is merged with the metadata header.
pub fn optimize(text: &str, meta: &BookMetadata, config: &OptimizerConfig) -> Optimized {
    let before_size = text.len();
    let text = normalize_newlines(text);
    let (_, body) = split_front_matter(&text);
    let front_matter = &text[..text.len() - body.len()];

    let before = analyze_with_weights(body, &config.weights);
    info!(
        "Optimization score {:.1}% ({} artifacts in {} lines)",
        before.score,
        before.total(),
        before.line_count
    );

    let (body, after, cleaned) = if before.score >= config.optimization_threshold {
        info!(
            "Score >= {:.1}%: skipping cleanup, adding metadata only",
            config.optimization_threshold
        );
        (body.to_string(), before.clone(), false)
    } else {
        info!(
            "Score < {:.1}%: running cleanup",
            config.optimization_threshold
        );
        let cleaned = clean(body);
        let after = analyze_with_weights(&cleaned, &config.weights);
        info!(
            "Post-cleanup score {:.1}% ({} artifacts remaining)",
            after.score,
            after.total()
        );
        (cleaned, after, true)
    };

    let heading_count = count_headings(&body);
    let document = if !cleaned || front_matter.is_empty() {
        format!("{}{}", front_matter, body)
    } else {
        format!("{}\n{}", front_matter, body)
    };
    let output = inject_header(&document, meta);

    let report = OptimizeReport {
        before_score: before.score,
        after_score: after.score,
        before_size,
        after_size: output.len(),
        heading_count,
        artifacts_found: before.counts,
        artifacts_remaining: after.counts,
        cleaned,
    };

    Optimized {
        text: output,
        report,
    }
}
