//! Quality pre-check run on raw converter output
//!
//! The pre-check decides whether a converted document is worth processing.
//! A long document with no headings at all means the converter lost the
//! book's structure; that is critical unless legacy heading markers are
//! present, which the cleaner can promote.

use crate::artifacts::{analyze_with_weights, count_headings, ArtifactKind};
use crate::config::OptimizerConfig;
use serde::Serialize;

/// Severity of a pre-check finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Fails the check regardless of score
    Critical,
    /// Auto-correctable by the cleaner
    Fixable,
}

/// A single pre-check finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub message: String,
}

/// Outcome of the pre-check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecheckResult {
    pub passed: bool,
    pub score: f64,
    pub heading_count: usize,
    pub issues: Vec<QualityIssue>,
}

impl PrecheckResult {
    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }
}

/// Run the pre-check against `config.quality_threshold`
pub fn precheck(text: &str, config: &OptimizerConfig) -> PrecheckResult {
    let report = analyze_with_weights(text, &config.weights);
    let heading_count = count_headings(text);
    let legacy = report.count(ArtifactKind::LegacyHeading);

    let mut issues = Vec::new();

    if heading_count == 0 && legacy == 0 && report.line_count > config.precheck_min_lines {
        issues.push(QualityIssue {
            severity: Severity::Critical,
            message: format!(
                "No headings found in {} lines; the converter produced no structure",
                report.line_count
            ),
        });
    }

    if legacy > 0 {
        issues.push(QualityIssue {
            severity: Severity::Fixable,
            message: format!("{} legacy heading markers will be promoted", legacy),
        });
    }

    let critical = issues.iter().any(|i| i.severity == Severity::Critical);
    let passed = !critical && report.score >= config.quality_threshold;

    PrecheckResult {
        passed,
        score: report.score,
        heading_count,
        issues,
    }
}
