//! Optimizer configuration
//!
//! Thresholds and penalty weights are policy constants tuned on sample
//! books. They are passed explicitly into the analyzer and cleaner and can
//! be overridden from a TOML file.

use crate::ConvertError;
use serde::Deserialize;
use std::path::Path;

/// Configuration for analysis, pre-check and conditional cleanup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Score at or above which body cleanup is skipped (default: 85.0)
    pub optimization_threshold: f64,
    /// Minimum score for the pre-check to pass (default: 70.0)
    pub quality_threshold: f64,
    /// Run the pre-check before cleanup
    pub enable_precheck: bool,
    /// Skip files that fail the pre-check instead of only warning
    pub strict_precheck: bool,
    /// Documents longer than this with no headings are flagged critical
    pub precheck_min_lines: usize,
    /// Per-kind penalty weights
    pub weights: ScoreWeights,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            optimization_threshold: 85.0,
            quality_threshold: 70.0,
            enable_precheck: true,
            strict_precheck: false,
            precheck_min_lines: 100,
            weights: ScoreWeights::default(),
        }
    }
}

impl OptimizerConfig {
    /// Load configuration from a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| ConvertError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

/// Penalty weights used by the optimization score.
///
/// The `*_per_1000` weights are multiplied by the artifact's rate per
/// thousand lines. `legacy_heading` is a flat penalty per occurrence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub header_id_per_1000: f64,
    pub html_block_per_1000: f64,
    pub citation_per_1000: f64,
    pub image_attr_per_1000: f64,
    pub bracket_class_per_1000: f64,
    pub xhtml_link_per_1000: f64,
    pub blockquote_div_per_1000: f64,
    pub legacy_heading: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            header_id_per_1000: 0.5,
            html_block_per_1000: 2.0,
            citation_per_1000: 0.2,
            image_attr_per_1000: 0.1,
            bracket_class_per_1000: 0.3,
            xhtml_link_per_1000: 0.1,
            blockquote_div_per_1000: 0.05,
            legacy_heading: 1.0,
        }
    }
}
