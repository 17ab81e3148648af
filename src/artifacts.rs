//! Artifact detection and optimization scoring
//!
//! This module scans converted Markdown for leftovers of the source format
//! (pandoc attribute blocks, raw HTML fences, calibre styling classes, ...)
//! and condenses them into a single 0-100 score. The score drives the
//! cleanup decision in [`crate::cleaner`], so it must be reproducible for a
//! given text and weight set.

use crate::config::ScoreWeights;
use crate::metadata::split_front_matter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Kinds of conversion artifacts recognised by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// `# Title {#id .class}` attribute blocks on headings
    HeaderId,
    /// Raw HTML fences (```` ```{=html} ````)
    HtmlBlock,
    /// `[[Smith 2020](#ref){.biblioref}]` citation links
    Citation,
    /// `![alt](src){.class}` image attributes
    ImageAttr,
    /// `[text]{.class}` span annotations
    BracketClass,
    /// `[text](ch01.xhtml#p3)` links into other files of the book
    XhtmlLink,
    /// `> ::: {}` division markers inside block quotes
    BlockquoteDiv,
    /// `[**Text**]{.calibre3}` lines standing in for headings (fixable)
    LegacyHeading,
}

impl ArtifactKind {
    /// All kinds, in report order
    pub const ALL: [ArtifactKind; 8] = [
        ArtifactKind::HeaderId,
        ArtifactKind::HtmlBlock,
        ArtifactKind::Citation,
        ArtifactKind::ImageAttr,
        ArtifactKind::BracketClass,
        ArtifactKind::XhtmlLink,
        ArtifactKind::BlockquoteDiv,
        ArtifactKind::LegacyHeading,
    ];

    /// Human readable label used in CLI output
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::HeaderId => "Header IDs",
            ArtifactKind::HtmlBlock => "HTML blocks",
            ArtifactKind::Citation => "Citations",
            ArtifactKind::ImageAttr => "Image attributes",
            ArtifactKind::BracketClass => "Bracket classes",
            ArtifactKind::XhtmlLink => "XHTML links",
            ArtifactKind::BlockquoteDiv => "Blockquote divs",
            ArtifactKind::LegacyHeading => "Legacy heading markers",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How an artifact kind is charged against the score
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Penalty {
    /// Weight multiplied by occurrences per 1000 lines
    PerThousandLines(f64),
    /// Weight multiplied by raw occurrences
    Flat(f64),
}

impl ScoreWeights {
    /// Penalty applied for one kind of artifact
    pub fn penalty(&self, kind: ArtifactKind) -> Penalty {
        match kind {
            ArtifactKind::HeaderId => Penalty::PerThousandLines(self.header_id_per_1000),
            ArtifactKind::HtmlBlock => Penalty::PerThousandLines(self.html_block_per_1000),
            ArtifactKind::Citation => Penalty::PerThousandLines(self.citation_per_1000),
            ArtifactKind::ImageAttr => Penalty::PerThousandLines(self.image_attr_per_1000),
            ArtifactKind::BracketClass => Penalty::PerThousandLines(self.bracket_class_per_1000),
            ArtifactKind::XhtmlLink => Penalty::PerThousandLines(self.xhtml_link_per_1000),
            ArtifactKind::BlockquoteDiv => Penalty::PerThousandLines(self.blockquote_div_per_1000),
            ArtifactKind::LegacyHeading => Penalty::Flat(self.legacy_heading),
        }
    }
}

pub(crate) static HEADER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+.*\{#[^}\n]*\}").unwrap());

pub(crate) static HTML_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^`{2,}\{=html\}[ \t]*$").unwrap());

pub(crate) static CITATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[([^\[\]\n]*)\]\(#[^)\n]*\)\{\.biblioref[^}\n]*\}\]?").unwrap()
});

pub(crate) static IMAGE_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]\n]*)\]\(([^)\n]*)\)\{[^}\n]+\}").unwrap());

pub(crate) static BRACKET_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\[\]\n]+)\]\{[^}\n]+\}").unwrap());

pub(crate) static XHTML_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\[\]\n]*)\]\(#?[^()\s:]*\.x?html?(?:[#_][^()\s]*)?\)").unwrap()
});

pub(crate) static BLOCKQUOTE_DIV_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^>[ \t]*:{3,}[ \t]*(?:\{[^}\n]*\})?[ \t]*$").unwrap());

pub(crate) static LEGACY_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\[([^\[\]\n]+)\]\{\.calibre\d*\}[ \t]*$").unwrap());

pub(crate) static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+\S").unwrap());

/// Result of artifact analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactReport {
    /// Occurrences per artifact kind (every kind present, possibly zero)
    pub counts: BTreeMap<ArtifactKind, usize>,
    /// Number of lines in the analyzed body
    pub line_count: usize,
    /// Optimization score in [0, 100]
    pub score: f64,
}

impl ArtifactReport {
    /// Occurrences of one kind
    pub fn count(&self, kind: ArtifactKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Total occurrences across all kinds
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Kinds with at least one occurrence, in report order
    pub fn found(&self) -> impl Iterator<Item = (ArtifactKind, usize)> + '_ {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(kind, count)| (*kind, *count))
    }
}

/// Analyze text with the default weights
pub fn analyze(text: &str) -> ArtifactReport {
    analyze_with_weights(text, &ScoreWeights::default())
}

/// Analyze text with custom weights.
///
/// A leading YAML front-matter block is ignored so that an injected
/// metadata header never counts against the document.
pub fn analyze_with_weights(text: &str, weights: &ScoreWeights) -> ArtifactReport {
    let text = normalize_newlines(text);
    let (_, body) = split_front_matter(&text);

    let counts = count_artifacts(body);
    let line_count = body.lines().count();
    let score = score_counts(&counts, line_count, weights);

    ArtifactReport {
        counts,
        line_count,
        score,
    }
}

/// Count every artifact kind in `body`
fn count_artifacts(body: &str) -> BTreeMap<ArtifactKind, usize> {
    let legacy = LEGACY_HEADING_RE.find_iter(body).count();
    // Each legacy marker line holds exactly one bracket-class span.
    let bracket = BRACKET_CLASS_RE
        .find_iter(body)
        .count()
        .saturating_sub(legacy);

    let mut counts = BTreeMap::new();
    counts.insert(ArtifactKind::HeaderId, HEADER_ID_RE.find_iter(body).count());
    counts.insert(ArtifactKind::HtmlBlock, HTML_BLOCK_RE.find_iter(body).count());
    counts.insert(ArtifactKind::Citation, CITATION_RE.find_iter(body).count());
    counts.insert(ArtifactKind::ImageAttr, IMAGE_ATTR_RE.find_iter(body).count());
    counts.insert(ArtifactKind::BracketClass, bracket);
    counts.insert(ArtifactKind::XhtmlLink, XHTML_LINK_RE.find_iter(body).count());
    counts.insert(
        ArtifactKind::BlockquoteDiv,
        BLOCKQUOTE_DIV_RE.find_iter(body).count(),
    );
    counts.insert(ArtifactKind::LegacyHeading, legacy);
    counts
}

/// Compute the optimization score from artifact counts.
///
/// Starts at 100 and subtracts each kind's penalty, clamped to [0, 100].
/// More artifacts never raise the score for a fixed line count.
pub fn score_counts(
    counts: &BTreeMap<ArtifactKind, usize>,
    line_count: usize,
    weights: &ScoreWeights,
) -> f64 {
    let lines = line_count.max(1) as f64;
    let mut score = 100.0;

    for (&kind, &count) in counts {
        if count == 0 {
            continue;
        }
        let count = count as f64;
        score -= match weights.penalty(kind) {
            Penalty::PerThousandLines(weight) => weight.max(0.0) * (count * 1000.0 / lines),
            Penalty::Flat(weight) => weight.max(0.0) * count,
        };
    }

    score.clamp(0.0, 100.0)
}

/// Count ATX heading lines outside any leading front matter
pub fn count_headings(text: &str) -> usize {
    let text = normalize_newlines(text);
    let (_, body) = split_front_matter(&text);
    HEADING_RE.find_iter(body).count()
}

/// Convert CRLF line endings to LF
pub fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(text)
    }
}
