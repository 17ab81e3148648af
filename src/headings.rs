//! Heading level selection for promoted legacy markers
//!
//! Calibre-produced books often mark headings with a styling class instead
//! of heading markup: `[**CHAPTER 1**]{.calibre3}`. When promoting such a
//! marker we pick a level from its text:
//!
//! - structural keywords ("Chapter 3", "Introduction") are always H1
//! - long bold text is H2, medium bold text is H3
//! - everything else is H4

/// Words that open a top-level division of a book
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "chapter",
    "part",
    "introduction",
    "conclusion",
    "appendix",
    "prologue",
    "epilogue",
    "preface",
    "foreword",
    "afterword",
];

/// Bold text longer than this becomes H2
const H2_MIN_CHARS: usize = 35;
/// Bold text longer than this becomes H3
const H3_MIN_CHARS: usize = 20;

/// Heading depth (1-4) for a legacy marker with the given text
pub fn promotion_level(text: &str, bold: bool) -> usize {
    let text = text.trim();

    if is_structural(text) {
        return 1;
    }

    let len = text.chars().count();
    if bold && len > H2_MIN_CHARS {
        2
    } else if bold && len > H3_MIN_CHARS {
        3
    } else {
        4
    }
}

/// Render an ATX heading line for a legacy marker
pub fn promote(text: &str, bold: bool) -> String {
    let text = text.trim();
    format!("{} {}", "#".repeat(promotion_level(text, bold)), text)
}

/// Split `**text**` emphasis off a marker's inner text.
///
/// Returns the stripped text and whether it was bold.
pub fn strip_emphasis(inner: &str) -> (&str, bool) {
    let trimmed = inner.trim();
    match trimmed
        .strip_prefix("**")
        .and_then(|rest| rest.strip_suffix("**"))
    {
        Some(text) => (text.trim(), true),
        None => (trimmed, false),
    }
}

/// Keyword match on whole words: "Part II" is structural, "Partner" is not
fn is_structural(text: &str) -> bool {
    let lower = text.to_lowercase();
    STRUCTURAL_KEYWORDS.iter().any(|keyword| {
        lower
            .strip_prefix(keyword)
            .map(|rest| rest.chars().next().map_or(true, |c| !c.is_alphanumeric()))
            .unwrap_or(false)
    })
}
