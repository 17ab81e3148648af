//! Text rewrite rules used by the cleaner
//!
//! Each rule is a pure `&str -> String` transformation. Rules are grouped in
//! stages and applied in the order of [`RULES`]. A rule that does not
//! recognise a construct leaves it alone: malformed nesting is under-cleaned
//! rather than mangled.

use crate::artifacts::{
    ArtifactKind, BLOCKQUOTE_DIV_RE, BRACKET_CLASS_RE, CITATION_RE, IMAGE_ATTR_RE,
    LEGACY_HEADING_RE, XHTML_LINK_RE,
};
use crate::headings::{promote, strip_emphasis};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Placeholder left where an unreachable image used to be
pub const IMAGE_PLACEHOLDER: &str = "[Image removed]";

/// Cleanup stage a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Legacy heading markers become real headings
    Promotion,
    /// Conversion artifacts are stripped
    Artifacts,
    /// Page-list and landmark sections are removed
    Navigation,
    /// Whitespace and escaping are normalised
    Cosmetic,
}

/// A single named rewrite
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub stage: Stage,
    /// Artifact kind this rule removes, if it maps to one
    pub kind: Option<ArtifactKind>,
    pub apply: fn(&str) -> String,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("stage", &self.stage)
            .field("kind", &self.kind)
            .finish()
    }
}

/// All rules, in application order
pub static RULES: &[Rule] = &[
    Rule {
        name: "promote_legacy_headings",
        stage: Stage::Promotion,
        kind: Some(ArtifactKind::LegacyHeading),
        apply: promote_legacy_headings,
    },
    Rule {
        name: "strip_header_ids",
        stage: Stage::Artifacts,
        kind: Some(ArtifactKind::HeaderId),
        apply: strip_header_ids,
    },
    Rule {
        name: "number_heading_sections",
        stage: Stage::Artifacts,
        kind: None,
        apply: number_heading_sections,
    },
    Rule {
        name: "remove_empty_anchors",
        stage: Stage::Artifacts,
        kind: None,
        apply: remove_empty_anchors,
    },
    Rule {
        name: "remove_html_blocks",
        stage: Stage::Artifacts,
        kind: Some(ArtifactKind::HtmlBlock),
        apply: remove_html_blocks,
    },
    Rule {
        name: "simplify_citations",
        stage: Stage::Artifacts,
        kind: Some(ArtifactKind::Citation),
        apply: simplify_citations,
    },
    Rule {
        name: "simplify_note_refs",
        stage: Stage::Artifacts,
        kind: None,
        apply: simplify_note_refs,
    },
    Rule {
        name: "strip_image_attrs",
        stage: Stage::Artifacts,
        kind: Some(ArtifactKind::ImageAttr),
        apply: strip_image_attrs,
    },
    Rule {
        name: "strip_bracket_classes",
        stage: Stage::Artifacts,
        kind: Some(ArtifactKind::BracketClass),
        apply: strip_bracket_classes,
    },
    Rule {
        name: "unlink_cross_file_links",
        stage: Stage::Artifacts,
        kind: Some(ArtifactKind::XhtmlLink),
        apply: unlink_cross_file_links,
    },
    Rule {
        name: "remove_blockquote_divs",
        stage: Stage::Artifacts,
        kind: Some(ArtifactKind::BlockquoteDiv),
        apply: remove_blockquote_divs,
    },
    Rule {
        name: "remove_div_fences",
        stage: Stage::Artifacts,
        kind: None,
        apply: remove_div_fences,
    },
    Rule {
        name: "remove_html_comments",
        stage: Stage::Artifacts,
        kind: None,
        apply: remove_html_comments,
    },
    Rule {
        name: "replace_html_figures",
        stage: Stage::Artifacts,
        kind: None,
        apply: replace_html_figures,
    },
    Rule {
        name: "remove_html_divs",
        stage: Stage::Artifacts,
        kind: None,
        apply: remove_html_divs,
    },
    Rule {
        name: "strip_html_tags",
        stage: Stage::Artifacts,
        kind: None,
        apply: strip_html_tags,
    },
    Rule {
        name: "replace_broken_images",
        stage: Stage::Artifacts,
        kind: None,
        apply: replace_broken_images,
    },
    Rule {
        name: "remove_navigation_sections",
        stage: Stage::Navigation,
        kind: None,
        apply: remove_navigation_sections,
    },
    Rule {
        name: "unescape_quotes",
        stage: Stage::Cosmetic,
        kind: None,
        apply: unescape_quotes,
    },
    Rule {
        name: "remove_empty_headings",
        stage: Stage::Cosmetic,
        kind: None,
        apply: remove_empty_headings,
    },
    Rule {
        name: "unwrap_heading_brackets",
        stage: Stage::Cosmetic,
        kind: None,
        apply: unwrap_heading_brackets,
    },
    Rule {
        name: "strip_trailing_whitespace",
        stage: Stage::Cosmetic,
        kind: None,
        apply: strip_trailing_whitespace,
    },
    Rule {
        name: "collapse_blank_lines",
        stage: Stage::Cosmetic,
        kind: None,
        apply: collapse_blank_lines,
    },
];

static HEADING_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t].*$").unwrap());

static EMPTY_ANCHOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\]\{#[^}\n]*\}").unwrap());

static ID_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\{#[^}\n]*\}").unwrap());

static TRAILING_CLASS_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+\{\.[^}\n]*\}[ \t]*$").unwrap());

static SECTION_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{1,6}[ \t]*)\[(\d[\d.]*)[ \t]*\][ \t]*").unwrap());

static NOTE_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\\\[(\d+)\\\]\]\([^)\n]*\)\{[^}\n]*\}").unwrap());

static DIV_FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*:{3,}.*$").unwrap());

static HTML_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static HTML_FIGURE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<figure\b[^>]*>.*?</figure>").unwrap());

static HTML_DIV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<div\b[^>]*>.*?</div>").unwrap());

// Table markup is left for the Markdown renderer
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)</?(?:a|abbr|article|aside|b|big|blockquote|body|br|center|cite|code|dd|del|dfn|div|dl|dt|em|figcaption|figure|font|footer|h[1-6]|head|header|hr|html|i|img|ins|kbd|li|main|mark|nav|ol|p|pre|q|s|samp|section|small|span|strike|strong|sub|sup|svg|u|ul|var)\b[^<>\n]*>",
    )
    .unwrap()
});

static IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[[^\]\n]*\]\(([^)\s]*)(?:[ \t]+"[^"\n]*")?\)"#).unwrap()
});

static NAV_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^#{1,6}[ \t]+\[?(pages|guide|landmarks)\]?$").unwrap());

static NAV_ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:[-*+]|\d+[.)])?[ \t]*(?:\[[^\]]*\]\([^)]*\)|[ivxlcdm]+|\d+)$").unwrap()
});

static NAV_LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*+]|\d+[.)])[ \t]+([^\n]{1,40})$").unwrap());

static EMPTY_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]*(?:\[\][ \t]*)?$").unwrap());

static BRACKETED_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{1,6})[ \t]+\[([^\[\]\n]+)\][ \t]*$").unwrap());

static TRAILING_WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());

/// `[**CHAPTER 1**]{.calibre3}` -> `# CHAPTER 1`
pub fn promote_legacy_headings(text: &str) -> String {
    LEGACY_HEADING_RE
        .replace_all(text, |caps: &Captures| {
            let (heading, bold) = strip_emphasis(&caps[1]);
            if heading.is_empty() {
                String::new()
            } else {
                promote(heading, bold)
            }
        })
        .into_owned()
}

/// `# []{#a}Title {#id .cls}` -> `# Title`
pub fn strip_header_ids(text: &str) -> String {
    HEADING_LINE_RE
        .replace_all(text, |caps: &Captures| {
            let line = EMPTY_ANCHOR_RE.replace_all(&caps[0], "");
            let line = ID_ATTR_RE.replace_all(&line, "");
            let line = TRAILING_CLASS_ATTR_RE.replace_all(&line, "");
            line.trim_end().to_string()
        })
        .into_owned()
}

/// `# [1.2 ]Overview` -> `# 1.2. Overview`
pub fn number_heading_sections(text: &str) -> String {
    SECTION_NUMBER_RE
        .replace_all(text, |caps: &Captures| {
            format!("{}{}. ", &caps[1], caps[2].trim_end_matches('.'))
        })
        .into_owned()
}

/// Drops `[]{#id}` anchors anywhere in the text
pub fn remove_empty_anchors(text: &str) -> String {
    EMPTY_ANCHOR_RE.replace_all(text, "").into_owned()
}

/// Removes ```` ```{=html} ```` fenced blocks including their content.
///
/// An opener without a closing fence loses only the opener line.
pub fn remove_html_blocks(text: &str) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < lines.len() {
        if let Some(ticks) = html_fence_ticks(lines[i]) {
            let closer = lines[i + 1..]
                .iter()
                .position(|line| is_fence_closer(line, ticks));
            i += match closer {
                Some(offset) => offset + 2,
                None => 1,
            };
            continue;
        }
        out.push_str(lines[i]);
        i += 1;
    }

    out
}

fn html_fence_ticks(line: &str) -> Option<usize> {
    let line = line.trim_end();
    let ticks = line.chars().take_while(|&c| c == '`').count();
    if ticks >= 2 && &line[ticks..] == "{=html}" {
        Some(ticks)
    } else {
        None
    }
}

fn is_fence_closer(line: &str, ticks: usize) -> bool {
    let line = line.trim_end();
    line.len() >= ticks && line.chars().all(|c| c == '`')
}

/// `[[Smith 2020](#ref){.biblioref}]` -> `[Smith 2020]`
pub fn simplify_citations(text: &str) -> String {
    CITATION_RE.replace_all(text, "[${1}]").into_owned()
}

/// `[\[12\]](#note12.xhtml){.noteref}` -> `[12]`
pub fn simplify_note_refs(text: &str) -> String {
    NOTE_REF_RE.replace_all(text, "[${1}]").into_owned()
}

/// `![Cover](cover.jpg){.cover}` -> `![Cover](cover.jpg)`
pub fn strip_image_attrs(text: &str) -> String {
    IMAGE_ATTR_RE.replace_all(text, "![${1}](${2})").into_owned()
}

/// `[small caps]{.smallcaps}` -> `small caps`, nested spans included.
///
/// A line that ends up as a legacy heading marker is kept for promotion.
pub fn strip_bracket_classes(text: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            until_stable(line, |line| {
                if LEGACY_HEADING_RE.is_match(line) {
                    line.to_string()
                } else {
                    BRACKET_CLASS_RE.replace_all(line, "${1}").into_owned()
                }
            })
        })
        .collect()
}

/// `[chapter two](#ch02.xhtml#sec1)` -> `chapter two`
pub fn unlink_cross_file_links(text: &str) -> String {
    XHTML_LINK_RE.replace_all(text, "${1}").into_owned()
}

/// Drops `> ::: {}` lines
pub fn remove_blockquote_divs(text: &str) -> String {
    BLOCKQUOTE_DIV_RE.replace_all(text, "").into_owned()
}

/// Drops pandoc `::: {.class}` / `:::` division fence lines, keeping their content
pub fn remove_div_fences(text: &str) -> String {
    DIV_FENCE_RE.replace_all(text, "").into_owned()
}

/// `a<!-- note -->b` -> `ab`
pub fn remove_html_comments(text: &str) -> String {
    HTML_COMMENT_RE.replace_all(text, "").into_owned()
}

/// `<figure><img src="a.png"/></figure>` -> [`IMAGE_PLACEHOLDER`]
pub fn replace_html_figures(text: &str) -> String {
    HTML_FIGURE_RE.replace_all(text, IMAGE_PLACEHOLDER).into_owned()
}

/// Drops inline `<div ...>...</div>` elements with their content
pub fn remove_html_divs(text: &str) -> String {
    until_stable(text, |text| HTML_DIV_RE.replace_all(text, "").into_owned())
}

/// `<span class="x">word</span>` -> `word`. Table tags are kept.
pub fn strip_html_tags(text: &str) -> String {
    until_stable(text, |text| HTML_TAG_RE.replace_all(text, "").into_owned())
}

/// Replaces images whose target is relative or missing with [`IMAGE_PLACEHOLDER`]
pub fn replace_broken_images(text: &str) -> String {
    IMAGE_RE
        .replace_all(text, |caps: &Captures| {
            if is_remote_target(&caps[1]) {
                caps[0].to_string()
            } else {
                IMAGE_PLACEHOLDER.to_string()
            }
        })
        .into_owned()
}

fn is_remote_target(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

/// Deletes "Pages" / "Guide" / "Landmarks" sections made of page links.
///
/// The section runs to the next heading. It is only removed when at least
/// three entries are present and 80% of its non-blank lines are navigation
/// entries, so a real chapter called "Guide" survives. Under "Guide" and
/// "Landmarks" short list items count as entries too, since their links
/// have usually been unlinked by the time this rule runs.
pub fn remove_navigation_sections(text: &str) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < lines.len() {
        if let Some(caps) = NAV_HEADING_RE.captures(lines[i].trim()) {
            let landmarks = !caps[1].eq_ignore_ascii_case("pages");
            let end = lines[i + 1..]
                .iter()
                .position(|line| is_heading_line(line))
                .map_or(lines.len(), |offset| i + 1 + offset);
            if is_navigation_block(&lines[i + 1..end], landmarks) {
                log::debug!(
                    "Removing navigation section '{}' ({} lines)",
                    lines[i].trim(),
                    end - i
                );
                i = end;
                continue;
            }
        }
        out.push_str(lines[i]);
        i += 1;
    }

    out
}

fn is_heading_line(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with([' ', '\t'])
}

fn is_navigation_block(lines: &[&str], landmarks: bool) -> bool {
    let entries: Vec<&str> = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect();
    let nav = entries
        .iter()
        .filter(|line| is_navigation_entry(line, landmarks))
        .count();

    nav >= 3 && nav * 5 >= entries.len() * 4
}

fn is_navigation_entry(line: &str, landmarks: bool) -> bool {
    if NAV_ENTRY_RE.is_match(line) {
        return true;
    }
    landmarks
        && NAV_LIST_ITEM_RE
            .captures(line)
            .map_or(false, |caps| !caps[1].ends_with(['.', '!', '?', ':']))
}

/// `don\'t` -> `don't`, plus `\"` and `\&`. Runs of backslashes collapse.
pub fn unescape_quotes(text: &str) -> String {
    until_stable(text, |text| {
        text.replace("\\'", "'")
            .replace("\\\"", "\"")
            .replace("\\&", "&")
    })
}

/// Drops heading lines with no text (`##`, `# []`)
pub fn remove_empty_headings(text: &str) -> String {
    EMPTY_HEADING_RE.replace_all(text, "").into_owned()
}

/// `# [Introduction]` -> `# Introduction`
pub fn unwrap_heading_brackets(text: &str) -> String {
    BRACKETED_HEADING_RE.replace_all(text, "${1} ${2}").into_owned()
}

/// `text  \n` -> `text\n`
pub fn strip_trailing_whitespace(text: &str) -> String {
    TRAILING_WS_RE.replace_all(text, "").into_owned()
}

/// Keeps at most one blank line between blocks, none at the start, and a
/// single trailing newline
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;

    for line in text.lines() {
        if line.trim().is_empty() {
            pending_blank = true;
            continue;
        }
        if pending_blank && !out.is_empty() {
            out.push('\n');
        }
        pending_blank = false;
        out.push_str(line);
        out.push('\n');
    }

    out
}

/// Apply a shrinking rewrite until it no longer changes the text
fn until_stable(text: &str, rewrite: impl Fn(&str) -> String) -> String {
    let mut current = rewrite(text);
    loop {
        let next = rewrite(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
