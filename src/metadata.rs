//! Metadata header injection
//!
//! Every converted book gets a small YAML front-matter block describing
//! where it came from. The analyzer skips this block, so it never counts as
//! an artifact.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::Path;

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").unwrap());

/// Book metadata supplied by the caller (container metadata, CLI flags, file name)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<String>,
    pub edition: Option<String>,
    /// External converter name and version, e.g. "pandoc 3.1.9"
    pub converter: Option<String>,
}

impl BookMetadata {
    /// Fallback metadata: the file stem becomes the title
    pub fn from_file_stem<P: AsRef<Path>>(path: P) -> Self {
        let title = path
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().replace('_', " ").trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            title,
            ..Self::default()
        }
    }

    /// Set the year from a free-form date, keeping the first 4-digit run
    pub fn with_year(mut self, raw: &str) -> Self {
        self.year = YEAR_RE.find(raw).map(|m| m.as_str().to_string());
        self
    }

    pub fn with_converter(mut self, converter: Option<String>) -> Self {
        self.converter = converter;
        self
    }

    /// True when there is nothing describing the book itself
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.year.is_none() && self.edition.is_none()
    }
}

/// Render the YAML front-matter header, or `None` when there is no metadata
pub fn render_header(meta: &BookMetadata) -> Option<String> {
    if meta.is_empty() {
        return None;
    }

    let mut header = String::from("---\n");
    let fields = [
        ("title", &meta.title),
        ("author", &meta.author),
        ("year", &meta.year),
        ("edition", &meta.edition),
        ("converter", &meta.converter),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            header.push_str(&format!("{}: \"{}\"\n", key, yaml_escape(value)));
        }
    }
    header.push_str(&format!(
        "generator: \"{} {}\"\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    ));
    header.push_str("---\n");

    Some(header)
}

/// Prepend the metadata header to `body`.
///
/// A front-matter block already at the start of `body` is merged into the
/// header: keys the header sets are replaced, the others are kept. The rest
/// of the body is kept byte for byte.
pub fn inject_header(body: &str, meta: &BookMetadata) -> String {
    let Some(header) = render_header(meta) else {
        return body.to_string();
    };

    let (existing, body) = split_front_matter(body);
    let header = match existing {
        Some(existing) => merge_front_matter(&header, existing),
        None => header,
    };
    let mut out = String::with_capacity(header.len() + body.len() + 1);
    out.push_str(&header);
    if !body.starts_with('\n') {
        out.push('\n');
    }
    out.push_str(body);
    out
}

/// Append the entries of `existing` whose top-level key `header` does not set
fn merge_front_matter(header: &str, existing: &str) -> String {
    let Some(fields) = header.strip_suffix("---\n") else {
        return header.to_string();
    };
    let taken: Vec<&str> = fields.lines().filter_map(top_level_key).collect();

    let mut merged = fields.to_string();
    let mut keep = false;
    for line in existing.split_inclusive('\n') {
        if let Some(key) = top_level_key(line) {
            keep = !taken.contains(&key);
        } else if line.trim().is_empty() {
            continue;
        }
        if keep {
            merged.push_str(line);
            if !line.ends_with('\n') {
                merged.push('\n');
            }
        }
    }
    merged.push_str("---\n");
    merged
}

fn top_level_key(line: &str) -> Option<&str> {
    if line.starts_with([' ', '\t', '-', '#']) {
        return None;
    }
    line.split_once(':').map(|(key, _)| key.trim())
}

/// Split a leading YAML front-matter block from the document.
///
/// Returns `(Some(front_matter), body)` when the text opens with `---` and
/// a closing `---` or `...` line follows with only YAML-looking lines in
/// between. Otherwise the whole text is the body.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text.strip_prefix("---\n") else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        if !trimmed.is_empty() && !looks_like_yaml(trimmed) {
            return (None, text);
        }
        offset += line.len();
    }

    (None, text)
}

fn looks_like_yaml(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t') || line.starts_with("- ") || line.contains(':')
}

fn yaml_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_header_fields() {
        let meta = BookMetadata {
            title: Some("Deep \"Work\"".to_string()),
            author: Some("Cal Newport".to_string()),
            year: Some("2016".to_string()),
            edition: None,
            converter: Some("pandoc 3.1.9".to_string()),
        };
        let header = render_header(&meta).unwrap();
        assert!(header.starts_with("---\n"));
        assert!(header.contains("title: \"Deep \\\"Work\\\"\"\n"));
        assert!(header.contains("author: \"Cal Newport\"\n"));
        assert!(header.contains("year: \"2016\"\n"));
        assert!(header.contains("converter: \"pandoc 3.1.9\"\n"));
        assert!(header.contains("generator: \"book-to-markdown "));
        assert!(!header.contains("edition"));
        assert!(header.ends_with("---\n"));
    }

    #[test]
    fn test_empty_metadata_leaves_body_alone() {
        let body = "# Title\n\nText\n";
        assert_eq!(inject_header(body, &BookMetadata::default()), body);
    }

    #[test]
    fn test_inject_replaces_existing_front_matter() {
        let meta = BookMetadata {
            title: Some("New".to_string()),
            ..BookMetadata::default()
        };
        let out = inject_header("---\ntitle: Old\n---\n\n# Body\n", &meta);
        assert!(!out.contains("Old"));
        assert_eq!(out.matches("---\n").count(), 2);
        assert!(out.ends_with("---\n\n# Body\n"));
    }

    #[test]
    fn test_inject_keeps_unknown_front_matter_keys() {
        let meta = BookMetadata {
            title: Some("New".to_string()),
            ..BookMetadata::default()
        };
        let out = inject_header(
            "---\ntitle: Old\nlang: en\ntags:\n  - a\n  - b\n---\n# Body\n",
            &meta,
        );
        assert!(out.starts_with("---\ntitle: \"New\"\n"));
        assert!(out.contains("lang: en\ntags:\n  - a\n  - b\n---\n\n# Body\n"));
        assert!(!out.contains("Old"));
    }

    #[test]
    fn test_split_front_matter() {
        let (front, body) = split_front_matter("---\ntitle: \"X\"\nyear: 2001\n---\nBody\n");
        assert_eq!(front, Some("title: \"X\"\nyear: 2001\n"));
        assert_eq!(body, "Body\n");
    }

    #[test]
    fn test_horizontal_rule_is_not_front_matter() {
        let text = "---\nJust a paragraph after a rule.\n---\n";
        let (front, body) = split_front_matter(text);
        assert!(front.is_none());
        assert_eq!(body, text);
    }

    #[test]
    fn test_from_file_stem_and_year() {
        let meta = BookMetadata::from_file_stem("/books/The_Pragmatic_Programmer.epub")
            .with_year("1999-10-20T00:00:00Z");
        assert_eq!(meta.title.as_deref(), Some("The Pragmatic Programmer"));
        assert_eq!(meta.year.as_deref(), Some("1999"));
    }
}
