//! Section slicing for extracted article text
//!
//! Keeps the body of a paper between its first abstract-like heading and the
//! references-like heading that follows it:
//! - headings are tried in priority order, first match of the first pattern wins
//! - matching is case-insensitive on word boundaries
//! - when either anchor is missing the full text is kept

use regex::Regex;
use std::sync::LazyLock;

static ABSTRACT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&["Abstract", "Summary", "Executive Summary", "Introduction"])
});

static REFERENCES_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        "References",
        "Bibliography",
        "Works Cited",
        "Literature Cited",
        "Reference List",
        "Citations",
    ])
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

fn compile(headings: &[&str]) -> Vec<Regex> {
    headings
        .iter()
        .map(|h| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(h))).expect("static regex"))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlicedText {
    pub text: String,
    /// False when an anchor was missing and `text` is the whole document
    pub sliced: bool,
}

/// Collapse every whitespace run to a single space and trim
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Whitespace-collapse each page and join pages with a newline
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(|p| collapse_whitespace(p.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn first_anchor(patterns: &[Regex], text: &str) -> Option<usize> {
    patterns.iter().find_map(|re| re.find(text)).map(|m| m.start())
}

/// Slice `text` to `[abstract heading, references heading)`
pub fn slice_body(text: &str) -> SlicedText {
    let start = first_anchor(&ABSTRACT_PATTERNS, text);
    let end = start.and_then(|s| first_anchor(&REFERENCES_PATTERNS, &text[s..]).map(|e| s + e));

    match (start, end) {
        (Some(start), Some(end)) if end > start => SlicedText {
            text: text[start..end].to_string(),
            sliced: true,
        },
        _ => SlicedText {
            text: text.to_string(),
            sliced: false,
        },
    }
}
