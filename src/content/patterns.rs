//! Cached regex patterns for content document rewriting.
//!
//! Compiled once on first use with LazyLock.

use regex_lite::Regex;
use std::sync::LazyLock;

// === Structure ===

/// Matches the opening <html ...> tag, capturing its attributes
pub static HTML_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<html\b([^>]*)>").unwrap());

/// Matches the opening <body ...> tag, capturing its attributes and a self-closing slash
pub static BODY_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<body\b([^>]*?)\s*(/?)>").unwrap());

/// Matches an <h1> start tag directly after <body>, capturing the body tag
pub static LEADING_H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(<body\b[^>]*>)\s*<h1\b[^>]*>").unwrap());

/// Matches a blank line at the start of the text
pub static BLANK_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*\r?\n[ \t]*\r?\n").unwrap());

/// Matches class="..." attributes
pub static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Matches an epub:type attribute
pub static EPUB_TYPE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bepub:type\s*=").unwrap());

// === Figures ===

/// Matches <figure>, <figcaption> and <img> start tags
pub static FIGURE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(figure|figcaption|img)(\s[^>]*?)?\s*(/?)>").unwrap()
});

/// Matches name="value" attribute pairs inside a tag
pub static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][-A-Za-z0-9_:.]*)\s*=\s*("[^"]*"|'[^']*')"#).unwrap()
});

/// Matches an epub:prefix attribute, capturing its value
pub static EPUB_PREFIX_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bepub:prefix\s*=\s*"([^"]*)""#).unwrap());

// === Images ===

/// Matches <img ...> tags, capturing their attributes
pub static IMG_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<img\b([^>]*?)/?>").unwrap());

// === Navigation ===

/// Matches an existing landmarks nav
pub static LANDMARKS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"epub:type\s*=\s*["']landmarks["']"#).unwrap()
});
