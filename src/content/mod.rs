//! Content document annotation.
//!
//! Each chapter file is classified by an ordered list of rules, stripped of
//! the heading the generator put in front of it, tagged with its structural
//! role and given semantic figure markup. Edits are textual and touch only
//! the tags they target.

pub mod cover;
pub mod nav;
mod patterns;

use std::borrow::Cow;

use regex_lite::{Captures, NoExpand};

use crate::util::{file_name, split_extension};
use patterns::{
    ATTR_RE, BLANK_LINE_RE, BODY_OPEN_RE, CLASS_ATTR_RE, EPUB_PREFIX_ATTR_RE, EPUB_TYPE_ATTR_RE,
    FIGURE_TAG_RE, HTML_OPEN_RE, IMG_TAG_RE, LEADING_H1_RE,
};

/// Built-in stylesheet that replaces whatever the generator shipped.
pub const STYLESHEET: &str = include_str!("stylesheet.css");

/// Namespace of the `epub:` attributes.
pub const EPUB_NS: &str = "http://www.idpf.org/2007/ops";

/// Vocabulary used for figure and caption roles.
pub const Z3998_PREFIX: &str = "z3998: http://www.daisy.org/z3998/2012/vocab/structure/#";

/// Structural role of a content document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    TitlePage,
    Epigraph,
    BackMatter,
    Chapter,
}

impl Role {
    /// Value of the `epub:type` attribute put on `<body>`.
    pub fn epub_type(self) -> &'static str {
        match self {
            Role::TitlePage => "titlepage",
            Role::Epigraph => "epigraph",
            Role::BackMatter => "backmatter",
            Role::Chapter => "bodymatter chapter",
        }
    }
}

/// What a classification rule gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    /// Archive path of the document.
    pub path: &'a str,
    /// Full document text.
    pub text: &'a str,
}

impl Section<'_> {
    /// Lowercased file name without extension.
    fn stem(&self) -> String {
        split_extension(file_name(self.path)).0.to_ascii_lowercase()
    }

    /// Everything from the opening `<body>` tag on.
    fn body(&self) -> &str {
        match BODY_OPEN_RE.find(self.text) {
            Some(m) => &self.text[m.start()..],
            None => "",
        }
    }
}

/// A classification rule: a role when the rule recognizes the document.
pub type Rule = fn(&Section<'_>) -> Option<Role>;

/// Classification rules, most specific first. The first rule that answers wins.
pub const RULES: &[Rule] = &[by_marker_class, by_position, by_keyword];

const MARKER_CLASSES: &[(&str, Role)] = &[
    ("title-page", Role::TitlePage),
    ("titlepage", Role::TitlePage),
    ("epigraph", Role::Epigraph),
    ("back-matter", Role::BackMatter),
    ("backmatter", Role::BackMatter),
];

const BACK_MATTER_KEYWORDS: &[&str] = &[
    "afterword",
    "epilogue",
    "notes",
    "bibliography",
    "sources",
    "acknowledg",
    "about",
    "appendix",
    "colophon",
];

/// An explicit marker class anywhere in the body.
pub fn by_marker_class(section: &Section<'_>) -> Option<Role> {
    CLASS_ATTR_RE.captures_iter(section.body()).find_map(|caps| {
        let classes = caps.get(1).or_else(|| caps.get(2))?.as_str();
        classes.split_whitespace().find_map(|class| {
            MARKER_CLASSES
                .iter()
                .find(|(marker, _)| marker.eq_ignore_ascii_case(class))
                .map(|(_, role)| *role)
        })
    })
}

/// The generator numbers sections from zero; section zero is the title page.
pub fn by_position(section: &Section<'_>) -> Option<Role> {
    let stem = section.stem();
    (stem.starts_with("0_") || stem.starts_with("00_")).then_some(Role::TitlePage)
}

/// A keyword in the file name.
pub fn by_keyword(section: &Section<'_>) -> Option<Role> {
    let stem = section.stem();
    if stem.contains("epigraph") {
        Some(Role::Epigraph)
    } else if stem.contains("title") {
        Some(Role::TitlePage)
    } else if BACK_MATTER_KEYWORDS.iter().any(|k| stem.contains(k)) {
        Some(Role::BackMatter)
    } else {
        None
    }
}

/// Role of a document under [`RULES`], defaulting to [`Role::Chapter`].
pub fn classify(section: &Section<'_>) -> Role {
    RULES
        .iter()
        .find_map(|rule| rule(section))
        .unwrap_or(Role::Chapter)
}

/// A content document after annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotated {
    pub role: Role,
    pub text: String,
}

/// Classify and annotate one content document.
pub fn annotate(path: &str, text: &str) -> Annotated {
    let role = classify(&Section { path, text });

    let text = strip_generator_heading(text);
    let text = tag_body(&text, role);
    let (text, has_figures) = rewrite_figure_tags(&text);
    let text = declare_namespaces(&text, has_figures);

    Annotated {
        role,
        text: text.into_owned(),
    }
}

/// Drop the `<h1>` the generator puts right after `<body>`.
///
/// Only a heading followed by a blank line is the generator's; anything
/// else is the author's and stays.
fn strip_generator_heading(text: &str) -> Cow<'_, str> {
    let Some(caps) = LEADING_H1_RE.captures(text) else {
        return Cow::Borrowed(text);
    };
    let (Some(heading), Some(body)) = (caps.get(0), caps.get(1)) else {
        return Cow::Borrowed(text);
    };
    let Some(close) = text[heading.end()..].find("</h1>") else {
        return Cow::Borrowed(text);
    };
    let after = heading.end() + close + "</h1>".len();
    let Some(blank) = BLANK_LINE_RE.find(&text[after..]) else {
        return Cow::Borrowed(text);
    };
    Cow::Owned(format!(
        "{}\n{}",
        &text[..body.end()],
        &text[after + blank.end()..]
    ))
}

/// Put the role on `<body>` unless it already declares one.
fn tag_body(text: &str, role: Role) -> String {
    BODY_OPEN_RE
        .replace(text, |caps: &Captures<'_>| {
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            if EPUB_TYPE_ATTR_RE.is_match(attrs) {
                caps[0].to_string()
            } else {
                format!(
                    r#"<body{attrs} epub:type="{}"{}>"#,
                    role.epub_type(),
                    &caps[2]
                )
            }
        })
        .into_owned()
}

/// Drop inline styles from figure markup and mark figures and captions.
///
/// Attributes are re-emitted one space apart, which also collapses the
/// whitespace a removed attribute leaves behind.
fn rewrite_figure_tags(text: &str) -> (String, bool) {
    let mut has_figures = false;
    let rewritten = FIGURE_TAG_RE.replace_all(text, |caps: &Captures<'_>| {
        let name = &caps[1];
        let raw_attrs = caps.get(2).map_or("", |m| m.as_str());
        let self_closing = !caps[3].is_empty();

        let mut attrs: Vec<(&str, Cow<'_, str>)> = ATTR_RE
            .captures_iter(raw_attrs)
            .filter_map(|a| {
                let (key, value) = (a.get(1)?.as_str(), a.get(2)?.as_str());
                (!key.eq_ignore_ascii_case("style")).then_some((key, Cow::Borrowed(value)))
            })
            .collect();

        let role = match name {
            "figure" => Some("z3998:figure"),
            "figcaption" => Some("z3998:caption"),
            _ => None,
        };
        if let Some(role) = role {
            has_figures = true;
            if !attrs.iter().any(|(k, _)| *k == "epub:type") {
                attrs.push(("epub:type", Cow::Owned(format!("\"{role}\""))));
            }
        }

        let mut tag = format!("<{name}");
        for (key, value) in &attrs {
            tag.push(' ');
            tag.push_str(key);
            tag.push('=');
            tag.push_str(value);
        }
        tag.push_str(if self_closing { "/>" } else { ">" });
        tag
    });
    (rewritten.into_owned(), has_figures)
}

/// Declare the `epub:` namespace on `<html>`, and the figure vocabulary when needed.
pub fn declare_namespaces(text: &str, with_vocabulary: bool) -> Cow<'_, str> {
    HTML_OPEN_RE.replace(text, |caps: &Captures<'_>| {
        let mut attrs = caps.get(1).map_or("", |m| m.as_str()).trim_end().to_string();

        if !attrs.contains("xmlns:epub") {
            attrs.push_str(&format!(r#" xmlns:epub="{EPUB_NS}""#));
        }

        if with_vocabulary && !attrs.contains("z3998:") {
            attrs = match EPUB_PREFIX_ATTR_RE.captures(&attrs) {
                Some(prefix) => {
                    let existing = prefix[1].trim();
                    let merged = format!(r#"epub:prefix="{existing} {Z3998_PREFIX}""#);
                    EPUB_PREFIX_ATTR_RE.replace(&attrs, NoExpand(&merged)).into_owned()
                }
                None => format!(r#"{attrs} epub:prefix="{Z3998_PREFIX}""#),
            };
        }

        format!("<html{attrs}>")
    })
}

/// `(src, alt)` of every `<img>` that has both, alt unescaped and non-empty.
pub fn image_references(text: &str) -> Vec<(String, String)> {
    IMG_TAG_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let attrs = caps.get(1)?.as_str();
            let mut src = None;
            let mut alt = None;
            for pair in ATTR_RE.captures_iter(attrs) {
                let value = unquote(&pair[2]);
                match &pair[1] {
                    "src" => src = Some(value),
                    "alt" => alt = Some(value),
                    _ => {}
                }
            }
            let alt = alt.filter(|a| !a.trim().is_empty())?;
            Some((src?, alt))
        })
        .collect()
}

fn unquote(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    quick_xml::escape::unescape(inner)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| inner.to_string())
}
