//! Consistent renaming of archive entries.
//!
//! A [`RenameMap`] moves assets and rewrites every textual reference to them
//! in one pass per document. Only whole file names are candidates: a match
//! must be bounded by a quote, slash, `(`, `=`, `>`, whitespace or the start
//! of the text on the left, and by a quote, `#`, `?`, `)`, `<`, whitespace or
//! the end of the text on the right, so `a.png` never matches inside `ba.png`.
//! A candidate is rewritten only when its href, resolved against the
//! document's directory, is the renamed path.

use std::collections::HashMap;

use regex_lite::Regex;

use crate::archive::Archive;
use crate::report::Warning;
use crate::util::{file_name, parent_dir, relative_href, resolve_href};

/// Ordered map of old archive path to new archive path.
#[derive(Debug, Clone, Default)]
pub struct RenameMap {
    pairs: Vec<(String, String)>,
}

impl RenameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.pairs.push((from.into(), to.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    /// Move every asset, then rewrite references in all text documents.
    ///
    /// A pair whose move fails (source missing or target taken) is dropped
    /// entirely: its references are left untouched. Returns the pairs that
    /// were applied.
    pub fn apply(&self, archive: &mut Archive) -> Vec<(String, String)> {
        let applied: Vec<(String, String)> = self
            .pairs
            .iter()
            .filter(|(from, to)| archive.rename(from, to))
            .cloned()
            .collect();

        if let Some(rewriter) = Rewriter::new(&applied) {
            for doc in archive.text_documents() {
                let Some(text) = archive.text(&doc) else {
                    continue;
                };
                if let Some(rewritten) = rewriter.rewrite(parent_dir(&doc), &text) {
                    archive.put(&doc, rewritten);
                }
            }
        }

        applied
    }
}

/// Report every reference that still points at a renamed path.
///
/// Paths that exist again (because a later rename moved something onto
/// them) are not stale.
pub fn dangling_references(archive: &Archive, renamed: &[(String, String)]) -> Vec<Warning> {
    let stale: Vec<(String, String)> = renamed
        .iter()
        .filter(|(from, _)| !archive.contains(from))
        .cloned()
        .collect();
    let Some(rewriter) = Rewriter::new(&stale) else {
        return Vec::new();
    };

    let mut warnings = Vec::new();
    for doc in archive.text_documents() {
        let Some(text) = archive.text(&doc) else {
            continue;
        };
        for reference in rewriter.references(parent_dir(&doc), &text) {
            if rewriter.target(&reference.path).is_some() {
                warnings.push(Warning::DanglingReference {
                    name: reference.href.to_string(),
                    document: doc.clone(),
                });
            }
        }
    }
    warnings
}

/// An href found in a document, resolved to an archive path.
struct Reference<'t> {
    start: usize,
    end: usize,
    href: &'t str,
    path: String,
}

/// Single-pass replacement of references to renamed paths.
///
/// Candidates are found by file name; each is widened to its whole href and
/// resolved against the document's directory before it is rewritten, so a
/// same-named file in another directory is left alone.
struct Rewriter<'a> {
    pattern: Regex,
    /// File name to the `(old path, new path)` pairs that share it.
    targets: HashMap<&'a str, Vec<(&'a str, &'a str)>>,
}

impl<'a> Rewriter<'a> {
    fn new(pairs: &'a [(String, String)]) -> Option<Self> {
        let mut targets: HashMap<&str, Vec<(&str, &str)>> = HashMap::new();
        for (from, to) in pairs {
            targets
                .entry(file_name(from))
                .or_default()
                .push((from.as_str(), to.as_str()));
        }
        if targets.is_empty() {
            return None;
        }

        // Longest first so that the alternation prefers the most specific name.
        let mut names: Vec<&str> = targets.keys().copied().collect();
        names.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let alternation = names
            .iter()
            .map(|s| regex_lite::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&alternation).ok()?;

        Some(Self { pattern, targets })
    }

    /// New path for a renamed old path.
    fn target(&self, path: &str) -> Option<&'a str> {
        self.targets
            .get(file_name(path))?
            .iter()
            .find(|(from, _)| *from == path)
            .map(|(_, to)| *to)
    }

    /// Bounded candidates in order of appearance, widened to full hrefs.
    fn references<'t>(&self, base_dir: &str, text: &'t str) -> Vec<Reference<'t>> {
        let mut floor = 0;
        let mut found = Vec::new();
        for m in self.pattern.find_iter(text) {
            if !is_bounded(text, m.start(), m.end()) {
                continue;
            }
            let start = href_start(text, floor, m.start());
            let href = &text[start..m.end()];
            found.push(Reference {
                start,
                end: m.end(),
                href,
                path: resolve_href(base_dir, href),
            });
            floor = m.end();
        }
        found
    }

    /// Rewritten text, or `None` when nothing pointed at a renamed path.
    fn rewrite(&self, base_dir: &str, text: &str) -> Option<String> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut changed = false;

        for reference in self.references(base_dir, text) {
            let Some(new) = self.target(&reference.path) else {
                continue;
            };
            out.push_str(&text[last..reference.start]);
            out.push_str(&relative_href(base_dir, new));
            last = reference.end;
            changed = true;
        }

        if !changed {
            return None;
        }
        out.push_str(&text[last..]);
        Some(out)
    }
}

/// Start of the href that ends with the name found at `name_start`.
fn href_start(text: &str, floor: usize, name_start: usize) -> usize {
    text[floor..name_start]
        .char_indices()
        .rev()
        .find(|&(_, c)| {
            c.is_whitespace() || matches!(c, '"' | '\'' | '(' | ')' | '=' | '<' | '>' | '#' | '?')
        })
        .map_or(floor, |(i, c)| floor + i + c.len_utf8())
}

fn is_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();

    let left_ok = match before {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, '"' | '\'' | '/' | '(' | '=' | '>'),
    };
    let right_ok = match after {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, '"' | '\'' | '#' | '?' | ')' | '<'),
    };
    left_ok && right_ok
}
