//! Landmarks in the navigation document.

use quick_xml::escape::escape;

use super::declare_namespaces;
use super::patterns::LANDMARKS_RE;
use crate::package::Landmarks;
use crate::util::relative_href;

/// Navigation document with a hidden landmarks block added before `</body>`.
///
/// `None` when the document already has landmarks, has no `</body>`, or
/// there is nothing to point at. Hrefs are relative to `nav_dir`.
pub fn add_landmarks(nav: &str, nav_dir: &str, landmarks: &Landmarks) -> Option<String> {
    if LANDMARKS_RE.is_match(nav) {
        return None;
    }
    let close = nav.rfind("</body>")?;

    let entries: Vec<String> = [
        ("cover", "Cover", &landmarks.cover),
        ("toc", "Table of Contents", &landmarks.toc),
        ("bodymatter", "Start Reading", &landmarks.start),
    ]
    .into_iter()
    .filter_map(|(kind, label, target)| {
        let href = relative_href(nav_dir, target.as_deref()?);
        Some(format!(
            "      <li><a epub:type=\"{kind}\" href=\"{}\">{label}</a></li>\n",
            escape(&href)
        ))
    })
    .collect();
    if entries.is_empty() {
        return None;
    }

    let mut block = String::from("  <nav epub:type=\"landmarks\" hidden=\"\">\n    <ol>\n");
    for entry in &entries {
        block.push_str(entry);
    }
    block.push_str("    </ol>\n  </nav>\n");

    let mut out = String::with_capacity(nav.len() + block.len());
    out.push_str(&nav[..close]);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&block);
    out.push_str(&nav[close..]);
    Some(declare_namespaces(&out, false).into_owned())
}
