//! Generated cover page.

use quick_xml::escape::{escape, unescape};

/// Title used when the package has no usable `dc:title`.
pub const DEFAULT_TITLE: &str = "Cover";

/// File name of the generated cover page, placed next to the package document.
pub const COVER_PAGE_NAME: &str = "cover.xhtml";

/// Book title for the cover page's alt text.
///
/// Takes the raw (still escaped) `dc:title` text, cuts the subtitle at the
/// first colon and decodes character references.
pub fn book_title(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return DEFAULT_TITLE.to_string();
    };
    let main = raw.split(':').next().unwrap_or_default();
    let title = match unescape(main) {
        Ok(decoded) => decoded.trim().to_string(),
        Err(_) => return DEFAULT_TITLE.to_string(),
    };
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    }
}

/// XHTML of the cover page, showing `image_href` with `title` as alt text.
pub fn cover_page(title: &str, image_href: &str) -> String {
    let title = escape(title);
    let image_href = escape(image_href);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="en" xml:lang="en">
<head>
  <title>{title}</title>
  <style type="text/css">
    html, body {{ margin: 0; padding: 0; height: 100%; text-align: center; }}
    img {{ max-width: 100%; max-height: 100%; }}
  </style>
</head>
<body epub:type="cover">
  <section epub:type="cover" class="cover">
    <img src="{image_href}" alt="{title}"/>
  </section>
</body>
</html>
"#
    )
}
