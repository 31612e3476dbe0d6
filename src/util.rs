//! Text decoding, archive path arithmetic and media type sniffing.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries UTF-8 (handles BOM automatically via encoding_rs)
/// 2. If malformed, tries the hint encoding (from `<?xml encoding="..."?>`)
/// 3. Falls back to Windows-1252 (common in old ebooks)
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Encoding named by a leading `<?xml ... encoding="..."?>` declaration.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    // The declaration, when present, sits in the first few dozen bytes.
    let head = &bytes[..bytes.len().min(100)];
    let start = head.windows(5).position(|w| w == b"<?xml")?;
    let decl = &head[start..];
    let decl = &decl[..decl.windows(2).position(|w| w == b"?>")?];

    let at = decl
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let rest = &decl[at + 9..];
    let quote = rest.first().copied().filter(|&q| q == b'"' || q == b'\'')?;
    let end = rest[1..].iter().position(|&b| b == quote)?;
    std::str::from_utf8(&rest[1..=end]).ok()
}

/// Relabel the XML declaration of text that is now held as UTF-8.
pub fn declare_utf8(text: &str) -> Cow<'_, str> {
    let Some(declared) = extract_xml_encoding(text.as_bytes()) else {
        return Cow::Borrowed(text);
    };
    if declared.eq_ignore_ascii_case("utf-8") {
        return Cow::Borrowed(text);
    }
    let Some(decl_end) = text.find("?>") else {
        return Cow::Borrowed(text);
    };
    let decl = &text[..decl_end];
    match decl.rfind(declared) {
        Some(at) => Cow::Owned(format!(
            "{}UTF-8{}",
            &text[..at],
            &text[at + declared.len()..]
        )),
        None => Cow::Borrowed(text),
    }
}

/// Directory part of an archive path, with its trailing slash (`""` at the root).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "",
    }
}

/// Last segment of an archive path.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Split a path into everything before the extension dot and the extension.
pub fn split_extension(path: &str) -> (&str, Option<&str>) {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(0) | None => (path, None),
        Some(dot) => {
            let dot = name_start + dot;
            (&path[..dot], Some(&path[dot + 1..]))
        }
    }
}

/// Resolve an href found in a document living in `base_dir` to an archive path.
///
/// Fragments and queries are dropped, percent escapes decoded and `.`/`..`
/// segments folded.
pub fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split(['#', '?']).next().unwrap_or_default();
    let decoded = percent_decode_str(href).decode_utf8_lossy();

    let mut segments: Vec<&str> = if decoded.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };

    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Href that reaches archive path `target` from a document in `from_dir`.
pub fn relative_href(from_dir: &str, target: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();

    // The last segment of `to` is the file itself and never part of the shared prefix.
    let shared = from
        .iter()
        .zip(to.iter().take(to.len().saturating_sub(1)))
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from.len() - shared];
    parts.extend_from_slice(&to[shared..]);
    parts.join("/")
}

/// Media type of an image, from its magic bytes when recognizable and its
/// extension otherwise.
pub fn image_media_type(data: &[u8], path: &str) -> &'static str {
    match image::guess_format(data) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        Ok(image::ImageFormat::Gif) => "image/gif",
        Ok(image::ImageFormat::WebP) => "image/webp",
        _ => match split_extension(path).1.map(str::to_ascii_lowercase).as_deref() {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("svg") => "image/svg+xml",
            _ => "image/jpeg",
        },
    }
}

/// True for extensions of documents whose text may reference other entries.
pub fn is_text_document(path: &str) -> bool {
    matches!(
        split_extension(path)
            .1
            .map(str::to_ascii_lowercase)
            .as_deref(),
        Some("xhtml" | "html" | "htm" | "opf" | "ncx" | "css" | "xml" | "svg")
    )
}
