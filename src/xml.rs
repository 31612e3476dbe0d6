//! A small, editable XML tree built on quick-xml events.
//!
//! Good enough to edit a package document without disturbing what it does
//! not touch: declarations, doctypes, comments, processing instructions and
//! text (including entity references) are kept verbatim.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};

/// A node in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Character data, still escaped as it appeared in the source.
    Text(String),
    /// Markup copied through verbatim (comments, declarations, doctype, PIs, CDATA).
    Raw(String),
}

/// An element with its attributes (unescaped) and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    self_closing: bool,
}

/// A parsed XML document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Document {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let node = match reader.read_event()? {
                Event::Start(e) => {
                    stack.push(Element::from_start(&e)?);
                    continue;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::InvalidEpub("unbalanced end tag".to_string()))?;
                    Node::Element(element)
                }
                Event::Empty(e) => {
                    let mut element = Element::from_start(&e)?;
                    element.self_closing = true;
                    Node::Element(element)
                }
                Event::Text(e) => Node::Text(lossy(&e).into_owned()),
                Event::GeneralRef(e) => Node::Text(format!("&{};", lossy(&e))),
                Event::CData(e) => Node::Raw(format!("<![CDATA[{}]]>", lossy(&e))),
                Event::Comment(e) => Node::Raw(format!("<!--{}-->", lossy(&e))),
                Event::Decl(e) => Node::Raw(format!("<?{}?>", lossy(&e))),
                Event::PI(e) => Node::Raw(format!("<?{}?>", lossy(&e))),
                Event::DocType(e) => Node::Raw(format!("<!DOCTYPE {}>", lossy(&e).trim())),
                Event::Eof => break,
            };

            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::InvalidEpub(format!("unclosed element <{}>", open.name)));
        }

        Ok(Self { nodes })
    }

    /// The document element.
    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write(&mut out);
        }
        out
    }
}

impl Node {
    fn write(&self, out: &mut String) {
        match self {
            Node::Element(e) => e.write(out),
            Node::Text(t) | Node::Raw(t) => out.push_str(t),
        }
    }
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            self_closing: true,
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Set escaped-on-write text content.
    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(escape(text).into_owned()));
        self.self_closing = false;
        self
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = lossy(attr.key.as_ref()).into_owned();
            let raw = lossy(&attr.value).into_owned();
            let value = unescape(&raw).map(Cow::into_owned).ok();
            attrs.push((key, value.unwrap_or(raw)));
        }

        Ok(Self {
            name: lossy(start.name().as_ref()).into_owned(),
            attrs,
            children: Vec::new(),
            self_closing: false,
        })
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        match self.name.rfind(':') {
            Some(i) => &self.name[i + 1..],
            None => &self.name,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, key: &str) {
        self.attrs.retain(|(k, _)| k != key);
    }

    /// Whitespace-separated tokens of an attribute such as `properties`.
    pub fn has_token(&self, key: &str, token: &str) -> bool {
        self.attr(key)
            .is_some_and(|v| v.split_whitespace().any(|t| t == token))
    }

    pub fn add_token(&mut self, key: &str, token: &str) {
        if self.has_token(key, token) {
            return;
        }
        let value = match self.attr(key) {
            Some(v) if !v.trim().is_empty() => format!("{} {token}", v.trim()),
            _ => token.to_string(),
        };
        self.set_attr(key, &value);
    }

    pub fn remove_token(&mut self, key: &str, token: &str) {
        let Some(value) = self.attr(key) else {
            return;
        };
        let rest: Vec<&str> = value.split_whitespace().filter(|t| *t != token).collect();
        if rest.is_empty() {
            self.remove_attr(key);
        } else {
            let rest = rest.join(" ");
            self.set_attr(key, &rest);
        }
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First child element with the given local name.
    pub fn find(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.local_name() == local)
    }

    pub fn find_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.local_name() == local)
    }

    /// Text content of direct children, with references still escaped.
    pub fn raw_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text content of direct children, unescaped.
    pub fn text(&self) -> String {
        let raw = self.raw_text();
        let unescaped = unescape(&raw).map(Cow::into_owned).ok();
        unescaped.unwrap_or(raw)
    }

    /// Drop child elements that fail the predicate, with the whitespace that led up to them.
    pub fn retain_elements<F: FnMut(&Element) -> bool>(&mut self, mut keep: F) {
        let mut kept: Vec<Node> = Vec::with_capacity(self.children.len());
        for node in self.children.drain(..) {
            match node {
                Node::Element(e) if !keep(&e) => {
                    if matches!(kept.last(), Some(Node::Text(t)) if t.trim().is_empty()) {
                        kept.pop();
                    }
                }
                other => kept.push(other),
            }
        }
        self.children = kept;
    }

    /// Insert a child element before the first child element matching `before`,
    /// or append it when none does.
    pub fn insert_before<F: Fn(&Element) -> bool>(&mut self, element: Element, before: F) {
        let indent = self.child_indent();
        let position = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if before(e)));

        match position {
            Some(at) => {
                self.children.insert(at, Node::Text(indent));
                self.children.insert(at, Node::Element(element));
            }
            None => self.append(element),
        }
    }

    /// Append a child element, keeping the closing tag's indentation last.
    pub fn append(&mut self, element: Element) {
        let indent = self.child_indent();
        let trailing_space =
            matches!(self.children.last(), Some(Node::Text(t)) if t.trim().is_empty());
        let at = if trailing_space {
            self.children.len() - 1
        } else {
            self.children.len()
        };
        self.children.insert(at, Node::Element(element));
        self.children.insert(at, Node::Text(indent));
        self.self_closing = false;
    }

    /// Whitespace in front of the first child element, reused for inserted children.
    fn child_indent(&self) -> String {
        let mut previous: Option<&str> = None;
        for node in &self.children {
            match node {
                Node::Element(_) => {
                    if let Some(t) = previous
                        && t.trim().is_empty()
                    {
                        return t.to_string();
                    }
                    break;
                }
                Node::Text(t) => previous = Some(t),
                Node::Raw(_) => previous = None,
            }
        }
        "\n".to_string()
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value));
            out.push('"');
        }

        if self.children.is_empty() && self.self_closing {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for child in &self.children {
            child.write(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- generated -->
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Amber &amp; Gold</dc:title>
  </metadata>
  <manifest>
    <item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
</package>
"#;

    #[test]
    fn test_round_trip_is_lossless() {
        let doc = Document::parse(OPF).unwrap();
        assert_eq!(doc.to_xml(), OPF);
    }

    #[test]
    fn test_text_unescapes() {
        let doc = Document::parse(OPF).unwrap();
        let title = doc.root().unwrap().find("metadata").unwrap().find("title").unwrap();
        assert_eq!(title.raw_text(), "Amber &amp; Gold");
        assert_eq!(title.text(), "Amber & Gold");
        assert_eq!(title.name, "dc:title");
        assert_eq!(title.local_name(), "title");
    }

    #[test]
    fn test_append_keeps_indentation() {
        let mut doc = Document::parse(OPF).unwrap();
        let manifest = doc.root_mut().unwrap().find_mut("manifest").unwrap();
        manifest.append(
            Element::new("item")
                .with_attr("id", "b")
                .with_attr("href", "b.xhtml"),
        );
        let xml = doc.to_xml();
        assert!(xml.contains(
            "<item id=\"a\" href=\"a.xhtml\" media-type=\"application/xhtml+xml\"/>\n    <item id=\"b\" href=\"b.xhtml\"/>\n  </manifest>"
        ));
    }

    #[test]
    fn test_insert_before_and_retain() {
        let mut doc = Document::parse(OPF).unwrap();
        let manifest = doc.root_mut().unwrap().find_mut("manifest").unwrap();
        manifest.insert_before(Element::new("item").with_attr("id", "first"), |e| {
            e.attr("id") == Some("a")
        });
        let ids: Vec<_> = manifest.elements().filter_map(|e| e.attr("id")).collect();
        assert_eq!(ids, vec!["first", "a"]);

        manifest.retain_elements(|e| e.attr("id") != Some("first"));
        assert_eq!(doc.to_xml(), OPF);
    }

    #[test]
    fn test_tokens() {
        let mut item = Element::new("item").with_attr("properties", "svg");
        item.add_token("properties", "cover-image");
        assert_eq!(item.attr("properties"), Some("svg cover-image"));
        assert!(item.has_token("properties", "cover-image"));
        item.remove_token("properties", "svg");
        item.remove_token("properties", "cover-image");
        assert_eq!(item.attr("properties"), None);
    }

    #[test]
    fn test_attribute_values_are_escaped_on_write() {
        let doc = Document {
            nodes: vec![Node::Element(
                Element::new("meta").with_attr("content", "A \"quoted\" <title>"),
            )],
        };
        assert_eq!(
            doc.to_xml(),
            "<meta content=\"A &quot;quoted&quot; &lt;title&gt;\"/>"
        );
    }

    #[test]
    fn test_unbalanced_document_is_rejected() {
        assert!(Document::parse("<package><metadata></package>").is_err());
    }
}
