//! Package document (OPF): lookup, metadata and repair.
//!
//! The package is reloaded from the archive whenever a step needs it and
//! stored back after editing, so textual rewrites done by other steps in
//! between are never lost.

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::util::{parent_dir, relative_href, resolve_href};
use crate::xml::{Document, Element, Node};

/// Manifest id given to the cover image.
pub const COVER_IMAGE_ID: &str = "cover-image";

/// Preferred manifest id of the generated cover page.
pub const COVER_PAGE_ID: &str = "cover";

/// Fallback id for the cover page when `cover` already names another item.
const COVER_PAGE_FALLBACK_ID: &str = "cover-page";

const CONTAINER_PATH: &str = "META-INF/container.xml";
const XHTML: &str = "application/xhtml+xml";

/// One `<item>` of the manifest, with its href resolved to an archive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub path: String,
    pub media_type: String,
    pub properties: Vec<String>,
}

impl ManifestItem {
    pub fn has_property(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }

    pub fn is_xhtml(&self) -> bool {
        self.media_type == XHTML
    }
}

/// Targets shared by the navigation landmarks and the legacy guide.
#[derive(Debug, Clone, Default)]
pub struct Landmarks {
    pub cover: Option<String>,
    pub toc: Option<String>,
    pub start: Option<String>,
}

/// Series declaration added to the metadata.
#[derive(Debug, Clone)]
pub struct Series<'a> {
    pub name: &'a str,
    pub position: Option<u32>,
}

/// An editable package document.
#[derive(Debug, Clone)]
pub struct Package {
    /// Archive path of the OPF file.
    pub path: String,
    doc: Document,
}

impl Package {
    /// Archive path of the package document.
    ///
    /// Read from `META-INF/container.xml`, falling back to the first `.opf`
    /// entry for archives that lack a usable container file.
    pub fn locate(archive: &Archive) -> Option<String> {
        let from_container = archive
            .text(CONTAINER_PATH)
            .and_then(|xml| Document::parse(&xml).ok())
            .and_then(|doc| {
                let rootfiles = doc.root()?.find("rootfiles")?;
                rootfiles
                    .elements()
                    .filter(|e| e.local_name() == "rootfile")
                    .find_map(|e| e.attr("full-path").map(str::to_string))
            })
            .filter(|path| archive.contains(path));

        from_container.or_else(|| {
            archive
                .names()
                .find(|n| n.to_ascii_lowercase().ends_with(".opf"))
                .map(str::to_string)
        })
    }

    pub fn load(archive: &Archive) -> Result<Self> {
        let path = Self::locate(archive)
            .ok_or_else(|| Error::InvalidEpub("no package document".to_string()))?;
        let xml = archive
            .text(&path)
            .ok_or_else(|| Error::InvalidEpub(format!("{path} is unreadable")))?;
        let doc = Document::parse(&xml)?;
        if doc.root().is_none_or(|r| r.local_name() != "package") {
            return Err(Error::InvalidEpub(format!("{path} has no <package> root")));
        }
        Ok(Self { path, doc })
    }

    /// Write the edited document back into the archive.
    pub fn store(&self, archive: &mut Archive) {
        archive.put(&self.path, self.doc.to_xml());
    }

    pub fn to_xml(&self) -> String {
        self.doc.to_xml()
    }

    /// Directory of the package document; manifest hrefs are relative to it.
    pub fn base_dir(&self) -> &str {
        parent_dir(&self.path)
    }

    /// Archive path of a manifest href.
    pub fn resolve(&self, href: &str) -> String {
        resolve_href(self.base_dir(), href)
    }

    /// Manifest href of an archive path.
    pub fn href_for(&self, path: &str) -> String {
        relative_href(self.base_dir(), path)
    }

    /// Raw text of the first `dc:title`, references still escaped.
    pub fn raw_title(&self) -> Option<String> {
        self.metadata()?
            .elements()
            .find(|e| e.local_name() == "title")
            .map(Element::raw_text)
    }

    pub fn manifest(&self) -> Vec<ManifestItem> {
        let Some(manifest) = self.section("manifest") else {
            return Vec::new();
        };
        manifest
            .elements()
            .filter(|e| e.local_name() == "item")
            .filter_map(|e| {
                let href = e.attr("href")?.to_string();
                Some(ManifestItem {
                    id: e.attr("id").unwrap_or_default().to_string(),
                    path: self.resolve(&href),
                    href,
                    media_type: e.attr("media-type").unwrap_or_default().to_string(),
                    properties: e
                        .attr("properties")
                        .unwrap_or_default()
                        .split_whitespace()
                        .map(str::to_string)
                        .collect(),
                })
            })
            .collect()
    }

    /// The EPUB 3 navigation document, or an item named `toc.xhtml`.
    pub fn nav_item(&self) -> Option<ManifestItem> {
        let manifest = self.manifest();
        manifest
            .iter()
            .find(|i| i.has_property("nav"))
            .or_else(|| {
                manifest
                    .iter()
                    .find(|i| i.href.rsplit('/').next() == Some("toc.xhtml"))
            })
            .cloned()
    }

    /// First stylesheet in the manifest.
    pub fn stylesheet_item(&self) -> Option<ManifestItem> {
        self.manifest()
            .into_iter()
            .find(|i| i.media_type == "text/css")
    }

    /// XHTML items in manifest order, excluding the navigation document and `exclude`.
    pub fn content_documents(&self, exclude: Option<&str>) -> Vec<ManifestItem> {
        let nav = self.nav_item().map(|i| i.path);
        self.manifest()
            .into_iter()
            .filter(|i| i.is_xhtml())
            .filter(|i| Some(&i.path) != nav.as_ref())
            .filter(|i| Some(i.path.as_str()) != exclude)
            .collect()
    }

    /// Archive path of the cover image.
    ///
    /// Tries the EPUB 3 `cover-image` property, then the EPUB 2
    /// `<meta name="cover">` pointer, then an image entry named `cover.*`
    /// next to the package document.
    pub fn cover_image(&self, archive: &Archive) -> Option<String> {
        let manifest = self.manifest();

        let by_property = manifest.iter().find(|i| i.has_property("cover-image"));
        let by_meta = || {
            let id = self.cover_meta_id()?;
            manifest.iter().find(|i| i.id == id)
        };
        if let Some(item) = by_property.or_else(by_meta)
            && archive.contains(&item.path)
        {
            return Some(item.path.clone());
        }

        let base = self.base_dir();
        archive
            .names()
            .find(|n| {
                let Some(rest) = n.strip_prefix(base) else {
                    return false;
                };
                let lower = rest.to_ascii_lowercase();
                ["cover.jpg", "cover.jpeg", "cover.png", "cover.gif", "cover.webp"]
                    .contains(&lower.as_str())
            })
            .map(str::to_string)
    }

    fn cover_meta_id(&self) -> Option<String> {
        self.metadata()?
            .elements()
            .find(|e| e.local_name() == "meta" && e.attr("name") == Some("cover"))
            .and_then(|e| e.attr("content"))
            .map(str::to_string)
    }

    /// Declare a new manifest item unless one with the same href exists.
    pub fn add_item(&mut self, id: &str, href: &str, media_type: &str) {
        if self.manifest().iter().any(|i| i.href == href) {
            return;
        }
        if let Some(manifest) = self.section_mut("manifest") {
            manifest.append(
                Element::new("item")
                    .with_attr("id", id)
                    .with_attr("href", href)
                    .with_attr("media-type", media_type),
            );
        }
    }

    /// Set the media type of the item at `path`, leaving every other item alone.
    pub fn set_media_type(&mut self, path: &str, media_type: &str) -> bool {
        let base = self.base_dir().to_string();
        let Some(manifest) = self.section_mut("manifest") else {
            return false;
        };
        let mut found = false;
        for item in manifest.elements_mut().filter(|e| e.local_name() == "item") {
            if item.attr("href").is_some_and(|h| resolve_href(&base, h) == path) {
                item.set_attr("media-type", media_type);
                found = true;
            }
        }
        found
    }

    // ------------------------------------------------------------------------
    // Repair
    // ------------------------------------------------------------------------

    /// Make the item at `path` the one canonical cover image.
    ///
    /// The item gets id `cover-image`, the given media type and the
    /// `cover-image` property; no other item keeps the property. The item is
    /// inserted when the manifest lacks it.
    pub fn normalize_cover_image(&mut self, path: &str, media_type: &str) {
        let base = self.base_dir().to_string();
        let href = self.href_for(path);
        let mut renamed_from: Option<String> = None;

        let Some(manifest) = self.section_mut("manifest") else {
            return;
        };

        let mut found = false;
        for item in manifest.elements_mut().filter(|e| e.local_name() == "item") {
            let is_cover = !found
                && item
                    .attr("href")
                    .is_some_and(|h| resolve_href(&base, h) == path);
            if is_cover {
                found = true;
                if let Some(old) = item.attr("id")
                    && old != COVER_IMAGE_ID
                {
                    renamed_from = Some(old.to_string());
                }
                item.set_attr("id", COVER_IMAGE_ID);
                item.set_attr("media-type", media_type);
                item.add_token("properties", "cover-image");
            } else {
                item.remove_token("properties", "cover-image");
                // Free the canonical id if some other item holds it.
                if item.attr("id") == Some(COVER_IMAGE_ID) {
                    item.set_attr("id", "cover-image-old");
                }
            }
        }

        if !found {
            manifest.insert_before(
                Element::new("item")
                    .with_attr("id", COVER_IMAGE_ID)
                    .with_attr("href", &href)
                    .with_attr("media-type", media_type)
                    .with_attr("properties", "cover-image"),
                |e| e.local_name() == "item",
            );
        }

        if let Some(old) = renamed_from
            && let Some(spine) = self.section_mut("spine")
        {
            for itemref in spine.elements_mut() {
                if itemref.attr("idref") == Some(old.as_str()) {
                    itemref.set_attr("idref", COVER_IMAGE_ID);
                }
            }
        }
    }

    /// Exactly one EPUB 2 `<meta name="cover">`, pointing at the cover image id.
    pub fn ensure_cover_meta(&mut self) {
        let Some(metadata) = self.metadata_mut() else {
            return;
        };

        let is_cover_meta = |e: &Element| e.local_name() == "meta" && e.attr("name") == Some("cover");
        let mut seen = false;
        metadata.retain_elements(|e| {
            if !is_cover_meta(e) {
                return true;
            }
            let keep = !seen;
            seen = true;
            keep
        });

        if let Some(meta) = metadata.elements_mut().find(|e| is_cover_meta(e)) {
            meta.set_attr("content", COVER_IMAGE_ID);
        } else {
            metadata.append(
                Element::new("meta")
                    .with_attr("name", "cover")
                    .with_attr("content", COVER_IMAGE_ID),
            );
        }
    }

    /// Declare the cover page once, ahead of the first content document.
    ///
    /// Returns the manifest id of the cover page.
    pub fn ensure_cover_page(&mut self, path: &str) -> String {
        let manifest = self.manifest();
        if let Some(existing) = manifest.iter().find(|i| i.path == path) {
            return existing.id.clone();
        }

        let id = if manifest.iter().any(|i| i.id == COVER_PAGE_ID) {
            COVER_PAGE_FALLBACK_ID
        } else {
            COVER_PAGE_ID
        };
        let href = self.href_for(path);
        let nav_href = self.nav_item().map(|i| i.href);

        if let Some(manifest) = self.section_mut("manifest") {
            manifest.insert_before(
                Element::new("item")
                    .with_attr("id", id)
                    .with_attr("href", &href)
                    .with_attr("media-type", XHTML),
                |e| {
                    e.local_name() == "item"
                        && e.attr("media-type") == Some(XHTML)
                        && e.attr("href") != nav_href.as_deref()
                },
            );
        }
        id.to_string()
    }

    /// Cover page first in reading order and linear; navigation document non-linear.
    ///
    /// Any existing cover itemref is moved in front of the navigation
    /// itemref (or to the front of the spine when there is none).
    pub fn repair_spine(&mut self, cover_id: Option<&str>, nav_id: Option<&str>) {
        let Some(spine) = self.section_mut("spine") else {
            return;
        };
        let is_itemref = |e: &Element, id: &str| e.local_name() == "itemref" && e.attr("idref") == Some(id);

        if let Some(nav_id) = nav_id {
            for itemref in spine.elements_mut().filter(|e| is_itemref(&**e, nav_id)) {
                itemref.set_attr("linear", "no");
            }
        }

        let Some(cover_id) = cover_id else {
            return;
        };
        spine.retain_elements(|e| !is_itemref(e, cover_id));

        let cover_ref = Element::new("itemref").with_attr("idref", cover_id);
        let nav_present = nav_id.is_some_and(|id| spine.elements().any(|e| is_itemref(e, id)));
        match nav_id {
            Some(nav_id) if nav_present => spine.insert_before(cover_ref, |e| is_itemref(e, nav_id)),
            _ => spine.insert_before(cover_ref, |e| e.local_name() == "itemref"),
        }
    }

    /// Replace the legacy `<guide>` with cover, toc and start-reading references.
    ///
    /// A missing guide is created as the last child of `<package>`.
    pub fn rewrite_guide(&mut self, landmarks: &Landmarks) {
        let references: Vec<Element> = [
            ("cover", "Cover", &landmarks.cover),
            ("toc", "Table of Contents", &landmarks.toc),
            ("text", "Start Reading", &landmarks.start),
        ]
        .into_iter()
        .filter_map(|(kind, title, target)| {
            let href = self.href_for(target.as_deref()?);
            Some(
                Element::new("reference")
                    .with_attr("type", kind)
                    .with_attr("title", title)
                    .with_attr("href", &href),
            )
        })
        .collect();

        let Some(package) = self.doc.root_mut() else {
            return;
        };

        let mut seen = false;
        package.retain_elements(|e| {
            if e.local_name() != "guide" {
                return true;
            }
            let keep = !seen;
            seen = true;
            keep
        });

        let mut guide = Element::new("guide");
        for reference in references {
            guide.children.push(Node::Text("\n    ".to_string()));
            guide.children.push(Node::Element(reference));
        }
        guide.children.push(Node::Text("\n  ".to_string()));

        match package.find_mut("guide") {
            Some(existing) => *existing = guide,
            None => package.append(guide),
        }
    }

    /// Declare the book as part of a series, unless a collection is already declared.
    pub fn ensure_series(&mut self, series: &Series<'_>) -> bool {
        let Some(metadata) = self.metadata_mut() else {
            return false;
        };
        let declared = metadata.elements().any(|e| {
            e.local_name() == "meta" && e.attr("property") == Some("belongs-to-collection")
        });
        if declared {
            return false;
        }

        metadata.append(
            Element::new("meta")
                .with_attr("property", "belongs-to-collection")
                .with_attr("id", "series")
                .with_text(series.name),
        );
        metadata.append(
            Element::new("meta")
                .with_attr("refines", "#series")
                .with_attr("property", "collection-type")
                .with_text("series"),
        );
        if let Some(position) = series.position {
            metadata.append(
                Element::new("meta")
                    .with_attr("refines", "#series")
                    .with_attr("property", "group-position")
                    .with_text(&position.to_string()),
            );
        }
        true
    }

    fn metadata(&self) -> Option<&Element> {
        self.section("metadata")
    }

    fn metadata_mut(&mut self) -> Option<&mut Element> {
        self.section_mut("metadata")
    }

    fn section(&self, local: &str) -> Option<&Element> {
        self.doc.root()?.find(local)
    }

    fn section_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.doc.root_mut()?.find_mut(local)
    }
}
