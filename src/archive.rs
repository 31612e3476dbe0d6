//! In-memory EPUB container.
//!
//! The archive is read once into an ordered list of entries, edited in place
//! by the pipeline, and written back as a brand-new zip that follows the OCF
//! packaging rule: `mimetype` first, stored, with the exact media type as its
//! payload, and every other entry deflated.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::Result;
use crate::report::Warning;
use crate::util::{decode_text, declare_utf8, extract_xml_encoding, is_text_document};

/// Name of the entry that identifies the container type.
pub const MIMETYPE_ENTRY: &str = "mimetype";

/// Required payload of the `mimetype` entry.
pub const EPUB_MIMETYPE: &[u8] = b"application/epub+zip";

/// One file inside the archive.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub data: Vec<u8>,
    /// Compression method as read from the input (new entries report `Deflated`).
    pub compression: CompressionMethod,
}

/// An ordered, mutable set of archive entries.
#[derive(Debug, Clone, Default)]
pub struct Archive {
    entries: Vec<Entry>,
}

impl Archive {
    /// Read every file entry of a zip archive into memory.
    ///
    /// Directory entries are dropped; the output never needs them.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(zip.len());

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
            });
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.position(name).map(|i| &self.entries[i])
    }

    pub fn data(&self, name: &str) -> Option<&[u8]> {
        self.get(name).map(|e| e.data.as_slice())
    }

    /// Entry contents decoded as text.
    ///
    /// Text decoded from a legacy encoding has its XML declaration relabeled
    /// to UTF-8, since whatever is written back with [`put`](Self::put) is UTF-8.
    pub fn text(&self, name: &str) -> Option<String> {
        let data = self.data(name)?;
        let text = decode_text(data, extract_xml_encoding(data));
        if std::str::from_utf8(data).is_ok() {
            return Some(text.into_owned());
        }
        Some(declare_utf8(&text).into_owned())
    }

    /// Replace an entry's contents, or append a new entry.
    pub fn put(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        match self.position(name) {
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.data = data;
                entry.compression = CompressionMethod::Deflated;
            }
            None => self.entries.push(Entry {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
            }),
        }
    }

    /// Move an entry to a new name, keeping its position.
    ///
    /// Returns false, changing nothing, when `from` is missing or `to` is taken.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if from == to || self.contains(to) {
            return false;
        }
        match self.position(from) {
            Some(i) => {
                self.entries[i].name = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Names of entries whose text may reference other entries.
    pub fn text_documents(&self) -> Vec<String> {
        self.names()
            .filter(|n| is_text_document(n))
            .map(str::to_string)
            .collect()
    }

    /// Serialize into a fresh, compliant zip.
    ///
    /// The `mimetype` entry is always regenerated with the exact payload;
    /// whatever the input carried under that name is discarded.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        // Fixed timestamps keep the output reproducible.
        let options = SimpleFileOptions::default().last_modified_time(DateTime::default());
        let stored = options.compression_method(CompressionMethod::Stored);
        let deflated = options.compression_method(CompressionMethod::Deflated);

        zip.start_file(MIMETYPE_ENTRY, stored)?;
        zip.write_all(EPUB_MIMETYPE)?;

        for entry in &self.entries {
            if entry.name == MIMETYPE_ENTRY {
                continue;
            }
            zip.start_file(entry.name.as_str(), deflated)?;
            zip.write_all(&entry.data)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }
}

/// Check a written archive against the mimetype packaging rule.
///
/// Never fails: every problem, including an unreadable archive, comes back
/// as a [`Warning::Compliance`].
pub fn verify(bytes: &[u8]) -> Vec<Warning> {
    let mut zip = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(zip) => zip,
        Err(e) => return vec![compliance(format!("output cannot be reopened: {e}"))],
    };

    if zip.index_for_name(MIMETYPE_ENTRY).is_none() {
        return vec![compliance("mimetype entry is missing".to_string())];
    }

    let mut first = match zip.by_index(0) {
        Ok(file) => file,
        Err(e) => return vec![compliance(format!("first entry cannot be read: {e}"))],
    };

    if first.name() != MIMETYPE_ENTRY {
        return vec![compliance(format!(
            "first entry is {}, not mimetype",
            first.name()
        ))];
    }

    let mut warnings = Vec::new();
    if first.compression() != CompressionMethod::Stored {
        warnings.push(compliance(format!(
            "mimetype is compressed with {:?} instead of stored",
            first.compression()
        )));
    }

    let mut payload = Vec::new();
    match first.read_to_end(&mut payload) {
        Ok(_) if payload == EPUB_MIMETYPE => {}
        Ok(_) => warnings.push(compliance(format!(
            "mimetype payload is {:?}",
            String::from_utf8_lossy(&payload)
        ))),
        Err(e) => warnings.push(compliance(format!("mimetype cannot be read: {e}"))),
    }

    warnings
}

fn compliance(detail: String) -> Warning {
    Warning::Compliance { detail }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip_of(entries: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, method) in entries {
            let options = SimpleFileOptions::default().compression_method(*method);
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_from_bytes_keeps_order() {
        let bytes = zip_of(&[
            ("OEBPS/content.opf", &b"<package/>"[..], CompressionMethod::Deflated),
            ("mimetype", EPUB_MIMETYPE, CompressionMethod::Deflated),
        ]);
        let archive = Archive::from_bytes(&bytes).unwrap();
        let names: Vec<_> = archive.names().collect();
        assert_eq!(names, vec!["OEBPS/content.opf", "mimetype"]);
        assert_eq!(
            archive.get("mimetype").unwrap().compression,
            CompressionMethod::Deflated
        );
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(Archive::from_bytes(b"definitely not a zip").is_err());
    }

    #[test]
    fn test_text_of_legacy_encoded_document() {
        let mut archive = Archive::default();
        archive.put(
            "OEBPS/ch1.xhtml",
            b"<?xml version=\"1.0\" encoding=\"windows-1252\"?>\n<p>Caf\xe9</p>".to_vec(),
        );
        archive.put("OEBPS/ch2.xhtml", "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<p>Café</p>");

        assert_eq!(
            archive.text("OEBPS/ch1.xhtml").unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<p>Café</p>"
        );
        assert_eq!(
            archive.text("OEBPS/ch2.xhtml").unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<p>Café</p>"
        );
    }

    #[test]
    fn test_rename_is_all_or_nothing() {
        let mut archive = Archive::default();
        archive.put("a.png", b"a".to_vec());
        archive.put("b.png", b"b".to_vec());

        assert!(!archive.rename("a.png", "b.png"));
        assert!(!archive.rename("missing.png", "c.png"));
        assert!(archive.rename("a.png", "c.png"));

        let names: Vec<_> = archive.names().collect();
        assert_eq!(names, vec!["c.png", "b.png"]);
    }

    #[test]
    fn test_to_bytes_writes_mimetype_first_and_stored() {
        let mut archive = Archive::default();
        archive.put("OEBPS/content.opf", b"<package/>".to_vec());
        archive.put("mimetype", b"application/zip".to_vec());

        let bytes = archive.to_bytes().unwrap();
        assert!(verify(&bytes).is_empty());

        let mut zip = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(zip.len(), 2);
        let second = zip.by_index(1).unwrap();
        assert_eq!(second.name(), "OEBPS/content.opf");
        assert_eq!(second.compression(), CompressionMethod::Deflated);
    }

    #[test]
    fn test_verify_reports_misplaced_mimetype() {
        let bytes = zip_of(&[
            ("OEBPS/content.opf", &b"<package/>"[..], CompressionMethod::Stored),
            ("mimetype", EPUB_MIMETYPE, CompressionMethod::Stored),
        ]);
        let warnings = verify(&bytes);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().contains("not mimetype"));
    }

    #[test]
    fn test_verify_reports_compressed_mimetype_and_payload() {
        let bytes = zip_of(&[("mimetype", &b"application/zip"[..], CompressionMethod::Deflated)]);
        let warnings = verify(&bytes);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_verify_reports_unreadable_output() {
        let warnings = verify(b"truncated");
        assert_eq!(warnings.len(), 1);
    }
}
