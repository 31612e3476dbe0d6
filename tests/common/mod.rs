//! Shared fixtures: a small generated book built in memory.
//!
//! The book mirrors what the upstream generator emits: a deflated
//! `mimetype`, no guide, no cover page, a `.jpeg` cover, opaque image names
//! and a generator heading on every chapter.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const OPF_PATH: &str = "OEBPS/content.opf";
pub const NAV_PATH: &str = "OEBPS/toc.xhtml";
pub const CHAPTER_PATH: &str = "OEBPS/2_the-gift.xhtml";
pub const FIGURE_ALT: &str = "Frederick I of Prussia, who commissioned the Amber Room";
pub const FIGURE_SLUG: &str = "frederick-i-of-prussia-who-commissioned-the-amber-room";

const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

pub const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="BookId">urn:uuid:6c1b2f0e-5a44-4d8e-9a61-2a8d8f0c7d11</dc:identifier>
    <dc:title>The Amber Room: Treasure of the Tsars</dc:title>
    <dc:language>en</dc:language>
    <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="toc" href="toc.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="cover-img" href="images/cover.jpeg" media-type="image/jpeg" properties="cover-image"/>
    <item id="style" href="style.css" media-type="text/css"/>
    <item id="c0" href="0_title.xhtml" media-type="application/xhtml+xml"/>
    <item id="c1" href="1_epigraph.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="2_the-gift.xhtml" media-type="application/xhtml+xml"/>
    <item id="c3" href="3_notes.xhtml" media-type="application/xhtml+xml"/>
    <item id="img1" href="images/img_9f3a.png" media-type="image/png"/>
    <item id="img2" href="images/img_77b1.jpg" media-type="image/jpeg"/>
  </manifest>
  <spine>
    <itemref idref="toc"/>
    <itemref idref="c0"/>
    <itemref idref="c1"/>
    <itemref idref="c2"/>
    <itemref idref="c3"/>
  </spine>
</package>
"#;

const NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>Contents</h1>
    <ol>
      <li><a href="0_title.xhtml">The Amber Room</a></li>
      <li><a href="2_the-gift.xhtml">The Gift</a></li>
      <li><a href="3_notes.xhtml">Notes</a></li>
    </ol>
  </nav>
</body>
</html>
"#;

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="style.css"/>
</head>
<body>
{body}
</body>
</html>
"#
    )
}

/// A small RGB image encoded in the given format.
pub fn image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 120])
    });
    let mut buffer = Vec::new();
    match format {
        ImageFormat::Jpeg => JpegEncoder::new_with_quality(&mut buffer, 90)
            .encode_image(&img)
            .unwrap(),
        other => DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), other)
            .unwrap(),
    }
    buffer
}

/// A PNG of about a megabyte: a gradient with low-amplitude noise that
/// deflate cannot squeeze but JPEG handles well.
pub fn large_png() -> Vec<u8> {
    let mut seed: u32 = 0x2545_f491;
    let img = RgbImage::from_fn(1300, 700, |x, y| {
        let mut noise = || {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((seed >> 24) & 0x0f) as u8
        };
        image::Rgb([
            (x * 200 / 1300) as u8 + noise(),
            (y * 200 / 700) as u8 + noise(),
            ((x + y) * 100 / 2000) as u8 + noise(),
        ])
    });
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

/// Builder for the generated book, with per-test overrides.
pub struct EpubBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl EpubBuilder {
    pub fn new() -> Self {
        let chapter = page(
            "The Gift",
            &format!(
                r#"<h1>2. The Gift</h1>

<h1>The Gift</h1>
<p>In 1716 the room left Berlin.</p>
<figure style="text-align: center; margin: 1em 0">
  <img src="images/img_9f3a.png" alt="{FIGURE_ALT}" style="max-width: 100%"/>
  <figcaption style="font-size: 0.8em">{FIGURE_ALT}</figcaption>
</figure>
<p>It was packed in eighteen crates.</p>
<p><img src="images/img_77b1.jpg" alt="The crates on the road to Memel"/></p>"#
            ),
        );

        let mut builder = Self {
            entries: Vec::new(),
        };
        builder
            .put("mimetype", "application/epub+zip")
            .put("META-INF/container.xml", CONTAINER)
            .put(OPF_PATH, OPF)
            .put(NAV_PATH, NAV)
            .put("OEBPS/style.css", "body { margin: 0; }\n")
            .put(
                "OEBPS/0_title.xhtml",
                page(
                    "The Amber Room",
                    "<h1>The Amber Room</h1>\n\n<p class=\"subtitle\">Treasure of the Tsars</p>\n<p><img src=\"images/cover.jpeg\" alt=\"Cover\"/></p>",
                ),
            )
            .put(
                "OEBPS/1_epigraph.xhtml",
                page(
                    "Epigraph",
                    "<blockquote><p>Amber is the gold of the north.</p></blockquote>",
                ),
            )
            .put(CHAPTER_PATH, chapter)
            .put(
                "OEBPS/3_notes.xhtml",
                page("Notes", "<h1>Notes</h1>\n\n<p>Sources are listed by chapter.</p>"),
            )
            .put("OEBPS/images/cover.jpeg", image_bytes(60, 90, ImageFormat::Jpeg))
            .put("OEBPS/images/img_9f3a.png", image_bytes(40, 30, ImageFormat::Png))
            .put("OEBPS/images/img_77b1.jpg", image_bytes(40, 30, ImageFormat::Jpeg));
        builder
    }

    /// Replace an entry, or add it at the end.
    pub fn put(&mut self, name: &str, data: impl Into<Vec<u8>>) -> &mut Self {
        let data = data.into();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = data,
            None => self.entries.push((name.to_string(), data)),
        }
        self
    }

    /// Replace text inside an existing entry.
    pub fn replace(&mut self, name: &str, from: &str, to: &str) -> &mut Self {
        let entry = self
            .entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .unwrap_or_else(|| panic!("missing {name}"));
        let text = String::from_utf8(entry.1.clone()).unwrap();
        entry.1 = text.replace(from, to).into_bytes();
        self
    }

    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.entries.retain(|(n, _)| n != name);
        self
    }

    /// Zip everything deflated, the way the generator does.
    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in &self.entries {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

/// Read-only view of a polished archive.
pub struct Output {
    zip: ZipArchive<Cursor<Vec<u8>>>,
}

impl Output {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            zip: ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        (0..self.zip.len())
            .filter_map(|i| self.zip.name_for_index(i).map(str::to_string))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.zip.index_for_name(name).is_some()
    }

    pub fn data(&mut self, name: &str) -> Vec<u8> {
        let mut file = self.zip.by_name(name).unwrap_or_else(|_| panic!("missing {name}"));
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        data
    }

    pub fn text(&mut self, name: &str) -> String {
        String::from_utf8(self.data(name)).unwrap()
    }

    pub fn compression(&mut self, index: usize) -> (String, CompressionMethod) {
        let file = self.zip.by_index(index).unwrap();
        (file.name().to_string(), file.compression())
    }

    /// Every text entry, by name.
    pub fn text_entries(&mut self) -> Vec<(String, String)> {
        let names = self.names();
        names
            .into_iter()
            .filter(|n| {
                [".xhtml", ".opf", ".ncx", ".css", ".xml"]
                    .iter()
                    .any(|ext| n.ends_with(ext))
            })
            .map(|n| {
                let text = self.text(&n);
                (n, text)
            })
            .collect()
    }
}
