//! The normalization pipeline.
//!
//! A run reads the archive into memory, applies a fixed sequence of edits
//! and writes a fresh, compliant archive. Only an unreadable input (or an
//! I/O failure) aborts; everything else degrades to a [`Warning`].

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::archive::{self, Archive};
use crate::config::PolishConfig;
use crate::content::cover::{COVER_PAGE_NAME, book_title, cover_page};
use crate::content::nav::add_landmarks;
use crate::content::{Role, STYLESHEET, annotate};
use crate::error::Result;
use crate::images::plan_renames;
use crate::images::recompress::{is_png, oversized, recompress};
use crate::package::{Landmarks, Package, Series};
use crate::rename::{RenameMap, dangling_references};
use crate::report::{Recompressed, Report, Warning};
use crate::util::{image_media_type, parent_dir, relative_href, split_extension};

/// Output of a polish run.
#[derive(Debug, Clone)]
pub struct Polished {
    /// The rewritten EPUB.
    pub bytes: Vec<u8>,
    pub report: Report,
}

/// EPUB normalizer.
///
/// # Example
///
/// ```no_run
/// use polish_epub::{PolishConfig, Polisher};
///
/// let config = PolishConfig {
///     series_position: Some(3),
///     ..PolishConfig::default()
/// };
/// let report = Polisher::new()
///     .with_config(config)
///     .polish_file("book.epub", "book.epub")?;
/// for warning in &report.warnings {
///     eprintln!("warning: {warning}");
/// }
/// # Ok::<(), polish_epub::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Polisher {
    config: PolishConfig,
}

impl Polisher {
    /// Create a polisher with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the polisher with custom settings.
    pub fn with_config(mut self, config: PolishConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PolishConfig {
        &self.config
    }

    /// Polish an EPUB held in memory.
    pub fn polish(&self, input: &[u8]) -> Result<Polished> {
        let mut polished = self.rewrite(input)?;
        for warning in archive::verify(&polished.bytes) {
            polished.report.warn(warning);
        }
        Ok(polished)
    }

    /// Polish the EPUB at `input` and write the result to `output`.
    ///
    /// `input` and `output` may be the same path. The written file is
    /// reopened and checked.
    pub fn polish_file(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<Report> {
        let (input, output) = (input.as_ref(), output.as_ref());
        let data = fs::read(input)?;
        let Polished { bytes, mut report } = self.rewrite(&data)?;

        fs::write(output, &bytes)?;
        info!(path = %output.display(), size = bytes.len(), "wrote EPUB");

        let written = fs::read(output)?;
        for warning in archive::verify(&written) {
            report.warn(warning);
        }
        Ok(report)
    }

    fn rewrite(&self, input: &[u8]) -> Result<Polished> {
        let archive = Archive::from_bytes(input)?;
        debug!(entries = archive.len(), "opened archive");

        let mut run = Run {
            config: &self.config,
            archive,
            report: Report::default(),
            package_failed: false,
            cover_image: None,
            cover_page: None,
            start_reading: None,
        };

        run.extract_title();
        run.replace_stylesheet();
        run.inject_cover_page();
        run.normalize_cover_name();
        run.rename_images();
        run.annotate_documents();
        run.add_landmarks();
        run.repair_package();
        run.recompress_images();
        run.check_references();

        let bytes = run.archive.to_bytes()?;
        info!(size = bytes.len(), warnings = run.report.warnings.len(), "serialized EPUB");
        Ok(Polished {
            bytes,
            report: run.report,
        })
    }
}

/// Polish the EPUB at `input` into `output` with the default configuration.
pub fn polish_epub(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<Report> {
    Polisher::new().polish_file(input, output)
}

/// State carried from one step to the next.
struct Run<'a> {
    config: &'a PolishConfig,
    archive: Archive,
    report: Report,
    /// Set once the package failed to load, so the failure is reported once.
    package_failed: bool,
    cover_image: Option<String>,
    cover_page: Option<String>,
    start_reading: Option<String>,
}

impl Run<'_> {
    /// Load the package document fresh from the archive.
    fn package(&mut self) -> Option<Package> {
        if self.package_failed {
            return None;
        }
        match Package::load(&self.archive) {
            Ok(package) => Some(package),
            Err(e) => {
                self.package_failed = true;
                self.report.warn(Warning::PackageDocument {
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    fn apply_renames(&mut self, renames: &RenameMap) -> Vec<(String, String)> {
        let applied = renames.apply(&mut self.archive);
        for (from, to) in &applied {
            debug!(from = %from, to = %to, "renamed");
        }
        self.report.renamed.extend(applied.iter().cloned());
        applied
    }

    fn extract_title(&mut self) {
        let raw = self.package().and_then(|p| p.raw_title());
        self.report.title = book_title(raw.as_deref());
        info!(title = %self.report.title, "extracted title");
    }

    fn replace_stylesheet(&mut self) {
        let package = self.package();
        let declared = package.as_ref().and_then(Package::stylesheet_item).map(|i| i.path);
        let existing = declared.or_else(|| {
            self.archive
                .names()
                .find(|n| n.to_ascii_lowercase().ends_with(".css"))
                .map(str::to_string)
        });

        let path = match (existing, package) {
            (Some(path), _) => path,
            (None, Some(mut package)) => {
                let path = format!("{}style.css", package.base_dir());
                package.add_item("style", "style.css", "text/css");
                package.store(&mut self.archive);
                path
            }
            (None, None) => return,
        };

        let css = self.config.stylesheet.as_deref().unwrap_or(STYLESHEET);
        self.archive.put(&path, css);
        info!(path = %path, "replaced stylesheet");
    }

    fn inject_cover_page(&mut self) {
        let Some(package) = self.package() else {
            return;
        };
        let Some(cover) = package.cover_image(&self.archive) else {
            self.report.warn(Warning::MissingCover);
            return;
        };

        let page_path = format!("{}{COVER_PAGE_NAME}", package.base_dir());
        let href = relative_href(parent_dir(&page_path), &cover);
        self.archive.put(&page_path, cover_page(&self.report.title, &href));
        info!(path = %page_path, image = %cover, "injected cover page");

        self.cover_image = Some(cover);
        self.cover_page = Some(page_path);
    }

    fn normalize_cover_name(&mut self) {
        let Some(cover) = self.cover_image.clone() else {
            return;
        };
        let (stem, extension) = split_extension(&cover);
        if !extension.is_some_and(|e| e.eq_ignore_ascii_case("jpeg")) {
            return;
        }

        let target = format!("{stem}.jpg");
        let mut renames = RenameMap::new();
        renames.insert(cover.as_str(), target.as_str());
        if self.apply_renames(&renames).is_empty() {
            debug!(path = %cover, "cover rename skipped, target exists");
            return;
        }
        info!(from = %cover, to = %target, "normalized cover file name");
        self.cover_image = Some(target);
    }

    fn rename_images(&mut self) {
        let Some(package) = self.package() else {
            return;
        };
        let skip: Vec<&str> = self.cover_image.as_deref().into_iter().collect();
        let plan = plan_renames(&self.archive, &package, &skip);

        for collision in plan.collisions {
            self.report.warn(collision);
        }
        let applied = self.apply_renames(&plan.renames);
        info!(count = applied.len(), "renamed images");
    }

    fn annotate_documents(&mut self) {
        let Some(package) = self.package() else {
            return;
        };

        let mut first_chapter = None;
        let mut first_document = None;
        let documents = package.content_documents(self.cover_page.as_deref());
        for doc in &documents {
            let Some(text) = self.archive.text(&doc.path) else {
                continue;
            };
            let annotated = annotate(&doc.path, &text);
            debug!(path = %doc.path, role = ?annotated.role, "annotated");

            first_document.get_or_insert_with(|| doc.path.clone());
            if annotated.role == Role::Chapter {
                first_chapter.get_or_insert_with(|| doc.path.clone());
            }
            if annotated.text != text {
                self.archive.put(&doc.path, annotated.text);
            }
        }

        self.start_reading = first_chapter.or(first_document);
        self.report.start_reading = self.start_reading.clone();
        info!(
            count = documents.len(),
            start = self.start_reading.as_deref().unwrap_or("-"),
            "annotated content documents"
        );
    }

    fn landmarks(&self, nav: Option<&str>) -> Landmarks {
        Landmarks {
            cover: self.cover_page.clone(),
            toc: nav.map(str::to_string),
            start: self.start_reading.clone(),
        }
    }

    fn add_landmarks(&mut self) {
        let Some(package) = self.package() else {
            return;
        };
        let Some(nav) = package.nav_item() else {
            debug!("no navigation document");
            return;
        };
        let Some(text) = self.archive.text(&nav.path) else {
            return;
        };

        let landmarks = self.landmarks(Some(&nav.path));
        match add_landmarks(&text, parent_dir(&nav.path), &landmarks) {
            Some(updated) => {
                self.archive.put(&nav.path, updated);
                info!(path = %nav.path, "added landmarks");
            }
            None => debug!(path = %nav.path, "landmarks already present"),
        }
    }

    fn repair_package(&mut self) {
        let Some(mut package) = self.package() else {
            return;
        };

        let mut cover_id = None;
        if let (Some(image), Some(page)) = (&self.cover_image, &self.cover_page) {
            let media_type = self
                .archive
                .data(image)
                .map_or("image/jpeg", |data| image_media_type(data, image));
            package.normalize_cover_image(image, media_type);
            package.ensure_cover_meta();
            cover_id = Some(package.ensure_cover_page(page));
        }

        let nav = package.nav_item();
        package.repair_spine(cover_id.as_deref(), nav.as_ref().map(|n| n.id.as_str()));
        package.rewrite_guide(&self.landmarks(nav.as_ref().map(|n| n.path.as_str())));

        if let Some(name) = self.config.series.as_deref() {
            let series = Series {
                name,
                position: self.config.series_position,
            };
            if package.ensure_series(&series) {
                debug!(series = name, "declared series");
            }
        }

        package.store(&mut self.archive);
        info!(path = %package.path, "repaired package document");
    }

    fn recompress_images(&mut self) {
        let max_bytes = self.config.max_image_bytes;
        let mut renames = RenameMap::new();
        let mut recompressed: Vec<(String, usize, usize)> = Vec::new();

        for path in oversized(&self.archive, max_bytes) {
            let Some(original) = self.archive.data(&path) else {
                continue;
            };
            let original_size = original.len();
            let was_png = is_png(original);

            let data = match recompress(original, self.config.max_dimension, self.config.jpeg_quality) {
                Ok(data) => data,
                Err(e) => {
                    self.report.warn(Warning::Recompression {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if data.len() >= original_size {
                self.report.warn(Warning::StillOversized {
                    path,
                    size: original_size,
                });
                continue;
            }

            let new_size = data.len();
            self.archive.put(&path, data);
            if was_png {
                // The cover keeps the `.jpg` spelling it was normalized to.
                let is_cover = self.cover_image.as_deref() == Some(path.as_str());
                let extension = if is_cover { "jpg" } else { "jpeg" };
                let (stem, _) = split_extension(&path);
                renames.insert(path.as_str(), format!("{stem}.{extension}"));
            }
            recompressed.push((path, original_size, new_size));
        }

        if recompressed.is_empty() {
            return;
        }
        let applied = self.apply_renames(&renames);
        let mut package = self.package();

        for (path, original_size, new_size) in recompressed {
            let path = match applied.iter().find(|(from, _)| *from == path) {
                Some((from, to)) => {
                    if self.cover_image.as_ref() == Some(from) {
                        self.cover_image = Some(to.clone());
                    }
                    to.clone()
                }
                None => path,
            };

            if let Some(package) = package.as_mut() {
                package.set_media_type(&path, "image/jpeg");
            }
            if new_size > max_bytes {
                self.report.warn(Warning::StillOversized {
                    path: path.clone(),
                    size: new_size,
                });
            }

            info!(path = %path, from = original_size, to = new_size, "recompressed image");
            self.report.recompressed.push(Recompressed {
                path,
                original_size,
                new_size,
            });
        }

        if let Some(package) = package {
            package.store(&mut self.archive);
        }
    }

    fn check_references(&mut self) {
        for warning in dangling_references(&self.archive, &self.report.renamed) {
            self.report.warn(warning);
        }
    }
}
