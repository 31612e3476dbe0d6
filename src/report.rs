//! Outcome of a polish run.

use std::fmt;

/// A soft failure: something the pipeline stepped around instead of aborting.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Warning {
    /// The package document could not be found or parsed; package-level steps were skipped.
    PackageDocument { reason: String },
    /// No cover image could be identified.
    MissingCover,
    /// An image slug was already taken, so the image kept its generated name.
    SlugCollision { image: String, slug: String },
    /// An oversized image could not be recompressed and was left as-is.
    Recompression { path: String, reason: String },
    /// An image was recompressed but is still above the size threshold.
    StillOversized { path: String, size: usize },
    /// A renamed file is still referenced by its old name.
    DanglingReference { name: String, document: String },
    /// The written archive breaks the mimetype packaging rule.
    Compliance { detail: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::PackageDocument { reason } => {
                write!(f, "package document unusable, skipping package steps: {reason}")
            }
            Warning::MissingCover => write!(f, "no cover image found"),
            Warning::SlugCollision { image, slug } => {
                write!(f, "slug '{slug}' already taken, keeping name of {image}")
            }
            Warning::Recompression { path, reason } => {
                write!(f, "could not recompress {path}: {reason}")
            }
            Warning::StillOversized { path, size } => {
                write!(f, "{path} is still {size} bytes after recompression")
            }
            Warning::DanglingReference { name, document } => {
                write!(f, "{document} still references old name {name}")
            }
            Warning::Compliance { detail } => write!(f, "EPUB compliance check failed: {detail}"),
        }
    }
}

/// An image that was re-encoded to fit the size budget.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Recompressed {
    /// Archive path after recompression (PNG sources end in `.jpeg`).
    pub path: String,
    pub original_size: usize,
    pub new_size: usize,
}

/// Everything a caller may want to know about a finished run.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Report {
    /// Book title used for the cover page.
    pub title: String,
    /// Archive path of the first chapter, the "start reading" landmark.
    pub start_reading: Option<String>,
    /// Renames performed, as (old archive path, new archive path).
    pub renamed: Vec<(String, String)>,
    pub recompressed: Vec<Recompressed>,
    pub warnings: Vec<Warning>,
}

impl Report {
    /// Record a soft failure and log it.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// True when the run finished without any soft failure.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
