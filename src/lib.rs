//! # polish-epub
//!
//! Normalizes generated EPUB files into packaging-compliant archives.
//!
//! ## What a run does
//!
//! - Replaces the stylesheet with a print-quality one (with a dark variant)
//! - Adds a cover page and makes the cover image the canonical one
//! - Renames `cover.jpeg` to `cover.jpg` and gives images descriptive names
//!   taken from their alt text, rewriting every reference
//! - Tags content documents with their structural role and semantic figure markup
//! - Adds landmarks to the navigation document
//! - Repairs manifest, spine and guide, and declares the series
//! - Recompresses oversized images
//! - Writes `mimetype` first and stored, everything else deflated
//!
//! Problems the run can step around are reported as [`Warning`]s on the
//! [`Report`] instead of failing it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use polish_epub::polish_epub;
//!
//! let report = polish_epub("book.epub", "book.epub")?;
//! println!("start reading at {:?}", report.start_reading);
//! # Ok::<(), polish_epub::Error>(())
//! ```
//!
//! ## In memory
//!
//! ```no_run
//! use polish_epub::Polisher;
//!
//! let input = std::fs::read("book.epub")?;
//! let polished = Polisher::new().polish(&input)?;
//! std::fs::write("polished.epub", &polished.bytes)?;
//! # Ok::<(), polish_epub::Error>(())
//! ```

pub mod archive;
pub mod config;
pub mod content;
pub mod error;
pub mod images;
pub mod package;
pub mod polish;
pub mod rename;
pub mod report;
pub mod slug;
pub(crate) mod util;
mod xml;

pub use archive::Archive;
pub use config::PolishConfig;
pub use error::{Error, Result};
pub use polish::{Polished, Polisher, polish_epub};
pub use rename::RenameMap;
pub use report::{Recompressed, Report, Warning};
