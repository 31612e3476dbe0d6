//! Error types for polish-epub operations.
//!
//! Only failures that make the run impossible are errors. Everything the
//! pipeline can step around is reported as a [`Warning`](crate::Warning).

use thiserror::Error;

/// Errors that abort a polish run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),
}

pub type Result<T> = std::result::Result<T, Error>;
