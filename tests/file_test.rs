//! Polishing files on disk.

mod common;

use std::fs;

use common::{EpubBuilder, OPF_PATH, Output};
use polish_epub::{Error, Polisher, polish_epub};
use tempfile::TempDir;

#[test]
fn test_polish_in_place() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.epub");
    let original = EpubBuilder::new().build();
    fs::write(&path, &original).unwrap();

    let report = polish_epub(&path, &path).unwrap();
    assert!(report.is_clean(), "{:?}", report.warnings);

    let written = fs::read(&path).unwrap();
    assert_ne!(written, original);
    let mut output = Output::new(&written);
    assert_eq!(output.compression(0).0, "mimetype");
    assert!(output.text(OPF_PATH).contains("<guide>"));
}

#[test]
fn test_polish_to_new_file_leaves_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("draft.epub");
    let output = dir.path().join("book.epub");
    let original = EpubBuilder::new().build();
    fs::write(&input, &original).unwrap();

    let report = Polisher::new().polish_file(&input, &output).unwrap();

    assert_eq!(fs::read(&input).unwrap(), original);
    assert!(output.exists());
    assert_eq!(report.title, "The Amber Room");
}

#[test]
fn test_file_and_memory_agree() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("draft.epub");
    let output = dir.path().join("book.epub");
    let original = EpubBuilder::new().build();
    fs::write(&input, &original).unwrap();

    Polisher::new().polish_file(&input, &output).unwrap();
    let in_memory = Polisher::new().polish(&original).unwrap();
    assert_eq!(fs::read(&output).unwrap(), in_memory.bytes);
}

#[test]
fn test_missing_input_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let result = polish_epub(dir.path().join("absent.epub"), dir.path().join("out.epub"));
    assert!(matches!(result, Err(Error::Io(_))));
}
