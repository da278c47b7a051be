use std::fs;

use report_engine::{ensure_output_dir, AtomicFileWriter, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_download() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("CPU1_processed.xlsx", b"first").unwrap();
    assert_eq!(first.file_name().unwrap(), "CPU1_processed.xlsx");
    assert_eq!(fs::read(&first).unwrap(), b"first");

    let second = writer.write("CPU1_processed.xlsx", b"second").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"second");
}

#[test]
fn output_dir_that_is_a_file_fails_without_partial_write() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("all.zip", b"data");
    assert!(matches!(result, Err(PersistError::OutputDir(_))));
    assert!(!file_path.with_file_name("all.zip").exists());
}

#[test]
fn traversal_names_never_leave_output_dir() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");
    let writer = AtomicFileWriter::new(out);

    let result = writer.write("../escape.csv", b"data");
    assert!(matches!(result, Err(PersistError::InvalidFileName(_))));
    assert!(!temp.path().join("escape.csv").exists());
}
