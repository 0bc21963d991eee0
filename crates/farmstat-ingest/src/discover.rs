//! Candidate file discovery.

use std::path::{Path, PathBuf};

use farmstat_core::domain::Domain;

use crate::{Error, Result};

/// Suffix of logger files already converted by the vendor tool; imported
/// before raw exports.
const CONVERTED_SUFFIX: &str = "_converted.csv";

fn lower_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().to_lowercase())
    .unwrap_or_default()
}

/// List the `*.csv` files (any case) directly inside `dir`, in import order.
///
/// Files are sorted by name. For the environment domain, `*_Converted.csv`
/// files come first. A missing directory or an empty listing is an error.
pub fn discover(dir: &Path, domain: Domain) -> Result<Vec<PathBuf>> {
  if !dir.is_dir() {
    return Err(Error::InboxMissing(dir.to_path_buf()));
  }

  let mut files = Vec::new();
  for entry in std::fs::read_dir(dir)? {
    let path = entry?.path();
    let is_csv = path
      .extension()
      .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv && path.is_file() {
      files.push(path);
    }
  }
  if files.is_empty() {
    return Err(Error::NoInputFiles(dir.to_path_buf()));
  }

  files.sort();
  if domain == Domain::Environment {
    // Stable: each group keeps its name order.
    files.sort_by_key(|p| !lower_name(p).ends_with(CONVERTED_SUFFIX));
  }
  Ok(files)
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;

  fn names(files: &[PathBuf]) -> Vec<String> {
    files
      .iter()
      .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
      .collect()
  }

  #[test]
  fn converted_logger_files_come_first() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.csv", "a.CSV", "z_Converted.csv", "m_converted.csv", "notes.txt"] {
      fs::write(dir.path().join(name), "").unwrap();
    }
    fs::create_dir(dir.path().join("nested.csv")).unwrap();

    let env = discover(dir.path(), Domain::Environment).unwrap();
    assert_eq!(names(&env), vec![
      "m_converted.csv",
      "z_Converted.csv",
      "a.CSV",
      "b.csv"
    ]);

    let harvest = discover(dir.path(), Domain::Harvest).unwrap();
    assert_eq!(names(&harvest), vec![
      "a.CSV",
      "b.csv",
      "m_converted.csv",
      "z_Converted.csv"
    ]);
  }

  #[test]
  fn missing_directory_is_a_precondition_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = discover(&dir.path().join("inbox"), Domain::Harvest).unwrap_err();
    assert!(matches!(err, Error::InboxMissing(_)));
  }

  #[test]
  fn directory_without_csv_files_is_a_precondition_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("readme.txt"), "").unwrap();
    let err = discover(dir.path(), Domain::Environment).unwrap_err();
    assert!(matches!(err, Error::NoInputFiles(_)));
  }
}
