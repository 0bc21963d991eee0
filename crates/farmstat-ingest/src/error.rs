//! Error type for `farmstat-ingest`.
//!
//! [`Error`] is batch-fatal. A [`FileError`] ends only its own file and is
//! rendered into a [`crate::FileStatus::Failed`] entry of the report.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("inbox directory not found: {}", .0.display())]
  InboxMissing(PathBuf),

  #[error("no *.csv files in {}", .0.display())]
  NoInputFiles(PathBuf),

  /// Environment exports carry no farm column; the operator must name one.
  #[error("a farm identifier is required for environment imports")]
  FarmRequired,

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Why one file could not be applied.
#[derive(Debug, Error)]
pub enum FileError {
  #[error("cannot resolve path: {0}")]
  Path(#[source] std::io::Error),

  #[error("cannot read file: {0}")]
  Read(#[source] std::io::Error),

  #[error(transparent)]
  Codec(#[from] farmstat_csv::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
