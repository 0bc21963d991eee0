//! Error type for `farmstat-store-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] farmstat_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// `open_existing` was pointed at a file that does not exist.
  #[error("database not found: {}", .0.display())]
  DatabaseNotFound(PathBuf),

  /// Derivation was asked for while a raw source table is absent.
  #[error("raw source tables missing: {}", .0.join(", "))]
  MissingSourceTables(Vec<&'static str>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
