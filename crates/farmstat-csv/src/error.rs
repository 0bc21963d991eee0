//! Error types for the farmstat-csv codec.
//!
//! Every variant is fatal for the file being parsed and for nothing else.

use thiserror::Error;

use crate::resolve::Role;

#[derive(Debug, Error)]
pub enum Error {
  #[error("header row not found with any candidate encoding (tried {})", .tried.join(", "))]
  HeaderNotFound { tried: Vec<&'static str> },

  #[error("could not resolve columns {unresolved:?} from header {columns:?}")]
  ColumnResolution {
    unresolved: Vec<Role>,
    columns:    Vec<String>,
  },

  #[error("input no longer decodes as {0}")]
  Decode(&'static str),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
