//! Error types for `farmstat-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid month {0:?}: expected YYYY-MM")]
  InvalidMonth(String),

  #[error("unknown data domain: {0:?}")]
  UnknownDomain(String),

  #[error("unknown refresh mode: {0:?}")]
  UnknownRefreshMode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
