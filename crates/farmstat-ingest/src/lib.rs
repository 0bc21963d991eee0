//! Batch runner for farmstat.
//!
//! Discovers the candidate files of one inbox, applies each one through the
//! codec and an [`IngestStore`], and finishes with a full derivation. Files
//! are processed strictly one after another; a file-fatal error is recorded
//! in the [`BatchReport`] and the batch moves on.
//!
//! ```no_run
//! # async fn demo(store: farmstat_store_sqlite::SqliteStore) -> farmstat_ingest::Result<()> {
//! use farmstat_core::domain::Domain;
//! use farmstat_ingest::{IngestConfig, run_batch};
//!
//! let config = IngestConfig {
//!   inbox:  "data/inbox/env".into(),
//!   domain: Domain::Environment,
//!   farm:   Some("FarmA".into()),
//!   derive: true,
//! };
//! let report = run_batch(&store, &config).await?;
//! for file in &report.files {
//!   println!("{file}");
//! }
//! # Ok(())
//! # }
//! ```

mod discover;
pub mod error;
mod report;

use std::path::{Path, PathBuf};

use farmstat_core::{
  domain::Domain,
  store::{Batch, ImportOutcome, IngestStore, RefreshMode},
};
use farmstat_csv::Profile;
use tracing::{info, warn};

pub use discover::discover;
pub use error::{Error, FileError, Result};
pub use report::{BatchReport, FileReport, FileStatus};

/// Explicit inputs for one batch run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
  /// Directory scanned (non-recursively) for `*.csv` files.
  pub inbox:  PathBuf,
  pub domain: Domain,
  /// Farm identifier stamped on environment readings. Required for the
  /// environment domain, ignored for harvest.
  pub farm:   Option<String>,
  /// Run a full derivation after the files.
  pub derive: bool,
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
  Error::Store(Box::new(e))
}

/// Run one ingestion batch.
///
/// Fails up front on a missing inbox, an empty inbox, or a missing farm for
/// environment data; fails afterwards only if derivation fails, in which case
/// every file already applied stays applied.
pub async fn run_batch<S: IngestStore>(
  store: &S,
  config: &IngestConfig,
) -> Result<BatchReport> {
  let farm = match (config.domain, config.farm.as_deref()) {
    (Domain::Environment, None) => return Err(Error::FarmRequired),
    (_, farm) => farm.unwrap_or_default(),
  };
  let files = discover(&config.inbox, config.domain)?;
  let batch = store.begin_batch(config.domain).await.map_err(store_err)?;
  info!(
    domain = %config.domain,
    seq = batch.seq,
    files = files.len(),
    inbox = %config.inbox.display(),
    "ingesting"
  );

  let mut reports = Vec::with_capacity(files.len());
  for path in files {
    let status = apply_file(store, &batch, &path, farm).await;
    match &status {
      FileStatus::Imported { rows, rejected } => {
        info!(path = %path.display(), rows, rejected, "imported")
      }
      FileStatus::Skipped => info!(path = %path.display(), "already imported"),
      FileStatus::Failed { reason } => {
        warn!(path = %path.display(), %reason, "file failed")
      }
    }
    reports.push(FileReport { path, status });
  }

  let derivation = if config.derive {
    let outcome = store.refresh(RefreshMode::Full).await.map_err(store_err)?;
    info!(%outcome, "derivation finished");
    Some(outcome)
  } else {
    None
  };

  Ok(BatchReport { batch, files: reports, derivation })
}

/// The unit of work for one file. Every error ends up as `Failed`.
async fn apply_file<S: IngestStore>(
  store: &S,
  batch: &Batch,
  path: &Path,
  farm: &str,
) -> FileStatus {
  match try_apply_file(store, batch, path, farm).await {
    Ok(status) => status,
    Err(e) => FileStatus::Failed { reason: e.to_string() },
  }
}

fn file_store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> FileError {
  FileError::Store(Box::new(e))
}

async fn try_apply_file<S: IngestStore>(
  store: &S,
  batch: &Batch,
  path: &Path,
  farm: &str,
) -> Result<FileStatus, FileError> {
  let canonical = tokio::fs::canonicalize(path).await.map_err(FileError::Path)?;
  let key = canonical.to_string_lossy().into_owned();

  if store
    .has_been_imported(batch.domain, key.clone())
    .await
    .map_err(file_store_err)?
  {
    return Ok(FileStatus::Skipped);
  }

  let bytes = tokio::fs::read(&canonical).await.map_err(FileError::Read)?;
  let parsed = farmstat_csv::parse(&bytes, Profile::for_domain(batch.domain), farm)?;
  let rejected = parsed.rejected;
  let source = parsed.source_file(key);

  match store
    .import_file(batch.seq, source, parsed.records)
    .await
    .map_err(file_store_err)?
  {
    ImportOutcome::Imported { rows } => Ok(FileStatus::Imported { rows, rejected }),
    ImportOutcome::AlreadyImported => Ok(FileStatus::Skipped),
  }
}
