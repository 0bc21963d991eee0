//! Per-file and per-batch outcomes.

use std::{fmt, path::PathBuf};

use farmstat_core::store::{Batch, RefreshOutcome};
use serde::Serialize;

/// What happened to one candidate file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
  Imported { rows: usize, rejected: usize },
  /// Already in the ledger; nothing was read or written.
  Skipped,
  /// File-fatal error; the ledger was not touched.
  Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
  pub path:   PathBuf,
  pub status: FileStatus,
}

impl fmt::Display for FileReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let path = self.path.display();
    match &self.status {
      FileStatus::Imported { rows, rejected } => {
        write!(f, "[OK] {path} ({rows} rows, {rejected} rejected)")
      }
      FileStatus::Skipped => write!(f, "[SKIP] {path} (already imported)"),
      FileStatus::Failed { reason } => write!(f, "[ERROR] {path}: {reason}"),
    }
  }
}

/// Everything one run did.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
  pub batch:      Batch,
  pub files:      Vec<FileReport>,
  /// `None` when derivation was disabled for this run.
  pub derivation: Option<RefreshOutcome>,
}

impl BatchReport {
  pub fn imported(&self) -> usize {
    self.count(|s| matches!(s, FileStatus::Imported { .. }))
  }

  pub fn skipped(&self) -> usize { self.count(|s| *s == FileStatus::Skipped) }

  pub fn failed(&self) -> usize {
    self.count(|s| matches!(s, FileStatus::Failed { .. }))
  }

  /// Raw rows appended across all files.
  pub fn rows(&self) -> usize {
    self
      .files
      .iter()
      .map(|f| match f.status {
        FileStatus::Imported { rows, .. } => rows,
        _ => 0,
      })
      .sum()
  }

  fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
    self.files.iter().filter(|f| pred(&f.status)).count()
  }
}

impl fmt::Display for BatchReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} batch #{}: {} imported, {} skipped, {} failed, {} rows",
      self.batch.domain,
      self.batch.seq,
      self.imported(),
      self.skipped(),
      self.failed(),
      self.rows()
    )
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use farmstat_core::domain::Domain;
  use uuid::Uuid;

  use super::*;

  fn file(name: &str, status: FileStatus) -> FileReport {
    FileReport { path: PathBuf::from(name), status }
  }

  #[test]
  fn status_lines_use_operator_prefixes() {
    assert_eq!(
      file("a.csv", FileStatus::Imported { rows: 10, rejected: 1 }).to_string(),
      "[OK] a.csv (10 rows, 1 rejected)"
    );
    assert_eq!(
      file("b.csv", FileStatus::Skipped).to_string(),
      "[SKIP] b.csv (already imported)"
    );
    assert_eq!(
      file("c.csv", FileStatus::Failed { reason: "bad header".into() }).to_string(),
      "[ERROR] c.csv: bad header"
    );
  }

  #[test]
  fn totals_count_each_outcome() {
    let report = BatchReport {
      batch:      Batch {
        seq:        4,
        run_id:     Uuid::new_v4(),
        domain:     Domain::Environment,
        started_at: Utc::now(),
      },
      files:      vec![
        file("a.csv", FileStatus::Imported { rows: 10, rejected: 0 }),
        file("b.csv", FileStatus::Imported { rows: 5, rejected: 2 }),
        file("c.csv", FileStatus::Skipped),
        file("d.csv", FileStatus::Failed { reason: "x".into() }),
      ],
      derivation: None,
    };
    assert_eq!(report.imported(), 2);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.rows(), 15);
    assert_eq!(
      report.to_string(),
      "env batch #4: 2 imported, 1 skipped, 1 failed, 15 rows"
    );
  }
}
