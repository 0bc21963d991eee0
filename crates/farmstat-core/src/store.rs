//! The `IngestStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `farmstat-store-sqlite`).
//! The batch runner and the CLI depend on this abstraction, not on any
//! concrete backend.

use std::{fmt, future::Future, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  aggregate::{
    DailyEnvironment, HarvestEnvironment, Month, MonthTotal, MonthlyEnvironment,
    TableCounts,
  },
  domain::Domain,
  record::{LedgerEntry, RawRecords, SourceFile},
};

// ─── Batches ─────────────────────────────────────────────────────────────────

/// One ingestion run. Every raw row written during the run carries `seq`,
/// which increases monotonically across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
  pub seq:        i64,
  pub run_id:     Uuid,
  pub domain:     Domain,
  pub started_at: DateTime<Utc>,
}

/// Result of applying one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
  /// All rows were appended and the ledger marked, atomically.
  Imported { rows: usize },
  /// The ledger already held this path; nothing was written.
  AlreadyImported,
}

// ─── Derivation ──────────────────────────────────────────────────────────────

/// How to bring the derived tables up to date.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshMode {
  /// Discard and recompute every derived table and view from the raw store.
  Full,
  /// Add one contribution to a monthly total. Not reflected in raw data; the
  /// next full refresh discards it.
  Delta { month: Month, farm: String, kg: f64 },
  /// Add every harvest contribution newer than the reconciliation marker.
  Incremental,
}

impl RefreshMode {
  pub fn name(&self) -> &'static str {
    match self {
      RefreshMode::Full => "full",
      RefreshMode::Delta { .. } => "delta",
      RefreshMode::Incremental => "incremental",
    }
  }
}

/// Mode selector without the delta payload, for config and CLI parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshKind {
  Full,
  Delta,
  Incremental,
}

impl FromStr for RefreshKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "full" => Ok(RefreshKind::Full),
      "delta" => Ok(RefreshKind::Delta),
      "incremental" => Ok(RefreshKind::Incremental),
      other => Err(Error::UnknownRefreshMode(other.to_string())),
    }
  }
}

/// What a refresh changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RefreshOutcome {
  Full {
    /// `env_daily` rows written; `None` when `env_raw` was empty and the
    /// environment tables were left untouched.
    daily_rows:     Option<usize>,
    monthly_totals: usize,
    /// Reconciliation marker after the rebuild.
    marker:         i64,
  },
  Delta {
    month:    Month,
    farm:     String,
    total_kg: f64,
  },
  Incremental {
    /// Raw harvest rows newer than the previous marker.
    raw_rows: usize,
    marker:   i64,
  },
}

impl fmt::Display for RefreshOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RefreshOutcome::Full { daily_rows: Some(n), monthly_totals, marker } => write!(
        f,
        "full refresh: {n} daily rows, {monthly_totals} monthly totals, marker={marker}"
      ),
      RefreshOutcome::Full { daily_rows: None, monthly_totals, marker } => write!(
        f,
        "full refresh: environment skipped (no raw data), {monthly_totals} monthly totals, marker={marker}"
      ),
      RefreshOutcome::Delta { month, farm, total_kg } => {
        write!(f, "delta applied: ({month}, {farm}) total_kg={total_kg}")
      }
      RefreshOutcome::Incremental { raw_rows, marker } => {
        write!(f, "incremental refresh: {raw_rows} raw rows applied, marker={marker}")
      }
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relational store holding raw, ledger, and derived
/// tables.
///
/// Raw tables are append-only. Ledger writes are insert-or-ignore. Derived
/// tables are only ever replaced wholesale (full mode) or additively upserted
/// (delta and incremental modes).
pub trait IngestStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Ledger ────────────────────────────────────────────────────────────

  /// Open a new ingestion batch for `domain`.
  fn begin_batch(
    &self,
    domain: Domain,
  ) -> impl Future<Output = Result<Batch, Self::Error>> + Send + '_;

  /// Whether `path` (canonical) is already recorded in the domain's ledger.
  fn has_been_imported(
    &self,
    domain: Domain,
    path: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Record `source` as imported. A path already present is a no-op.
  fn mark_imported(
    &self,
    domain: Domain,
    batch_seq: Option<i64>,
    source: SourceFile,
    row_count: usize,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// List the domain's ledger in import order.
  fn imported_files(
    &self,
    domain: Domain,
  ) -> impl Future<Output = Result<Vec<LedgerEntry>, Self::Error>> + Send + '_;

  // ── Raw store ─────────────────────────────────────────────────────────

  /// Apply one source file: ledger check, raw append, and ledger mark in a
  /// single transaction. Either every row is visible afterwards together with
  /// the ledger entry, or nothing is.
  fn import_file(
    &self,
    batch_seq: i64,
    source: SourceFile,
    records: RawRecords,
  ) -> impl Future<Output = Result<ImportOutcome, Self::Error>> + Send + '_;

  /// Number of rows in the domain's raw table.
  fn raw_row_count(
    &self,
    domain: Domain,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Derivation ────────────────────────────────────────────────────────

  fn refresh(
    &self,
    mode: RefreshMode,
  ) -> impl Future<Output = Result<RefreshOutcome, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// First `limit` rows of `mv_farm_month_totals`, ordered by month, farm.
  fn top_totals(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<MonthTotal>, Self::Error>> + Send + '_;

  fn daily_environment(
    &self,
    farm: Option<String>,
  ) -> impl Future<Output = Result<Vec<DailyEnvironment>, Self::Error>> + Send + '_;

  fn monthly_environment(
    &self,
  ) -> impl Future<Output = Result<Vec<MonthlyEnvironment>, Self::Error>> + Send + '_;

  fn harvest_environment(
    &self,
  ) -> impl Future<Output = Result<Vec<HarvestEnvironment>, Self::Error>> + Send + '_;

  fn table_counts(
    &self,
  ) -> impl Future<Output = Result<TableCounts, Self::Error>> + Send + '_;
}
