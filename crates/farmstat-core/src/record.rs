//! Normalized raw records and source-file metadata.
//!
//! Raw records are append-only. They are produced once per source row by the
//! codec and never updated in place; every derived table is recomputed from
//! them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Domain;

// ─── Environment ─────────────────────────────────────────────────────────────

/// One logger reading. Measures that failed to parse are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentReading {
  pub farm:           String,
  pub ts:             NaiveDateTime,
  /// CH1, °C.
  pub air_temp_c:     Option<f64>,
  /// CH2, relative humidity in percent.
  pub rh_percent:     Option<f64>,
  /// CH3, °C.
  pub sand_temp_c:    Option<f64>,
  /// CH4.
  pub water_content:  Option<f64>,
  /// CH5, W/m².
  pub irradiance_wm2: Option<f64>,
}

// ─── Harvest ─────────────────────────────────────────────────────────────────

/// One harvest line from a spreadsheet export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestRecord {
  pub harvest_date: NaiveDate,
  /// Company (farm) name; the grouping key for monthly totals.
  pub company:      Option<String>,
  pub crop:         Option<String>,
  /// Harvested mass in grams.
  pub amount_g:     Option<f64>,
}

// ─── Batches of records ──────────────────────────────────────────────────────

/// All records normalized from one source file.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecords {
  Environment(Vec<EnvironmentReading>),
  Harvest(Vec<HarvestRecord>),
}

impl RawRecords {
  pub fn domain(&self) -> Domain {
    match self {
      RawRecords::Environment(_) => Domain::Environment,
      RawRecords::Harvest(_) => Domain::Harvest,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      RawRecords::Environment(rows) => rows.len(),
      RawRecords::Harvest(rows) => rows.len(),
    }
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

// ─── Source files ────────────────────────────────────────────────────────────

/// Detection metadata for a source file, keyed by its canonical path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
  /// Canonical absolute path; the ledger identity.
  pub path:          String,
  /// Label of the encoding the header was found with (e.g. `"cp932"`).
  pub encoding:      String,
  /// Zero-based line index of the header row.
  pub header_line:   usize,
  /// Rows dropped because their timestamp did not parse.
  pub rejected_rows: usize,
}

/// A source file as recorded in the import ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
  pub source:      SourceFile,
  pub domain:      Domain,
  pub row_count:   usize,
  pub batch_seq:   Option<i64>,
  pub imported_at: DateTime<Utc>,
}
