//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Instants are RFC 3339 strings; reading timestamps are naive
//! `YYYY-MM-DD HH:MM:SS[.f]` so SQLite's `date()` can truncate them; dates and
//! months are ISO text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use farmstat_core::{
  aggregate::{
    DailyEnvironment, HarvestEnvironment, Month, MonthTotal, MonthlyEnvironment,
  },
  domain::Domain,
  record::{LedgerEntry, SourceFile},
};

use crate::{Error, Result};

// ─── Table names ─────────────────────────────────────────────────────────────

pub fn raw_table(domain: Domain) -> &'static str {
  match domain {
    Domain::Environment => "env_raw",
    Domain::Harvest => "raw_csv",
  }
}

pub fn ledger_table(domain: Domain) -> &'static str {
  match domain {
    Domain::Environment => "env_import_log",
    Domain::Harvest => "harvest_import_log",
  }
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Readings and dates ──────────────────────────────────────────────────────

pub fn encode_ts(ts: NaiveDateTime) -> String {
  ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn decode_month(s: &str) -> Result<Month> { Ok(s.parse()?) }

/// SQLite has no NaN; a non-finite measure is stored as NULL.
pub fn finite(v: Option<f64>) -> Option<f64> { v.filter(|v| v.is_finite()) }

pub fn count(n: i64) -> u64 { n.max(0) as u64 }

// ─── Raw rows ────────────────────────────────────────────────────────────────
//
// Column values as read inside a `call` closure; decoded to domain types
// after the closure returns so decode errors surface as this crate's errors.

/// One ledger row.
pub struct RawLedgerEntry {
  pub path:           String,
  pub imported_at:    String,
  pub encoding:       String,
  pub header_line:    i64,
  pub row_count:      i64,
  pub rejected_count: i64,
  pub batch_seq:      Option<i64>,
}

impl RawLedgerEntry {
  pub fn into_entry(self, domain: Domain) -> Result<LedgerEntry> {
    Ok(LedgerEntry {
      source: SourceFile {
        path:          self.path,
        encoding:      self.encoding,
        header_line:   count(self.header_line) as usize,
        rejected_rows: count(self.rejected_count) as usize,
      },
      domain,
      row_count: count(self.row_count) as usize,
      batch_seq: self.batch_seq,
      imported_at: decode_dt(&self.imported_at)?,
    })
  }
}

/// One `env_daily` row.
pub struct RawDaily {
  pub farm:  String,
  pub date:  String,
  pub means: [Option<f64>; 6],
}

impl RawDaily {
  pub fn into_daily(self) -> Result<DailyEnvironment> {
    let [temp, humidity, sand, water, irradiance, vpd] = self.means;
    Ok(DailyEnvironment {
      farm:               self.farm,
      date:               decode_date(&self.date)?,
      mean_temp:          temp,
      mean_humidity:      humidity,
      mean_sand_temp:     sand,
      mean_water_content: water,
      mean_irradiance:    irradiance,
      vpd_kpa:            vpd,
    })
  }
}

/// One `env_monthly` row.
pub struct RawMonthly {
  pub farm:  String,
  pub month: String,
  pub means: [Option<f64>; 6],
}

impl RawMonthly {
  pub fn into_monthly(self) -> Result<MonthlyEnvironment> {
    let [temp, humidity, vpd, sand, water, irradiance] = self.means;
    Ok(MonthlyEnvironment {
      farm:               self.farm,
      month:              decode_month(&self.month)?,
      mean_temp:          temp,
      mean_humidity:      humidity,
      mean_vpd_kpa:       vpd,
      mean_sand_temp:     sand,
      mean_water_content: water,
      mean_irradiance:    irradiance,
    })
  }
}

/// One `v_harvest_env` row.
pub struct RawHarvestEnv {
  pub farm:    String,
  pub month:   String,
  pub mean_kg: f64,
  pub means:   [Option<f64>; 6],
}

impl RawHarvestEnv {
  pub fn into_harvest_env(self) -> Result<HarvestEnvironment> {
    let [temp, humid, vpd, sand, water, irradiance] = self.means;
    Ok(HarvestEnvironment {
      farm:               self.farm,
      month:              decode_month(&self.month)?,
      mean_kg:            self.mean_kg,
      mean_temp:          temp,
      mean_humid:         humid,
      mean_vpd_kpa:       vpd,
      mean_sand_temp:     sand,
      mean_water_content: water,
      mean_irradiance:    irradiance,
    })
  }
}

/// One `(month, farm, total_kg)` row.
pub struct RawTotal {
  pub month:    String,
  pub farm:     String,
  pub total_kg: f64,
}

impl RawTotal {
  pub fn into_total(self) -> Result<MonthTotal> {
    Ok(MonthTotal {
      month:    decode_month(&self.month)?,
      farm:     self.farm,
      total_kg: self.total_kg,
    })
  }
}
