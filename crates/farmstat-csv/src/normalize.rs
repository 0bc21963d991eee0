//! Row normalization: split fields, coerce values, build typed records.
//!
//! A row whose timestamp does not parse is dropped and counted (vendor
//! exports carry a units row right under the header). A measure that does
//! not parse becomes `None`; the row is kept.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use farmstat_core::{
  domain::Domain,
  record::{EnvironmentReading, HarvestRecord, RawRecords},
};
use regex::Regex;

use crate::{
  error::Result,
  profile::Delimiter,
  resolve::{ColumnMap, Role},
};

const DATETIME_FORMATS: &[&str] = &[
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y/%m/%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M",
  "%Y/%m/%d %H:%M",
  "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

// ─── Field splitting ─────────────────────────────────────────────────────────

/// One field separator: a comma, a tab, or a comma and tab written as a pair.
/// Consecutive separators delimit empty fields.
pub(crate) fn field_separator() -> &'static Regex {
  static FIELD_SEPARATOR: OnceLock<Regex> = OnceLock::new();
  FIELD_SEPARATOR.get_or_init(|| Regex::new(r",\t|\t,|[,\t]").expect("valid regex"))
}

fn unquote(field: &str) -> String {
  field.trim().trim_matches('"').trim().to_string()
}

/// Split the decoded text from `header_line` on into the header row and the
/// data rows. Blank lines are skipped.
pub fn split_table(
  text: &str,
  header_line: usize,
  delimiter: Delimiter,
) -> Result<(Vec<String>, Vec<Vec<String>>)> {
  let mut rows: Vec<Vec<String>> = match delimiter {
    Delimiter::CommaOrTab => text
      .lines()
      .skip(header_line)
      .filter(|line| !line.trim().is_empty())
      .map(|line| field_separator().split(line).map(unquote).collect())
      .collect(),
    Delimiter::Comma => {
      let body = text.lines().skip(header_line).collect::<Vec<_>>().join("\n");
      let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());
      let mut rows = Vec::new();
      for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
          continue;
        }
        rows.push(record.iter().map(unquote).collect());
      }
      rows
    }
  };

  if rows.is_empty() {
    return Ok((Vec::new(), Vec::new()));
  }
  let header = rows.remove(0);
  Ok((header, rows))
}

// ─── Lenient coercion ────────────────────────────────────────────────────────

/// Parse a timestamp in any of the accepted layouts. A bare date means
/// midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
  let s = raw.trim().trim_matches('"').trim();
  if s.is_empty() {
    return None;
  }
  DATETIME_FORMATS
    .iter()
    .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    .or_else(|| parse_date_only(s).map(|d| d.and_time(NaiveTime::MIN)))
}

/// Parse a calendar date; a full timestamp is truncated to its date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
  let s = raw.trim().trim_matches('"').trim();
  parse_date_only(s).or_else(|| parse_timestamp(s).map(|ts| ts.date()))
}

fn parse_date_only(s: &str) -> Option<NaiveDate> {
  DATE_FORMATS
    .iter()
    .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
    .or_else(|| parse_compact_date(s))
}

// `20250817`; chrono's `%Y` is greedy, so split by hand.
fn parse_compact_date(s: &str) -> Option<NaiveDate> {
  if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  NaiveDate::from_ymd_opt(
    s[..4].parse().ok()?,
    s[4..6].parse().ok()?,
    s[6..].parse().ok()?,
  )
}

/// Parse a measure. Thousands separators and a leading `+` are accepted;
/// empty, non-numeric, and non-finite input is `None`.
pub fn parse_measure(raw: &str) -> Option<f64> {
  let s: String = raw
    .trim()
    .trim_matches('"')
    .chars()
    .filter(|c| *c != ',' && !c.is_whitespace())
    .collect();
  if s.is_empty() {
    return None;
  }
  s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_text(raw: &str) -> Option<String> {
  let s = raw.trim();
  (!s.is_empty()).then(|| s.to_string())
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Typed records plus the count of rows dropped for a bad timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
  pub records:  RawRecords,
  pub rejected: usize,
}

fn field<'a>(row: &'a [String], map: &ColumnMap, role: Role) -> &'a str {
  map
    .index(role)
    .and_then(|i| row.get(i))
    .map(String::as_str)
    .unwrap_or("")
}

/// Turn data rows into records of `domain`. `farm` tags environment readings;
/// harvest records carry their own company column.
pub fn normalize_rows(
  rows: &[Vec<String>],
  map: &ColumnMap,
  domain: Domain,
  farm: &str,
) -> Normalized {
  let mut rejected = 0;

  let records = match domain {
    Domain::Environment => {
      let mut out = Vec::with_capacity(rows.len());
      for row in rows {
        let Some(ts) = parse_timestamp(field(row, map, Role::Timestamp)) else {
          rejected += 1;
          continue;
        };
        out.push(EnvironmentReading {
          farm: farm.to_string(),
          ts,
          air_temp_c: parse_measure(field(row, map, Role::AirTemp)),
          rh_percent: parse_measure(field(row, map, Role::Humidity)),
          sand_temp_c: parse_measure(field(row, map, Role::SandTemp)),
          water_content: parse_measure(field(row, map, Role::WaterContent)),
          irradiance_wm2: parse_measure(field(row, map, Role::Irradiance)),
        });
      }
      RawRecords::Environment(out)
    }
    Domain::Harvest => {
      let mut out = Vec::with_capacity(rows.len());
      for row in rows {
        let Some(harvest_date) = parse_date(field(row, map, Role::HarvestDate))
        else {
          rejected += 1;
          continue;
        };
        out.push(HarvestRecord {
          harvest_date,
          company: parse_text(field(row, map, Role::Company)),
          crop: parse_text(field(row, map, Role::Crop)),
          amount_g: parse_measure(field(row, map, Role::Amount)),
        });
      }
      RawRecords::Harvest(out)
    }
  };

  Normalized { records, rejected }
}
