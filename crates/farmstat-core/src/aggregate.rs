//! Derived entities read back from the aggregate tables and views.
//!
//! None of these hold information absent from the raw tables; each can be
//! rebuilt from scratch by a full refresh.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Error;

// ─── Month ───────────────────────────────────────────────────────────────────

/// A calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
  year:  i32,
  month: u32,
}

impl Month {
  pub fn new(year: i32, month: u32) -> Option<Self> {
    ((1..=12).contains(&month) && (0..=9999).contains(&year))
      .then_some(Self { year, month })
  }
}

impl fmt::Display for Month {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}-{:02}", self.year, self.month)
  }
}

impl FromStr for Month {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || Error::InvalidMonth(s.to_string());
    let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
    if y.len() != 4 || m.len() != 2 {
      return Err(invalid());
    }
    let year = y.parse().map_err(|_| invalid())?;
    let month = m.parse().map_err(|_| invalid())?;
    Month::new(year, month).ok_or_else(invalid)
  }
}

impl Serialize for Month {
  fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Month {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(d)?;
    raw.parse().map_err(serde::de::Error::custom)
  }
}

// ─── Environment aggregates ──────────────────────────────────────────────────

/// One row of `env_daily`: per-(farm, date) means plus VPD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEnvironment {
  pub farm:               String,
  pub date:               NaiveDate,
  pub mean_temp:          Option<f64>,
  pub mean_humidity:      Option<f64>,
  pub mean_sand_temp:     Option<f64>,
  pub mean_water_content: Option<f64>,
  pub mean_irradiance:    Option<f64>,
  pub vpd_kpa:            Option<f64>,
}

/// One row of the `env_monthly` view (averages of daily rows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyEnvironment {
  pub farm:               String,
  pub month:              Month,
  pub mean_temp:          Option<f64>,
  pub mean_humidity:      Option<f64>,
  pub mean_vpd_kpa:       Option<f64>,
  pub mean_sand_temp:     Option<f64>,
  pub mean_water_content: Option<f64>,
  pub mean_irradiance:    Option<f64>,
}

// ─── Harvest aggregates ──────────────────────────────────────────────────────

/// One (month, farm) harvest total in kilograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthTotal {
  pub month:    Month,
  pub farm:     String,
  pub total_kg: f64,
}

/// One row of the `v_harvest_env` view. Environment fields are `None` when
/// no environment data exists for the harvest's (farm, month).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestEnvironment {
  pub farm:               String,
  pub month:              Month,
  pub mean_kg:            f64,
  pub mean_temp:          Option<f64>,
  pub mean_humid:         Option<f64>,
  pub mean_vpd_kpa:       Option<f64>,
  pub mean_sand_temp:     Option<f64>,
  pub mean_water_content: Option<f64>,
  pub mean_irradiance:    Option<f64>,
}

// ─── Overview ────────────────────────────────────────────────────────────────

/// Row counts of the raw and derived tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
  pub raw_csv:              u64,
  pub env_raw:              u64,
  pub env_daily:            u64,
  pub harvest_monthly:      u64,
  pub mv_farm_month_totals: u64,
}
