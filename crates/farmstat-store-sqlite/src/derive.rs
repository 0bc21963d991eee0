//! The derivation engine: rebuilds and patches the aggregate tables.
//!
//! Every function here runs inside one transaction on the store's
//! connection thread. A failure drops the transaction, which rolls back and
//! leaves the previous derived state in place.

use farmstat_core::vpd::vpd_kpa;
use rusqlite::{Connection, OptionalExtension as _, Transaction, params};
use tracing::{info, warn};

use crate::schema::{ENV_MONTHLY_VIEW, HARVEST_ENV_VIEW, RAW_SOURCE_TABLES};

/// `derivation_state` row tracking `raw_csv`.
const HARVEST_MARKER: &str = "raw_csv";

pub struct FullSummary {
  pub daily_rows:     Option<usize>,
  pub monthly_totals: usize,
  pub marker:         i64,
}

pub struct IncrementalSummary {
  pub raw_rows: usize,
  pub marker:   i64,
}

/// Raw source tables absent from the database.
pub fn missing_source_tables(
  conn: &Connection,
) -> rusqlite::Result<Vec<&'static str>> {
  let mut stmt = conn
    .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
  let mut missing = Vec::new();
  for &table in RAW_SOURCE_TABLES {
    if !stmt.exists(params![table])? {
      missing.push(table);
    }
  }
  Ok(missing)
}

// ─── Full ────────────────────────────────────────────────────────────────────

pub fn full(conn: &mut Connection) -> rusqlite::Result<FullSummary> {
  let tx = conn.transaction()?;

  let daily_rows = rebuild_environment(&tx)?;
  let monthly_totals = rebuild_harvest(&tx)?;
  let marker: i64 =
    tx.query_row("SELECT COALESCE(MAX(batch_seq), 0) FROM raw_csv", [], |r| {
      r.get(0)
    })?;
  set_marker(&tx, marker)?;

  tx.commit()?;
  info!(?daily_rows, monthly_totals, marker, "full refresh committed");
  Ok(FullSummary { daily_rows, monthly_totals, marker })
}

/// Replace `env_daily` and recreate the dependent views. `None` when
/// `env_raw` is empty; nothing is touched then.
fn rebuild_environment(tx: &Transaction<'_>) -> rusqlite::Result<Option<usize>> {
  let raw: i64 = tx.query_row("SELECT COUNT(*) FROM env_raw", [], |r| r.get(0))?;
  if raw == 0 {
    warn!("env_raw is empty; environment aggregates left as they were");
    return Ok(None);
  }

  // SQLite's AVG skips NULLs, so a missing measure does not poison the day.
  let daily = {
    let mut stmt = tx.prepare(
      "SELECT farm, date(ts) AS day,
              AVG(air_temp_c), AVG(rh_percent), AVG(sand_temp_c),
              AVG(water_content), AVG(irradiance_wm2)
       FROM env_raw
       WHERE date(ts) IS NOT NULL
       GROUP BY farm, day
       ORDER BY farm, day",
    )?;
    stmt
      .query_map([], |r| {
        Ok((
          r.get::<_, String>(0)?,
          r.get::<_, String>(1)?,
          r.get::<_, Option<f64>>(2)?,
          r.get::<_, Option<f64>>(3)?,
          r.get::<_, Option<f64>>(4)?,
          r.get::<_, Option<f64>>(5)?,
          r.get::<_, Option<f64>>(6)?,
        ))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };

  tx.execute("DELETE FROM env_daily", [])?;
  {
    let mut insert = tx.prepare(
      "INSERT INTO env_daily
         (farm, date, mean_temp, mean_humidity, mean_sand_temp,
          mean_water_content, mean_irradiance, vpd_kpa)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (farm, day, temp, humidity, sand, water, irradiance) in &daily {
      let vpd = match (temp, humidity) {
        (Some(t), Some(rh)) => Some(vpd_kpa(*t, *rh)).filter(|v| v.is_finite()),
        _ => None,
      };
      insert.execute(params![
        farm, day, temp, humidity, sand, water, irradiance, vpd
      ])?;
    }
  }

  tx.execute_batch("DROP VIEW IF EXISTS v_harvest_env; DROP VIEW IF EXISTS env_monthly;")?;
  tx.execute_batch(ENV_MONTHLY_VIEW)?;
  tx.execute_batch(HARVEST_ENV_VIEW)?;

  info!(rows = daily.len(), "env_daily rebuilt");
  Ok(Some(daily.len()))
}

/// Replace `harvest_monthly` from `raw_csv`, then `mv_farm_month_totals`
/// from `harvest_monthly`. Returns the number of (month, farm) totals.
fn rebuild_harvest(tx: &Transaction<'_>) -> rusqlite::Result<usize> {
  tx.execute("DELETE FROM harvest_monthly", [])?;
  tx.execute(
    "INSERT INTO harvest_monthly (month, farm, total_kg)
     SELECT strftime('%Y-%m', c1) AS month, c2, COALESCE(SUM(c4), 0) / 1000.0
     FROM raw_csv
     WHERE c2 IS NOT NULL AND strftime('%Y-%m', c1) IS NOT NULL
     GROUP BY month, c2",
    [],
  )?;

  tx.execute("DELETE FROM mv_farm_month_totals", [])?;
  let totals = tx.execute(
    "INSERT INTO mv_farm_month_totals (month, farm, total_kg)
     SELECT month, farm, SUM(total_kg)
     FROM harvest_monthly
     GROUP BY month, farm",
    [],
  )?;
  info!(totals, "harvest totals rebuilt");
  Ok(totals)
}

// ─── Delta ───────────────────────────────────────────────────────────────────

/// Add `kg` to the (month, farm) total, creating the row if absent. Returns
/// the resulting total.
pub fn delta(
  conn: &mut Connection,
  month: &str,
  farm: &str,
  kg: f64,
) -> rusqlite::Result<f64> {
  let tx = conn.transaction()?;
  tx.execute(
    "INSERT INTO mv_farm_month_totals (month, farm, total_kg)
     VALUES (?1, ?2, ?3)
     ON CONFLICT (month, farm) DO UPDATE
       SET total_kg = mv_farm_month_totals.total_kg + excluded.total_kg",
    params![month, farm, kg],
  )?;
  let total: f64 = tx.query_row(
    "SELECT total_kg FROM mv_farm_month_totals WHERE month = ?1 AND farm = ?2",
    params![month, farm],
    |r| r.get(0),
  )?;
  tx.commit()?;
  info!(month, farm, kg, total, "delta applied");
  Ok(total)
}

// ─── Incremental ─────────────────────────────────────────────────────────────

/// Fold every `raw_csv` row newer than the marker into both harvest
/// aggregates, then advance the marker.
pub fn incremental(conn: &mut Connection) -> rusqlite::Result<IncrementalSummary> {
  let tx = conn.transaction()?;

  let since = marker(&tx)?;
  let raw_rows: i64 = tx.query_row(
    "SELECT COUNT(*) FROM raw_csv WHERE batch_seq > ?1",
    params![since],
    |r| r.get(0),
  )?;

  // The WHERE clause also disambiguates the upsert from a join constraint.
  for table in ["harvest_monthly", "mv_farm_month_totals"] {
    tx.execute(
      &format!(
        "INSERT INTO {table} (month, farm, total_kg)
         SELECT strftime('%Y-%m', c1) AS month, c2, COALESCE(SUM(c4), 0) / 1000.0
         FROM raw_csv
         WHERE batch_seq > ?1 AND c2 IS NOT NULL AND strftime('%Y-%m', c1) IS NOT NULL
         GROUP BY month, c2
         ON CONFLICT (month, farm) DO UPDATE
           SET total_kg = {table}.total_kg + excluded.total_kg"
      ),
      params![since],
    )?;
  }

  let marker: i64 = tx.query_row(
    "SELECT MAX(?1, COALESCE(MAX(batch_seq), 0)) FROM raw_csv",
    params![since],
    |r| r.get(0),
  )?;
  set_marker(&tx, marker)?;

  tx.commit()?;
  let raw_rows = raw_rows.max(0) as usize;
  info!(raw_rows, since, marker, "incremental refresh committed");
  Ok(IncrementalSummary { raw_rows, marker })
}

// ─── Marker ──────────────────────────────────────────────────────────────────

fn marker(tx: &Transaction<'_>) -> rusqlite::Result<i64> {
  Ok(
    tx.query_row(
      "SELECT last_seq FROM derivation_state WHERE name = ?1",
      params![HARVEST_MARKER],
      |r| r.get(0),
    )
    .optional()?
    .unwrap_or(0),
  )
}

fn set_marker(tx: &Transaction<'_>, seq: i64) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO derivation_state (name, last_seq) VALUES (?1, ?2)
     ON CONFLICT (name) DO UPDATE SET last_seq = excluded.last_seq",
    params![HARVEST_MARKER, seq],
  )?;
  Ok(())
}
