//! The SQLite implementation of [`IngestStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params};
use tracing::{debug, info};
use uuid::Uuid;

use farmstat_core::{
  aggregate::{
    DailyEnvironment, HarvestEnvironment, MonthTotal, MonthlyEnvironment,
    TableCounts,
  },
  domain::Domain,
  record::{LedgerEntry, RawRecords, SourceFile},
  store::{Batch, ImportOutcome, IngestStore, RefreshMode, RefreshOutcome},
};

use crate::{
  Error, Result, derive,
  encode::{
    RawDaily, RawHarvestEnv, RawLedgerEntry, RawMonthly, RawTotal, count,
    encode_date, encode_dt, encode_ts, finite, ledger_table, raw_table,
  },
  schema::{DERIVED_SCHEMA, ENV_MONTHLY_VIEW, HARVEST_ENV_VIEW, RAW_SCHEMA},
};

fn means(row: &rusqlite::Row<'_>, from: usize) -> rusqlite::Result<[Option<f64>; 6]> {
  Ok([
    row.get(from)?,
    row.get(from + 1)?,
    row.get(from + 2)?,
    row.get(from + 3)?,
    row.get(from + 4)?,
    row.get(from + 5)?,
  ])
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A farmstat store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with the full schema, ready for
  /// ingestion.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema(true).await?;
    Ok(store)
  }

  /// Open an in-memory store with the full schema.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema(true).await?;
    Ok(store)
  }

  /// Open a database that must already exist, for derivation and reads.
  ///
  /// Only the derived tables are created; raw tables are never invented here,
  /// so a refresh against a database that was never ingested into fails with
  /// [`Error::MissingSourceTables`].
  pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if !path.is_file() {
      return Err(Error::DatabaseNotFound(path.to_path_buf()));
    }
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema(false).await?;
    Ok(store)
  }

  async fn init_schema(&self, raw: bool) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        if raw {
          conn.execute_batch(RAW_SCHEMA)?;
        }
        conn.execute_batch(DERIVED_SCHEMA)?;
        conn.execute_batch(ENV_MONTHLY_VIEW)?;
        conn.execute_batch(HARVEST_ENV_VIEW)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn require_source_tables(&self) -> Result<()> {
    let missing = self
      .conn
      .call(|conn| Ok(derive::missing_source_tables(conn)?))
      .await?;
    if missing.is_empty() {
      Ok(())
    } else {
      Err(Error::MissingSourceTables(missing))
    }
  }
}

// ─── IngestStore impl ────────────────────────────────────────────────────────

impl IngestStore for SqliteStore {
  type Error = Error;

  // ── Ledger ────────────────────────────────────────────────────────────────

  async fn begin_batch(&self, domain: Domain) -> Result<Batch> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();

    let run_str = run_id.hyphenated().to_string();
    let at_str  = encode_dt(started_at);
    let seq = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO ingest_batches (run_id, domain, started_at) VALUES (?1, ?2, ?3)",
          params![run_str, domain.as_str(), at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    info!(seq, %run_id, %domain, "batch started");
    Ok(Batch { seq, run_id, domain, started_at })
  }

  async fn has_been_imported(&self, domain: Domain, path: String) -> Result<bool> {
    let found = self
      .conn
      .call(move |conn| Ok(ledger_contains(conn, domain, &path)?))
      .await?;
    Ok(found)
  }

  async fn mark_imported(
    &self,
    domain: Domain,
    batch_seq: Option<i64>,
    source: SourceFile,
    row_count: usize,
  ) -> Result<()> {
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        mark(conn, domain, batch_seq, &source, row_count, &at_str)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn imported_files(&self, domain: Domain) -> Result<Vec<LedgerEntry>> {
    let sql = format!(
      "SELECT path, imported_at, encoding, header_line, row_count, rejected_count,
              batch_seq
       FROM {} ORDER BY id",
      ledger_table(domain)
    );
    let raws: Vec<RawLedgerEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawLedgerEntry {
              path:           row.get(0)?,
              imported_at:    row.get(1)?,
              encoding:       row.get(2)?,
              header_line:    row.get(3)?,
              row_count:      row.get(4)?,
              rejected_count: row.get(5)?,
              batch_seq:      row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(|r| r.into_entry(domain)).collect()
  }

  // ── Raw store ─────────────────────────────────────────────────────────────

  async fn import_file(
    &self,
    batch_seq: i64,
    source: SourceFile,
    records: RawRecords,
  ) -> Result<ImportOutcome> {
    let domain = records.domain();
    let at_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if ledger_contains(&tx, domain, &source.path)? {
          // Dropping `tx` rolls back; nothing was written.
          return Ok(ImportOutcome::AlreadyImported);
        }

        let rows = append(&tx, batch_seq, &records)?;
        mark(&tx, domain, Some(batch_seq), &source, rows, &at_str)?;
        tx.commit()?;
        Ok(ImportOutcome::Imported { rows })
      })
      .await?;

    debug!(%domain, batch_seq, ?outcome, "import_file");
    Ok(outcome)
  }

  async fn raw_row_count(&self, domain: Domain) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", raw_table(domain));
    let n: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |r| r.get(0))?))
      .await?;
    Ok(count(n))
  }

  // ── Derivation ────────────────────────────────────────────────────────────

  async fn refresh(&self, mode: RefreshMode) -> Result<RefreshOutcome> {
    info!(mode = mode.name(), "refresh started");
    match mode {
      RefreshMode::Full => {
        self.require_source_tables().await?;
        let summary = self.conn.call(|conn| Ok(derive::full(conn)?)).await?;
        Ok(RefreshOutcome::Full {
          daily_rows:     summary.daily_rows,
          monthly_totals: summary.monthly_totals,
          marker:         summary.marker,
        })
      }
      RefreshMode::Delta { month, farm, kg } => {
        let month_str = month.to_string();
        let farm_key  = farm.clone();
        let total_kg = self
          .conn
          .call(move |conn| Ok(derive::delta(conn, &month_str, &farm_key, kg)?))
          .await?;
        Ok(RefreshOutcome::Delta { month, farm, total_kg })
      }
      RefreshMode::Incremental => {
        self.require_source_tables().await?;
        let summary = self
          .conn
          .call(|conn| Ok(derive::incremental(conn)?))
          .await?;
        Ok(RefreshOutcome::Incremental {
          raw_rows: summary.raw_rows,
          marker:   summary.marker,
        })
      }
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn top_totals(&self, limit: usize) -> Result<Vec<MonthTotal>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let raws: Vec<RawTotal> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT month, farm, total_kg FROM mv_farm_month_totals
           ORDER BY month, farm LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(params![limit], |row| {
            Ok(RawTotal {
              month:    row.get(0)?,
              farm:     row.get(1)?,
              total_kg: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTotal::into_total).collect()
  }

  async fn daily_environment(
    &self,
    farm: Option<String>,
  ) -> Result<Vec<DailyEnvironment>> {
    let raws: Vec<RawDaily> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT farm, date, mean_temp, mean_humidity, mean_sand_temp,
                  mean_water_content, mean_irradiance, vpd_kpa
           FROM env_daily
           WHERE ?1 IS NULL OR farm = ?1
           ORDER BY farm, date",
        )?;
        let rows = stmt
          .query_map(params![farm], |row| {
            Ok(RawDaily {
              farm:  row.get(0)?,
              date:  row.get(1)?,
              means: means(row, 2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDaily::into_daily).collect()
  }

  async fn monthly_environment(&self) -> Result<Vec<MonthlyEnvironment>> {
    let raws: Vec<RawMonthly> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT farm, month, mean_temp, mean_humidity, mean_vpd_kpa,
                  mean_sand_temp, mean_water_content, mean_irradiance
           FROM env_monthly
           ORDER BY farm, month",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawMonthly {
              farm:  row.get(0)?,
              month: row.get(1)?,
              means: means(row, 2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMonthly::into_monthly).collect()
  }

  async fn harvest_environment(&self) -> Result<Vec<HarvestEnvironment>> {
    let raws: Vec<RawHarvestEnv> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT farm, month, mean_kg, mean_temp, mean_humid, mean_vpd_kpa,
                  mean_sand_temp, mean_water_content, mean_irradiance
           FROM v_harvest_env
           ORDER BY farm, month",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawHarvestEnv {
              farm:    row.get(0)?,
              month:   row.get(1)?,
              mean_kg: row.get(2)?,
              means:   means(row, 3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHarvestEnv::into_harvest_env).collect()
  }

  async fn table_counts(&self) -> Result<TableCounts> {
    let counts = self
      .conn
      .call(|conn| {
        let mut n = [0i64; 5];
        let tables =
          ["raw_csv", "env_raw", "env_daily", "harvest_monthly", "mv_farm_month_totals"];
        for (slot, table) in n.iter_mut().zip(tables) {
          *slot = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
        }
        Ok(n)
      })
      .await?;

    let [raw_csv, env_raw, env_daily, harvest_monthly, mv_farm_month_totals] =
      counts.map(count);
    Ok(TableCounts {
      raw_csv,
      env_raw,
      env_daily,
      harvest_monthly,
      mv_farm_month_totals,
    })
  }
}

// ─── Statement helpers ───────────────────────────────────────────────────────
//
// Run on the connection thread, inside whatever transaction the caller holds.

/// Append every record to its raw table. Returns the number of rows written.
fn append(
  conn: &rusqlite::Connection,
  batch_seq: i64,
  records: &RawRecords,
) -> rusqlite::Result<usize> {
  match records {
    RawRecords::Environment(readings) => {
      let mut stmt = conn.prepare(
        "INSERT INTO env_raw
           (farm, ts, air_temp_c, rh_percent, sand_temp_c, water_content,
            irradiance_wm2, batch_seq)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      )?;
      for r in readings {
        stmt.execute(params![
          r.farm,
          encode_ts(r.ts),
          finite(r.air_temp_c),
          finite(r.rh_percent),
          finite(r.sand_temp_c),
          finite(r.water_content),
          finite(r.irradiance_wm2),
          batch_seq,
        ])?;
      }
      Ok(readings.len())
    }
    RawRecords::Harvest(harvests) => {
      let mut stmt = conn.prepare(
        "INSERT INTO raw_csv (c1, c2, c3, c4, batch_seq)
         VALUES (?1, ?2, ?3, ?4, ?5)",
      )?;
      for h in harvests {
        stmt.execute(params![
          encode_date(h.harvest_date),
          h.company,
          h.crop,
          finite(h.amount_g),
          batch_seq,
        ])?;
      }
      Ok(harvests.len())
    }
  }
}

/// Insert-or-ignore a ledger row; a path already present is left unchanged.
fn mark(
  conn: &rusqlite::Connection,
  domain: Domain,
  batch_seq: Option<i64>,
  source: &SourceFile,
  row_count: usize,
  imported_at: &str,
) -> rusqlite::Result<()> {
  let inserted = conn.execute(
    &format!(
      "INSERT OR IGNORE INTO {}
         (path, imported_at, encoding, header_line, row_count, rejected_count,
          batch_seq)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      ledger_table(domain)
    ),
    params![
      source.path,
      imported_at,
      source.encoding,
      source.header_line as i64,
      row_count as i64,
      source.rejected_rows as i64,
      batch_seq,
    ],
  )?;
  if inserted == 0 {
    debug!(%domain, path = %source.path, "ledger entry already present");
  }
  Ok(())
}

fn ledger_contains(
  conn: &rusqlite::Connection,
  domain: Domain,
  path: &str,
) -> rusqlite::Result<bool> {
  conn
    .query_row(
      &format!("SELECT 1 FROM {} WHERE path = ?1", ledger_table(domain)),
      params![path],
      |_| Ok(true),
    )
    .optional()
    .map(|found| found.unwrap_or(false))
}
