//! Integration tests for `SqliteStore` against an in-memory database.

use std::path::Path;

use chrono::NaiveDate;
use farmstat_core::{
  aggregate::Month,
  domain::Domain,
  record::{EnvironmentReading, HarvestRecord, RawRecords, SourceFile},
  store::{ImportOutcome, IngestStore, RefreshMode, RefreshOutcome},
  vpd::vpd_kpa,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn source(path: &str) -> SourceFile {
  SourceFile {
    path:          path.to_string(),
    encoding:      "utf-8".to_string(),
    header_line:   0,
    rejected_rows: 0,
  }
}

fn reading(farm: &str, ts: &str, temp: f64, rh: Option<f64>) -> EnvironmentReading {
  EnvironmentReading {
    farm:           farm.to_string(),
    ts:             chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M")
      .unwrap(),
    air_temp_c:     Some(temp),
    rh_percent:     rh,
    sand_temp_c:    Some(18.0),
    water_content:  Some(0.3),
    irradiance_wm2: None,
  }
}

fn harvest(date: &str, company: Option<&str>, grams: f64) -> HarvestRecord {
  HarvestRecord {
    harvest_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
    company:      company.map(str::to_string),
    crop:         Some("トマト".to_string()),
    amount_g:     Some(grams),
  }
}

/// Import `records` under a fresh batch; panics unless rows were written.
async fn import(s: &SqliteStore, path: &str, records: RawRecords) -> i64 {
  let batch = s.begin_batch(records.domain()).await.unwrap();
  let outcome = s.import_file(batch.seq, source(path), records).await.unwrap();
  assert!(matches!(outcome, ImportOutcome::Imported { .. }));
  batch.seq
}

fn month(s: &str) -> Month { s.parse().unwrap() }

// ─── Batches and ledger ──────────────────────────────────────────────────────

#[tokio::test]
async fn batch_sequence_increases() {
  let s = store().await;
  let a = s.begin_batch(Domain::Environment).await.unwrap();
  let b = s.begin_batch(Domain::Harvest).await.unwrap();
  assert!(b.seq > a.seq);
  assert_ne!(a.run_id, b.run_id);
  assert_eq!(b.domain, Domain::Harvest);
}

#[tokio::test]
async fn duplicate_mark_is_a_no_op() {
  let s = store().await;
  let path = "/inbox/env/a.csv";

  assert!(!s.has_been_imported(Domain::Environment, path.into()).await.unwrap());
  s.mark_imported(Domain::Environment, None, source(path), 3).await.unwrap();
  s.mark_imported(Domain::Environment, None, source(path), 99).await.unwrap();
  assert!(s.has_been_imported(Domain::Environment, path.into()).await.unwrap());

  let ledger = s.imported_files(Domain::Environment).await.unwrap();
  assert_eq!(ledger.len(), 1);
  assert_eq!(ledger[0].row_count, 3);
  assert_eq!(ledger[0].source.path, path);
}

#[tokio::test]
async fn ledgers_are_per_domain() {
  let s = store().await;
  let path = "/inbox/shared.csv";
  s.mark_imported(Domain::Harvest, None, source(path), 1).await.unwrap();
  assert!(s.has_been_imported(Domain::Harvest, path.into()).await.unwrap());
  assert!(!s.has_been_imported(Domain::Environment, path.into()).await.unwrap());
}

#[tokio::test]
async fn reimporting_a_path_writes_nothing() {
  let s = store().await;
  let records = RawRecords::Environment(vec![reading(
    "FarmA",
    "2025-10-01 00:00",
    20.0,
    Some(80.0),
  )]);

  let seq = import(&s, "/inbox/env/a.csv", records.clone()).await;
  let n1 = s.raw_row_count(Domain::Environment).await.unwrap();

  let again = s.import_file(seq, source("/inbox/env/a.csv"), records).await.unwrap();
  assert_eq!(again, ImportOutcome::AlreadyImported);
  let n2 = s.raw_row_count(Domain::Environment).await.unwrap();
  assert_eq!(n1, n2);
  assert_eq!(n1, 1);
}

#[tokio::test]
async fn import_records_ledger_metadata() {
  let s = store().await;
  let batch = s.begin_batch(Domain::Harvest).await.unwrap();
  let src = SourceFile {
    path:          "/inbox/harvest/h.csv".into(),
    encoding:      "cp932".into(),
    header_line:   2,
    rejected_rows: 1,
  };
  let records = RawRecords::Harvest(vec![
    harvest("2025-08-17", Some("FarmA"), 1200.0),
    harvest("2025-08-18", Some("FarmA"), 800.0),
  ]);
  s.import_file(batch.seq, src.clone(), records).await.unwrap();

  let ledger = s.imported_files(Domain::Harvest).await.unwrap();
  assert_eq!(ledger.len(), 1);
  assert_eq!(ledger[0].source, src);
  assert_eq!(ledger[0].row_count, 2);
  assert_eq!(ledger[0].batch_seq, Some(batch.seq));
  assert_eq!(ledger[0].domain, Domain::Harvest);
}

// ─── Full refresh ────────────────────────────────────────────────────────────

#[tokio::test]
async fn identical_readings_in_two_files_average_into_one_day() {
  let s = store().await;
  let batch = s.begin_batch(Domain::Environment).await.unwrap();
  for (path, temp, rh) in [("/inbox/env/a.csv", 20.0, 80.0), ("/inbox/env/b.csv", 22.0, 60.0)] {
    let records =
      RawRecords::Environment(vec![reading("FarmA", "2025-10-01 00:00", temp, Some(rh))]);
    s.import_file(batch.seq, source(path), records).await.unwrap();
  }
  assert_eq!(s.raw_row_count(Domain::Environment).await.unwrap(), 2);

  s.refresh(RefreshMode::Full).await.unwrap();
  let daily = s.daily_environment(None).await.unwrap();
  assert_eq!(daily.len(), 1);
  let day = &daily[0];
  assert_eq!(day.farm, "FarmA");
  assert_eq!(day.date, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
  assert_eq!(day.mean_temp, Some(21.0));
  assert_eq!(day.mean_humidity, Some(70.0));
  assert_eq!(day.mean_irradiance, None);
  let vpd = day.vpd_kpa.unwrap();
  assert!((vpd - vpd_kpa(21.0, 70.0)).abs() < 1e-9, "vpd={vpd}");
}

#[tokio::test]
async fn missing_humidity_leaves_vpd_null() {
  let s = store().await;
  import(
    &s,
    "/inbox/env/a.csv",
    RawRecords::Environment(vec![reading("FarmA", "2025-10-01 06:00", 20.0, None)]),
  )
  .await;

  s.refresh(RefreshMode::Full).await.unwrap();
  let daily = s.daily_environment(Some("FarmA".into())).await.unwrap();
  assert_eq!(daily[0].mean_temp, Some(20.0));
  assert_eq!(daily[0].vpd_kpa, None);
}

#[tokio::test]
async fn readings_split_by_calendar_day_and_farm() {
  let s = store().await;
  import(
    &s,
    "/inbox/env/a.csv",
    RawRecords::Environment(vec![
      reading("FarmA", "2025-10-01 23:50", 20.0, Some(80.0)),
      reading("FarmA", "2025-10-02 00:10", 10.0, Some(80.0)),
      reading("FarmB", "2025-10-01 12:00", 30.0, Some(50.0)),
    ]),
  )
  .await;

  s.refresh(RefreshMode::Full).await.unwrap();
  assert_eq!(s.daily_environment(None).await.unwrap().len(), 3);
  let farm_a = s.daily_environment(Some("FarmA".into())).await.unwrap();
  assert_eq!(farm_a.len(), 2);
  assert_eq!(farm_a[0].mean_temp, Some(20.0));
  assert_eq!(farm_a[1].mean_temp, Some(10.0));

  let monthly = s.monthly_environment().await.unwrap();
  assert_eq!(monthly.len(), 2);
  assert_eq!(monthly[0].farm, "FarmA");
  assert_eq!(monthly[0].month, month("2025-10"));
  assert_eq!(monthly[0].mean_temp, Some(15.0));
}

#[tokio::test]
async fn full_refresh_twice_is_idempotent() {
  let s = store().await;
  import(
    &s,
    "/inbox/env/a.csv",
    RawRecords::Environment(vec![
      reading("FarmA", "2025-10-01 00:00", 20.0, Some(80.0)),
      reading("FarmA", "2025-10-03 00:00", 24.0, Some(60.0)),
    ]),
  )
  .await;
  import(
    &s,
    "/inbox/harvest/h.csv",
    RawRecords::Harvest(vec![harvest("2025-10-05", Some("FarmA"), 1500.0)]),
  )
  .await;

  let first = s.refresh(RefreshMode::Full).await.unwrap();
  let daily = s.daily_environment(None).await.unwrap();
  let monthly = s.monthly_environment().await.unwrap();
  let joined = s.harvest_environment().await.unwrap();
  let totals = s.top_totals(20).await.unwrap();

  let second = s.refresh(RefreshMode::Full).await.unwrap();
  assert_eq!(first, second);
  assert_eq!(s.daily_environment(None).await.unwrap(), daily);
  assert_eq!(s.monthly_environment().await.unwrap(), monthly);
  assert_eq!(s.harvest_environment().await.unwrap(), joined);
  assert_eq!(s.top_totals(20).await.unwrap(), totals);
}

#[tokio::test]
async fn harvest_totals_in_kg_without_companyless_rows() {
  let s = store().await;
  import(
    &s,
    "/inbox/harvest/h.csv",
    RawRecords::Harvest(vec![
      harvest("2025-08-17", Some("FarmA"), 1200.0),
      harvest("2025-08-30", Some("FarmA"), 800.0),
      harvest("2025-09-01", Some("FarmA"), 500.0),
      harvest("2025-08-17", Some("FarmB"), 250.0),
      harvest("2025-08-17", None, 9999.0),
    ]),
  )
  .await;

  let outcome = s.refresh(RefreshMode::Full).await.unwrap();
  match outcome {
    RefreshOutcome::Full { daily_rows, monthly_totals, marker } => {
      assert_eq!(daily_rows, None);
      assert_eq!(monthly_totals, 3);
      assert!(marker > 0);
    }
    other => panic!("expected full outcome, got {other:?}"),
  }

  let totals = s.top_totals(20).await.unwrap();
  let flat: Vec<(String, String, f64)> = totals
    .into_iter()
    .map(|t| (t.month.to_string(), t.farm, t.total_kg))
    .collect();
  assert_eq!(flat, vec![
    ("2025-08".to_string(), "FarmA".to_string(), 2.0),
    ("2025-08".to_string(), "FarmB".to_string(), 0.25),
    ("2025-09".to_string(), "FarmA".to_string(), 0.5),
  ]);
  assert_eq!(s.top_totals(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn harvest_without_environment_joins_to_nulls() {
  let s = store().await;
  import(
    &s,
    "/inbox/env/a.csv",
    RawRecords::Environment(vec![reading("FarmA", "2025-10-01 00:00", 20.0, Some(80.0))]),
  )
  .await;
  import(
    &s,
    "/inbox/harvest/h.csv",
    RawRecords::Harvest(vec![
      harvest("2025-10-05", Some("FarmA"), 1000.0),
      harvest("2025-10-05", Some("FarmB"), 3000.0),
    ]),
  )
  .await;
  s.refresh(RefreshMode::Full).await.unwrap();

  let joined = s.harvest_environment().await.unwrap();
  assert_eq!(joined.len(), 2);
  assert_eq!(joined[0].farm, "FarmA");
  assert_eq!(joined[0].mean_kg, 1.0);
  assert_eq!(joined[0].mean_temp, Some(20.0));
  assert_eq!(joined[0].mean_humid, Some(80.0));
  assert_eq!(joined[1].farm, "FarmB");
  assert_eq!(joined[1].mean_kg, 3.0);
  assert_eq!(joined[1].mean_temp, None);
  assert_eq!(joined[1].mean_vpd_kpa, None);
}

// ─── Delta and incremental ───────────────────────────────────────────────────

#[tokio::test]
async fn delta_upsert_is_additive() {
  let s = store().await;
  let mode = RefreshMode::Delta {
    month: month("2025-10"),
    farm:  "FarmA".into(),
    kg:    5.0,
  };

  s.refresh(mode.clone()).await.unwrap();
  let totals = s.top_totals(20).await.unwrap();
  assert_eq!(totals.len(), 1);
  assert_eq!(totals[0].total_kg, 5.0);

  let outcome = s.refresh(mode).await.unwrap();
  assert_eq!(outcome, RefreshOutcome::Delta {
    month:    month("2025-10"),
    farm:     "FarmA".into(),
    total_kg: 10.0,
  });
  let totals = s.top_totals(20).await.unwrap();
  assert_eq!(totals.len(), 1);
  assert_eq!(totals[0].total_kg, 10.0);
}

#[tokio::test]
async fn full_refresh_discards_manual_deltas() {
  let s = store().await;
  import(
    &s,
    "/inbox/harvest/h.csv",
    RawRecords::Harvest(vec![harvest("2025-10-05", Some("FarmA"), 2000.0)]),
  )
  .await;
  s.refresh(RefreshMode::Full).await.unwrap();
  s.refresh(RefreshMode::Delta {
    month: month("2025-10"),
    farm:  "FarmA".into(),
    kg:    5.0,
  })
  .await
  .unwrap();
  assert_eq!(s.top_totals(20).await.unwrap()[0].total_kg, 7.0);

  s.refresh(RefreshMode::Full).await.unwrap();
  assert_eq!(s.top_totals(20).await.unwrap()[0].total_kg, 2.0);
}

#[tokio::test]
async fn incremental_after_full_does_not_double_count() {
  let s = store().await;
  import(
    &s,
    "/inbox/harvest/a.csv",
    RawRecords::Harvest(vec![harvest("2025-10-05", Some("FarmA"), 2000.0)]),
  )
  .await;
  s.refresh(RefreshMode::Full).await.unwrap();

  // Nothing new since the full refresh.
  let idle = s.refresh(RefreshMode::Incremental).await.unwrap();
  assert!(matches!(idle, RefreshOutcome::Incremental { raw_rows: 0, .. }));
  assert_eq!(s.top_totals(20).await.unwrap()[0].total_kg, 2.0);

  let seq = import(
    &s,
    "/inbox/harvest/b.csv",
    RawRecords::Harvest(vec![
      harvest("2025-10-20", Some("FarmA"), 1000.0),
      harvest("2025-11-01", Some("FarmB"), 500.0),
    ]),
  )
  .await;
  let outcome = s.refresh(RefreshMode::Incremental).await.unwrap();
  assert_eq!(outcome, RefreshOutcome::Incremental { raw_rows: 2, marker: seq });

  let incremental = s.top_totals(20).await.unwrap();
  assert_eq!(incremental.len(), 2);
  assert_eq!(incremental[0].total_kg, 3.0);
  assert_eq!(incremental[1].total_kg, 0.5);

  // A full rebuild agrees with the incremental result.
  s.refresh(RefreshMode::Full).await.unwrap();
  assert_eq!(s.top_totals(20).await.unwrap(), incremental);
}

#[tokio::test]
async fn incremental_from_scratch_covers_all_raw_rows() {
  let s = store().await;
  import(
    &s,
    "/inbox/harvest/a.csv",
    RawRecords::Harvest(vec![harvest("2025-10-05", Some("FarmA"), 2000.0)]),
  )
  .await;
  import(
    &s,
    "/inbox/harvest/b.csv",
    RawRecords::Harvest(vec![harvest("2025-10-06", Some("FarmA"), 1000.0)]),
  )
  .await;

  s.refresh(RefreshMode::Incremental).await.unwrap();
  let counts = s.table_counts().await.unwrap();
  assert_eq!(counts.raw_csv, 2);
  assert_eq!(counts.harvest_monthly, 1);
  assert_eq!(counts.mv_farm_month_totals, 1);
  assert_eq!(s.top_totals(20).await.unwrap()[0].total_kg, 3.0);
}

// ─── Rollback ────────────────────────────────────────────────────────────────

/// Make every insert into `table` fail, through a second connection.
fn fail_inserts_into(path: &Path, table: &str) {
  let conn = rusqlite::Connection::open(path).unwrap();
  conn
    .execute_batch(&format!(
      "CREATE TRIGGER fail_{table} BEFORE INSERT ON {table}
       BEGIN SELECT RAISE(ABORT, 'insert refused'); END;"
    ))
    .unwrap();
}

#[tokio::test]
async fn failed_ledger_write_leaves_no_raw_rows() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("harvests.db");
  let s = SqliteStore::open(&path).await.unwrap();
  fail_inserts_into(&path, "env_import_log");

  let batch = s.begin_batch(Domain::Environment).await.unwrap();
  let result = s
    .import_file(
      batch.seq,
      source("/inbox/env/a.csv"),
      RawRecords::Environment(vec![
        reading("FarmA", "2025-10-01 00:00", 20.0, Some(80.0)),
        reading("FarmA", "2025-10-01 00:10", 21.0, Some(78.0)),
      ]),
    )
    .await;

  assert!(result.is_err());
  assert_eq!(s.raw_row_count(Domain::Environment).await.unwrap(), 0);
  assert!(
    !s.has_been_imported(Domain::Environment, "/inbox/env/a.csv".into())
      .await
      .unwrap()
  );
}

#[tokio::test]
async fn failed_full_refresh_keeps_previous_aggregates() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("harvests.db");
  let s = SqliteStore::open(&path).await.unwrap();
  import(
    &s,
    "/inbox/env/a.csv",
    RawRecords::Environment(vec![reading("FarmA", "2025-10-01 00:00", 20.0, Some(80.0))]),
  )
  .await;
  s.refresh(RefreshMode::Full).await.unwrap();
  let daily = s.daily_environment(None).await.unwrap();
  let monthly = s.monthly_environment().await.unwrap();
  assert_eq!(daily.len(), 1);

  import(
    &s,
    "/inbox/env/b.csv",
    RawRecords::Environment(vec![reading("FarmA", "2025-10-02 00:00", 24.0, Some(60.0))]),
  )
  .await;
  fail_inserts_into(&path, "env_daily");

  assert!(s.refresh(RefreshMode::Full).await.is_err());
  assert_eq!(s.daily_environment(None).await.unwrap(), daily);
  assert_eq!(s.monthly_environment().await.unwrap(), monthly);
}

// ─── Preconditions ───────────────────────────────────────────────────────────

#[tokio::test]
async fn open_existing_requires_the_file() {
  let dir = tempfile::tempdir().unwrap();
  let missing = dir.path().join("db").join("harvests.db");
  match SqliteStore::open_existing(&missing).await {
    Err(Error::DatabaseNotFound(path)) => assert_eq!(path, missing),
    Err(other) => panic!("expected DatabaseNotFound, got {other:?}"),
    Ok(_) => panic!("expected DatabaseNotFound, got a store"),
  }
}

#[tokio::test]
async fn refresh_without_raw_tables_is_refused() {
  let file = tempfile::NamedTempFile::new().unwrap();
  let s = SqliteStore::open_existing(file.path()).await.unwrap();

  match s.refresh(RefreshMode::Full).await {
    Err(Error::MissingSourceTables(tables)) => {
      assert_eq!(tables, vec!["env_raw", "raw_csv"]);
    }
    other => panic!("expected MissingSourceTables, got {other:?}"),
  }
  assert!(matches!(
    s.refresh(RefreshMode::Incremental).await,
    Err(Error::MissingSourceTables(_))
  ));
}

#[tokio::test]
async fn on_disk_store_reopens_with_data() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("harvests.db");
  {
    let s = SqliteStore::open(&path).await.unwrap();
    import(
      &s,
      "/inbox/env/a.csv",
      RawRecords::Environment(vec![reading("FarmA", "2025-10-01 00:00", 20.0, Some(80.0))]),
    )
    .await;
  }

  let s = SqliteStore::open_existing(&path).await.unwrap();
  let outcome = s.refresh(RefreshMode::Full).await.unwrap();
  assert!(matches!(outcome, RefreshOutcome::Full { daily_rows: Some(1), .. }));
  let counts = s.table_counts().await.unwrap();
  assert_eq!(counts.env_raw, 1);
  assert_eq!(counts.env_daily, 1);
}
