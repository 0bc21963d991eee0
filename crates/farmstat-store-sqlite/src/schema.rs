//! SQL schema for the farmstat SQLite store.
//!
//! Split in two: the raw side (batches, raw tables, ledgers) is created only
//! by stores opened for ingestion; the derived side is created by every open,
//! including `open_existing`, which must not invent raw tables.

/// Raw tables, ledgers, and batch bookkeeping. Idempotent.
pub const RAW_SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS ingest_batches (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id     TEXT NOT NULL,
    domain     TEXT NOT NULL,   -- 'env' | 'harvest'
    started_at TEXT NOT NULL    -- RFC 3339 UTC
);

-- Raw tables are strictly append-only.
-- No UPDATE or DELETE is ever issued against them.
CREATE TABLE IF NOT EXISTS env_raw (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    farm           TEXT NOT NULL,
    ts             TEXT NOT NULL,   -- 'YYYY-MM-DD HH:MM:SS[.fff]'
    air_temp_c     REAL,
    rh_percent     REAL,
    sand_temp_c    REAL,
    water_content  REAL,
    irradiance_wm2 REAL,
    batch_seq      INTEGER NOT NULL REFERENCES ingest_batches(seq)
);

CREATE TABLE IF NOT EXISTS raw_csv (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    c1        TEXT NOT NULL,   -- harvest date, 'YYYY-MM-DD'
    c2        TEXT,            -- company
    c3        TEXT,            -- crop
    c4        REAL,            -- grams
    batch_seq INTEGER NOT NULL REFERENCES ingest_batches(seq)
);

CREATE TABLE IF NOT EXISTS env_import_log (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    path           TEXT NOT NULL UNIQUE,
    imported_at    TEXT NOT NULL,
    encoding       TEXT NOT NULL,
    header_line    INTEGER NOT NULL,
    row_count      INTEGER NOT NULL,
    rejected_count INTEGER NOT NULL DEFAULT 0,
    batch_seq      INTEGER
);

CREATE TABLE IF NOT EXISTS harvest_import_log (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    path           TEXT NOT NULL UNIQUE,
    imported_at    TEXT NOT NULL,
    encoding       TEXT NOT NULL,
    header_line    INTEGER NOT NULL,
    row_count      INTEGER NOT NULL,
    rejected_count INTEGER NOT NULL DEFAULT 0,
    batch_seq      INTEGER
);

CREATE INDEX IF NOT EXISTS env_raw_farm_ts_idx   ON env_raw(farm, ts);
CREATE INDEX IF NOT EXISTS env_raw_batch_idx     ON env_raw(batch_seq);
CREATE INDEX IF NOT EXISTS raw_csv_batch_idx     ON raw_csv(batch_seq);
";

/// Derived tables, views, and the reconciliation marker. Idempotent.
pub const DERIVED_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS env_daily (
    farm               TEXT NOT NULL,
    date               TEXT NOT NULL,   -- 'YYYY-MM-DD'
    mean_temp          REAL,
    mean_humidity      REAL,
    mean_sand_temp     REAL,
    mean_water_content REAL,
    mean_irradiance    REAL,
    vpd_kpa            REAL,
    PRIMARY KEY (farm, date)
);

CREATE TABLE IF NOT EXISTS harvest_monthly (
    month    TEXT NOT NULL,   -- 'YYYY-MM'
    farm     TEXT NOT NULL,
    total_kg REAL NOT NULL,
    PRIMARY KEY (month, farm)
);

CREATE TABLE IF NOT EXISTS mv_farm_month_totals (
    month    TEXT NOT NULL,
    farm     TEXT NOT NULL,
    total_kg REAL NOT NULL,
    PRIMARY KEY (month, farm)
);

-- Highest raw_csv.batch_seq already reflected in the harvest aggregates.
CREATE TABLE IF NOT EXISTS derivation_state (
    name     TEXT PRIMARY KEY,
    last_seq INTEGER NOT NULL
);
";

/// Monthly averages of `env_daily`.
pub const ENV_MONTHLY_VIEW: &str = "
CREATE VIEW IF NOT EXISTS env_monthly AS
SELECT
    farm,
    strftime('%Y-%m', date) AS month,
    AVG(mean_temp)          AS mean_temp,
    AVG(mean_humidity)      AS mean_humidity,
    AVG(vpd_kpa)            AS mean_vpd_kpa,
    AVG(mean_sand_temp)     AS mean_sand_temp,
    AVG(mean_water_content) AS mean_water_content,
    AVG(mean_irradiance)    AS mean_irradiance
FROM env_daily
GROUP BY farm, month;
";

/// Monthly harvest totals left-joined with the monthly environment.
pub const HARVEST_ENV_VIEW: &str = "
CREATE VIEW IF NOT EXISTS v_harvest_env AS
SELECT
    h.farm,
    h.month,
    h.total_kg       AS mean_kg,
    e.mean_temp,
    e.mean_humidity  AS mean_humid,
    e.mean_vpd_kpa,
    e.mean_sand_temp,
    e.mean_water_content,
    e.mean_irradiance
FROM harvest_monthly h
LEFT JOIN env_monthly e
  ON h.farm  = e.farm
 AND h.month = e.month;
";

/// Tables a refresh reads from.
pub const RAW_SOURCE_TABLES: &[&str] = &["env_raw", "raw_csv"];
