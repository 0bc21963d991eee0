//! `farmstat`: operator CLI for the farm ingestion store.
//!
//! Reads `farmstat.toml` (or the path given with `--config`) and `FARMSTAT_*`
//! environment variables, then runs one command against the SQLite store.
//!
//! # Usage
//!
//! ```text
//! farmstat ingest env --farm FarmA
//! farmstat ingest harvest --dir /mnt/share/harvest
//! farmstat refresh --mode delta --month 2025-10 --farm FarmA --kg 5.0 --show
//! farmstat show harvest-env --json
//! farmstat status
//! ```

mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use farmstat_core::{
  aggregate::{Month, MonthTotal},
  domain::Domain,
  store::{IngestStore, RefreshKind, RefreshMode},
};
use farmstat_ingest::{IngestConfig, run_batch};
use farmstat_store_sqlite::SqliteStore;
use serde::Serialize;
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Farm sensor and harvest CSV ingestion")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "farmstat.toml")]
  config: PathBuf,

  /// Database file; overrides `store_path`, `data_dir` and `profile`.
  #[arg(long, global = true, value_name = "FILE")]
  db: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Import every new CSV file from an inbox, then rebuild aggregates.
  Ingest {
    /// `env` or `harvest`.
    domain:    Domain,
    /// Inbox directory; defaults to `<data_dir>/inbox/<domain>`.
    #[arg(long)]
    dir:       Option<PathBuf>,
    /// Farm identifier for environment readings.
    #[arg(long)]
    farm:      Option<String>,
    /// Skip the full derivation after the files.
    #[arg(long)]
    no_derive: bool,
  },

  /// Rebuild or patch the monthly aggregates.
  Refresh {
    /// `full`, `delta`, or `incremental`.
    #[arg(long, default_value = "full")]
    mode:  RefreshKind,
    /// Month for a delta, `YYYY-MM`.
    #[arg(long, default_value = "2025-10")]
    month: Month,
    /// Farm for a delta.
    #[arg(long, default_value = "FarmA")]
    farm:  String,
    /// Kilograms to add for a delta.
    #[arg(long, default_value_t = 5.0)]
    kg:    f64,
    /// Print the first monthly totals afterwards.
    #[arg(long)]
    show:  bool,
  },

  /// Print a derived table or view.
  Show {
    #[arg(value_enum)]
    view:  View,
    /// Emit JSON instead of text.
    #[arg(long)]
    json:  bool,
    /// Restrict `daily` to one farm.
    #[arg(long)]
    farm:  Option<String>,
    /// Row limit for `totals`.
    #[arg(long)]
    limit: Option<usize>,
  },

  /// Print row counts and ledger sizes.
  Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum View {
  Daily,
  Monthly,
  HarvestEnv,
  Totals,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let mut settings = Settings::load(&cli.config)?;
  if let Some(db) = cli.db {
    settings.store_path = Some(db);
  }

  match cli.command {
    Command::Ingest { domain, dir, farm, no_derive } => {
      ingest(&settings, domain, dir, farm, !no_derive).await
    }
    Command::Refresh { mode, month, farm, kg, show } => {
      let mode = match mode {
        RefreshKind::Full => RefreshMode::Full,
        RefreshKind::Delta => RefreshMode::Delta { month, farm, kg },
        RefreshKind::Incremental => RefreshMode::Incremental,
      };
      refresh(&settings, mode, show).await
    }
    Command::Show { view, json, farm, limit } => {
      show(&settings, view, json, farm, limit).await
    }
    Command::Status => status(&settings).await,
  }
}

async fn open_existing(settings: &Settings) -> anyhow::Result<SqliteStore> {
  let path = settings.store_path();
  SqliteStore::open_existing(&path)
    .await
    .with_context(|| format!("failed to open store at {}", path.display()))
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn ingest(
  settings: &Settings,
  domain: Domain,
  dir: Option<PathBuf>,
  farm: Option<String>,
  derive: bool,
) -> anyhow::Result<()> {
  let path = settings.store_path();
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&path)
    .await
    .with_context(|| format!("failed to open store at {}", path.display()))?;

  let config = IngestConfig {
    inbox: dir.unwrap_or_else(|| settings.inbox(domain)),
    domain,
    farm: farm.or_else(|| settings.env_farm.clone()),
    derive,
  };
  let report = run_batch(&store, &config)
    .await
    .with_context(|| format!("{domain} ingestion failed"))?;

  for file in &report.files {
    println!("{file}");
  }
  println!("{report}");
  if let Some(outcome) = &report.derivation {
    println!("[OK] {outcome}");
  }
  Ok(())
}

async fn refresh(
  settings: &Settings,
  mode: RefreshMode,
  show_totals: bool,
) -> anyhow::Result<()> {
  let store = open_existing(settings).await?;
  let name = mode.name();
  let outcome = store
    .refresh(mode)
    .await
    .with_context(|| format!("{name} refresh failed"))?;
  println!("[OK] {outcome}");

  if show_totals {
    print_totals(&store.top_totals(settings.show_limit).await?);
  }
  Ok(())
}

async fn show(
  settings: &Settings,
  view: View,
  json: bool,
  farm: Option<String>,
  limit: Option<usize>,
) -> anyhow::Result<()> {
  let store = open_existing(settings).await?;
  match view {
    View::Daily => {
      let rows = store.daily_environment(farm).await?;
      if json {
        return print_json(&rows);
      }
      println!("farm\tdate\ttemp\thumidity\tsand\twater\tirradiance\tvpd_kpa");
      for r in &rows {
        println!(
          "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
          r.farm,
          r.date,
          num(r.mean_temp),
          num(r.mean_humidity),
          num(r.mean_sand_temp),
          num(r.mean_water_content),
          num(r.mean_irradiance),
          num(r.vpd_kpa)
        );
      }
    }
    View::Monthly => {
      let rows = store.monthly_environment().await?;
      if json {
        return print_json(&rows);
      }
      println!("farm\tmonth\ttemp\thumidity\tvpd_kpa\tsand\twater\tirradiance");
      for r in &rows {
        println!(
          "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
          r.farm,
          r.month,
          num(r.mean_temp),
          num(r.mean_humidity),
          num(r.mean_vpd_kpa),
          num(r.mean_sand_temp),
          num(r.mean_water_content),
          num(r.mean_irradiance)
        );
      }
    }
    View::HarvestEnv => {
      let rows = store.harvest_environment().await?;
      if json {
        return print_json(&rows);
      }
      println!("farm\tmonth\tkg\ttemp\thumid\tvpd_kpa\tsand\twater\tirradiance");
      for r in &rows {
        println!(
          "{}\t{}\t{:.3}\t{}\t{}\t{}\t{}\t{}\t{}",
          r.farm,
          r.month,
          r.mean_kg,
          num(r.mean_temp),
          num(r.mean_humid),
          num(r.mean_vpd_kpa),
          num(r.mean_sand_temp),
          num(r.mean_water_content),
          num(r.mean_irradiance)
        );
      }
    }
    View::Totals => {
      let rows = store.top_totals(limit.unwrap_or(settings.show_limit)).await?;
      if json {
        return print_json(&rows);
      }
      print_totals(&rows);
    }
  }
  Ok(())
}

async fn status(settings: &Settings) -> anyhow::Result<()> {
  let store = open_existing(settings).await?;
  let counts = store.table_counts().await?;
  println!("store: {}", settings.store_path().display());
  println!("  raw_csv              {}", counts.raw_csv);
  println!("  env_raw              {}", counts.env_raw);
  println!("  env_daily            {}", counts.env_daily);
  println!("  harvest_monthly      {}", counts.harvest_monthly);
  println!("  mv_farm_month_totals {}", counts.mv_farm_month_totals);
  for domain in Domain::ALL {
    let ledger = store.imported_files(domain).await?;
    let last = ledger
      .last()
      .map(|e| e.imported_at.to_rfc3339())
      .unwrap_or_else(|| "-".to_string());
    println!("  {domain} ledger: {} files, last import {last}", ledger.len());
  }
  Ok(())
}

// ─── Output helpers ───────────────────────────────────────────────────────────

fn num(v: Option<f64>) -> String {
  v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

fn print_totals(rows: &[MonthTotal]) {
  println!("month\tfarm\ttotal_kg");
  for r in rows {
    println!("{}\t{}\t{:.3}", r.month, r.farm, r.total_kg);
  }
}

fn print_json<T: Serialize>(rows: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(rows)?);
  Ok(())
}
