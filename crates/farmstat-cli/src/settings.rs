//! Operator settings: `farmstat.toml` layered under `FARMSTAT_*` variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use farmstat_core::domain::Domain;
use serde::Deserialize;

/// Which database file a run targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbProfile {
  #[default]
  Real,
  Stage,
  Dev,
}

impl DbProfile {
  fn file_name(self) -> &'static str {
    match self {
      DbProfile::Real => "harvests_real.db",
      DbProfile::Stage => "harvests_stage.db",
      DbProfile::Dev => "harvests.db",
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// Root of the `db/` and `inbox/` directories.
  pub data_dir:      PathBuf,
  pub profile:       DbProfile,
  /// Explicit database file; overrides `data_dir` + `profile`.
  pub store_path:    Option<PathBuf>,
  pub env_inbox:     Option<PathBuf>,
  pub harvest_inbox: Option<PathBuf>,
  /// Farm identifier for environment imports when `--farm` is not given.
  pub env_farm:      Option<String>,
  /// Row limit for `refresh --show` and `show totals`.
  pub show_limit:    usize,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      data_dir:      PathBuf::from("data"),
      profile:       DbProfile::default(),
      store_path:    None,
      env_inbox:     None,
      harvest_inbox: None,
      env_farm:      None,
      show_limit:    20,
    }
  }
}

impl Settings {
  /// Read `file` (optional on disk) and the environment.
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(file.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("FARMSTAT"))
      .build()
      .with_context(|| format!("failed to read config {}", file.display()))?
      .try_deserialize()
      .context("failed to deserialise Settings")
  }

  pub fn store_path(&self) -> PathBuf {
    self
      .store_path
      .clone()
      .unwrap_or_else(|| self.data_dir.join("db").join(self.profile.file_name()))
  }

  pub fn inbox(&self, domain: Domain) -> PathBuf {
    let explicit = match domain {
      Domain::Environment => &self.env_inbox,
      Domain::Harvest => &self.harvest_inbox,
    };
    explicit
      .clone()
      .unwrap_or_else(|| self.data_dir.join("inbox").join(domain.as_str()))
  }
}
