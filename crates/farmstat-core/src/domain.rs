//! Data domains: the two independent families of source files.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Which raw table a source file feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
  /// Data-logger exports with CH1..CH5 channels.
  #[serde(rename = "env")]
  Environment,
  /// Spreadsheet harvest exports with free-text Japanese headers.
  Harvest,
}

impl Domain {
  pub const ALL: [Domain; 2] = [Domain::Environment, Domain::Harvest];

  pub fn as_str(self) -> &'static str {
    match self {
      Domain::Environment => "env",
      Domain::Harvest => "harvest",
    }
  }
}

impl fmt::Display for Domain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Domain {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "env" | "environment" => Ok(Domain::Environment),
      "harvest" => Ok(Domain::Harvest),
      other => Err(Error::UnknownDomain(other.to_string())),
    }
  }
}
