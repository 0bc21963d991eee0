//! Per-domain parsing profiles.
//!
//! A profile bundles everything vendor-specific about a family of exports:
//! which encodings to try, how to recognise the header row, how fields are
//! delimited, and how columns map to roles.

use std::sync::OnceLock;

use farmstat_core::domain::Domain;
use regex::Regex;

use crate::{
  detect::TextEncoding,
  resolve::{MatchRule, Role, RoleRules},
};

/// How a data line splits into fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
  /// A comma, a tab, or a comma+tab pair separates fields; quotes are
  /// stripped from field edges. Empty fields keep their position.
  CommaOrTab,
  /// Quoted comma-separated values.
  Comma,
}

#[derive(Debug)]
pub struct Profile {
  pub domain:    Domain,
  /// Candidate encodings, most likely first.
  pub encodings: &'static [TextEncoding],
  /// Both must match a line for it to count as the header row.
  pub markers:   [Regex; 2],
  pub delimiter: Delimiter,
  /// One cascade per required role, in output order.
  pub roles:     Vec<RoleRules>,
}

impl Profile {
  pub fn for_domain(domain: Domain) -> &'static Profile {
    static ENVIRONMENT: OnceLock<Profile> = OnceLock::new();
    static HARVEST: OnceLock<Profile> = OnceLock::new();
    match domain {
      Domain::Environment => ENVIRONMENT.get_or_init(environment),
      Domain::Harvest => HARVEST.get_or_init(harvest),
    }
  }
}

fn regex(pattern: &str) -> Regex {
  Regex::new(pattern).expect("valid profile regex")
}

/// CH`n` exactly, tolerating separators and zero padding; then CH`n` followed
/// by a unit or label suffix.
fn channel(role: Role, n: u8) -> RoleRules {
  RoleRules::new(role, vec![
    MatchRule::Pattern(regex(&format!(r"(?i)^ch[_\-]*0*{n}$"))),
    MatchRule::Pattern(regex(&format!(r"(?i)^ch[_\-]*0*{n}\b"))),
  ])
}

fn environment() -> Profile {
  Profile {
    domain:    Domain::Environment,
    encodings: &[
      TextEncoding::Utf8Sig,
      TextEncoding::Utf8,
      TextEncoding::Utf16Le,
      TextEncoding::Cp932,
    ],
    markers:   [regex(r"(?i)\bCH\s*0*1\b"), regex(r"(?i)\bCH\s*0*2\b")],
    delimiter: Delimiter::CommaOrTab,
    roles:     vec![
      RoleRules::new(Role::Timestamp, vec![
        MatchRule::Exact(&["time", "時刻", "datetime", "日付時刻"]),
        MatchRule::Contains(&["time"]),
        MatchRule::Contains(&["日付", "日時", "時間"]),
        MatchRule::Position(1),
      ]),
      channel(Role::AirTemp, 1),
      channel(Role::Humidity, 2),
      channel(Role::SandTemp, 3),
      channel(Role::WaterContent, 4),
      channel(Role::Irradiance, 5),
    ],
  }
}

fn harvest() -> Profile {
  Profile {
    domain:    Domain::Harvest,
    encodings: &[TextEncoding::Cp932, TextEncoding::Utf8Sig, TextEncoding::Utf8],
    markers:   [regex("収穫日|日付"), regex("企業名|会社名")],
    delimiter: Delimiter::Comma,
    roles:     vec![
      RoleRules::new(Role::HarvestDate, vec![
        MatchRule::Exact(&["収穫日", "日付"]),
        MatchRule::Contains(&["収穫日", "日付"]),
      ]),
      RoleRules::new(Role::Company, vec![MatchRule::Contains(&["企業名", "会社名"])]),
      RoleRules::new(Role::Crop, vec![MatchRule::Contains(&[
        "収穫野菜名",
        "品目",
        "作物",
      ])]),
      RoleRules::new(Role::Amount, vec![
        MatchRule::Contains(&["収穫量"]),
        MatchRule::Contains(&["量", "ｇ", "g"]),
      ]),
    ],
  }
}
