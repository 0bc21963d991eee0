//! Column resolution: header names → semantic roles.
//!
//! Each role owns an ordered cascade of [`MatchRule`]s. Rules are tried in
//! order; the first rule that singles out exactly one column wins. A rule
//! that matches several columns is ambiguous and is skipped, so the outcome
//! does not depend on column order.
//!
//! Name-based rules run for every role before any positional fallback, and a
//! positional rule never takes a column another role already holds. Two
//! roles that still land on one column fail resolution.

use std::fmt;

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};

// ─── Roles ───────────────────────────────────────────────────────────────────

/// A semantic field a source column can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
  Timestamp,
  AirTemp,
  Humidity,
  SandTemp,
  WaterContent,
  Irradiance,
  HarvestDate,
  Company,
  Crop,
  Amount,
}

impl Role {
  /// The raw-table column this role is written to.
  pub fn column(self) -> &'static str {
    match self {
      Role::Timestamp => "ts",
      Role::AirTemp => "air_temp_c",
      Role::Humidity => "rh_percent",
      Role::SandTemp => "sand_temp_c",
      Role::WaterContent => "water_content",
      Role::Irradiance => "irradiance_wm2",
      Role::HarvestDate => "c1",
      Role::Company => "c2",
      Role::Crop => "c3",
      Role::Amount => "c4",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.column())
  }
}

// ─── Rules ───────────────────────────────────────────────────────────────────

/// One step of a role's matching cascade.
#[derive(Debug, Clone)]
pub enum MatchRule {
  /// Case-insensitive equality with any alias.
  Exact(&'static [&'static str]),
  /// Case-insensitive containment of any token.
  Contains(&'static [&'static str]),
  /// Regex match against the whole (normalized) column name.
  Pattern(Regex),
  /// The column at this zero-based position, if the header is that wide.
  Position(usize),
}

impl MatchRule {
  /// Indices of all columns this rule accepts.
  fn candidates(&self, columns: &[String]) -> Vec<usize> {
    match self {
      MatchRule::Exact(aliases) => indices_where(columns, |c: &str| {
        let c = c.to_lowercase();
        aliases.iter().any(|a| a.to_lowercase() == c)
      }),
      MatchRule::Contains(tokens) => indices_where(columns, |c: &str| {
        let c = c.to_lowercase();
        tokens.iter().any(|t| c.contains(&t.to_lowercase()))
      }),
      MatchRule::Pattern(re) => indices_where(columns, |c: &str| re.is_match(c)),
      MatchRule::Position(i) => {
        if *i < columns.len() { vec![*i] } else { vec![] }
      }
    }
  }
}

fn indices_where(columns: &[String], pred: impl Fn(&str) -> bool) -> Vec<usize> {
  columns
    .iter()
    .enumerate()
    .filter(|(_, c)| pred(c.as_str()))
    .map(|(i, _)| i)
    .collect()
}

/// The cascade for one role.
#[derive(Debug, Clone)]
pub struct RoleRules {
  pub role:  Role,
  pub rules: Vec<MatchRule>,
}

impl RoleRules {
  pub fn new(role: Role, rules: Vec<MatchRule>) -> Self { Self { role, rules } }

  /// Run the name-based rules (`positional == false`) or the positional
  /// ones of the cascade, ignoring columns in `claimed`. `None` if no rule
  /// singles out a column.
  fn resolve_pass(
    &self,
    columns: &[String],
    positional: bool,
    claimed: &[usize],
  ) -> Option<usize> {
    let steps = self
      .rules
      .iter()
      .enumerate()
      .filter(|(_, rule)| matches!(rule, MatchRule::Position(_)) == positional);
    for (step, rule) in steps {
      let mut candidates = rule.candidates(columns);
      candidates.retain(|i| !claimed.contains(i));
      match candidates.as_slice() {
        [] => {}
        [only] => {
          debug!(role = %self.role, step, column = %columns[*only], "column resolved");
          return Some(*only);
        }
        many => {
          debug!(role = %self.role, step, matches = many.len(), "ambiguous rule skipped");
        }
      }
    }
    None
  }
}

// ─── Header normalization ────────────────────────────────────────────────────

/// Strip surrounding quotes and delete every whitespace character, including
/// the ideographic space (U+3000), so `"CH 1"` and `CH1` compare equal.
pub fn normalize_header(name: &str) -> String {
  name
    .trim()
    .trim_matches('"')
    .chars()
    .filter(|c| !c.is_whitespace())
    .collect()
}

// ─── Column map ──────────────────────────────────────────────────────────────

/// The outcome of resolving a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
  columns:  Vec<String>,
  resolved: Vec<(Role, usize)>,
}

impl ColumnMap {
  pub fn index(&self, role: Role) -> Option<usize> {
    self
      .resolved
      .iter()
      .find(|(r, _)| *r == role)
      .map(|(_, i)| *i)
  }

  /// The header name resolved for `role`.
  pub fn name(&self, role: Role) -> Option<&str> {
    self.index(role).map(|i| self.columns[i].as_str())
  }
}

/// Resolve every role in `roles` against `columns` (already normalized).
///
/// Fails with [`Error::ColumnResolution`] naming every role left unresolved.
pub fn resolve(columns: &[String], roles: &[RoleRules]) -> Result<ColumnMap> {
  let by_name: Vec<Option<usize>> = roles
    .iter()
    .map(|rules| rules.resolve_pass(columns, false, &[]))
    .collect();
  let mut claimed: Vec<usize> = by_name.iter().flatten().copied().collect();

  let mut resolved = Vec::with_capacity(roles.len());
  let mut unresolved = Vec::new();
  for (rules, found) in roles.iter().zip(by_name) {
    let found = found.or_else(|| {
      let i = rules.resolve_pass(columns, true, &claimed)?;
      claimed.push(i);
      Some(i)
    });
    match found {
      Some(i) => resolved.push((rules.role, i)),
      None => unresolved.push(rules.role),
    }
  }

  // Name rules of two roles may still pick the same column.
  let shared: Vec<Role> = resolved
    .iter()
    .filter(|(_, i)| resolved.iter().filter(|(_, j)| j == i).count() > 1)
    .map(|(role, _)| *role)
    .collect();
  if !shared.is_empty() {
    debug!(roles = ?shared, "roles share a column");
    unresolved.extend(shared);
  }

  if !unresolved.is_empty() {
    return Err(Error::ColumnResolution {
      unresolved,
      columns: columns.to_vec(),
    });
  }

  Ok(ColumnMap { columns: columns.to_vec(), resolved })
}
