//! CSV codec for farmstat.
//!
//! Turns the bytes of a logger or harvest export into typed
//! [`farmstat_core::record::RawRecords`]. Pure synchronous; no filesystem or
//! database access.
//!
//! Parsing runs in four stages: encoding and header-row detection
//! ([`detect`]), field splitting, column resolution ([`resolve`]), and row
//! normalization ([`normalize`]). The vendor-specific knobs of each stage live
//! in a per-domain [`Profile`].
//!
//! # Quick start
//!
//! ```no_run
//! use farmstat_core::domain::Domain;
//! use farmstat_csv::{Profile, parse};
//!
//! let bytes = std::fs::read("inbox/env/logger.csv").unwrap();
//! let parsed = parse(&bytes, Profile::for_domain(Domain::Environment), "FarmA").unwrap();
//! println!("{} rows via {}", parsed.records.len(), parsed.encoding);
//! ```

pub mod detect;
pub mod error;
pub mod normalize;
pub mod profile;
pub mod resolve;

pub use detect::{Detection, TextEncoding, detect};
pub use error::{Error, Result};
use farmstat_core::record::{RawRecords, SourceFile};
pub use profile::{Delimiter, Profile};
pub use resolve::{ColumnMap, Role};
use tracing::debug;

// ─── Public types
// ─────────────────────────────────────────────────────────────

/// The result of parsing one source file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
  pub encoding:    TextEncoding,
  /// Zero-based line index of the header row in the decoded text.
  pub header_line: usize,
  pub columns:     ColumnMap,
  pub records:     RawRecords,
  /// Data rows dropped because their timestamp (or harvest date) did not
  /// parse.
  pub rejected:    usize,
}

impl ParsedFile {
  /// Ledger metadata for this parse, keyed by `path`.
  pub fn source_file(&self, path: impl Into<String>) -> SourceFile {
    SourceFile {
      path:          path.into(),
      encoding:      self.encoding.label().to_string(),
      header_line:   self.header_line,
      rejected_rows: self.rejected,
    }
  }
}

// ─── Public API
// ───────────────────────────────────────────────────────────────

/// Parse a whole export under `profile`.
///
/// `farm` tags environment readings; it is ignored for harvest exports, which
/// carry a company column.
pub fn parse(bytes: &[u8], profile: &Profile, farm: &str) -> Result<ParsedFile> {
  let Detection { encoding, header_line } = detect(bytes, profile)?;
  let text = encoding
    .decode(bytes)
    .ok_or(Error::Decode(encoding.label()))?;

  let (header, rows) =
    normalize::split_table(&text, header_line, profile.delimiter)?;
  let header: Vec<String> =
    header.iter().map(|h| resolve::normalize_header(h)).collect();
  let columns = resolve::resolve(&header, &profile.roles)?;

  let normalize::Normalized { records, rejected } =
    normalize::normalize_rows(&rows, &columns, profile.domain, farm);
  debug!(
    domain = %profile.domain,
    %encoding,
    header_line,
    rows = records.len(),
    rejected,
    "parsed export"
  );

  Ok(ParsedFile { encoding, header_line, columns, records, rejected })
}
