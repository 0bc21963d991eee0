//! Encoding and header-row detection.
//!
//! Each candidate encoding is tried in profile order. The input is decoded
//! strictly (a malformed sequence rejects the candidate) and scanned line by
//! line for a row carrying both header markers. The first hit wins.

use std::fmt;

use encoding_rs::{DecoderResult, SHIFT_JIS, UTF_16LE, UTF_8};
use tracing::debug;

use crate::{
  error::{Error, Result},
  normalize::field_separator,
  profile::Profile,
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ─── Encodings ───────────────────────────────────────────────────────────────

/// The text encodings a source file may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
  /// UTF-8 with a leading byte-order mark. Input without the mark is not
  /// accepted under this label.
  Utf8Sig,
  Utf8,
  Utf16Le,
  /// Windows-31J, the Shift_JIS dialect written by Japanese Excel.
  Cp932,
}

impl TextEncoding {
  pub fn label(self) -> &'static str {
    match self {
      TextEncoding::Utf8Sig => "utf-8-sig",
      TextEncoding::Utf8 => "utf-8",
      TextEncoding::Utf16Le => "utf-16le",
      TextEncoding::Cp932 => "cp932",
    }
  }

  /// Decode the whole input, or `None` if it is not valid in this encoding.
  /// A leading U+FEFF is dropped.
  pub fn decode(self, bytes: &[u8]) -> Option<String> {
    let text = match self {
      TextEncoding::Utf8Sig => decode_strict(UTF_8, bytes.strip_prefix(UTF8_BOM)?)?,
      TextEncoding::Utf8 => decode_strict(UTF_8, bytes)?,
      TextEncoding::Utf16Le => decode_strict(UTF_16LE, bytes)?,
      TextEncoding::Cp932 => decode_strict(SHIFT_JIS, bytes)?,
    };
    Some(match text.strip_prefix('\u{FEFF}') {
      Some(rest) => rest.to_string(),
      None => text,
    })
  }
}

impl fmt::Display for TextEncoding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

fn decode_strict(
  encoding: &'static encoding_rs::Encoding,
  bytes: &[u8],
) -> Option<String> {
  let mut decoder = encoding.new_decoder_without_bom_handling();
  let capacity = decoder.max_utf8_buffer_length_without_replacement(bytes.len())?;
  let mut out = String::with_capacity(capacity);
  let (result, _read) =
    decoder.decode_to_string_without_replacement(bytes, &mut out, true);
  match result {
    DecoderResult::InputEmpty => Some(out),
    DecoderResult::Malformed(..) | DecoderResult::OutputFull => None,
  }
}

// ─── Detection ───────────────────────────────────────────────────────────────

/// Where the header row was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
  pub encoding:    TextEncoding,
  /// Zero-based index into `str::lines()` of the decoded text.
  pub header_line: usize,
}

/// Whether `line` carries both header markers of `profile`.
pub(crate) fn is_header_line(line: &str, profile: &Profile) -> bool {
  let squashed = field_separator().replace_all(line.trim(), ",");
  profile.markers.iter().all(|m| m.is_match(&squashed))
}

/// Find the first (encoding, header line) pair that satisfies `profile`.
pub fn detect(bytes: &[u8], profile: &Profile) -> Result<Detection> {
  for &encoding in profile.encodings {
    let Some(text) = encoding.decode(bytes) else {
      debug!(encoding = encoding.label(), "candidate encoding rejected");
      continue;
    };
    if let Some(header_line) =
      text.lines().position(|line| is_header_line(line, profile))
    {
      debug!(encoding = encoding.label(), header_line, "header row found");
      return Ok(Detection { encoding, header_line });
    }
    debug!(encoding = encoding.label(), "decoded, but no header row matched");
  }

  Err(Error::HeaderNotFound {
    tried: profile.encodings.iter().map(|e| e.label()).collect(),
  })
}
