//! Canonicalization — the byte form each logical type hashes under.
//!
//! Every value enters through one of two paths: a structured JSON payload
//! (line-delimited ingest) or a raw text token (CLI `type:value`). Both
//! paths must produce identical canonical bytes for equivalent inputs;
//! any drift would fork value identity across the whole database. The
//! content hash is SHA-256 over the tagged canonical bytes under the
//! database's format.

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{
  Error, Result,
  types::{DbFormat, HashFormat, LogicalType},
};

// ─── Primitives ──────────────────────────────────────────────────────────────

/// Trim ASCII whitespace (space, tab, CR, LF) from both ends.
///
/// Deliberately not `str::trim`: canonical forms must not depend on the
/// Unicode whitespace table.
pub fn trim(s: &str) -> &str {
  s.trim_matches([' ', '\t', '\r', '\n'])
}

/// Validate `bytes` as UTF-8. `what` names the input for the error.
pub fn utf8<'a>(bytes: &'a [u8], what: &'static str) -> Result<&'a str> {
  std::str::from_utf8(bytes).map_err(|_| Error::BadEncoding(what))
}

/// Unicode Normalization Form C over the whole string.
pub fn nfc(s: &str) -> String {
  s.nfc().collect()
}

/// Strict standard-alphabet base-64: ASCII whitespace is ignored, padding
/// must be valid.
pub fn base64_decode_strict(b64: &str) -> Result<Vec<u8>> {
  let compact: String = b64
    .chars()
    .filter(|c| !matches!(c, ' ' | '\t' | '\r' | '\n'))
    .collect();
  if compact.is_empty() {
    return Ok(Vec::new());
  }
  B64
    .decode(compact.as_bytes())
    .map_err(|e| Error::BadBase64(e.to_string()))
}

/// Canonical UUID form: 36 bytes after trim, dashed 8-4-4-4-12, lowercase
/// hex. Variant and version bits are not validated.
pub fn canonicalize_uuid(raw: &str) -> Result<String> {
  let s = trim(raw);
  if s.len() != 36 {
    return Err(Error::BadUuid(format!("expected 36 bytes, got {}", s.len())));
  }
  let u = Uuid::try_parse(s).map_err(|e| Error::BadUuid(e.to_string()))?;
  Ok(u.as_hyphenated().to_string())
}

// ─── Float rendering ─────────────────────────────────────────────────────────

/// Render `d` in its canonical decimal form.
///
/// Shortest round-trip rendering, then the normative fixups: NaN is
/// rejected, infinities become `inf`/`-inf`, signed zero becomes `0`, the
/// exponent marker is lowercase, and trailing mantissa zeros plus any
/// dangling `.` are stripped.
pub fn canonicalize_float64(d: f64) -> Result<String> {
  if d.is_nan() {
    return Err(Error::BadFloat("NaN".into()));
  }
  if d.is_infinite() {
    return Ok(if d.is_sign_negative() { "-inf" } else { "inf" }.into());
  }
  if d == 0.0 {
    return Ok("0".into());
  }

  let mut buf = ryu::Buffer::new();
  let rendered = buf.format_finite(d).replace('E', "e");

  let (mut mantissa, exponent) = match rendered.find('e') {
    Some(pos) => (rendered[..pos].to_string(), &rendered[pos..]),
    None => (rendered.clone(), ""),
  };

  if mantissa.contains('.') {
    while mantissa.ends_with('0') {
      mantissa.pop();
    }
    if mantissa.ends_with('.') {
      mantissa.pop();
    }
  }

  let out = format!("{mantissa}{exponent}");
  Ok(if out == "-0" { "0".into() } else { out })
}

fn float_from_text(raw: &str) -> Result<String> {
  let s = trim(raw);
  match s {
    "inf" | "+inf" => return Ok("inf".into()),
    "-inf" => return Ok("-inf".into()),
    _ => {}
  }
  let d: f64 = s.parse().map_err(|_| Error::BadFloat(s.into()))?;
  // `inf`/`-inf` above are the only accepted non-finite spellings; this
  // also rejects `nan` in any case and overflowing decimals.
  if !d.is_finite() {
    return Err(Error::BadFloat(s.into()));
  }
  canonicalize_float64(d)
}

fn int_from_text(raw: &str) -> Result<String> {
  let s = trim(raw);
  if s.is_empty() || s.starts_with('+') {
    return Err(Error::BadInt(s.into()));
  }
  let v: i64 = s.parse().map_err(|_| Error::BadInt(s.into()))?;
  Ok(v.to_string())
}

// ─── CanonValue ──────────────────────────────────────────────────────────────

/// The canonical payload: textual for every type except Bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonPayload {
  Text(String),
  Blob(Vec<u8>),
}

/// A value reduced to its logical type and canonical bytes.
///
/// Canonicalization is format-independent; the database's tag map and hash
/// framing only enter via [`content_hash`](Self::content_hash), which is
/// computed at insertion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonValue {
  pub logical_type: LogicalType,
  pub payload:      CanonPayload,
}

impl CanonValue {
  /// The canonical Null value. No payload is ever consulted for Null.
  pub fn null() -> Self {
    Self {
      logical_type: LogicalType::Null,
      payload:      CanonPayload::Text("null".into()),
    }
  }

  fn text(t: LogicalType, s: String) -> Self {
    Self { logical_type: t, payload: CanonPayload::Text(s) }
  }

  fn blob(t: LogicalType, b: Vec<u8>) -> Self {
    Self { logical_type: t, payload: CanonPayload::Blob(b) }
  }

  /// Canonicalize a structured (parsed JSON) payload of type `t`.
  pub fn from_json(t: LogicalType, v: &serde_json::Value) -> Result<Self> {
    match t {
      LogicalType::Null => Ok(Self::null()),
      LogicalType::Bool => match v.as_bool() {
        Some(b) => Ok(Self::text(t, if b { "true" } else { "false" }.into())),
        None => Err(Error::BadBool(v.to_string())),
      },
      LogicalType::Int => match v.as_i64() {
        Some(x) => Ok(Self::text(t, x.to_string())),
        None => Err(Error::BadInt(v.to_string())),
      },
      LogicalType::Float => match v.as_f64() {
        Some(d) => Ok(Self::text(t, canonicalize_float64(d)?)),
        None => Err(Error::BadFloat(v.to_string())),
      },
      LogicalType::Text => match v.as_str() {
        Some(s) => Ok(Self::text(t, nfc(trim(s)))),
        None => Err(Error::Parse("text value must be a JSON string".into())),
      },
      LogicalType::Uuid => match v.as_str() {
        Some(s) => Ok(Self::text(t, canonicalize_uuid(s)?)),
        None => Err(Error::Parse("uuid value must be a JSON string".into())),
      },
      LogicalType::Bytes => match v.as_str() {
        Some(s) => Ok(Self::blob(t, base64_decode_strict(s)?)),
        None => {
          Err(Error::Parse("bytes value must be a base64 JSON string".into()))
        }
      },
      LogicalType::JsonReserved => Err(Error::ReservedType),
    }
  }

  /// Canonicalize a raw text token of type `t`. For Null the token is
  /// ignored entirely.
  pub fn from_text(t: LogicalType, raw: &str) -> Result<Self> {
    match t {
      LogicalType::Null => Ok(Self::null()),
      LogicalType::Bool => {
        let s = trim(raw);
        if s == "true" || s == "false" {
          Ok(Self::text(t, s.into()))
        } else {
          Err(Error::BadBool(s.into()))
        }
      }
      LogicalType::Int => Ok(Self::text(t, int_from_text(raw)?)),
      LogicalType::Float => Ok(Self::text(t, float_from_text(raw)?)),
      LogicalType::Text => Ok(Self::text(t, nfc(trim(raw)))),
      LogicalType::Uuid => Ok(Self::text(t, canonicalize_uuid(raw)?)),
      LogicalType::Bytes => Ok(Self::blob(t, base64_decode_strict(raw)?)),
      LogicalType::JsonReserved => Err(Error::ReservedType),
    }
  }

  /// The canonical bytes fed to the content hash.
  pub fn canonical_bytes(&self) -> &[u8] {
    match &self.payload {
      CanonPayload::Text(s) => s.as_bytes(),
      CanonPayload::Blob(b) => b,
    }
  }

  /// SHA-256 over the tagged canonical bytes under `format`.
  ///
  /// Fails with `UnsupportedInLegacy` for types the database's tag map
  /// cannot represent.
  pub fn content_hash(&self, format: DbFormat) -> Result<[u8; 32]> {
    let tag = format.tag_map.tag_byte(self.logical_type)?;
    let mut hasher = Sha256::new();
    hasher.update([tag]);
    if format.hash_format == HashFormat::FelixV03Sep {
      hasher.update([0x00]);
    }
    hasher.update(self.canonical_bytes());
    Ok(hasher.finalize().into())
  }
}

// ─── Field names ─────────────────────────────────────────────────────────────

// Field hashes are local to one database; value hashes are the
// cross-database contract.
const FIELD_HASH_PREFIX: &[u8] = b"field\0";

/// Canonical field name: ASCII-trimmed, NFC-normalized, case preserved.
pub fn canonicalize_field_name(name: &str) -> String {
  nfc(trim(name))
}

/// SHA-256 identity for a canonical field name.
pub fn field_name_hash(canon: &str) -> [u8; 32] {
  let mut hasher = Sha256::new();
  hasher.update(FIELD_HASH_PREFIX);
  hasher.update(canon.as_bytes());
  hasher.finalize().into()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
