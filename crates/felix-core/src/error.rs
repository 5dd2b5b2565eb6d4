//! Error types for `felix-core`.

use thiserror::Error;

use crate::types::LogicalType;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid UTF-8 in {0}")]
  BadEncoding(&'static str),

  #[error("invalid base64 for bytes: {0}")]
  BadBase64(String),

  #[error("invalid uuid: {0}")]
  BadUuid(String),

  #[error("bool must be true or false, got {0:?}")]
  BadBool(String),

  #[error("invalid int: {0:?}")]
  BadInt(String),

  #[error("invalid float: {0:?}")]
  BadFloat(String),

  /// A stored type tag that the database's tag map does not define.
  #[error("unknown type tag {tag} under {map}")]
  BadTag { map: &'static str, tag: u8 },

  #[error("type {0} is not supported by the legacy tag map")]
  UnsupportedInLegacy(LogicalType),

  /// The `json` type name occupies a tag slot reserved for a future
  /// format version and is rejected at every user-facing boundary.
  #[error("type json is reserved and not accepted")]
  ReservedType,

  #[error("field name exceeds {max} bytes (canonical form is {got} bytes)")]
  FieldTooLong { max: usize, got: usize },

  #[error("fields per ingest exceeds {max} (got {got})")]
  FieldsPerCallExceeded { max: usize, got: usize },

  #[error("{what} value exceeds {max} bytes (got {got})")]
  ValueTooLarge {
    what: &'static str,
    max:  usize,
    got:  usize,
  },

  #[error("input line exceeds {max} bytes")]
  LineTooLarge { max: usize },

  /// Structural failure in NDJSON input or a CLI token.
  #[error("parse error: {0}")]
  Parse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
