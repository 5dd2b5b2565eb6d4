//! Error type for `felix-store-sqlite`.

use felix_core::fact::{FieldId, RecordId, ValueId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] felix_core::Error),

  /// Primary-key conflict on the facts log: at most one fact per field
  /// per instant per record.
  #[error("duplicate fact for record {record_id} field {field_id} at ts {ts_ms}")]
  Duplicate {
    record_id: RecordId,
    field_id:  FieldId,
    ts_ms:     i64,
  },

  #[error("unknown field_id: {0}")]
  UnknownFieldId(FieldId),

  #[error("unknown value_id: {0}")]
  UnknownValueId(ValueId),

  #[error("database error: {0}")]
  Storage(#[from] rusqlite::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
