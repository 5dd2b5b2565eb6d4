//! The row model — records, fields, values, facts.
//!
//! Field and value primary keys are opaque store-assigned integers; their
//! identity is carried by UNIQUE content-hash columns, so ids must never be
//! compared across databases.

use serde::Serialize;

use crate::{canon::CanonValue, types::LogicalType};

/// Externally-supplied record identifier.
pub type RecordId = u64;
/// Store-assigned field identifier, local to one database.
pub type FieldId = i64;
/// Store-assigned value identifier, local to one database.
pub type ValueId = i64;

/// One observation: `(record, field, value, ts)`. The facts log holds at
/// most one row per `(record, field, ts)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FactRow {
  pub record_id: RecordId,
  pub field_id:  FieldId,
  pub value_id:  ValueId,
  pub ts_ms:     i64,
}

/// The materialized latest-ts fact for a `(record, field)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentFact {
  pub value_id: ValueId,
  pub ts_ms:    i64,
}

/// A `fields` row.
#[derive(Debug, Clone)]
pub struct FieldRow {
  pub field_id:   FieldId,
  pub name_canon: String,
}

/// An `f_values` row. Exactly one of `canon_text`/`canon_blob` is
/// populated: the blob column for Bytes, the text column for every other
/// type.
#[derive(Debug, Clone)]
pub struct ValueRow {
  pub value_id:     ValueId,
  pub logical_type: LogicalType,
  pub canon_text:   Option<String>,
  pub canon_blob:   Option<Vec<u8>>,
}

/// One `(field name, canonical value)` pair of an ingest call.
#[derive(Debug, Clone)]
pub struct IngestItem {
  pub field_name: String,
  pub value:      CanonValue,
}

impl IngestItem {
  pub fn new(field_name: impl Into<String>, value: CanonValue) -> Self {
    Self { field_name: field_name.into(), value }
  }
}
