//! JSON result serializers for the query commands.

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use felix_core::{
  fact::{FactRow, RecordId, ValueRow},
  store::FactStore,
};
use serde_json::{Value, json};

/// The `canon` string for a value row. Bytes values are re-encoded as
/// base-64; every other type stores its canonical text directly.
fn canon_string(value: &ValueRow) -> String {
  match (&value.canon_text, &value.canon_blob) {
    (Some(text), _) => text.clone(),
    (None, Some(blob)) => B64.encode(blob),
    (None, None) => String::new(),
  }
}

/// One fact as a flat JSON object.
pub fn fact_json<S: FactStore>(
  store: &S,
  fact: &FactRow,
) -> Result<Value, S::Error> {
  let field = store.get_field(fact.field_id)?;
  let value = store.get_value(fact.value_id)?;
  Ok(json!({
    "record_id": fact.record_id,
    "field_id": fact.field_id,
    "field_name": field.name_canon,
    "value_id": fact.value_id,
    "type": value.logical_type.name(),
    "canon": canon_string(&value),
    "ts_ms": fact.ts_ms,
  }))
}

/// A snapshot as one object with a `fields` sub-object keyed by canonical
/// field name.
pub fn snapshot_json<S: FactStore>(
  store: &S,
  record_id: RecordId,
  t_ms: i64,
  rows: &[FactRow],
) -> Result<Value, S::Error> {
  let mut fields = serde_json::Map::new();
  for fact in rows {
    let field = store.get_field(fact.field_id)?;
    let value = store.get_value(fact.value_id)?;
    fields.insert(
      field.name_canon,
      json!({
        "field_id": fact.field_id,
        "value_id": fact.value_id,
        "type": value.logical_type.name(),
        "canon": canon_string(&value),
        "fact_ts_ms": fact.ts_ms,
      }),
    );
  }

  Ok(json!({
    "record_id": record_id,
    "ts_ms": t_ms,
    "fields": fields,
  }))
}
