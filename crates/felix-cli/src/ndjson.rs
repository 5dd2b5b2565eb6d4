//! Line-delimited JSON ingest.
//!
//! One record update per line:
//!
//! ```json
//! { "record_id": 5001,
//!   "ts_ms": 1739539200000,
//!   "mode": "event",
//!   "fields": {
//!     "First Name": {"t": "text", "v": "Luke"},
//!     "Age":        {"t": "int",  "v": 6},
//!     "Deleted":    {"t": "null"}
//!   } }
//! ```
//!
//! Empty lines are skipped. Each line is one ingest transaction, so a
//! failing line leaves every earlier line committed and nothing of its
//! own.

use std::{
  fs::File,
  io::{BufRead, BufReader},
  path::Path,
};

use anyhow::Context as _;
use felix_core::{
  canon::{self, CanonValue},
  fact::IngestItem,
  limits,
  store::FactStore,
  types::{LogicalType, TemporalityMode},
};
use serde::Deserialize;

/// One line of ingest input.
#[derive(Debug, Deserialize)]
struct IngestLine {
  record_id: u64,
  ts_ms:     i64,
  mode:      Option<String>,
  fields:    serde_json::Map<String, serde_json::Value>,
}

/// A `fields` entry: `{"t": "<type>", "v": <payload>}`. `v` may be absent
/// only for `t == "null"`.
#[derive(Debug, Deserialize)]
struct FieldSpec {
  t: String,
  v: Option<serde_json::Value>,
}

/// Ingest `path` line by line under `default_mode`.
pub fn ingest_file<S: FactStore>(
  store: &mut S,
  path: &Path,
  default_mode: TemporalityMode,
) -> anyhow::Result<()> {
  let file = File::open(path)
    .with_context(|| format!("failed to open ndjson file {path:?}"))?;
  let mut reader = BufReader::new(file);

  let mut buf = Vec::new();
  let mut lineno = 0u64;
  loop {
    buf.clear();
    if reader.read_until(b'\n', &mut buf)? == 0 {
      break;
    }
    lineno += 1;

    while matches!(buf.last(), Some(b'\n' | b'\r')) {
      buf.pop();
    }
    if buf.len() > limits::MAX_NDJSON_LINE_BYTES {
      return Err(felix_core::Error::LineTooLarge {
        max: limits::MAX_NDJSON_LINE_BYTES,
      })
      .with_context(|| format!("line {lineno}"));
    }

    let text = canon::utf8(&buf, "ndjson line")
      .with_context(|| format!("line {lineno}"))?;
    let text = canon::trim(text);
    if text.is_empty() {
      continue;
    }

    let line: IngestLine = serde_json::from_str(text)
      .map_err(|e| felix_core::Error::Parse(format!("line {lineno}: {e}")))?;

    let mode = match line.mode.as_deref() {
      Some(name) => TemporalityMode::from_name(name)
        .with_context(|| format!("line {lineno}"))?,
      None => default_mode,
    };

    let mut items = Vec::with_capacity(line.fields.len());
    for (name, spec) in &line.fields {
      let item = item_from_field(name, spec)
        .with_context(|| format!("line {lineno}, field {name:?}"))?;
      items.push(item);
    }

    store
      .ingest(line.record_id, line.ts_ms, mode, &items)
      .with_context(|| format!("line {lineno}"))?;
  }

  Ok(())
}

fn item_from_field(
  name: &str,
  spec: &serde_json::Value,
) -> anyhow::Result<IngestItem> {
  let spec: FieldSpec = serde_json::from_value(spec.clone())
    .map_err(|e| felix_core::Error::Parse(format!("entry must be {{t, v}}: {e}")))?;
  let t = LogicalType::from_name(&spec.t)?;

  let value = match &spec.v {
    Some(v) => CanonValue::from_json(t, v)?,
    None if t == LogicalType::Null => CanonValue::null(),
    None => {
      return Err(
        felix_core::Error::Parse(format!("missing v for non-null type {t}"))
          .into(),
      );
    }
  };

  Ok(IngestItem::new(name, value))
}
