//! [`SqliteStore`] — the SQLite implementation of [`FactStore`].
//!
//! Field and value identity is carried by UNIQUE content-hash columns:
//! interning is insert-or-ignore followed by select-by-hash, so at most
//! one insert wins per hash and every loser finds the winner's row. The
//! current view is maintained by a monotonic upsert that never moves a
//! pair's timestamp backwards.

use std::path::Path;

use felix_core::{
  canon::{self, CanonPayload, CanonValue},
  fact::{
    CurrentFact, FactRow, FieldId, FieldRow, IngestItem, RecordId, ValueId,
    ValueRow,
  },
  limits,
  store::FactStore,
  types::{DbFormat, LogicalType, TemporalityMode},
};
use rusqlite::{
  Connection, OptionalExtension as _, TransactionBehavior, params,
};

use crate::{Error, Result, schema};

// ─── Meta keys ───────────────────────────────────────────────────────────────

const META_SPEC: &str = "felix_spec";
const META_TAG_MAP: &str = "tag_map";
const META_HASH_FORMAT: &str = "hash_format";
const SPEC_VERSION: &str = "0.3";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Felix fact store backed by a single SQLite file.
///
/// Holds the one exclusive connection for its lifetime. The tag map and
/// hash format are detected once, when the database is opened; databases
/// missing the meta keys are treated as legacy on both axes, and only
/// [`FactStore::init`] ever writes them.
pub struct SqliteStore {
  conn:   Connection,
  format: DbFormat,
}

impl SqliteStore {
  /// Open (or create) a store at `path`.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::setup(Connection::open(path)?)
  }

  /// Open an in-memory store — useful for testing.
  pub fn open_in_memory() -> Result<Self> {
    Self::setup(Connection::open_in_memory()?)
  }

  fn setup(conn: Connection) -> Result<Self> {
    conn.execute_batch(
      "PRAGMA foreign_keys = ON;
       PRAGMA journal_mode = WAL;
       PRAGMA synchronous = NORMAL;",
    )?;
    conn.execute_batch(schema::META_SCHEMA)?;

    let tag_map = meta_get(&conn, META_TAG_MAP)?;
    let hash_format = meta_get(&conn, META_HASH_FORMAT)?;
    let format =
      DbFormat::from_meta(tag_map.as_deref(), hash_format.as_deref());

    tracing::debug!(
      tag_map = format.tag_map.meta_value(),
      hash_format = format.hash_format.meta_value(),
      "opened store"
    );
    Ok(Self { conn, format })
  }

  /// The format this database was opened under.
  pub fn format(&self) -> DbFormat {
    self.format
  }
}

// ─── Meta ────────────────────────────────────────────────────────────────────

fn meta_get(conn: &Connection, k: &str) -> Result<Option<String>> {
  Ok(
    conn
      .query_row("SELECT v FROM meta WHERE k = ?1", params![k], |row| {
        row.get(0)
      })
      .optional()?,
  )
}

fn meta_set(conn: &Connection, k: &str, v: &str) -> Result<()> {
  conn.execute(
    "INSERT INTO meta (k, v) VALUES (?1, ?2)
     ON CONFLICT(k) DO UPDATE SET v = excluded.v",
    params![k, v],
  )?;
  Ok(())
}

// ─── Interning ───────────────────────────────────────────────────────────────

// Free functions over `&Connection` so the same code path runs standalone
// and inside an ingest transaction.

fn intern_field(conn: &Connection, name: &str) -> Result<FieldId> {
  let name_canon = canon::canonicalize_field_name(name);
  if name_canon.len() > limits::MAX_FIELD_NAME_BYTES {
    return Err(
      felix_core::Error::FieldTooLong {
        max: limits::MAX_FIELD_NAME_BYTES,
        got: name_canon.len(),
      }
      .into(),
    );
  }
  let hash = canon::field_name_hash(&name_canon);

  conn.execute(
    "INSERT OR IGNORE INTO fields (name_canon, hash) VALUES (?1, ?2)",
    params![name_canon, hash.as_slice()],
  )?;
  conn
    .query_row(
      "SELECT field_id FROM fields WHERE hash = ?1",
      params![hash.as_slice()],
      |row| row.get(0),
    )
    .map_err(Error::from)
}

fn intern_value(
  conn: &Connection,
  format: DbFormat,
  value: &CanonValue,
) -> Result<ValueId> {
  let len = value.canonical_bytes().len();
  match value.logical_type {
    LogicalType::Text if len > limits::MAX_TEXT_CANON_BYTES => {
      return Err(
        felix_core::Error::ValueTooLarge {
          what: "text",
          max:  limits::MAX_TEXT_CANON_BYTES,
          got:  len,
        }
        .into(),
      );
    }
    LogicalType::Bytes if len > limits::MAX_BYTES_CANON_BYTES => {
      return Err(
        felix_core::Error::ValueTooLarge {
          what: "bytes",
          max:  limits::MAX_BYTES_CANON_BYTES,
          got:  len,
        }
        .into(),
      );
    }
    _ => {}
  }

  // Fails with UnsupportedInLegacy for types the tag map cannot express.
  let hash = value.content_hash(format)?;
  let tag = format.tag_map.tag_byte(value.logical_type)?;

  match &value.payload {
    CanonPayload::Text(text) => {
      conn.execute(
        "INSERT OR IGNORE INTO f_values (type_tag, canon_text, canon_blob, hash)
         VALUES (?1, ?2, NULL, ?3)",
        params![tag, text, hash.as_slice()],
      )?;
    }
    CanonPayload::Blob(blob) => {
      conn.execute(
        "INSERT OR IGNORE INTO f_values (type_tag, canon_text, canon_blob, hash)
         VALUES (?1, NULL, ?2, ?3)",
        params![tag, blob, hash.as_slice()],
      )?;
    }
  }

  conn
    .query_row(
      "SELECT value_id FROM f_values WHERE hash = ?1",
      params![hash.as_slice()],
      |row| row.get(0),
    )
    .map_err(Error::from)
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn ensure_record(
  conn: &Connection,
  record_id: RecordId,
  created_ts_ms: i64,
) -> Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO records (record_id, created_ts) VALUES (?1, ?2)",
    params![record_id as i64, created_ts_ms],
  )?;
  Ok(())
}

fn get_current(
  conn: &Connection,
  record_id: RecordId,
  field_id: FieldId,
) -> Result<Option<CurrentFact>> {
  conn
    .query_row(
      "SELECT value_id, ts FROM current_facts
       WHERE record_id = ?1 AND field_id = ?2",
      params![record_id as i64, field_id],
      |row| Ok(CurrentFact { value_id: row.get(0)?, ts_ms: row.get(1)? }),
    )
    .optional()
    .map_err(Error::from)
}

fn insert_fact(conn: &Connection, fact: FactRow) -> Result<()> {
  let inserted = conn.execute(
    "INSERT INTO facts (record_id, field_id, value_id, ts)
     VALUES (?1, ?2, ?3, ?4)",
    params![fact.record_id as i64, fact.field_id, fact.value_id, fact.ts_ms],
  );
  match inserted {
    Ok(_) => Ok(()),
    Err(rusqlite::Error::SqliteFailure(e, _))
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
    {
      Err(Error::Duplicate {
        record_id: fact.record_id,
        field_id:  fact.field_id,
        ts_ms:     fact.ts_ms,
      })
    }
    Err(e) => Err(e.into()),
  }
}

fn upsert_current_if_newer(conn: &Connection, fact: FactRow) -> Result<()> {
  // Monotonic guard: out-of-order observations never demote the view.
  conn.execute(
    "INSERT INTO current_facts (record_id, field_id, value_id, ts)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(record_id, field_id) DO UPDATE SET
       value_id = excluded.value_id, ts = excluded.ts
     WHERE excluded.ts >= current_facts.ts",
    params![fact.record_id as i64, fact.field_id, fact.value_id, fact.ts_ms],
  )?;
  Ok(())
}

fn fact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FactRow> {
  Ok(FactRow {
    record_id: row.get::<_, i64>(0)? as u64,
    field_id:  row.get(1)?,
    value_id:  row.get(2)?,
    ts_ms:     row.get(3)?,
  })
}

// ─── FactStore impl ──────────────────────────────────────────────────────────

impl FactStore for SqliteStore {
  type Error = Error;

  fn init(&mut self) -> Result<()> {
    self.conn.execute_batch(schema::SCHEMA)?;

    meta_set(&self.conn, META_SPEC, SPEC_VERSION)?;
    meta_set(
      &self.conn,
      META_TAG_MAP,
      DbFormat::CURRENT.tag_map.meta_value(),
    )?;
    meta_set(
      &self.conn,
      META_HASH_FORMAT,
      DbFormat::CURRENT.hash_format.meta_value(),
    )?;
    self.format = DbFormat::CURRENT;

    // Pre-intern Null so its id is allocated before any ingest.
    intern_value(&self.conn, self.format, &CanonValue::null())?;
    Ok(())
  }

  fn ingest(
    &mut self,
    record_id: RecordId,
    ts_ms: i64,
    mode: TemporalityMode,
    items: &[IngestItem],
  ) -> Result<()> {
    if items.len() > limits::MAX_FIELDS_PER_INGEST {
      return Err(
        felix_core::Error::FieldsPerCallExceeded {
          max: limits::MAX_FIELDS_PER_INGEST,
          got: items.len(),
        }
        .into(),
      );
    }

    let format = self.format;
    let tx = self
      .conn
      .transaction_with_behavior(TransactionBehavior::Immediate)?;

    ensure_record(&tx, record_id, ts_ms)?;

    for item in items {
      let field_id = intern_field(&tx, &item.field_name)?;
      let value_id = intern_value(&tx, format, &item.value)?;

      if mode == TemporalityMode::EventDriven
        && let Some(current) = get_current(&tx, record_id, field_id)?
        && current.value_id == value_id
      {
        // Unchanged value: no fact, current untouched.
        continue;
      }

      let fact = FactRow { record_id, field_id, value_id, ts_ms };
      insert_fact(&tx, fact)?;
      upsert_current_if_newer(&tx, fact)?;
    }

    // Dropping the transaction without committing rolls everything back.
    tx.commit()?;
    Ok(())
  }

  fn intern_field(&self, name: &str) -> Result<FieldId> {
    intern_field(&self.conn, name)
  }

  fn intern_value(&self, value: &CanonValue) -> Result<ValueId> {
    intern_value(&self.conn, self.format, value)
  }

  fn get_current(
    &self,
    record_id: RecordId,
    field_id: FieldId,
  ) -> Result<Option<CurrentFact>> {
    get_current(&self.conn, record_id, field_id)
  }

  fn query_current_eq(
    &self,
    field_id: FieldId,
    value_id: ValueId,
  ) -> Result<Vec<RecordId>> {
    let mut stmt = self.conn.prepare(
      "SELECT record_id FROM current_facts
       WHERE field_id = ?1 AND value_id = ?2",
    )?;
    let ids = stmt
      .query_map(params![field_id, value_id], |row| row.get::<_, i64>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids.into_iter().map(|id| id as u64).collect())
  }

  fn query_ever_eq(
    &self,
    field_id: FieldId,
    value_id: ValueId,
  ) -> Result<Vec<RecordId>> {
    let mut stmt = self.conn.prepare(
      "SELECT DISTINCT record_id FROM facts
       WHERE field_id = ?1 AND value_id = ?2",
    )?;
    let ids = stmt
      .query_map(params![field_id, value_id], |row| row.get::<_, i64>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids.into_iter().map(|id| id as u64).collect())
  }

  fn facts_window(
    &self,
    t1_ms: i64,
    t2_ms: i64,
    record_id: Option<RecordId>,
  ) -> Result<Vec<FactRow>> {
    let rows = if let Some(rid) = record_id {
      let mut stmt = self.conn.prepare(
        "SELECT record_id, field_id, value_id, ts FROM facts
         WHERE ts BETWEEN ?1 AND ?2 AND record_id = ?3
         ORDER BY ts",
      )?;
      stmt
        .query_map(params![t1_ms, t2_ms, rid as i64], fact_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?
    } else {
      let mut stmt = self.conn.prepare(
        "SELECT record_id, field_id, value_id, ts FROM facts
         WHERE ts BETWEEN ?1 AND ?2
         ORDER BY ts",
      )?;
      stmt
        .query_map(params![t1_ms, t2_ms], fact_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?
    };
    Ok(rows)
  }

  fn snapshot_at(
    &self,
    record_id: RecordId,
    t_ms: i64,
  ) -> Result<Vec<FactRow>> {
    let mut stmt = self.conn.prepare(
      "SELECT f.record_id, f.field_id, f.value_id, f.ts
       FROM facts f
       JOIN (
         SELECT field_id, MAX(ts) AS max_ts
         FROM facts
         WHERE record_id = ?1 AND ts <= ?2
         GROUP BY field_id
       ) latest
       ON latest.field_id = f.field_id AND latest.max_ts = f.ts
       WHERE f.record_id = ?1",
    )?;
    let rows = stmt
      .query_map(params![record_id as i64, t_ms], fact_from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  fn rebuild_current_facts(&mut self) -> Result<()> {
    let tx = self
      .conn
      .transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute("DELETE FROM current_facts", [])?;
    let repopulated = tx.execute(
      "INSERT INTO current_facts (record_id, field_id, value_id, ts)
       SELECT f.record_id, f.field_id, f.value_id, f.ts
       FROM facts f
       JOIN (
         SELECT record_id, field_id, MAX(ts) AS max_ts
         FROM facts
         GROUP BY record_id, field_id
       ) latest
       ON latest.record_id = f.record_id
       AND latest.field_id = f.field_id
       AND latest.max_ts = f.ts",
      [],
    )?;
    tx.commit()?;

    tracing::debug!(rows = repopulated, "rebuilt current_facts");
    Ok(())
  }

  fn get_field(&self, field_id: FieldId) -> Result<FieldRow> {
    self
      .conn
      .query_row(
        "SELECT field_id, name_canon FROM fields WHERE field_id = ?1",
        params![field_id],
        |row| {
          Ok(FieldRow { field_id: row.get(0)?, name_canon: row.get(1)? })
        },
      )
      .optional()?
      .ok_or(Error::UnknownFieldId(field_id))
  }

  fn get_value(&self, value_id: ValueId) -> Result<ValueRow> {
    let raw = self
      .conn
      .query_row(
        "SELECT value_id, type_tag, canon_text, canon_blob
         FROM f_values WHERE value_id = ?1",
        params![value_id],
        |row| {
          Ok((
            row.get::<_, ValueId>(0)?,
            row.get::<_, u8>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<Vec<u8>>>(3)?,
          ))
        },
      )
      .optional()?;

    let Some((value_id, tag, canon_text, canon_blob)) = raw else {
      return Err(Error::UnknownValueId(value_id));
    };
    let logical_type =
      self.format.tag_map.logical_type(tag).map_err(Error::Core)?;
    Ok(ValueRow { value_id, logical_type, canon_text, canon_blob })
  }
}

// ─── Test support ────────────────────────────────────────────────────────────

#[cfg(test)]
impl SqliteStore {
  /// An in-memory store whose meta rows read the legacy format, as an old
  /// database on disk would.
  pub(crate) fn open_legacy_in_memory() -> Result<Self> {
    let mut store = Self::open_in_memory()?;
    store.conn.execute_batch(schema::SCHEMA)?;
    meta_set(&store.conn, META_TAG_MAP, DbFormat::LEGACY.tag_map.meta_value())?;
    meta_set(
      &store.conn,
      META_HASH_FORMAT,
      DbFormat::LEGACY.hash_format.meta_value(),
    )?;
    store.format = DbFormat::LEGACY;
    Ok(store)
  }

  /// The stored content hash for a value id.
  pub(crate) fn value_hash(&self, value_id: ValueId) -> Result<Vec<u8>> {
    Ok(self.conn.query_row(
      "SELECT hash FROM f_values WHERE value_id = ?1",
      params![value_id],
      |row| row.get(0),
    )?)
  }

  /// Every `current_facts` row, ordered by (record, field).
  pub(crate) fn dump_current(&self) -> Result<Vec<FactRow>> {
    let mut stmt = self.conn.prepare(
      "SELECT record_id, field_id, value_id, ts FROM current_facts
       ORDER BY record_id, field_id",
    )?;
    let rows = stmt
      .query_map([], fact_from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  /// Total number of fact rows.
  pub(crate) fn count_facts(&self) -> Result<i64> {
    Ok(self.conn.query_row("SELECT COUNT(*) FROM facts", [], |row| {
      row.get(0)
    })?)
  }
}
