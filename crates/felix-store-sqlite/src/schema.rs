//! SQL schema for the Felix SQLite store.
//!
//! The meta table is created separately at open time so format detection
//! works before `init` has ever run.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS fields (
    field_id    INTEGER PRIMARY KEY,
    name_canon  TEXT NOT NULL,
    hash        BLOB NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS f_values (
    value_id    INTEGER PRIMARY KEY,
    type_tag    INTEGER NOT NULL,
    canon_text  TEXT,
    canon_blob  BLOB,
    hash        BLOB NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS records (
    record_id   INTEGER PRIMARY KEY,
    created_ts  INTEGER NOT NULL
);

-- The append-only log. No UPDATE or DELETE is ever issued against facts.
CREATE TABLE IF NOT EXISTS facts (
    record_id  INTEGER NOT NULL,
    field_id   INTEGER NOT NULL,
    value_id   INTEGER NOT NULL,
    ts         INTEGER NOT NULL,
    PRIMARY KEY (record_id, field_id, ts),
    FOREIGN KEY (record_id) REFERENCES records(record_id),
    FOREIGN KEY (field_id)  REFERENCES fields(field_id),
    FOREIGN KEY (value_id)  REFERENCES f_values(value_id)
);

-- Materialized latest-ts row per (record, field); always rebuildable from
-- the facts log.
CREATE TABLE IF NOT EXISTS current_facts (
    record_id  INTEGER NOT NULL,
    field_id   INTEGER NOT NULL,
    value_id   INTEGER NOT NULL,
    ts         INTEGER NOT NULL,
    PRIMARY KEY (record_id, field_id),
    FOREIGN KEY (record_id) REFERENCES records(record_id),
    FOREIGN KEY (field_id)  REFERENCES fields(field_id),
    FOREIGN KEY (value_id)  REFERENCES f_values(value_id)
);

CREATE INDEX IF NOT EXISTS facts_by_value           ON facts(value_id);
CREATE INDEX IF NOT EXISTS facts_by_field_value     ON facts(field_id, value_id);
CREATE INDEX IF NOT EXISTS facts_by_record_field_ts ON facts(record_id, field_id, ts);
CREATE INDEX IF NOT EXISTS facts_by_ts              ON facts(ts);
CREATE INDEX IF NOT EXISTS current_by_field_value   ON current_facts(field_id, value_id);
";

/// Meta key/value table, created at open time.
pub const META_SCHEMA: &str =
  "CREATE TABLE IF NOT EXISTS meta (k TEXT PRIMARY KEY, v TEXT NOT NULL);";
