//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeMap;

use felix_core::{
  canon::{CanonPayload, CanonValue},
  fact::{FactRow, IngestItem},
  store::FactStore,
  types::{DbFormat, LogicalType, TemporalityMode},
};
use proptest::prelude::*;

use crate::{Error, SqliteStore};

const EVENT: TemporalityMode = TemporalityMode::EventDriven;
const OBSERVE: TemporalityMode = TemporalityMode::ObservationDriven;

fn store() -> SqliteStore {
  let mut s = SqliteStore::open_in_memory().expect("in-memory store");
  s.init().expect("init");
  s
}

fn text(v: &str) -> CanonValue {
  CanonValue::from_text(LogicalType::Text, v).unwrap()
}

fn int(v: i64) -> CanonValue {
  CanonValue::from_text(LogicalType::Int, &v.to_string()).unwrap()
}

fn item(name: &str, value: CanonValue) -> IngestItem {
  IngestItem::new(name, value)
}

// ─── Init ────────────────────────────────────────────────────────────────────

#[test]
fn init_is_idempotent() {
  let mut s = store();
  s.init().unwrap();
  assert_eq!(s.format(), DbFormat::CURRENT);
}

#[test]
fn init_pre_interns_null() {
  let s = store();
  // The Null value was interned by init, so re-interning returns the
  // pre-allocated first id.
  let id = s.intern_value(&CanonValue::null()).unwrap();
  assert_eq!(id, 1);
}

// ─── Ingest & current view ───────────────────────────────────────────────────

#[test]
fn ingest_two_fields_and_query_current() {
  let mut s = store();
  s.ingest(1, 1000, EVENT, &[item("Name", text("Luke")), item("Age", int(6))])
    .unwrap();

  let field_id = s.intern_field("Name").unwrap();
  let value_id = s.intern_value(&text("Luke")).unwrap();
  assert_eq!(s.query_current_eq(field_id, value_id).unwrap(), vec![1]);

  let facts = s.facts_window(0, 10_000, None).unwrap();
  assert_eq!(facts.len(), 2);
  assert!(facts.iter().all(|f| f.record_id == 1 && f.ts_ms == 1000));
}

#[test]
fn event_mode_suppresses_unchanged_value() {
  let mut s = store();
  s.ingest(1, 1000, EVENT, &[item("Name", text("Luke"))]).unwrap();
  s.ingest(1, 2000, EVENT, &[item("Name", text("Luke"))]).unwrap();

  assert_eq!(s.count_facts().unwrap(), 1);

  let field_id = s.intern_field("Name").unwrap();
  let current = s.get_current(1, field_id).unwrap().unwrap();
  assert_eq!(current.ts_ms, 1000);
}

#[test]
fn observe_mode_appends_unchanged_value() {
  let mut s = store();
  s.ingest(1, 1000, OBSERVE, &[item("Name", text("Luke"))]).unwrap();
  s.ingest(1, 2000, OBSERVE, &[item("Name", text("Luke"))]).unwrap();

  assert_eq!(s.count_facts().unwrap(), 2);

  let field_id = s.intern_field("Name").unwrap();
  let current = s.get_current(1, field_id).unwrap().unwrap();
  assert_eq!(current.ts_ms, 2000);
}

#[test]
fn out_of_order_fact_is_logged_but_current_stays_pinned() {
  let mut s = store();
  s.ingest(1, 1000, EVENT, &[item("Age", int(6))]).unwrap();
  s.ingest(1, 500, EVENT, &[item("Age", int(5))]).unwrap();

  // The log is append-only: both facts exist.
  assert_eq!(s.count_facts().unwrap(), 2);

  // But current never moves backwards.
  let field_id = s.intern_field("Age").unwrap();
  let six = s.intern_value(&int(6)).unwrap();
  let current = s.get_current(1, field_id).unwrap().unwrap();
  assert_eq!(current.value_id, six);
  assert_eq!(current.ts_ms, 1000);
}

#[test]
fn event_mode_same_value_at_same_ts_is_skipped_not_duplicate() {
  let mut s = store();
  s.ingest(1, 1000, EVENT, &[item("Name", text("Luke"))]).unwrap();
  s.ingest(1, 1000, EVENT, &[item("Name", text("Luke"))]).unwrap();
  assert_eq!(s.count_facts().unwrap(), 1);
}

#[test]
fn duplicate_instant_conflicts() {
  let mut s = store();
  s.ingest(1, 1000, OBSERVE, &[item("Name", text("Luke"))]).unwrap();

  let err = s
    .ingest(1, 1000, OBSERVE, &[item("Name", text("Leia"))])
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate { record_id: 1, ts_ms: 1000, .. }));
}

#[test]
fn failed_ingest_rolls_back_every_item() {
  let mut s = store();
  s.ingest(1, 1000, OBSERVE, &[item("Name", text("Luke"))]).unwrap();

  // The second item collides on (record, field, ts); the first item must
  // not survive the rollback.
  let err = s
    .ingest(
      1,
      1000,
      OBSERVE,
      &[item("Fresh", int(1)), item("Name", text("Leia"))],
    )
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate { .. }));
  assert_eq!(s.count_facts().unwrap(), 1);
}

// ─── Content addressing ──────────────────────────────────────────────────────

#[test]
fn equivalent_text_collapses_to_one_value_id() {
  let mut s = store();

  // Outer whitespace plus a decomposed accent vs the NFC short form.
  let messy = text(" Cafe\u{301} ");
  let clean = text("Caf\u{e9}");
  assert_eq!(
    s.intern_value(&messy).unwrap(),
    s.intern_value(&clean).unwrap()
  );

  // In event mode only the first ingest produces a fact.
  s.ingest(1, 1, EVENT, &[item("Color", messy)]).unwrap();
  s.ingest(1, 2, EVENT, &[item("Color", clean)]).unwrap();
  assert_eq!(s.count_facts().unwrap(), 1);
}

#[test]
fn field_names_collapse_on_canonical_form() {
  let s = store();
  assert_eq!(
    s.intern_field(" Name ").unwrap(),
    s.intern_field("Name").unwrap()
  );
  assert_ne!(
    s.intern_field("Name").unwrap(),
    s.intern_field("name").unwrap()
  );
}

#[test]
fn bytes_round_trip_through_value_row() {
  let mut s = store();
  let blob = CanonValue::from_text(LogicalType::Bytes, "aGVsbG8=").unwrap();
  s.ingest(1, 1, OBSERVE, &[item("Payload", blob)]).unwrap();

  let field_id = s.intern_field("Payload").unwrap();
  let current = s.get_current(1, field_id).unwrap().unwrap();
  let row = s.get_value(current.value_id).unwrap();
  assert_eq!(row.logical_type, LogicalType::Bytes);
  assert_eq!(row.canon_text, None);
  assert_eq!(row.canon_blob.as_deref(), Some(b"hello".as_slice()));
}

// ─── Limits ──────────────────────────────────────────────────────────────────

#[test]
fn ingest_rejects_too_many_fields() {
  let mut s = store();
  let items: Vec<_> =
    (0..257).map(|i| item(&format!("F{i}"), int(i))).collect();
  let err = s.ingest(1, 1, OBSERVE, &items).unwrap_err();
  assert!(matches!(
    err,
    Error::Core(felix_core::Error::FieldsPerCallExceeded { got: 257, .. })
  ));
  assert_eq!(s.count_facts().unwrap(), 0);
}

#[test]
fn ingest_rejects_oversized_field_name() {
  let mut s = store();
  let name = "x".repeat(257);
  let err = s.ingest(1, 1, OBSERVE, &[item(&name, int(1))]).unwrap_err();
  assert!(matches!(
    err,
    Error::Core(felix_core::Error::FieldTooLong { .. })
  ));
}

#[test]
fn ingest_rejects_oversized_text_value() {
  let mut s = store();
  let big = text(&"x".repeat(1024 * 1024 + 1));
  let err = s.ingest(1, 1, OBSERVE, &[item("Big", big)]).unwrap_err();
  assert!(matches!(
    err,
    Error::Core(felix_core::Error::ValueTooLarge { what: "text", .. })
  ));
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[test]
fn current_eq_and_ever_eq_diverge_after_supersession() {
  let mut s = store();
  s.ingest(1, 1000, OBSERVE, &[item("Name", text("Luke"))]).unwrap();
  s.ingest(1, 2000, OBSERVE, &[item("Name", text("Leia"))]).unwrap();

  let field_id = s.intern_field("Name").unwrap();
  let luke = s.intern_value(&text("Luke")).unwrap();
  let leia = s.intern_value(&text("Leia")).unwrap();

  assert!(s.query_current_eq(field_id, luke).unwrap().is_empty());
  assert_eq!(s.query_current_eq(field_id, leia).unwrap(), vec![1]);
  assert_eq!(s.query_ever_eq(field_id, luke).unwrap(), vec![1]);
}

#[test]
fn ever_eq_is_distinct_per_record() {
  let mut s = store();
  s.ingest(7, 1, OBSERVE, &[item("Name", text("Luke"))]).unwrap();
  s.ingest(7, 2, OBSERVE, &[item("Name", text("Luke"))]).unwrap();

  let field_id = s.intern_field("Name").unwrap();
  let luke = s.intern_value(&text("Luke")).unwrap();
  assert_eq!(s.query_ever_eq(field_id, luke).unwrap(), vec![7]);
}

#[test]
fn unknown_names_and_values_yield_empty_sets() {
  let s = store();
  let field_id = s.intern_field("NeverSeen").unwrap();
  let value_id = s.intern_value(&text("nothing")).unwrap();
  assert!(s.query_current_eq(field_id, value_id).unwrap().is_empty());
  assert!(s.query_ever_eq(field_id, value_id).unwrap().is_empty());
}

#[test]
fn window_is_inclusive_on_both_ends() {
  let mut s = store();
  for (ts, v) in [(1, 10), (2, 20), (3, 30)] {
    s.ingest(1, ts, OBSERVE, &[item("N", int(v))]).unwrap();
  }

  let ts_of = |facts: &[FactRow]| -> Vec<i64> {
    facts.iter().map(|f| f.ts_ms).collect()
  };

  assert_eq!(ts_of(&s.facts_window(2, 3, None).unwrap()), vec![2, 3]);
  assert_eq!(ts_of(&s.facts_window(0, 10, None).unwrap()), vec![1, 2, 3]);
  assert!(s.facts_window(4, 10, None).unwrap().is_empty());
}

#[test]
fn window_record_filter() {
  let mut s = store();
  s.ingest(1, 1, OBSERVE, &[item("N", int(1))]).unwrap();
  s.ingest(2, 2, OBSERVE, &[item("N", int(2))]).unwrap();

  let only_two = s.facts_window(0, 10, Some(2)).unwrap();
  assert_eq!(only_two.len(), 1);
  assert_eq!(only_two[0].record_id, 2);
}

#[test]
fn snapshot_returns_latest_per_field_at_or_before_t() {
  let mut s = store();
  s.ingest(1, 1000, EVENT, &[item("Name", text("Luke")), item("Age", int(6))])
    .unwrap();
  s.ingest(1, 2000, OBSERVE, &[item("Age", int(7))]).unwrap();

  // Before any fact: empty.
  assert!(s.snapshot_at(1, 400).unwrap().is_empty());

  // Between the two ingests: both fields at their ts=1000 state.
  let mid = s.snapshot_at(1, 1500).unwrap();
  assert_eq!(mid.len(), 2);
  assert!(mid.iter().all(|f| f.ts_ms == 1000));

  // After: Age moved to its ts=2000 fact.
  let age = s.intern_field("Age").unwrap();
  let late = s.snapshot_at(1, 3000).unwrap();
  let age_fact = late.iter().find(|f| f.field_id == age).unwrap();
  assert_eq!(age_fact.ts_ms, 2000);
  assert_eq!(age_fact.value_id, s.intern_value(&int(7)).unwrap());
}

#[test]
fn get_field_and_value_reject_unknown_ids() {
  let s = store();
  assert!(matches!(s.get_field(999), Err(Error::UnknownFieldId(999))));
  assert!(matches!(s.get_value(999), Err(Error::UnknownValueId(999))));
}

// ─── Rebuild ─────────────────────────────────────────────────────────────────

#[test]
fn rebuild_reproduces_incremental_view() {
  let mut s = store();
  s.ingest(1, 1000, EVENT, &[item("Name", text("Luke")), item("Age", int(6))])
    .unwrap();
  s.ingest(1, 500, EVENT, &[item("Age", int(5))]).unwrap();
  s.ingest(2, 2000, OBSERVE, &[item("Name", text("Leia"))]).unwrap();
  s.ingest(2, 3000, OBSERVE, &[item("Name", text("Leia"))]).unwrap();

  let before = s.dump_current().unwrap();
  s.rebuild_current_facts().unwrap();
  assert_eq!(s.dump_current().unwrap(), before);
}

// ─── Legacy format ───────────────────────────────────────────────────────────

#[test]
fn legacy_db_rejects_bytes_and_uuid() {
  let mut s = SqliteStore::open_legacy_in_memory().unwrap();
  assert_eq!(s.format(), DbFormat::LEGACY);

  let blob = CanonValue::from_text(LogicalType::Bytes, "AA==").unwrap();
  let err = s.ingest(1, 1, EVENT, &[item("X", blob)]).unwrap_err();
  assert!(matches!(
    err,
    Error::Core(felix_core::Error::UnsupportedInLegacy(LogicalType::Bytes))
  ));

  let id = CanonValue::from_text(
    LogicalType::Uuid,
    "550e8400-e29b-41d4-a716-446655440000",
  )
  .unwrap();
  let err = s.ingest(1, 1, EVENT, &[item("X", id)]).unwrap_err();
  assert!(matches!(
    err,
    Error::Core(felix_core::Error::UnsupportedInLegacy(LogicalType::Uuid))
  ));
}

#[test]
fn legacy_db_hashes_without_separator() {
  let mut s = SqliteStore::open_legacy_in_memory().unwrap();
  s.ingest(1, 1, EVENT, &[item("X", text("a"))]).unwrap();

  let value_id = s.intern_value(&text("a")).unwrap();
  let stored = s.value_hash(value_id).unwrap();
  let expect = text("a").content_hash(DbFormat::LEGACY).unwrap();
  assert_eq!(stored, expect);
}

// ─── Properties ──────────────────────────────────────────────────────────────

const FIELD_POOL: [&str; 3] = ["Alpha", "Beta", "Gamma"];

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  // After any ingest stream: every (record, field) pair's current row is
  // the max-ts fact for that pair, and rebuilding reproduces the
  // incrementally-maintained table exactly.
  #[test]
  fn current_view_matches_log_and_rebuild(
    ops in prop::collection::vec(
      (0u64..3, 0usize..3, 0i64..5, 0i64..40, any::<bool>()),
      1..50,
    ),
  ) {
    let mut s = store();

    for (record_id, field, value, ts, observe) in ops {
      let mode = if observe { OBSERVE } else { EVENT };
      let it = item(FIELD_POOL[field], int(value));
      match s.ingest(record_id, ts, mode, std::slice::from_ref(&it)) {
        // Same (record, field, instant) twice is a legitimate conflict.
        Ok(()) | Err(Error::Duplicate { .. }) => {}
        Err(e) => panic!("unexpected ingest error: {e}"),
      }
    }

    let facts = s.facts_window(i64::MIN, i64::MAX, None).unwrap();
    let mut latest: BTreeMap<(u64, i64), FactRow> = BTreeMap::new();
    for f in facts {
      latest
        .entry((f.record_id, f.field_id))
        .and_modify(|cur| {
          if f.ts_ms > cur.ts_ms {
            *cur = f;
          }
        })
        .or_insert(f);
    }

    let current = s.dump_current().unwrap();
    prop_assert_eq!(current.len(), latest.len());
    for row in &current {
      let want = latest[&(row.record_id, row.field_id)];
      prop_assert_eq!(row.ts_ms, want.ts_ms);
      prop_assert_eq!(row.value_id, want.value_id);
    }

    let before = current;
    s.rebuild_current_facts().unwrap();
    prop_assert_eq!(s.dump_current().unwrap(), before);
  }

  // Identical canonical bytes always collapse to one value id.
  #[test]
  fn interning_is_idempotent(v in any::<i64>()) {
    let s = store();
    let a = s.intern_value(&int(v)).unwrap();
    let b = s.intern_value(&int(v)).unwrap();
    prop_assert_eq!(a, b);
  }
}

#[test]
fn canonical_payload_shape_matches_type() {
  let blob = CanonValue::from_text(LogicalType::Bytes, "AA==").unwrap();
  assert!(matches!(blob.payload, CanonPayload::Blob(_)));
  assert!(matches!(int(1).payload, CanonPayload::Text(_)));
}
