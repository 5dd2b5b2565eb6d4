//! The `FactStore` trait and the engine operation surface.
//!
//! Implemented by storage backends (`felix-store-sqlite`). The front-end
//! depends on this abstraction, not on any concrete backend.
//!
//! The engine owns one exclusive connection to its substrate, and every
//! write runs in an immediate transaction, so mutating operations take
//! `&mut self`. Interning alone takes `&self`: content-hash UNIQUE
//! constraints make concurrent intern attempts converge regardless of
//! which insert wins.

use crate::{
  canon::CanonValue,
  fact::{
    CurrentFact, FactRow, FieldId, FieldRow, IngestItem, RecordId, ValueId,
    ValueRow,
  },
  types::TemporalityMode,
};

/// Abstraction over a Felix fact-store backend.
pub trait FactStore {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create tables and indexes if absent, stamp the current-format meta
  /// keys, and pre-intern the Null value so its id exists before any
  /// ingest.
  fn init(&mut self) -> Result<(), Self::Error>;

  /// Append observations for `record_id` at `ts_ms` in one transaction.
  ///
  /// Creates the record on first reference. Under
  /// [`TemporalityMode::EventDriven`], an item whose value equals the
  /// current value for its `(record, field)` is skipped entirely; under
  /// [`TemporalityMode::ObservationDriven`] every item appends a fact.
  /// The current view is updated only when the new timestamp is not older
  /// than the existing one. Any failure rolls the whole call back.
  fn ingest(
    &mut self,
    record_id: RecordId,
    ts_ms: i64,
    mode: TemporalityMode,
    items: &[IngestItem],
  ) -> Result<(), Self::Error>;

  /// Intern a field by name, returning the existing id when known.
  fn intern_field(&self, name: &str) -> Result<FieldId, Self::Error>;

  /// Intern a canonical value. Identical canonical bytes under the
  /// database's format always collapse to one id.
  fn intern_value(&self, value: &CanonValue) -> Result<ValueId, Self::Error>;

  /// The current value for a `(record, field)` pair, if any.
  fn get_current(
    &self,
    record_id: RecordId,
    field_id: FieldId,
  ) -> Result<Option<CurrentFact>, Self::Error>;

  /// Record ids whose current value for `field_id` is `value_id`.
  /// Order is unspecified.
  fn query_current_eq(
    &self,
    field_id: FieldId,
    value_id: ValueId,
  ) -> Result<Vec<RecordId>, Self::Error>;

  /// Distinct record ids that ever held `value_id` in `field_id`, at any
  /// timestamp. Order is unspecified.
  fn query_ever_eq(
    &self,
    field_id: FieldId,
    value_id: ValueId,
  ) -> Result<Vec<RecordId>, Self::Error>;

  /// All facts with `t1_ms <= ts <= t2_ms` (inclusive both ends), sorted
  /// ascending by ts, optionally restricted to one record.
  fn facts_window(
    &self,
    t1_ms: i64,
    t2_ms: i64,
    record_id: Option<RecordId>,
  ) -> Result<Vec<FactRow>, Self::Error>;

  /// For each field of `record_id` with any fact at `ts <= t_ms`, the
  /// fact with the greatest such ts. Ties are broken by the substrate.
  fn snapshot_at(
    &self,
    record_id: RecordId,
    t_ms: i64,
  ) -> Result<Vec<FactRow>, Self::Error>;

  /// Truncate `current_facts` and repopulate it from the facts log. The
  /// authoritative definition of the current view; the incremental upsert
  /// in [`ingest`](Self::ingest) must maintain equivalence.
  fn rebuild_current_facts(&mut self) -> Result<(), Self::Error>;

  /// Resolve a field row by id.
  fn get_field(&self, field_id: FieldId) -> Result<FieldRow, Self::Error>;

  /// Resolve a value row by id.
  fn get_value(&self, value_id: ValueId) -> Result<ValueRow, Self::Error>;
}
