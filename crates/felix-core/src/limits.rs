//! Size caps, enforced at ingestion and at the line-delimited boundary —
//! never during canonicalization itself.

/// Canonical text payload cap.
pub const MAX_TEXT_CANON_BYTES: usize = 1024 * 1024;

/// Canonical bytes payload cap (decoded size, not base-64 size).
pub const MAX_BYTES_CANON_BYTES: usize = 4 * 1024 * 1024;

/// Canonical field-name cap.
pub const MAX_FIELD_NAME_BYTES: usize = 256;

/// Items accepted by a single ingest call.
pub const MAX_FIELDS_PER_INGEST: usize = 256;

/// One raw line of line-delimited ingest input.
pub const MAX_NDJSON_LINE_BYTES: usize = 2 * 1024 * 1024;
