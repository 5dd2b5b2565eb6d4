//! The closed logical type system and the two versioned format axes.
//!
//! A database is opened under a tag map (logical type ↔ one-byte tag) and a
//! hash format (how the tag frames the canonical bytes). Both are stored as
//! independent meta keys so tags can evolve without invalidating existing
//! hashes. Databases missing either key predate the keys and are legacy on
//! both axes.

use std::fmt;

use crate::{Error, Result, canon};

// ─── LogicalType ─────────────────────────────────────────────────────────────

/// The closed set of logical value types.
///
/// `JsonReserved` occupies a tag slot reserved for a future format version.
/// It round-trips through the tag maps but is rejected by user-facing
/// canonicalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
  Null,
  Bool,
  Int,
  Float,
  Text,
  Bytes,
  Uuid,
  JsonReserved,
}

impl LogicalType {
  /// The user-facing type name, as used in `type:value` tokens and in the
  /// NDJSON `t` field.
  pub fn name(self) -> &'static str {
    match self {
      Self::Null => "null",
      Self::Bool => "bool",
      Self::Int => "int",
      Self::Float => "float",
      Self::Text => "text",
      Self::Bytes => "bytes",
      Self::Uuid => "uuid",
      Self::JsonReserved => "json",
    }
  }

  /// Inverse of [`name`](Self::name). The input is trimmed first.
  pub fn from_name(s: &str) -> Result<Self> {
    match canon::trim(s) {
      "null" => Ok(Self::Null),
      "bool" => Ok(Self::Bool),
      "int" => Ok(Self::Int),
      "float" => Ok(Self::Float),
      "text" => Ok(Self::Text),
      "bytes" => Ok(Self::Bytes),
      "uuid" => Ok(Self::Uuid),
      "json" => Ok(Self::JsonReserved),
      other => Err(Error::Parse(format!("unknown type: {other}"))),
    }
  }
}

impl fmt::Display for LogicalType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

// ─── TagMap ──────────────────────────────────────────────────────────────────

/// The bijection between logical types and one-byte tags, versioned per
/// database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMap {
  /// Mapping used by early databases: Text=1, Int=2, Float=3, Bool=4,
  /// Null=5, Json=6. Bytes and Uuid do not exist under this map.
  LegacyV02,
  /// The v0.3 normative mapping.
  FelixV03,
}

impl TagMap {
  /// The `tag_map` meta value naming this map.
  pub fn meta_value(self) -> &'static str {
    match self {
      Self::LegacyV02 => "legacy_v02",
      Self::FelixV03 => "felix_v03",
    }
  }

  /// The one-byte tag for `t` under this map.
  pub fn tag_byte(self, t: LogicalType) -> Result<u8> {
    match self {
      Self::LegacyV02 => match t {
        LogicalType::Text => Ok(1),
        LogicalType::Int => Ok(2),
        LogicalType::Float => Ok(3),
        LogicalType::Bool => Ok(4),
        LogicalType::Null => Ok(5),
        LogicalType::JsonReserved => Ok(6),
        LogicalType::Bytes | LogicalType::Uuid => {
          Err(Error::UnsupportedInLegacy(t))
        }
      },
      Self::FelixV03 => Ok(match t {
        LogicalType::Null => 0x00,
        LogicalType::Bool => 0x01,
        LogicalType::Int => 0x02,
        LogicalType::Float => 0x03,
        LogicalType::Text => 0x04,
        LogicalType::Bytes => 0x05,
        LogicalType::Uuid => 0x06,
        LogicalType::JsonReserved => 0x07,
      }),
    }
  }

  /// Inverse of [`tag_byte`](Self::tag_byte); unknown tags are rejected.
  pub fn logical_type(self, tag: u8) -> Result<LogicalType> {
    let t = match self {
      Self::LegacyV02 => match tag {
        1 => LogicalType::Text,
        2 => LogicalType::Int,
        3 => LogicalType::Float,
        4 => LogicalType::Bool,
        5 => LogicalType::Null,
        6 => LogicalType::JsonReserved,
        _ => {
          return Err(Error::BadTag { map: self.meta_value(), tag });
        }
      },
      Self::FelixV03 => match tag {
        0x00 => LogicalType::Null,
        0x01 => LogicalType::Bool,
        0x02 => LogicalType::Int,
        0x03 => LogicalType::Float,
        0x04 => LogicalType::Text,
        0x05 => LogicalType::Bytes,
        0x06 => LogicalType::Uuid,
        0x07 => LogicalType::JsonReserved,
        _ => {
          return Err(Error::BadTag { map: self.meta_value(), tag });
        }
      },
    };
    Ok(t)
  }
}

// ─── HashFormat ──────────────────────────────────────────────────────────────

/// How the type tag frames the canonical bytes in the content hash input.
///
/// The v0.3 form inserts a `0x00` separator after the tag so a tag byte can
/// never be confused with the first canonical byte across future tag-map
/// extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashFormat {
  /// `[tag] ++ canonical_bytes`
  LegacyNoSep,
  /// `[tag, 0x00] ++ canonical_bytes`
  FelixV03Sep,
}

impl HashFormat {
  /// The `hash_format` meta value naming this framing.
  pub fn meta_value(self) -> &'static str {
    match self {
      Self::LegacyNoSep => "legacy_no_sep",
      Self::FelixV03Sep => "felix_v03_sep",
    }
  }
}

// ─── DbFormat ────────────────────────────────────────────────────────────────

/// The two format axes a database is opened under. Fixed at open time;
/// `init` is the only operation that writes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbFormat {
  pub tag_map:     TagMap,
  pub hash_format: HashFormat,
}

impl DbFormat {
  /// The format stamped onto newly initialized databases.
  pub const CURRENT: Self = Self {
    tag_map:     TagMap::FelixV03,
    hash_format: HashFormat::FelixV03Sep,
  };
  /// The format assumed for databases that predate the meta keys.
  pub const LEGACY: Self = Self {
    tag_map:     TagMap::LegacyV02,
    hash_format: HashFormat::LegacyNoSep,
  };

  /// Resolve the format from the raw meta values. Unless both keys are
  /// present, the database is legacy on both axes; unrecognized values
  /// also fall back to legacy.
  pub fn from_meta(tag_map: Option<&str>, hash_format: Option<&str>) -> Self {
    match (tag_map, hash_format) {
      (Some(tm), Some(hf)) => Self {
        tag_map:     if tm == "felix_v03" {
          TagMap::FelixV03
        } else {
          TagMap::LegacyV02
        },
        hash_format: if hf == "felix_v03_sep" {
          HashFormat::FelixV03Sep
        } else {
          HashFormat::LegacyNoSep
        },
      },
      _ => Self::LEGACY,
    }
  }
}

// ─── TemporalityMode ─────────────────────────────────────────────────────────

/// How an ingest treats a value equal to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalityMode {
  /// Suppress the fact when the incoming value equals the current value
  /// for the pair (`"event"`).
  EventDriven,
  /// Always append (`"observe"`).
  ObservationDriven,
}

impl TemporalityMode {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::EventDriven => "event",
      Self::ObservationDriven => "observe",
    }
  }

  pub fn from_name(s: &str) -> Result<Self> {
    match s {
      "event" => Ok(Self::EventDriven),
      "observe" => Ok(Self::ObservationDriven),
      _ => Err(Error::Parse("mode must be 'event' or 'observe'".into())),
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
