//! `felixctl` — command-line front-end for the Felix fact store.
//!
//! Usage: `felixctl <db-path> <command> [args]`. Exit code 0 on success,
//! 1 on a runtime error (one message to stderr), 2 on a usage error.
//!
//! Values are strictly typed: every CLI value is a `type:value` token and
//! every ingest item a `Field=type:value` token. No inference is ever
//! performed.

mod ndjson;
mod output;

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use felix_core::{
  canon::{self, CanonValue},
  fact::IngestItem,
  store::FactStore,
  types::{LogicalType, TemporalityMode},
};
use felix_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI definition ──────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
  name = "felixctl",
  about = "Bitemporal, content-addressed fact store",
  version
)]
struct Cli {
  /// Path to the SQLite database file.
  db: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
#[command(rename_all = "snake_case")]
enum Command {
  /// Create tables and indexes and stamp the current format.
  Init,

  /// Append typed field observations for one record.
  Ingest {
    record_id: u64,
    ts_ms:     i64,
    mode:      ModeArg,
    /// One or more `Field=type:value` tokens.
    #[arg(required = true)]
    items:     Vec<String>,
  },

  /// Ingest a line-delimited JSON file, one record update per line.
  IngestNdjson {
    file: PathBuf,
    /// Default mode for lines that omit `mode`.
    #[arg(default_value = "event")]
    mode: ModeArg,
  },

  /// Record ids whose current value for a field equals a typed value.
  CurrentEq {
    field_name: String,
    /// A `type:value` token.
    value:      String,
  },

  /// Record ids that ever held a typed value in a field.
  EverEq {
    field_name: String,
    /// A `type:value` token.
    value:      String,
  },

  /// All facts in an inclusive time window, one JSON object per line.
  FactsWindow {
    t1_ms:     i64,
    t2_ms:     i64,
    record_id: Option<u64>,
  },

  /// Latest-known field values for a record at or before a time.
  Snapshot { record_id: u64, t_ms: i64 },

  /// Rebuild the materialized current view from the facts log.
  RebuildCurrent,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
  /// Suppress facts whose value equals the current one.
  Event,
  /// Always append.
  Observe,
}

impl From<ModeArg> for TemporalityMode {
  fn from(mode: ModeArg) -> Self {
    match mode {
      ModeArg::Event => Self::EventDriven,
      ModeArg::Observe => Self::ObservationDriven,
    }
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("error: {e:#}");
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> anyhow::Result<()> {
  let mut store = SqliteStore::open(&cli.db)
    .with_context(|| format!("failed to open store at {:?}", cli.db))?;

  match cli.command {
    Command::Init => {
      store.init()?;
      println!("ok: initialized schema");
    }

    Command::Ingest { record_id, ts_ms, mode, items } => {
      let items = items
        .iter()
        .map(|token| parse_typed_kv(token))
        .collect::<Result<Vec<_>, _>>()?;
      store.ingest(record_id, ts_ms, mode.into(), &items)?;
      println!("ok: ingested record {record_id}");
    }

    Command::IngestNdjson { file, mode } => {
      ndjson::ingest_file(&mut store, &file, mode.into())?;
      println!("ok: ingested ndjson {}", file.display());
    }

    Command::CurrentEq { field_name, value } => {
      for record_id in query_eq(&store, &field_name, &value, true)? {
        println!("{record_id}");
      }
    }

    Command::EverEq { field_name, value } => {
      for record_id in query_eq(&store, &field_name, &value, false)? {
        println!("{record_id}");
      }
    }

    Command::FactsWindow { t1_ms, t2_ms, record_id } => {
      for fact in store.facts_window(t1_ms, t2_ms, record_id)? {
        println!("{}", output::fact_json(&store, &fact)?);
      }
    }

    Command::Snapshot { record_id, t_ms } => {
      let rows = store.snapshot_at(record_id, t_ms)?;
      let doc = output::snapshot_json(&store, record_id, t_ms, &rows)?;
      println!("{}", serde_json::to_string_pretty(&doc)?);
    }

    Command::RebuildCurrent => {
      store.rebuild_current_facts()?;
      println!("ok: rebuilt current_facts");
    }
  }

  Ok(())
}

/// Shared body of `current_eq`/`ever_eq`: intern the field and the value
/// (so unknown names and values resolve to an empty match set instead of
/// an error), then query by id.
fn query_eq<S: FactStore>(
  store: &S,
  field_name: &str,
  typed_value: &str,
  current_only: bool,
) -> anyhow::Result<Vec<u64>> {
  let field_id = store.intern_field(field_name)?;
  let value = parse_typed_value(typed_value)?;
  let value_id = store.intern_value(&value)?;
  let rows = if current_only {
    store.query_current_eq(field_id, value_id)?
  } else {
    store.query_ever_eq(field_id, value_id)?
  };
  Ok(rows)
}

// ─── Token parsing ───────────────────────────────────────────────────────────

/// Parse a `type:value` token. A token without `:` is a bare type name
/// with an empty value (only meaningful for `null`).
fn parse_typed_value(token: &str) -> Result<CanonValue, felix_core::Error> {
  let (type_name, raw_value) = token.split_once(':').unwrap_or((token, ""));
  CanonValue::from_text(LogicalType::from_name(type_name)?, raw_value)
}

/// Parse a `Field=type:value` token.
fn parse_typed_kv(token: &str) -> Result<IngestItem, felix_core::Error> {
  let Some((field, rhs)) = token.split_once('=') else {
    return Err(felix_core::Error::Parse(format!(
      "expected Field=type:value, got {token:?}"
    )));
  };
  Ok(IngestItem::new(canon::trim(field), parse_typed_value(rhs)?))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
