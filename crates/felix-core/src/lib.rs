//! Core types and trait definitions for the Felix fact store.
//!
//! Felix is a bitemporal, content-addressed store: an append-only log of
//! typed field observations per record, with a materialized current view
//! and point-in-time snapshots. This crate holds everything that must be
//! stable across storage backends — the closed logical type system, the
//! versioned tag maps and hash framing, the canonical byte form of every
//! type, and the [`store::FactStore`] trait — and is deliberately free of
//! database dependencies.

pub mod canon;
pub mod error;
pub mod fact;
pub mod limits;
pub mod store;
pub mod types;

pub use error::{Error, Result};
