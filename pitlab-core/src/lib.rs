//! pitlab core: typed records, ingestion normalizer, as-of aligner, feature
//! engine, consolidator.
//!
//! This crate holds the point-in-time join and everything computed from it:
//! - Domain types (tickers, bars, fundamentals, market caps, splits, sectors)
//! - Normalizer turning raw delimited tables into typed, per-source records
//! - As-of aligner attaching the latest known value of each source to every bar
//! - Causal feature engine (rolling, momentum, candles, structure, ratios)
//! - Consolidator producing the keyed output table and its checks
//!
//! Nothing here does I/O; a run is a pure function of its inputs.

pub mod align;
pub mod consolidate;
pub mod domain;
pub mod features;
pub mod ingest;
pub mod report;
pub mod schema;
