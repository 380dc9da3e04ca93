//! Ingestion normalizer.
//!
//! Turns heterogeneous raw tables (column name → string cell) into typed
//! records with a fixed schema per source kind. Pure: no filesystem or
//! network access happens here.
//!
//! Failure classes:
//! - a row without a usable ticker or date is skipped and reported as
//!   `Issue::MalformedRecord`;
//! - a batch with none of the expected value columns (or no ticker/date
//!   column at all) fails with `IngestError::SchemaMismatch` and the caller
//!   drops that source;
//! - a value that does not parse as a number becomes `None`.

pub mod coerce;
mod columns;
pub mod normalize;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::report::Issue;

pub use normalize::{
    normalize_fundamentals, normalize_market_caps, normalize_prices, normalize_sectors,
    normalize_splits, NormalizedFundamentals,
};

/// Which upstream source a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Prices,
    Fundamentals,
    MarketCap,
    Splits,
    Sectors,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Prices,
        SourceKind::Fundamentals,
        SourceKind::MarketCap,
        SourceKind::Splits,
        SourceKind::Sectors,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Prices => "prices",
            SourceKind::Fundamentals => "fundamentals",
            SourceKind::MarketCap => "market_cap",
            SourceKind::Splits => "splits",
            SourceKind::Sectors => "sectors",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raw table as handed over by an ingestion collaborator.
///
/// Rows are positional against `headers`; short rows read as empty cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub kind: SourceKind,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new<I, S>(kind: SourceKind, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build from mapping-style records. Headers are the union of keys.
    pub fn from_records(kind: SourceKind, records: &[BTreeMap<String, String>]) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|h| record.get(h).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Self {
            kind,
            headers,
            rows,
        }
    }

    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    /// Cell at `(row, column)`, or `""` when the row is short.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("{kind} batch has none of the expected columns: {}", expected.join(", "))]
    SchemaMismatch {
        kind: SourceKind,
        expected: Vec<String>,
    },
}

impl IngestError {
    pub fn to_issue(&self) -> Issue {
        match self {
            IngestError::SchemaMismatch { kind, expected } => Issue::SchemaMismatch {
                source: *kind,
                expected: expected.clone(),
            },
        }
    }
}

/// Typed records plus the non-fatal issues found while building them.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub issues: Vec<Issue>,
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            issues: Vec::new(),
        }
    }
}
