//! The consolidated output table.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::row::{Cell, FeatureRow};
use crate::domain::Ticker;
use crate::schema::OutputSchema;

/// Feature rows keyed by `(ticker, date)`. Iteration is in key order, so any
/// rendering of the table is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    schema: Arc<OutputSchema>,
    rows: BTreeMap<(Ticker, NaiveDate), FeatureRow>,
}

impl FeatureTable {
    pub fn new(schema: Arc<OutputSchema>) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    pub fn shared_schema(&self) -> Arc<OutputSchema> {
        Arc::clone(&self.schema)
    }

    /// Insert or replace the row for its key. Returns the superseded row.
    pub fn upsert(&mut self, row: FeatureRow) -> Option<FeatureRow> {
        debug_assert_eq!(row.cells().len(), self.schema.len());
        self.rows.insert(row.key(), row)
    }

    pub fn get(&self, ticker: &Ticker, date: NaiveDate) -> Option<&FeatureRow> {
        self.rows.get(&(ticker.clone(), date))
    }

    /// Cell of `column` for one key.
    pub fn value(&self, ticker: &Ticker, date: NaiveDate, column: &str) -> Option<&Cell> {
        let index = self.schema.index_of(column)?;
        self.get(ticker, date)?.cell(index)
    }

    /// Every cell of `column`, in key order.
    pub fn column(&self, column: &str) -> Option<impl Iterator<Item = &Cell>> {
        let index = self.schema.index_of(column)?;
        Some(self.rows.values().filter_map(move |row| row.cell(index)))
    }

    /// Rows of one ticker, in date order.
    pub fn entity(&self, ticker: &Ticker) -> impl Iterator<Item = &FeatureRow> {
        let ticker = ticker.clone();
        self.rows
            .range((ticker.clone(), NaiveDate::MIN)..=(ticker, NaiveDate::MAX))
            .map(|(_, row)| row)
    }

    pub fn tickers(&self) -> Vec<&Ticker> {
        let mut tickers: Vec<&Ticker> = self.rows.keys().map(|(t, _)| t).collect();
        tickers.dedup();
        tickers
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// BLAKE3 over the canonical rendering: header, then each row in key
    /// order. Separators are ASCII unit/record separators so text cells
    /// cannot collide with them.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for name in self.schema.names() {
            hasher.update(name.as_bytes());
            hasher.update(b"\x1f");
        }
        hasher.update(b"\x1e");
        for row in self.rows.values() {
            for cell in row.cells() {
                hasher.update(cell.to_string().as_bytes());
                hasher.update(b"\x1f");
            }
            hasher.update(b"\x1e");
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl Extend<FeatureRow> for FeatureTable {
    /// Last write wins per key, including within `rows`.
    fn extend<I: IntoIterator<Item = FeatureRow>>(&mut self, rows: I) {
        for row in rows {
            self.upsert(row);
        }
    }
}
