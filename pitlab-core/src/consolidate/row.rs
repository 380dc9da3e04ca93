//! Output cells and rows.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::domain::Ticker;
use crate::schema::ColumnKind;

/// One output value. `Null` renders as an empty field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Float(f64),
    Flag(i8),
    Text(String),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot read {raw:?} as a {kind:?} cell")]
pub struct CellParseError {
    pub kind: ColumnKind,
    pub raw: String,
}

impl Cell {
    pub fn float(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Cell::Float(v),
            _ => Cell::Null,
        }
    }

    pub fn date(value: Option<NaiveDate>) -> Self {
        value.map_or(Cell::Null, Cell::Date)
    }

    pub fn text(value: Option<&str>) -> Self {
        value.map_or(Cell::Null, |s| Cell::Text(s.to_string()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Flag(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Read a rendered cell back. An empty field is `Null` for every kind.
    pub fn parse(kind: ColumnKind, raw: &str) -> Result<Self, CellParseError> {
        if raw.is_empty() {
            return Ok(Cell::Null);
        }
        let err = || CellParseError {
            kind,
            raw: raw.to_string(),
        };
        match kind {
            ColumnKind::Text => Ok(Cell::Text(raw.to_string())),
            ColumnKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Cell::Date)
                .map_err(|_| err()),
            ColumnKind::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Cell::Float)
                .ok_or_else(err),
            ColumnKind::Flag => raw.parse::<i8>().map(Cell::Flag).map_err(|_| err()),
        }
    }
}

/// Floats use Rust's shortest round-trip formatting, dates ISO 8601.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Flag(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// One `(ticker, date)` row of the output table. Cells are positional
/// against the table's `OutputSchema`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    ticker: Ticker,
    date: NaiveDate,
    cells: Vec<Cell>,
}

impl FeatureRow {
    pub fn new(ticker: Ticker, date: NaiveDate, cells: Vec<Cell>) -> Self {
        Self {
            ticker,
            date,
            cells,
        }
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn key(&self) -> (Ticker, NaiveDate) {
        (self.ticker.clone(), self.date)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }
}
