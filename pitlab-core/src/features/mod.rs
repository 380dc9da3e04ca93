//! Feature engine.
//!
//! Every feature is a pure function of one entity's aligned, date-ordered
//! rows and is causal: the value at row t depends only on rows 0..=t. Each
//! feature passes the truncated-vs-full series test in `tests/lookahead.rs`.
//!
//! Numeric features are `Option<f64>` columns (`None` during warmup or when
//! an input is null). Pattern features are `i8` flag columns: +1 bullish,
//! -1 bearish, 0 none.

pub mod candles;
pub mod engine;
pub mod oscillators;
pub mod poc;
pub mod ratios;
pub mod returns;
pub mod rolling;
pub mod structure;

use chrono::NaiveDate;

use crate::domain::Bar;

pub use engine::{FeatureConfig, FeatureEngine};

/// A single-series feature computed from bar history.
///
/// The output has the same length as `bars`; the first `lookback()` values
/// are `None`.
pub trait Indicator: Send + Sync {
    /// Output column name (e.g. "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Rows needed before the first value can be produced.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<Option<f64>>),
    Flag(Vec<i8>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(values) => values.len(),
            Column::Flag(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Named feature columns for one entity, index-aligned with its rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    dates: Vec<NaiveDate>,
    columns: Vec<(String, Column)>,
}

impl FeatureFrame {
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            columns: Vec::new(),
        }
    }

    pub fn push_float(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) {
        self.push(name.into(), Column::Float(values));
    }

    pub fn push_flag(&mut self, name: impl Into<String>, values: Vec<i8>) {
        self.push(name.into(), Column::Flag(values));
    }

    fn push(&mut self, name: String, column: Column) {
        debug_assert_eq!(column.len(), self.dates.len(), "column {name} has wrong length");
        self.columns.push((name, column));
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, column)| column)
    }

    pub fn float(&self, name: &str) -> Option<&[Option<f64>]> {
        match self.column(name)? {
            Column::Float(values) => Some(values),
            Column::Flag(_) => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<&[i8]> {
        match self.column(name)? {
            Column::Flag(values) => Some(values),
            Column::Float(_) => None,
        }
    }

    pub fn columns(&self) -> &[(String, Column)] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// `(a - b) / b * 100`, or `None` when either side is missing or `b` is zero.
pub(crate) fn pct_change(current: Option<f64>, base: Option<f64>) -> Option<f64> {
    let (current, base) = (current?, base?);
    if base == 0.0 {
        return None;
    }
    Some((current - base) / base * 100.0)
}

/// Synthetic bars from closes: open = previous close, high/low one unit
/// outside the body, volume 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let ohlc: Vec<_> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            (open, open.max(close) + 1.0, open.min(close) - 1.0, close)
        })
        .collect();
    make_ohlc_bars(&ohlc)
}

#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    let base_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            ticker: crate::domain::Ticker::parse("TEST").unwrap(),
            date: base_date + chrono::Duration::days(i as i64),
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(1000.0),
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: Option<f64>, expected: f64, epsilon: f64) {
    let actual = actual.unwrap_or_else(|| panic!("assert_approx failed: actual=None, expected={expected}"));
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_lookup_by_kind() {
        let bars = make_bars(&[1.0, 2.0]);
        let mut frame = FeatureFrame::new(bars.iter().map(|b| b.date).collect());
        frame.push_float("x", vec![None, Some(1.0)]);
        frame.push_flag("f", vec![0, 1]);

        assert_eq!(frame.float("x"), Some(&[None, Some(1.0)][..]));
        assert_eq!(frame.flag("f"), Some(&[0, 1][..]));
        assert!(frame.float("f").is_none());
        assert!(frame.column("missing").is_none());
        assert_eq!(frame.names().collect::<Vec<_>>(), vec!["x", "f"]);
    }

    #[test]
    fn pct_change_is_null_safe() {
        assert_approx(pct_change(Some(11.0), Some(10.0)), 10.0, 1e-9);
        assert_eq!(pct_change(Some(1.0), Some(0.0)), None);
        assert_eq!(pct_change(None, Some(1.0)), None);
    }
}
