//! Bar — one daily OHLCV observation for one ticker.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::series::Dated;
use super::ticker::Ticker;

/// Daily OHLCV bar. Any field that failed numeric coercion is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ticker: Ticker,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl Bar {
    /// True if the close is missing; such bars still occupy a row but
    /// contribute nothing to close-based windows.
    pub fn is_void(&self) -> bool {
        self.close.is_none()
    }

    /// OHLC sanity: all four present, high >= low and both bracket open/close.
    pub fn is_sane(&self) -> bool {
        match (self.open, self.high, self.low, self.close) {
            (Some(o), Some(h), Some(l), Some(c)) => {
                h >= l && h >= o && h >= c && l <= o && l <= c && o > 0.0 && c > 0.0
            }
            _ => false,
        }
    }

    /// Returns `(open, high, low, close)` if all four are present.
    pub fn ohlc(&self) -> Option<(f64, f64, f64, f64)> {
        Some((self.open?, self.high?, self.low?, self.close?))
    }
}

impl Dated for Bar {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        Bar {
            ticker: Ticker::parse("SPY").unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: Some(100.0),
            high: Some(105.0),
            low: Some(98.0),
            close: Some(103.0),
            volume: Some(50_000.0),
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.close = None;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
        assert!(bar.ohlc().is_none());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = Some(97.0);
        assert!(!bar.is_sane());
    }
}
