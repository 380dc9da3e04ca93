//! Returns and performance windows, in percent.
//!
//! Offsets count rows of the same entity, so the "previous close" of a row is
//! the close of the row before it in this entity's series, whatever its date.

use chrono::Datelike;

use super::{pct_change, Indicator};
use crate::domain::Bar;

/// Close-to-close change against the previous row.
#[derive(Debug, Clone, Default)]
pub struct ChangePct;

impl Indicator for ChangePct {
    fn name(&self) -> &str {
        "change_pct"
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        (0..bars.len())
            .map(|i| match i {
                0 => None,
                _ => pct_change(bars[i].close, bars[i - 1].close),
            })
            .collect()
    }
}

/// Change from today's open to today's close.
#[derive(Debug, Clone, Default)]
pub struct ChangeFromOpen;

impl Indicator for ChangeFromOpen {
    fn name(&self) -> &str {
        "change_from_open_pct"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        bars.iter().map(|b| pct_change(b.close, b.open)).collect()
    }
}

/// Change of the close over `period` rows (252 ≈ one trading year).
#[derive(Debug, Clone)]
pub struct Performance {
    period: usize,
    name: String,
}

impl Performance {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "performance period must be >= 1");
        Self {
            period,
            name: format!("perf_{period}"),
        }
    }
}

impl Indicator for Performance {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        (0..bars.len())
            .map(|i| {
                let base = i.checked_sub(self.period)?;
                pct_change(bars[i].close, bars[base].close)
            })
            .collect()
    }
}

/// Change since the first non-null close of the row's calendar year.
#[derive(Debug, Clone, Default)]
pub struct YearToDate;

impl Indicator for YearToDate {
    fn name(&self) -> &str {
        "perf_ytd"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let mut year = None;
        let mut base: Option<f64> = None;
        bars.iter()
            .map(|bar| {
                if year != Some(bar.date.year()) {
                    year = Some(bar.date.year());
                    base = None;
                }
                if base.is_none() {
                    base = bar.close;
                }
                pct_change(bar.close, base)
            })
            .collect()
    }
}

/// Opening gap: today's open minus the previous row's close (price units).
#[derive(Debug, Clone, Default)]
pub struct Gap;

impl Indicator for Gap {
    fn name(&self) -> &str {
        "gap"
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        (0..bars.len())
            .map(|i| {
                let prev = bars.get(i.checked_sub(1)?)?;
                Some(bars[i].open? - prev.close?)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{assert_approx, make_bars, make_ohlc_bars};
    use chrono::NaiveDate;

    #[test]
    fn change_pct_first_row_is_null() {
        let bars = make_bars(&[100.0, 110.0, 99.0]);
        let out = ChangePct.compute(&bars);
        assert_eq!(out[0], None);
        assert_approx(out[1], 10.0, 1e-9);
        assert_approx(out[2], -10.0, 1e-9);
    }

    #[test]
    fn change_from_open() {
        let bars = make_ohlc_bars(&[(50.0, 60.0, 40.0, 55.0), (0.0, 1.0, 0.0, 1.0)]);
        let out = ChangeFromOpen.compute(&bars);
        assert_approx(out[0], 10.0, 1e-9);
        assert_eq!(out[1], None);
    }

    #[test]
    fn performance_offset() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 20.0]);
        let out = Performance::new(3).compute(&bars);
        assert_eq!(&out[..3], &[None, None, None]);
        assert_approx(out[3], 100.0, 1e-9);
    }

    #[test]
    fn ytd_resets_each_year() {
        let mut bars = make_bars(&[10.0, 12.0, 20.0, 25.0]);
        bars[0].date = NaiveDate::from_ymd_opt(2023, 12, 28).unwrap();
        bars[1].date = NaiveDate::from_ymd_opt(2023, 12, 29).unwrap();
        bars[2].date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        bars[3].date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let out = YearToDate.compute(&bars);
        assert_approx(out[0], 0.0, 1e-9);
        assert_approx(out[1], 20.0, 1e-9);
        assert_approx(out[2], 0.0, 1e-9);
        assert_approx(out[3], 25.0, 1e-9);
    }

    #[test]
    fn gap_uses_previous_close() {
        let bars = make_ohlc_bars(&[(10.0, 11.0, 9.0, 10.5), (11.0, 12.0, 10.0, 11.5)]);
        let out = Gap.compute(&bars);
        assert_eq!(out[0], None);
        assert_approx(out[1], 0.5, 1e-12);
    }
}
