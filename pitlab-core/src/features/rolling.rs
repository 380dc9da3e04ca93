//! Rolling and expanding statistics over the close.
//!
//! Rolling windows count rows, not calendar days. A window is `None` until it
//! holds `period` rows, and `None` whenever any close inside it is null.
//! Expanding max/min use a minimum of one observation and skip null closes.

use super::Indicator;
use crate::domain::Bar;

/// Simple moving average of the close.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let n = bars.len();
        let mut result = vec![None; n];
        // Nulls currently inside the window.
        let mut nulls = 0usize;

        for i in 0..n {
            if bars[i].close.is_none() {
                nulls += 1;
            }
            if i >= self.period && bars[i - self.period].close.is_none() {
                nulls -= 1;
            }
            if i + 1 >= self.period && nulls == 0 {
                // Summed afresh so the value is the plain mean of the window.
                let sum: f64 = bars[i + 1 - self.period..=i]
                    .iter()
                    .filter_map(|b| b.close)
                    .sum();
                result[i] = Some(sum / self.period as f64);
            }
        }

        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Max,
    Min,
}

impl Extreme {
    fn pick(self, a: f64, b: f64) -> f64 {
        match self {
            Extreme::Max => a.max(b),
            Extreme::Min => a.min(b),
        }
    }
}

/// Highest or lowest close over the last `period` rows.
#[derive(Debug, Clone)]
pub struct RollingExtreme {
    period: usize,
    extreme: Extreme,
    name: String,
}

impl RollingExtreme {
    pub fn high(period: usize) -> Self {
        assert!(period >= 1, "rolling period must be >= 1");
        Self {
            period,
            extreme: Extreme::Max,
            name: format!("high_{period}"),
        }
    }

    pub fn low(period: usize) -> Self {
        assert!(period >= 1, "rolling period must be >= 1");
        Self {
            period,
            extreme: Extreme::Min,
            name: format!("low_{period}"),
        }
    }
}

impl Indicator for RollingExtreme {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let n = bars.len();
        let mut result = vec![None; n];
        if n < self.period {
            return result;
        }

        for i in (self.period - 1)..n {
            let window = &bars[i + 1 - self.period..=i];
            result[i] = window.iter().try_fold(None, |acc: Option<f64>, bar| {
                let close = bar.close?;
                Some(Some(match acc {
                    Some(best) => self.extreme.pick(best, close),
                    None => close,
                }))
            })
            .flatten();
        }

        result
    }
}

/// All-time high or low of the close up to and including each row.
#[derive(Debug, Clone)]
pub struct Expanding {
    extreme: Extreme,
    name: String,
}

impl Expanding {
    pub fn high() -> Self {
        Self {
            extreme: Extreme::Max,
            name: "all_time_high".to_string(),
        }
    }

    pub fn low() -> Self {
        Self {
            extreme: Extreme::Min,
            name: "all_time_low".to_string(),
        }
    }
}

impl Indicator for Expanding {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let mut best: Option<f64> = None;
        bars.iter()
            .map(|bar| {
                if let Some(close) = bar.close {
                    best = Some(match best {
                        Some(b) => self.extreme.pick(b, close),
                        None => close,
                    });
                }
                best
            })
            .collect()
    }
}
