//! RSI and ATR.
//!
//! Both use simple rolling means rather than Wilder smoothing:
//! RSI = 100 - 100 / (1 + mean(gains) / mean(losses)) over `period` changes,
//! ATR = mean(true range) over `period` rows.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let n = bars.len();
        // changes[i] is close[i] - close[i-1]; index 0 has none.
        let changes: Vec<Option<f64>> = (0..n)
            .map(|i| match i {
                0 => None,
                _ => Some(bars[i].close? - bars[i - 1].close?),
            })
            .collect();

        let mut result = vec![None; n];
        for i in self.period..n {
            let window = &changes[i + 1 - self.period..=i];
            let Some(deltas) = window.iter().copied().collect::<Option<Vec<f64>>>() else {
                continue;
            };
            let gain: f64 = deltas.iter().map(|d| d.max(0.0)).sum::<f64>() / self.period as f64;
            let loss: f64 = deltas.iter().map(|d| (-d).max(0.0)).sum::<f64>() / self.period as f64;
            result[i] = match (gain, loss) {
                (g, l) if l == 0.0 && g == 0.0 => None,
                (_, l) if l == 0.0 => Some(100.0),
                (g, l) => Some(100.0 - 100.0 / (1.0 + g / l)),
            };
        }
        result
    }
}

/// True range: max(high - low, |high - prev_close|, |low - prev_close|).
/// The first row has no previous close and uses high - low.
pub fn true_range(bars: &[Bar]) -> Vec<Option<f64>> {
    (0..bars.len())
        .map(|i| {
            let (h, l) = (bars[i].high?, bars[i].low?);
            match i {
                0 => Some(h - l),
                _ => {
                    let pc = bars[i - 1].close?;
                    Some((h - l).max((h - pc).abs()).max((l - pc).abs()))
                }
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let tr = true_range(bars);
        let mut result = vec![None; bars.len()];
        for i in (self.period - 1)..bars.len() {
            let window = &tr[i + 1 - self.period..=i];
            let sum: Option<f64> = window.iter().copied().sum();
            result[i] = sum.map(|s| s / self.period as f64);
        }
        result
    }
}
