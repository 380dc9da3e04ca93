//! Point of control: the most frequent close over a rolling window.
//!
//! Closes are compared exactly. When several prices share the top count the
//! lowest price wins, so a window of all-distinct closes reports its minimum.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Poc {
    window: usize,
    name: String,
}

impl Poc {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "POC window must be >= 1");
        Self {
            window,
            name: format!("poc_{window}"),
        }
    }
}

impl Indicator for Poc {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let n = bars.len();
        let mut result = vec![None; n];
        for i in (self.window - 1)..n {
            let window = &bars[i + 1 - self.window..=i];
            let Some(mut closes) = window.iter().map(|b| b.close).collect::<Option<Vec<f64>>>()
            else {
                continue;
            };
            closes.sort_by(f64::total_cmp);
            result[i] = mode_of_sorted(&closes);
        }
        result
    }
}

/// Mode of an ascending slice; ties resolve to the first (lowest) run.
fn mode_of_sorted(values: &[f64]) -> Option<f64> {
    let mut best: Option<(f64, usize)> = None;
    let mut run_start = 0;
    for i in 1..=values.len() {
        if i == values.len() || values[i] != values[run_start] {
            let count = i - run_start;
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((values[run_start], count));
            }
            run_start = i;
        }
    }
    best.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::make_bars;

    #[test]
    fn most_frequent_close() {
        let bars = make_bars(&[5.0, 7.0, 7.0, 6.0, 5.0, 7.0]);
        let out = Poc::new(4).compute(&bars);
        assert_eq!(&out[..3], &[None, None, None]);
        // [5,7,7,6] -> 7, [7,7,6,5] -> 7, [7,6,5,7] -> 7
        assert_eq!(&out[3..], &[Some(7.0), Some(7.0), Some(7.0)]);
    }

    #[test]
    fn ties_pick_lowest_price() {
        let bars = make_bars(&[9.0, 3.0, 9.0, 3.0]);
        assert_eq!(Poc::new(4).compute(&bars)[3], Some(3.0));
        let distinct = make_bars(&[4.0, 2.0, 8.0]);
        assert_eq!(Poc::new(3).compute(&distinct)[2], Some(2.0));
    }

    #[test]
    fn null_close_blanks_window() {
        let mut bars = make_bars(&[1.0, 1.0, 2.0]);
        bars[0].close = None;
        let out = Poc::new(2).compute(&bars);
        assert_eq!(out, vec![None, None, Some(1.0)]);
    }
}
