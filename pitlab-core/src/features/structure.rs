//! Market structure: swing points, breaks of structure, changes of
//! character, order blocks, liquidity pools and fair value gaps.
//!
//! A swing high at pivot row p has the highest high of rows p-L..=p+L
//! (ties only with rows before it). It is flagged on row p+L, the first row
//! at which it is known, with `swing_level` carrying the pivot's high. Swing
//! lows mirror this on lows.
//!
//! A close above the latest unbroken swing high is a break upward: `bos = 1`
//! if the prevailing structure was not bearish, otherwise `choch = 1`.
//! Breaks downward mirror this. Each swing level can be broken once.
//! `structure_age` is the row distance from the broken pivot to the break.
//!
//! Every break also marks an order block on the break row: for an upward
//! break, the candle with the lowest low strictly between the pivot and the
//! break; for a downward break, the one with the highest high.
//! `ob_volume` is the volume of the break row and the two before it, and
//! `ob_percentage` is the smaller of (break + previous volume) and the
//! volume two rows back, relative to the larger.
//!
//! A confirmed swing that lands within `LIQUIDITY_RANGE_PERCENT` of the
//! price range seen so far from an unswept swing of the same side forms a
//! liquidity pool: `liquidity` is flagged on the confirmation row with the
//! pool's mean level and the row span from its first pivot. A pool is swept
//! on the first later row whose wick trades through one of its swings.
//!
//! A fair value gap is flagged on the third candle of the pattern: bullish
//! when its low is above the high two rows back and the middle candle closed
//! up; bearish mirrors this. A gap is mitigated on the first later row that
//! trades back into it; `fvg_mitigated` carries the gap's direction and
//! `fvg_mitigated_age` the rows since it formed.
//!
//! Events the batch reports as row indices are expressed here as ages in
//! rows, counted back from the row where the event becomes known.

use super::FeatureFrame;
use crate::domain::Bar;

pub const DEFAULT_SWING_LENGTH: usize = 5;

/// Equal-level tolerance for liquidity pools, as a fraction of the range.
pub const LIQUIDITY_RANGE_PERCENT: f64 = 0.01;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureFlags {
    pub swing: Vec<i8>,
    pub swing_level: Vec<Option<f64>>,
    pub bos: Vec<i8>,
    pub choch: Vec<i8>,
    pub structure_level: Vec<Option<f64>>,
    pub structure_age: Vec<Option<f64>>,
    pub ob: Vec<i8>,
    pub ob_top: Vec<Option<f64>>,
    pub ob_bottom: Vec<Option<f64>>,
    pub ob_volume: Vec<Option<f64>>,
    pub ob_percentage: Vec<Option<f64>>,
    pub liquidity: Vec<i8>,
    pub liquidity_level: Vec<Option<f64>>,
    pub liquidity_span: Vec<Option<f64>>,
    pub liquidity_swept: Vec<i8>,
    pub fvg: Vec<i8>,
    pub fvg_top: Vec<Option<f64>>,
    pub fvg_bottom: Vec<Option<f64>>,
    pub fvg_mitigated: Vec<i8>,
    pub fvg_mitigated_age: Vec<Option<f64>>,
}

impl StructureFlags {
    fn with_len(n: usize) -> Self {
        Self {
            swing: vec![0; n],
            swing_level: vec![None; n],
            bos: vec![0; n],
            choch: vec![0; n],
            structure_level: vec![None; n],
            structure_age: vec![None; n],
            ob: vec![0; n],
            ob_top: vec![None; n],
            ob_bottom: vec![None; n],
            ob_volume: vec![None; n],
            ob_percentage: vec![None; n],
            liquidity: vec![0; n],
            liquidity_level: vec![None; n],
            liquidity_span: vec![None; n],
            liquidity_swept: vec![0; n],
            fvg: vec![0; n],
            fvg_top: vec![None; n],
            fvg_bottom: vec![None; n],
            fvg_mitigated: vec![0; n],
            fvg_mitigated_age: vec![None; n],
        }
    }

    pub fn push_into(self, frame: &mut FeatureFrame) {
        frame.push_flag("swing", self.swing);
        frame.push_float("swing_level", self.swing_level);
        frame.push_flag("bos", self.bos);
        frame.push_flag("choch", self.choch);
        frame.push_float("structure_level", self.structure_level);
        frame.push_float("structure_age", self.structure_age);
        frame.push_flag("ob", self.ob);
        frame.push_float("ob_top", self.ob_top);
        frame.push_float("ob_bottom", self.ob_bottom);
        frame.push_float("ob_volume", self.ob_volume);
        frame.push_float("ob_percentage", self.ob_percentage);
        frame.push_flag("liquidity", self.liquidity);
        frame.push_float("liquidity_level", self.liquidity_level);
        frame.push_float("liquidity_span", self.liquidity_span);
        frame.push_flag("liquidity_swept", self.liquidity_swept);
        frame.push_flag("fvg", self.fvg);
        frame.push_float("fvg_top", self.fvg_top);
        frame.push_float("fvg_bottom", self.fvg_bottom);
        frame.push_flag("fvg_mitigated", self.fvg_mitigated);
        frame.push_float("fvg_mitigated_age", self.fvg_mitigated_age);
    }
}

/// A confirmed swing that has not been traded through yet.
#[derive(Debug, Clone, Copy)]
struct OpenSwing {
    level: f64,
    pivot: usize,
    pooled: bool,
}

#[derive(Debug, Clone, Copy)]
struct OpenGap {
    direction: i8,
    top: f64,
    bottom: f64,
    row: usize,
}

pub fn detect(bars: &[Bar], swing_length: usize) -> StructureFlags {
    assert!(swing_length >= 1, "swing length must be >= 1");
    let n = bars.len();
    let mut out = StructureFlags::with_len(n);

    // Latest unbroken swing per side, for breaks: (level, pivot).
    let mut break_high: Option<(f64, usize)> = None;
    let mut break_low: Option<(f64, usize)> = None;
    let mut trend: i8 = 0;

    let mut open_highs: Vec<OpenSwing> = Vec::new();
    let mut open_lows: Vec<OpenSwing> = Vec::new();
    let mut open_gaps: Vec<OpenGap> = Vec::new();
    let mut range: Option<(f64, f64)> = None;

    for i in 0..n {
        let bar = &bars[i];
        if let (Some(high), Some(low)) = (bar.high, bar.low) {
            range = Some(match range {
                Some((max, min)) => (max.max(high), min.min(low)),
                None => (high, low),
            });
        }

        mitigate_gaps(&mut open_gaps, bar, i, &mut out);

        // Sweeps only see swings confirmed on earlier rows.
        if let Some(low) = bar.low {
            if sweep(&mut open_lows, |level| low < level) {
                out.liquidity_swept[i] = -1;
            }
        }
        if let Some(high) = bar.high {
            if sweep(&mut open_highs, |level| high > level) {
                out.liquidity_swept[i] = 1;
            }
        }

        // Breaks are tested against swings confirmed on earlier rows.
        if let Some(close) = bar.close {
            if let Some((level, pivot)) = break_high.filter(|(level, _)| close > *level) {
                if trend < 0 {
                    out.choch[i] = 1;
                } else {
                    out.bos[i] = 1;
                }
                trend = 1;
                record_break(bars, i, level, pivot, 1, &mut out);
                break_high = None;
            } else if let Some((level, pivot)) = break_low.filter(|(level, _)| close < *level) {
                if trend > 0 {
                    out.choch[i] = -1;
                } else {
                    out.bos[i] = -1;
                }
                trend = -1;
                record_break(bars, i, level, pivot, -1, &mut out);
                break_low = None;
            }
        }

        if let Some(pivot) = i.checked_sub(swing_length).filter(|p| *p >= swing_length) {
            let window = &bars[pivot - swing_length..=i];
            let high = pivot_value(window, swing_length, |b| b.high, |a, b| a > b);
            let low = pivot_value(window, swing_length, |b| b.low, |a, b| a < b);
            let tolerance =
                range.map_or(0.0, |(max, min)| (max - min) * LIQUIDITY_RANGE_PERCENT);
            if let Some(level) = low {
                out.swing[i] = -1;
                out.swing_level[i] = Some(level);
                break_low = Some((level, pivot));
                if let Some((mean, span)) = join_pool(&mut open_lows, level, pivot, tolerance) {
                    out.liquidity[i] = -1;
                    out.liquidity_level[i] = Some(mean);
                    out.liquidity_span[i] = Some(span as f64);
                }
            }
            // An outside bar can be both; the high is reported.
            if let Some(level) = high {
                out.swing[i] = 1;
                out.swing_level[i] = Some(level);
                break_high = Some((level, pivot));
                if let Some((mean, span)) = join_pool(&mut open_highs, level, pivot, tolerance) {
                    out.liquidity[i] = 1;
                    out.liquidity_level[i] = Some(mean);
                    out.liquidity_span[i] = Some(span as f64);
                }
            }
        }

        if i >= 2 {
            if let Some(gap) = fair_value_gap(&bars[i - 2..=i], i, &mut out) {
                open_gaps.push(gap);
            }
        }
    }

    out
}

/// Value at `window[center]` if it beats every later row strictly and every
/// earlier row or ties with it. Any null in the window means no pivot.
fn pivot_value(
    window: &[Bar],
    center: usize,
    field: impl Fn(&Bar) -> Option<f64>,
    beats: impl Fn(f64, f64) -> bool,
) -> Option<f64> {
    let values: Vec<f64> = window.iter().map(&field).collect::<Option<_>>()?;
    let pivot = values[center];
    let before_ok = values[..center].iter().all(|v| !beats(*v, pivot));
    let after_ok = values[center + 1..].iter().all(|v| beats(pivot, *v));
    (before_ok && after_ok).then_some(pivot)
}

/// Level, age and order block for a break on row `i` of the swing at `pivot`.
fn record_break(
    bars: &[Bar],
    i: usize,
    level: f64,
    pivot: usize,
    direction: i8,
    out: &mut StructureFlags,
) {
    out.structure_level[i] = Some(level);
    out.structure_age[i] = Some((i - pivot) as f64);

    // Rows strictly between pivot and break; a swing is confirmed at least
    // one row before it can be broken, so the range is never empty.
    let candidate = (pivot + 1..i)
        .filter_map(|k| Some((k, bars[k].high?, bars[k].low?)))
        .reduce(|best, next| {
            let better = if direction > 0 { next.2 < best.2 } else { next.1 > best.1 };
            if better {
                next
            } else {
                best
            }
        });
    let Some((_, top, bottom)) = candidate else {
        return;
    };
    out.ob[i] = direction;
    out.ob_top[i] = Some(top);
    out.ob_bottom[i] = Some(bottom);

    let volumes: Option<Vec<f64>> = i
        .checked_sub(2)
        .and_then(|start| bars[start..=i].iter().map(|b| b.volume).collect());
    if let Some(v) = volumes {
        out.ob_volume[i] = Some(v[0] + v[1] + v[2]);
        let (recent, earlier) = (v[1] + v[2], v[0]);
        let larger = recent.max(earlier);
        if larger > 0.0 {
            out.ob_percentage[i] = Some(recent.min(earlier) / larger * 100.0);
        }
    }
}

/// Add a newly confirmed swing to the open list. Returns the pool's mean
/// level and row span when it lands near at least one unswept swing.
fn join_pool(
    open: &mut Vec<OpenSwing>,
    level: f64,
    pivot: usize,
    tolerance: f64,
) -> Option<(f64, usize)> {
    let mut sum = level;
    let mut count = 1usize;
    let mut first = pivot;
    for swing in open.iter_mut().filter(|s| (s.level - level).abs() <= tolerance) {
        swing.pooled = true;
        sum += swing.level;
        count += 1;
        first = first.min(swing.pivot);
    }
    let pooled = count > 1;
    open.push(OpenSwing {
        level,
        pivot,
        pooled,
    });
    pooled.then(|| (sum / count as f64, pivot - first))
}

/// Drop swings that price traded through. True if any of them was pooled.
fn sweep(open: &mut Vec<OpenSwing>, crossed: impl Fn(f64) -> bool) -> bool {
    let mut pool_swept = false;
    open.retain(|swing| {
        if crossed(swing.level) {
            pool_swept |= swing.pooled;
            false
        } else {
            true
        }
    });
    pool_swept
}

/// Close gaps that row `i` trades back into; the oldest one is reported.
fn mitigate_gaps(open: &mut Vec<OpenGap>, bar: &Bar, i: usize, out: &mut StructureFlags) {
    open.retain(|gap| {
        let hit = if gap.direction > 0 {
            bar.low.is_some_and(|low| low <= gap.top)
        } else {
            bar.high.is_some_and(|high| high >= gap.bottom)
        };
        if hit && out.fvg_mitigated[i] == 0 {
            out.fvg_mitigated[i] = gap.direction;
            out.fvg_mitigated_age[i] = Some((i - gap.row) as f64);
        }
        !hit
    });
}

fn fair_value_gap(three: &[Bar], i: usize, out: &mut StructureFlags) -> Option<OpenGap> {
    let (first, middle, last) = (&three[0], &three[1], &three[2]);
    let (first_high, first_low) = (first.high?, first.low?);
    let (last_high, last_low) = (last.high?, last.low?);
    let (mid_open, mid_close) = (middle.open?, middle.close?);

    let (direction, top, bottom) = if last_low > first_high && mid_close > mid_open {
        (1, last_low, first_high)
    } else if last_high < first_low && mid_close < mid_open {
        (-1, first_low, last_high)
    } else {
        return None;
    };
    out.fvg[i] = direction;
    out.fvg_top[i] = Some(top);
    out.fvg_bottom[i] = Some(bottom);
    Some(OpenGap {
        direction,
        top,
        bottom,
        row: i,
    })
}
