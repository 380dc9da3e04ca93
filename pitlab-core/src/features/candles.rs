//! Candlestick pattern flags.
//!
//! Single-candle shapes (doji, hammer family, marubozu) look at the current
//! row; two-candle patterns (engulfing, harami) also look at the previous
//! row. Hammer vs hanging man and inverted hammer vs shooting star depend on
//! the preceding trend: the sign of `close[t-1] - close[t-1-trend_period]`.
//! A row with any null OHLC value flags nothing.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandleParams {
    /// body / range below this is a doji.
    pub doji_body_ratio: f64,
    /// Long shadow must be at least this multiple of the body.
    pub shadow_ratio: f64,
    /// body / range at or above this is a marubozu.
    pub marubozu_body_ratio: f64,
    pub trend_period: usize,
}

impl Default for CandleParams {
    fn default() -> Self {
        Self {
            doji_body_ratio: 0.1,
            shadow_ratio: 2.0,
            marubozu_body_ratio: 0.95,
            trend_period: 5,
        }
    }
}

pub const CANDLE_COLUMNS: [&str; 8] = [
    "cdl_doji",
    "cdl_hammer",
    "cdl_inverted_hammer",
    "cdl_hanging_man",
    "cdl_shooting_star",
    "cdl_engulfing",
    "cdl_harami",
    "cdl_marubozu",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleFlags {
    pub doji: Vec<i8>,
    pub hammer: Vec<i8>,
    pub inverted_hammer: Vec<i8>,
    pub hanging_man: Vec<i8>,
    pub shooting_star: Vec<i8>,
    pub engulfing: Vec<i8>,
    pub harami: Vec<i8>,
    pub marubozu: Vec<i8>,
}

impl CandleFlags {
    fn with_len(n: usize) -> Self {
        Self {
            doji: vec![0; n],
            hammer: vec![0; n],
            inverted_hammer: vec![0; n],
            hanging_man: vec![0; n],
            shooting_star: vec![0; n],
            engulfing: vec![0; n],
            harami: vec![0; n],
            marubozu: vec![0; n],
        }
    }

    /// Columns in `CANDLE_COLUMNS` order.
    pub fn into_columns(self) -> [(&'static str, Vec<i8>); 8] {
        let [doji, hammer, inverted_hammer, hanging_man, shooting_star, engulfing, harami, marubozu] =
            CANDLE_COLUMNS;
        [
            (doji, self.doji),
            (hammer, self.hammer),
            (inverted_hammer, self.inverted_hammer),
            (hanging_man, self.hanging_man),
            (shooting_star, self.shooting_star),
            (engulfing, self.engulfing),
            (harami, self.harami),
            (marubozu, self.marubozu),
        ]
    }
}

#[derive(Debug, Clone, Copy)]
struct Candle {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl Candle {
    fn from_bar(bar: &Bar) -> Option<Self> {
        let (open, high, low, close) = bar.ohlc()?;
        Some(Self {
            open,
            high,
            low,
            close,
        })
    }

    fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    fn range(&self) -> f64 {
        self.high - self.low
    }

    fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    fn body_ratio(&self) -> f64 {
        if self.range() > 0.0 {
            self.body() / self.range()
        } else {
            0.0
        }
    }
}

pub fn detect(bars: &[Bar], params: &CandleParams) -> CandleFlags {
    let n = bars.len();
    let mut flags = CandleFlags::with_len(n);
    let candles: Vec<Option<Candle>> = bars.iter().map(Candle::from_bar).collect();

    for i in 0..n {
        let Some(c) = candles[i] else { continue };
        let trend = trend_before(bars, i, params.trend_period);

        if c.body_ratio() < params.doji_body_ratio {
            flags.doji[i] = 1;
        }
        if c.range() > 0.0 && c.body_ratio() >= params.marubozu_body_ratio {
            flags.marubozu[i] = direction(&c);
        }

        let body = c.body();
        if body > 0.0 {
            if c.lower_shadow() >= body * params.shadow_ratio && c.upper_shadow() < body * 0.5 {
                if trend < 0 {
                    flags.hammer[i] = 1;
                } else {
                    flags.hanging_man[i] = -1;
                }
            }
            if c.upper_shadow() >= body * params.shadow_ratio && c.lower_shadow() < body * 0.5 {
                if trend < 0 {
                    flags.inverted_hammer[i] = 1;
                } else {
                    flags.shooting_star[i] = -1;
                }
            }
        }

        let Some(prev) = i.checked_sub(1).and_then(|p| candles[p]) else {
            continue;
        };
        flags.engulfing[i] = engulfing(&prev, &c);
        flags.harami[i] = harami(&prev, &c);
    }

    flags
}

fn direction(c: &Candle) -> i8 {
    if c.is_bullish() {
        1
    } else if c.is_bearish() {
        -1
    } else {
        0
    }
}

fn engulfing(prev: &Candle, c: &Candle) -> i8 {
    if prev.is_bearish() && c.is_bullish() && c.open < prev.close && c.close > prev.open {
        1
    } else if prev.is_bullish() && c.is_bearish() && c.open > prev.close && c.close < prev.open {
        -1
    } else {
        0
    }
}

fn harami(prev: &Candle, c: &Candle) -> i8 {
    if c.body() >= prev.body() {
        return 0;
    }
    if prev.is_bearish() && c.is_bullish() && c.open >= prev.close && c.close <= prev.open {
        1
    } else if prev.is_bullish() && c.is_bearish() && c.open <= prev.close && c.close >= prev.open {
        -1
    } else {
        0
    }
}

/// Sign of the close change over `period` rows ending at the previous row.
fn trend_before(bars: &[Bar], i: usize, period: usize) -> i8 {
    let Some(end) = i.checked_sub(1) else { return 0 };
    let Some(start) = end.checked_sub(period) else {
        return 0;
    };
    match (bars[end].close, bars[start].close) {
        (Some(to), Some(from)) if to > from => 1,
        (Some(to), Some(from)) if to < from => -1,
        _ => 0,
    }
}
