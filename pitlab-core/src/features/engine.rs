//! Per-entity feature computation.
//!
//! The column set depends only on `FeatureConfig`, never on the data: a
//! feature that cannot be computed for an entity is still emitted, as nulls.

use tracing::{debug, warn};

use super::candles::{self, CandleParams};
use super::oscillators::{Atr, Rsi};
use super::poc::Poc;
use super::ratios::{self, RatioInputs, GROWTH, RATIOS};
use super::returns::{ChangeFromOpen, ChangePct, Gap, Performance, YearToDate};
use super::rolling::{Expanding, RollingExtreme, Sma};
use super::structure::{self, DEFAULT_SWING_LENGTH};
use super::{Column, FeatureFrame, Indicator};
use crate::align::AlignedEntity;
use crate::domain::{Bar, FieldSet, FundamentalField, FundamentalsRecord, Series};
use crate::report::Issue;
use crate::schema::ColumnKind;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    /// Rolling windows, in rows, for SMA and rolling high/low.
    pub windows: Vec<usize>,
    /// Offsets, in rows, for `perf_<n>` columns.
    pub performance_periods: Vec<usize>,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub swing_length: usize,
    pub poc_window: usize,
    pub candles: CandleParams,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            windows: vec![20, 50, 200, 252],
            performance_periods: vec![252, 756, 1260],
            rsi_period: 14,
            atr_period: 14,
            swing_length: DEFAULT_SWING_LENGTH,
            poc_window: 50,
            candles: CandleParams::default(),
        }
    }
}

pub struct FeatureEngine {
    config: FeatureConfig,
    indicators: Vec<Box<dyn Indicator>>,
}

impl std::fmt::Debug for FeatureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureEngine")
            .field("config", &self.config)
            .field("indicators", &self.indicators.len())
            .finish()
    }
}

impl FeatureEngine {
    /// Panics if a window or period is zero; configs are validated on load.
    pub fn new(config: FeatureConfig) -> Self {
        let mut indicators: Vec<Box<dyn Indicator>> = Vec::new();
        for &window in &config.windows {
            indicators.push(Box::new(Sma::new(window)));
            indicators.push(Box::new(RollingExtreme::high(window)));
            indicators.push(Box::new(RollingExtreme::low(window)));
        }
        indicators.push(Box::new(Expanding::high()));
        indicators.push(Box::new(Expanding::low()));
        indicators.push(Box::new(ChangePct));
        indicators.push(Box::new(ChangeFromOpen));
        indicators.push(Box::new(Gap));
        for &period in &config.performance_periods {
            indicators.push(Box::new(Performance::new(period)));
        }
        indicators.push(Box::new(YearToDate));
        indicators.push(Box::new(Rsi::new(config.rsi_period)));
        indicators.push(Box::new(Atr::new(config.atr_period)));
        indicators.push(Box::new(Poc::new(config.poc_window)));

        Self { config, indicators }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Longest indicator lookback: an entity needs more rows than this for
    /// every rolling column to be non-null on its last row.
    pub fn lookback(&self) -> usize {
        self.indicators
            .iter()
            .map(|indicator| indicator.lookback())
            .max()
            .unwrap_or(0)
    }

    /// Compute every feature for one aligned entity.
    pub fn compute(&self, entity: &AlignedEntity, present: &FieldSet) -> FeatureFrame {
        let bars: Vec<Bar> = entity.rows.iter().map(|row| row.bar.clone()).collect();
        let inputs: Vec<RatioInputs<'_>> = (0..entity.rows.len())
            .map(|i| RatioInputs {
                close: entity.rows[i].bar.close,
                market_cap: entity.rows[i].market_cap.map(|s| s.value),
                fundamentals: entity.fundamentals_at(i).map(|report| &report.values),
            })
            .collect();
        let report_index: Vec<Option<usize>> = entity
            .rows
            .iter()
            .map(|row| row.fundamentals.map(|s| s.value))
            .collect();

        let frame = self.build(&bars, &inputs, &report_index, &entity.fundamentals, present);
        debug!(
            ticker = %entity.ticker,
            rows = frame.len(),
            columns = frame.columns().len(),
            "computed features"
        );
        frame
    }

    /// Output columns, in order, with their kinds.
    pub fn columns(&self) -> Vec<(String, ColumnKind)> {
        let everything: FieldSet = FundamentalField::ALL.into_iter().collect();
        self.build(&[], &[], &[], &Series::default(), &everything)
            .columns()
            .iter()
            .map(|(name, column)| {
                let kind = match column {
                    Column::Float(_) => ColumnKind::Float,
                    Column::Flag(_) => ColumnKind::Flag,
                };
                (name.clone(), kind)
            })
            .collect()
    }

    /// Features that the batch's line items cannot support, one issue per
    /// absent input. Report once per batch, not per entity.
    pub fn missing_inputs(&self, present: &FieldSet) -> Vec<Issue> {
        let issues = ratios::missing_inputs(present);
        for issue in &issues {
            if let Issue::MissingColumnForFeature { feature, column } = issue {
                warn!(%feature, %column, "feature disabled: input column absent");
            }
        }
        issues
    }

    fn build(
        &self,
        bars: &[Bar],
        inputs: &[RatioInputs<'_>],
        report_index: &[Option<usize>],
        reports: &Series<FundamentalsRecord>,
        present: &FieldSet,
    ) -> FeatureFrame {
        let n = bars.len();
        let mut frame = FeatureFrame::new(bars.iter().map(|b| b.date).collect());

        for indicator in &self.indicators {
            frame.push_float(indicator.name(), indicator.compute(bars));
        }

        for (name, flags) in candles::detect(bars, &self.config.candles).into_columns() {
            frame.push_flag(name, flags);
        }
        structure::detect(bars, self.config.swing_length).push_into(&mut frame);

        for def in RATIOS {
            let values = if ratios::is_enabled(def.requires, present) {
                inputs.iter().map(|r| (def.compute)(r)).collect()
            } else {
                vec![None; n]
            };
            frame.push_float(def.name, values);
        }

        for def in GROWTH {
            let values = if present.contains(&def.field) {
                let per_report = def.per_report(reports);
                report_index
                    .iter()
                    .map(|k| k.and_then(|k| per_report.get(k).copied().flatten()))
                    .collect()
            } else {
                vec![None; n]
            };
            frame.push_float(def.name, values);
        }

        frame
    }
}
