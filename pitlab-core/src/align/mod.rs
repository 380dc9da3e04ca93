//! Temporal aligner.
//!
//! For one entity, attaches to every daily bar the most recent low-frequency
//! value known on that date (fundamentals, market cap, sector label) plus the
//! split event of that exact day and the cumulative split factor so far.
//! Each source is matched independently; sources carry disjoint fields so the
//! order in which they are combined does not matter.
//!
//! No attachment ever has a source date later than its row. Records that
//! carry no value at all (an empty fundamentals report, a market cap or split
//! ratio that failed to parse) are dropped before matching so they cannot
//! shadow an earlier usable record.

pub mod asof;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::{
    Bar, Dated, FundamentalsRecord, MarketCapPoint, SectorInfo, SectorLabel, Series, SplitEvent,
    Ticker,
};
use crate::ingest::SourceKind;
use crate::report::Issue;
use asof::{asof_indices, exact_indices};

/// What to do when a per-entity input is not in date order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPolicy {
    /// Sort (stable) and continue; upstream order is not trusted.
    #[default]
    Sort,
    /// Reject the entity with `AlignError::UnsortedInput`.
    FailFast,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignOptions {
    pub sort_policy: SortPolicy,
    /// Discard as-of matches older than this many calendar days.
    pub max_staleness_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignError {
    #[error("{ticker}: {kind} input out of date order at index {index}")]
    UnsortedInput {
        ticker: Ticker,
        kind: SourceKind,
        index: usize,
    },
}

impl AlignError {
    pub fn to_issue(&self) -> Issue {
        match self {
            AlignError::UnsortedInput {
                ticker,
                kind,
                index,
            } => Issue::UnsortedInput {
                ticker: ticker.clone(),
                source: *kind,
                index: *index,
            },
        }
    }
}

/// Everything known about one entity, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInputs {
    pub ticker: Ticker,
    pub bars: Vec<Bar>,
    pub fundamentals: Vec<FundamentalsRecord>,
    pub market_caps: Vec<MarketCapPoint>,
    pub splits: Vec<SplitEvent>,
    pub sectors: Vec<SectorInfo>,
}

impl EntityInputs {
    pub fn new(ticker: Ticker) -> Self {
        Self {
            ticker,
            bars: Vec::new(),
            fundamentals: Vec::new(),
            market_caps: Vec::new(),
            splits: Vec::new(),
            sectors: Vec::new(),
        }
    }
}

/// A value together with the date of the record it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    pub source_date: NaiveDate,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub bar: Bar,
    /// Index into `AlignedEntity::fundamentals`.
    pub fundamentals: Option<Stamped<usize>>,
    pub market_cap: Option<Stamped<f64>>,
    /// Ratio of a split taking effect on this exact date.
    pub split_ratio: Option<f64>,
    /// Product of all split ratios dated on or before this row.
    pub cumulative_split_factor: Option<Stamped<f64>>,
    pub sector: Option<SectorLabel>,
    /// Date of the sector row used; `None` for static metadata.
    pub sector_as_of: Option<NaiveDate>,
}

impl AlignedRow {
    /// Latest source date among the attachments.
    pub fn max_source_date(&self) -> Option<NaiveDate> {
        [
            self.fundamentals.map(|s| s.source_date),
            self.market_cap.map(|s| s.source_date),
            self.cumulative_split_factor.map(|s| s.source_date),
            self.sector_as_of,
        ]
        .into_iter()
        .flatten()
        .max()
    }
}

impl Dated for AlignedRow {
    fn date(&self) -> NaiveDate {
        self.bar.date
    }
}

/// One entity's bars with their as-of attachments, in date order.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedEntity {
    pub ticker: Ticker,
    pub rows: Vec<AlignedRow>,
    /// The entity's cleaned fundamentals reports, ascending by date.
    pub fundamentals: Series<FundamentalsRecord>,
}

impl AlignedEntity {
    pub fn fundamentals_at(&self, row: usize) -> Option<&FundamentalsRecord> {
        let stamped = self.rows.get(row)?.fundamentals?;
        self.fundamentals.get(stamped.value)
    }
}

/// Align one entity's inputs.
pub fn align_entity(
    inputs: &EntityInputs,
    options: &AlignOptions,
) -> Result<AlignedEntity, AlignError> {
    let ticker = &inputs.ticker;
    let policy = options.sort_policy;

    let bars = ordered(ticker, SourceKind::Prices, &inputs.bars, policy)?;
    let fundamentals = ordered(ticker, SourceKind::Fundamentals, &inputs.fundamentals, policy)?;
    let market_caps = ordered(ticker, SourceKind::MarketCap, &inputs.market_caps, policy)?;
    let splits = ordered(ticker, SourceKind::Splits, &inputs.splits, policy)?;

    let (static_sectors, dated_sectors): (Vec<&SectorInfo>, Vec<&SectorInfo>) =
        inputs.sectors.iter().partition(|s| s.date.is_none());
    let dated_sectors: Vec<SectorInfo> = dated_sectors.into_iter().cloned().collect();
    let dated_sectors = ordered(ticker, SourceKind::Sectors, &dated_sectors, policy)?;
    let static_sector = static_sectors.last().map(|s| s.label.clone());

    let fundamentals = Series::from_unsorted(
        fundamentals
            .into_vec()
            .into_iter()
            .filter(|r| !r.values.is_empty())
            .collect(),
    );
    let market_caps: Vec<(NaiveDate, f64)> = market_caps
        .iter()
        .filter_map(|p| Some((p.date, p.market_cap?)))
        .collect();
    let splits: Vec<(NaiveDate, f64)> = splits
        .iter()
        .filter_map(|s| Some((s.date, s.ratio?)))
        .collect();

    let targets = bars.dates();
    let fundamentals_hits = asof_indices(&targets, &fundamentals.dates());
    let cap_dates: Vec<NaiveDate> = market_caps.iter().map(|(d, _)| *d).collect();
    let cap_hits = asof_indices(&targets, &cap_dates);
    let split_dates: Vec<NaiveDate> = splits.iter().map(|(d, _)| *d).collect();
    let split_hits = asof_indices(&targets, &split_dates);
    let split_exact = exact_indices(&targets, &split_dates);
    let sector_hits = asof_indices(&targets, &dated_sectors.dates());

    let cumulative: Vec<f64> = splits
        .iter()
        .scan(1.0, |factor, (_, ratio)| {
            *factor *= ratio;
            Some(*factor)
        })
        .collect();

    let fresh = |source: NaiveDate, target: NaiveDate| match options.max_staleness_days {
        Some(days) => (target - source).num_days() <= i64::from(days),
        None => true,
    };

    let rows: Vec<AlignedRow> = bars
        .into_vec()
        .into_iter()
        .enumerate()
        .map(|(i, bar)| {
            let date = bar.date;
            let fundamentals = fundamentals_hits[i]
                .and_then(|j| fundamentals.get(j).map(|r| (j, r.date)))
                .filter(|(_, source)| fresh(*source, date))
                .map(|(j, source_date)| Stamped {
                    source_date,
                    value: j,
                });
            let market_cap = cap_hits[i]
                .map(|j| market_caps[j])
                .filter(|(source, _)| fresh(*source, date))
                .map(|(source_date, value)| Stamped { source_date, value });
            let cumulative_split_factor = split_hits[i].map(|j| Stamped {
                source_date: splits[j].0,
                value: cumulative[j],
            });
            let split_ratio = split_exact[i].map(|j| splits[j].1);

            let dated_sector = sector_hits[i]
                .and_then(|j| dated_sectors.get(j))
                .filter(|s| fresh(s.date(), date));
            let (sector, sector_as_of) = match dated_sector {
                Some(s) => (Some(s.label.clone()), s.date),
                None => (static_sector.clone(), None),
            };

            AlignedRow {
                bar,
                fundamentals,
                market_cap,
                split_ratio,
                cumulative_split_factor,
                sector,
                sector_as_of,
            }
        })
        .collect();

    debug!(
        ticker = %ticker,
        rows = rows.len(),
        fundamentals = fundamentals.len(),
        market_caps = market_caps.len(),
        splits = splits.len(),
        "aligned entity"
    );

    Ok(AlignedEntity {
        ticker: ticker.clone(),
        rows,
        fundamentals,
    })
}

fn ordered<T: Dated + Clone>(
    ticker: &Ticker,
    kind: SourceKind,
    items: &[T],
    policy: SortPolicy,
) -> Result<Series<T>, AlignError> {
    match policy {
        SortPolicy::Sort => Ok(Series::from_unsorted(items.to_vec())),
        SortPolicy::FailFast => {
            Series::from_sorted(items.to_vec()).map_err(|index| AlignError::UnsortedInput {
                ticker: ticker.clone(),
                kind,
                index,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FundamentalField, Fundamentals};

    fn t() -> Ticker {
        Ticker::parse("XYZ").unwrap()
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn bar(date: NaiveDate, close: f64) -> Bar {
        Bar {
            ticker: t(),
            date,
            open: Some(close),
            high: Some(close),
            low: Some(close),
            close: Some(close),
            volume: Some(1.0),
        }
    }

    fn report(date: NaiveDate, revenue: f64) -> FundamentalsRecord {
        FundamentalsRecord {
            ticker: t(),
            date,
            values: Fundamentals::default().with(FundamentalField::Revenue, revenue),
        }
    }

    fn revenue_at(entity: &AlignedEntity, row: usize) -> Option<f64> {
        entity
            .fundamentals_at(row)
            .and_then(|r| r.values.get(FundamentalField::Revenue))
    }

    #[test]
    fn backward_fills_and_never_looks_ahead() {
        let mut inputs = EntityInputs::new(t());
        inputs.bars = (1..=10).map(|day| bar(d(1, day), day as f64)).collect();
        inputs.fundamentals = vec![report(d(1, 4), 200.0), report(d(1, 1), 100.0)];

        let entity = align_entity(&inputs, &AlignOptions::default()).unwrap();
        assert_eq!(revenue_at(&entity, 0), Some(100.0));
        assert_eq!(revenue_at(&entity, 2), Some(100.0));
        assert_eq!(revenue_at(&entity, 3), Some(200.0));
        assert_eq!(revenue_at(&entity, 9), Some(200.0));
        for row in &entity.rows {
            assert!(row.max_source_date().map_or(true, |s| s <= row.date()));
        }
    }

    #[test]
    fn no_prior_record_is_null() {
        let mut inputs = EntityInputs::new(t());
        inputs.bars = vec![bar(d(1, 2), 1.0), bar(d(1, 3), 1.0)];
        inputs.fundamentals = vec![report(d(1, 3), 5.0)];
        let entity = align_entity(&inputs, &AlignOptions::default()).unwrap();
        assert_eq!(revenue_at(&entity, 0), None);
        assert_eq!(revenue_at(&entity, 1), Some(5.0));
    }

    #[test]
    fn equal_dates_later_input_wins() {
        let mut inputs = EntityInputs::new(t());
        inputs.bars = vec![bar(d(1, 5), 1.0)];
        inputs.fundamentals = vec![report(d(1, 2), 1.0), report(d(1, 2), 2.0)];
        let entity = align_entity(&inputs, &AlignOptions::default()).unwrap();
        assert_eq!(revenue_at(&entity, 0), Some(2.0));
    }

    #[test]
    fn empty_reports_do_not_shadow_earlier_ones() {
        let mut inputs = EntityInputs::new(t());
        inputs.bars = vec![bar(d(1, 5), 1.0)];
        inputs.fundamentals = vec![
            report(d(1, 2), 7.0),
            FundamentalsRecord {
                ticker: t(),
                date: d(1, 3),
                values: Fundamentals::default(),
            },
        ];
        let entity = align_entity(&inputs, &AlignOptions::default()).unwrap();
        assert_eq!(revenue_at(&entity, 0), Some(7.0));
    }

    #[test]
    fn fail_fast_reports_first_unsorted_index() {
        let mut inputs = EntityInputs::new(t());
        inputs.bars = vec![bar(d(1, 3), 1.0), bar(d(1, 2), 1.0)];
        let options = AlignOptions {
            sort_policy: SortPolicy::FailFast,
            ..Default::default()
        };
        let err = align_entity(&inputs, &options).unwrap_err();
        assert_eq!(
            err,
            AlignError::UnsortedInput {
                ticker: t(),
                kind: SourceKind::Prices,
                index: 1
            }
        );
        assert_eq!(err.to_issue().kind(), "unsorted_input");
    }

    #[test]
    fn unsorted_bars_are_sorted_by_default() {
        let mut inputs = EntityInputs::new(t());
        inputs.bars = vec![bar(d(1, 3), 3.0), bar(d(1, 2), 2.0), bar(d(1, 3), 4.0)];
        let entity = align_entity(&inputs, &AlignOptions::default()).unwrap();
        let closes: Vec<_> = entity.rows.iter().map(|r| r.bar.close).collect();
        assert_eq!(closes, vec![Some(2.0), Some(4.0)]);
    }

    #[test]
    fn splits_exact_and_cumulative() {
        let mut inputs = EntityInputs::new(t());
        inputs.bars = (1..=6).map(|day| bar(d(3, day), 1.0)).collect();
        inputs.splits = vec![
            SplitEvent {
                ticker: t(),
                date: d(3, 2),
                ratio: Some(2.0),
            },
            SplitEvent {
                ticker: t(),
                date: d(3, 5),
                ratio: Some(3.0),
            },
        ];
        let entity = align_entity(&inputs, &AlignOptions::default()).unwrap();
        let ratios: Vec<_> = entity.rows.iter().map(|r| r.split_ratio).collect();
        assert_eq!(ratios, vec![None, Some(2.0), None, None, Some(3.0), None]);
        let factors: Vec<_> = entity
            .rows
            .iter()
            .map(|r| r.cumulative_split_factor.map(|s| s.value))
            .collect();
        assert_eq!(
            factors,
            vec![None, Some(2.0), Some(2.0), Some(2.0), Some(6.0), Some(6.0)]
        );
    }

    #[test]
    fn static_sector_applies_everywhere_until_a_dated_row() {
        let mut inputs = EntityInputs::new(t());
        inputs.bars = (1..=4).map(|day| bar(d(2, day), 1.0)).collect();
        let label = |sector: &str| SectorLabel {
            sector: Some(sector.to_string()),
            industry: None,
        };
        inputs.sectors = vec![
            SectorInfo {
                ticker: t(),
                date: None,
                label: label("Technology"),
            },
            SectorInfo {
                ticker: t(),
                date: Some(d(2, 3)),
                label: label("Energy"),
            },
        ];
        let entity = align_entity(&inputs, &AlignOptions::default()).unwrap();
        let sectors: Vec<_> = entity
            .rows
            .iter()
            .map(|r| r.sector.as_ref().and_then(|l| l.sector.clone()))
            .collect();
        assert_eq!(
            sectors,
            vec![
                Some("Technology".to_string()),
                Some("Technology".to_string()),
                Some("Energy".to_string()),
                Some("Energy".to_string()),
            ]
        );
        assert_eq!(entity.rows[0].sector_as_of, None);
        assert_eq!(entity.rows[3].sector_as_of, Some(d(2, 3)));
    }

    #[test]
    fn staleness_bound_drops_old_matches() {
        let mut inputs = EntityInputs::new(t());
        inputs.bars = vec![bar(d(1, 5), 1.0), bar(d(1, 20), 1.0)];
        inputs.market_caps = vec![MarketCapPoint {
            ticker: t(),
            date: d(1, 1),
            market_cap: Some(9.0),
        }];
        let options = AlignOptions {
            max_staleness_days: Some(7),
            ..Default::default()
        };
        let entity = align_entity(&inputs, &options).unwrap();
        assert_eq!(entity.rows[0].market_cap.map(|s| s.value), Some(9.0));
        assert_eq!(entity.rows[1].market_cap, None);
    }

    #[test]
    fn absent_sources_leave_attachments_null() {
        let mut inputs = EntityInputs::new(t());
        inputs.bars = vec![bar(d(1, 5), 1.0)];
        let entity = align_entity(&inputs, &AlignOptions::default()).unwrap();
        let row = &entity.rows[0];
        assert!(row.fundamentals.is_none());
        assert!(row.market_cap.is_none());
        assert!(row.cumulative_split_factor.is_none());
        assert!(row.sector.is_none());
        assert_eq!(row.max_source_date(), None);
    }
}
