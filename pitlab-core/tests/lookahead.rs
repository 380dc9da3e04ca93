//! Look-ahead contamination tests for the whole per-entity pipeline.
//!
//! Invariant: no output value at date T may depend on a record dated after T.
//!
//! Method: run align + features + merge on the full inputs, and again on
//! inputs truncated at a cutoff date (every source, not just prices). Rows up
//! to the cutoff must be identical. Every attachment's source date must also
//! be on or before its row's date.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use pitlab_core::align::{align_entity, AlignOptions, EntityInputs};
use pitlab_core::consolidate::{merge, FeatureRow};
use pitlab_core::domain::{
    Bar, FieldSet, FundamentalField, Fundamentals, FundamentalsRecord, MarketCapPoint, SplitEvent,
    Ticker,
};
use pitlab_core::features::{FeatureConfig, FeatureEngine};
use pitlab_core::schema::OutputSchema;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 12, 20).unwrap()
}

/// Short windows so every feature family produces values on small inputs.
fn small_config() -> FeatureConfig {
    FeatureConfig {
        windows: vec![3, 5],
        performance_periods: vec![5],
        rsi_period: 3,
        atr_period: 3,
        swing_length: 2,
        poc_window: 4,
        ..FeatureConfig::default()
    }
}

fn present() -> FieldSet {
    FundamentalField::ALL.into_iter().collect()
}

type BarSpec = (f64, f64, f64);
type ReportSpec = (i64, f64, f64);

fn build_inputs(
    bars: &[BarSpec],
    reports: &[ReportSpec],
    caps: &[(i64, f64)],
    splits: &[(i64, f64)],
) -> EntityInputs {
    let ticker = Ticker::parse("LOOK").unwrap();
    let mut inputs = EntityInputs::new(ticker.clone());
    inputs.bars = bars
        .iter()
        .enumerate()
        .map(|(i, &(close, body, spread))| {
            let open = close + body;
            Bar {
                ticker: ticker.clone(),
                date: base_date() + Duration::days(i as i64),
                open: Some(open),
                high: Some(open.max(close) + spread),
                low: Some(open.min(close) - spread),
                close: Some(close),
                volume: Some(1000.0),
            }
        })
        .collect();
    inputs.fundamentals = reports
        .iter()
        .map(|&(offset, revenue, eps)| FundamentalsRecord {
            ticker: ticker.clone(),
            date: base_date() + Duration::days(offset),
            values: Fundamentals::default()
                .with(FundamentalField::Revenue, revenue)
                .with(FundamentalField::Eps, eps)
                .with(FundamentalField::Dividends, revenue / 100.0),
        })
        .collect();
    inputs.market_caps = caps
        .iter()
        .map(|&(offset, cap)| MarketCapPoint {
            ticker: ticker.clone(),
            date: base_date() + Duration::days(offset),
            market_cap: Some(cap),
        })
        .collect();
    inputs.splits = splits
        .iter()
        .map(|&(offset, ratio)| SplitEvent {
            ticker: ticker.clone(),
            date: base_date() + Duration::days(offset),
            ratio: Some(ratio),
        })
        .collect();
    inputs
}

fn truncate(inputs: &EntityInputs, cutoff: NaiveDate) -> EntityInputs {
    let mut out = EntityInputs::new(inputs.ticker.clone());
    out.bars = inputs.bars.iter().filter(|b| b.date <= cutoff).cloned().collect();
    out.fundamentals = inputs
        .fundamentals
        .iter()
        .filter(|r| r.date <= cutoff)
        .cloned()
        .collect();
    out.market_caps = inputs
        .market_caps
        .iter()
        .filter(|p| p.date <= cutoff)
        .cloned()
        .collect();
    out.splits = inputs.splits.iter().filter(|s| s.date <= cutoff).cloned().collect();
    out
}

fn run(inputs: &EntityInputs, engine: &FeatureEngine, schema: &OutputSchema) -> Vec<FeatureRow> {
    let aligned = align_entity(inputs, &AlignOptions::default()).unwrap();
    for row in &aligned.rows {
        if let Some(source) = row.max_source_date() {
            assert!(
                source <= row.bar.date,
                "attachment dated {source} on row {}",
                row.bar.date
            );
        }
    }
    let frame = engine.compute(&aligned, &present());
    merge(&aligned, &frame, schema).unwrap()
}

fn bar_strategy() -> impl Strategy<Value = Vec<BarSpec>> {
    prop::collection::vec((10.0f64..100.0, -3.0f64..3.0, 0.0f64..2.0), 20..80)
}

fn report_strategy() -> impl Strategy<Value = Vec<ReportSpec>> {
    prop::collection::vec((-30i64..90, -50.0f64..500.0, -3.0f64..3.0), 0..8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn truncated_run_matches_full_run(
        bars in bar_strategy(),
        reports in report_strategy(),
        caps in prop::collection::vec((-10i64..90, 100.0f64..10_000.0), 0..10),
        splits in prop::collection::vec((0i64..90, 0.5f64..4.0), 0..3),
        cut in 0.0f64..1.0,
    ) {
        let engine = FeatureEngine::new(small_config());
        let schema = OutputSchema::for_engine(&engine);
        let full_inputs = build_inputs(&bars, &reports, &caps, &splits);
        let cutoff_index = ((bars.len() - 1) as f64 * cut) as usize;
        let cutoff = base_date() + Duration::days(cutoff_index as i64);

        let full = run(&full_inputs, &engine, &schema);
        let truncated = run(&truncate(&full_inputs, cutoff), &engine, &schema);

        prop_assert_eq!(truncated.len(), cutoff_index + 1);
        for (t, f) in truncated.iter().zip(&full) {
            prop_assert_eq!(t, f, "row {} differs once later data is added", t.date());
        }
    }
}

#[test]
fn report_after_row_is_never_attached() {
    let engine = FeatureEngine::new(small_config());
    let schema = OutputSchema::for_engine(&engine);
    let bars: Vec<BarSpec> = (0..10).map(|i| (20.0 + i as f64, 0.5, 1.0)).collect();
    let inputs = build_inputs(&bars, &[(5, 300.0, 1.0)], &[], &[]);
    let rows = run(&inputs, &engine, &schema);

    let revenue = schema.index_of("revenue").unwrap();
    assert!(rows[..5].iter().all(|r| r.cells()[revenue].is_null()));
    assert!(rows[5..].iter().all(|r| r.cells()[revenue].as_f64() == Some(300.0)));
}
