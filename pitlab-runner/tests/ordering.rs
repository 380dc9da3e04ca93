//! Row order of the raw input tables must not matter under the default
//! sort policy, as long as no `(ticker, date)` key repeats.

use chrono::NaiveDate;
use proptest::prelude::*;

use pitlab_core::ingest::{RawTable, SourceKind};
use pitlab_runner::{generate, run_pipeline, PipelineConfig, SourceBatch, SyntheticSpec};

fn batch() -> SourceBatch {
    generate(&SyntheticSpec {
        tickers: 3,
        start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2023, 4, 30).unwrap(),
        seed: 3,
    })
}

fn config() -> PipelineConfig {
    PipelineConfig {
        windows: vec![5, 20],
        performance_periods: vec![10],
        poc_window: 10,
        ..PipelineConfig::default()
    }
}

fn permuted(table: &RawTable, keys: &[u64]) -> RawTable {
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by_key(|&i| keys[i % keys.len()].wrapping_mul(i as u64 + 1));
    let mut out = RawTable::new(table.kind, table.headers.iter().cloned());
    for i in order {
        out.push_row(table.rows[i].iter().cloned());
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn shuffled_inputs_give_same_table(keys in prop::collection::vec(any::<u64>(), 1..32)) {
        let original = batch();
        let mut shuffled = SourceBatch::new();
        for table in original.tables() {
            shuffled.insert(permuted(table, &keys));
        }

        let a = run_pipeline(&original, None, &config()).unwrap();
        let b = run_pipeline(&shuffled, None, &config()).unwrap();
        prop_assert_eq!(a.report.table_digest, b.report.table_digest);
        prop_assert_eq!(a.report.entities_failed, 0);
    }
}

#[test]
fn every_source_is_summarized() {
    let output = run_pipeline(&batch(), None, &config()).unwrap();
    for kind in SourceKind::ALL {
        let summary = &output.report.sources[&kind];
        assert!(!summary.dropped, "{kind} dropped");
        assert_eq!(summary.skipped, 0);
    }
}
