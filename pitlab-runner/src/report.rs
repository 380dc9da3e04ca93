//! Machine-readable run report.
//!
//! Serialized as JSON next to the output table. Every degraded outcome of a
//! run is one entry in `issues`; the summary counts are derived from the
//! same data so the two cannot disagree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use pitlab_core::ingest::SourceKind;
use pitlab_core::report::{Issue, Severity};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// What happened to one input source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    /// Rows in the raw table.
    pub rows_in: usize,
    /// Typed records produced.
    pub records: usize,
    /// Rows skipped as malformed.
    pub skipped: usize,
    /// True when the whole source was dropped (schema mismatch).
    pub dropped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config_fingerprint: String,
    /// BLAKE3 of the output table's canonical rendering.
    pub table_digest: String,
    pub sources: BTreeMap<SourceKind, SourceSummary>,
    pub entities: usize,
    pub entities_failed: usize,
    /// Rows computed by this run (new or superseding).
    pub rows_computed: usize,
    /// Rows in the output table, including carried-over rows.
    pub rows_total: usize,
    pub issues: Vec<Issue>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl PipelineReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity() == severity)
            .count()
    }

    /// Issue counts keyed by issue kind.
    pub fn counts_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitlab_core::domain::Ticker;

    fn report(issues: Vec<Issue>) -> PipelineReport {
        PipelineReport {
            schema_version: SCHEMA_VERSION,
            config_fingerprint: "f".into(),
            table_digest: "d".into(),
            sources: BTreeMap::new(),
            entities: 2,
            entities_failed: 1,
            rows_computed: 10,
            rows_total: 10,
            issues,
        }
    }

    #[test]
    fn counts_follow_issues() {
        let r = report(vec![
            Issue::EntityFailed {
                ticker: Ticker::parse("A").unwrap(),
                reason: "x".into(),
            },
            Issue::ValidationWarning {
                column: "p_e".into(),
            },
            Issue::ValidationWarning {
                column: "p_b".into(),
            },
        ]);
        assert!(r.has_errors());
        assert_eq!(r.count(Severity::Info), 2);
        assert_eq!(r.counts_by_kind()["validation_warning"], 2);
    }

    #[test]
    fn json_round_trip_keeps_issue_tags() {
        let mut r = report(vec![Issue::MissingOutputColumn {
            column: "foo".into(),
        }]);
        r.sources.insert(SourceKind::Prices, SourceSummary::default());
        let json = r.to_json().unwrap();
        assert!(json.contains("\"kind\": \"missing_output_column\""));
        assert!(json.contains("\"prices\""));
        let back: PipelineReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
