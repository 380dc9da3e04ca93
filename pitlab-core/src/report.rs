//! Structured issues raised while processing a batch.
//!
//! Every degraded outcome (skipped row, aborted source, disabled feature,
//! failed entity, all-null column) becomes one `Issue`. Nothing is only
//! printed and discarded.

use serde::{Deserialize, Serialize};

use crate::domain::Ticker;
use crate::ingest::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    /// A row lacked a usable ticker or date and was skipped.
    MalformedRecord {
        source: SourceKind,
        row: usize,
        reason: String,
    },
    /// None of a source's value columns were present; the source was dropped.
    SchemaMismatch {
        source: SourceKind,
        expected: Vec<String>,
    },
    /// Input for one entity was out of date order under the fail-fast policy.
    UnsortedInput {
        ticker: Ticker,
        source: SourceKind,
        index: usize,
    },
    /// A derived feature was disabled because an input column is absent.
    MissingColumnForFeature { feature: String, column: String },
    /// An output column is null in every row.
    ValidationWarning { column: String },
    /// An expected output column is not part of the output schema.
    MissingOutputColumn { column: String },
    /// An entity's processing failed; its rows are absent from this run.
    EntityFailed { ticker: Ticker, reason: String },
    /// An incremental batch replaced stored rows of an entity with fewer bars
    /// than the longest indicator lookback, so some recomputed values are null.
    ShortHistory {
        ticker: Ticker,
        rows: usize,
        lookback: usize,
    },
}

impl Issue {
    pub fn severity(&self) -> Severity {
        match self {
            Issue::MalformedRecord { .. } | Issue::ValidationWarning { .. } => Severity::Info,
            Issue::MissingColumnForFeature { .. }
            | Issue::UnsortedInput { .. }
            | Issue::ShortHistory { .. } => Severity::Warning,
            Issue::SchemaMismatch { .. }
            | Issue::MissingOutputColumn { .. }
            | Issue::EntityFailed { .. } => Severity::Error,
        }
    }

    /// Stable short name, matching the serde tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Issue::MalformedRecord { .. } => "malformed_record",
            Issue::SchemaMismatch { .. } => "schema_mismatch",
            Issue::UnsortedInput { .. } => "unsorted_input",
            Issue::MissingColumnForFeature { .. } => "missing_column_for_feature",
            Issue::ValidationWarning { .. } => "validation_warning",
            Issue::MissingOutputColumn { .. } => "missing_output_column",
            Issue::EntityFailed { .. } => "entity_failed",
            Issue::ShortHistory { .. } => "short_history",
        }
    }
}
