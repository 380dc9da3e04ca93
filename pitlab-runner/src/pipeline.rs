//! Run orchestration: normalize every source, group by ticker, fan entities
//! out to a worker pool, consolidate on the calling thread.
//!
//! Entities share nothing mutable. Each worker reads its own `EntityInputs`
//! and returns its rows or an error; a panic is caught at the entity boundary
//! so one bad ticker never takes the batch down.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use pitlab_core::align::{align_entity, AlignError, AlignOptions, EntityInputs};
use pitlab_core::consolidate::{self, ConsolidateError, FeatureRow, FeatureTable};
use pitlab_core::domain::{FieldSet, Ticker};
use pitlab_core::features::FeatureEngine;
use pitlab_core::ingest::{
    normalize_fundamentals, normalize_market_caps, normalize_prices, normalize_sectors,
    normalize_splits, IngestError, Normalized, RawTable, SourceKind,
};
use pitlab_core::report::Issue;
use pitlab_core::schema::OutputSchema;

use crate::config::{ConfigError, PipelineConfig};
use crate::report::{PipelineReport, SourceSummary, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("previous table was built with a different column set")]
    SchemaChanged,
}

/// Why one entity produced no rows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntityError {
    #[error(transparent)]
    Align(#[from] AlignError),
    #[error(transparent)]
    Consolidate(#[from] ConsolidateError),
    #[error("panicked: {0}")]
    Panicked(String),
}

impl EntityError {
    fn to_issues(&self, ticker: &Ticker) -> Vec<Issue> {
        let failed = Issue::EntityFailed {
            ticker: ticker.clone(),
            reason: self.to_string(),
        };
        match self {
            EntityError::Align(err) => vec![err.to_issue(), failed],
            _ => vec![failed],
        }
    }
}

/// One batch of raw input tables. Any source may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBatch {
    tables: BTreeMap<SourceKind, RawTable>,
}

impl SourceBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table under its own kind, replacing any earlier one.
    pub fn insert(&mut self, table: RawTable) {
        self.tables.insert(table.kind, table);
    }

    pub fn with(mut self, table: RawTable) -> Self {
        self.insert(table);
        self
    }

    pub fn get(&self, kind: SourceKind) -> Option<&RawTable> {
        self.tables.get(&kind)
    }

    pub fn tables(&self) -> impl Iterator<Item = &RawTable> {
        self.tables.values()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: FeatureTable,
    pub report: PipelineReport,
}

/// Shared, read-only state for entity workers.
pub struct EntityContext {
    pub engine: FeatureEngine,
    pub schema: Arc<OutputSchema>,
    pub options: AlignOptions,
    pub present: FieldSet,
}

impl EntityContext {
    pub fn new(config: &PipelineConfig, present: FieldSet) -> Self {
        let engine = FeatureEngine::new(config.feature_config());
        let schema = Arc::new(OutputSchema::for_engine(&engine));
        Self {
            engine,
            schema,
            options: config.align_options(),
            present,
        }
    }
}

/// Align, compute and merge one entity.
pub fn process_entity(
    inputs: &EntityInputs,
    ctx: &EntityContext,
) -> Result<Vec<FeatureRow>, EntityError> {
    let aligned = align_entity(inputs, &ctx.options)?;
    let frame = ctx.engine.compute(&aligned, &ctx.present);
    let rows = consolidate::merge(&aligned, &frame, &ctx.schema)?;
    Ok(rows)
}

/// `process_entity` with panics turned into `EntityError::Panicked`.
pub fn process_entity_guarded(
    inputs: &EntityInputs,
    ctx: &EntityContext,
) -> Result<Vec<FeatureRow>, EntityError> {
    guarded(|| process_entity(inputs, ctx))
}

fn guarded<T>(f: impl FnOnce() -> Result<T, EntityError>) -> Result<T, EntityError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(EntityError::Panicked(message))
    })
}

/// Run the pipeline over one batch.
///
/// `previous` is the table from an earlier run, if any. Rows recomputed here
/// replace rows with the same `(ticker, date)`; all other rows carry over.
pub fn run_pipeline(
    batch: &SourceBatch,
    previous: Option<FeatureTable>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, RunError> {
    config.validate()?;
    let mut issues: Vec<Issue> = Vec::new();
    let mut sources: BTreeMap<SourceKind, SourceSummary> = BTreeMap::new();

    // ── Normalize ──
    let (s, i) = (&mut sources, &mut issues);
    let prices = normalize_source(batch, SourceKind::Prices, normalize_prices, s, i);
    let market_caps = normalize_source(batch, SourceKind::MarketCap, normalize_market_caps, s, i);
    let splits = normalize_source(batch, SourceKind::Splits, normalize_splits, s, i);
    let sectors = normalize_source(batch, SourceKind::Sectors, normalize_sectors, s, i);

    let mut present = FieldSet::new();
    let mut fundamentals = Vec::new();
    if let Some(table) = batch.get(SourceKind::Fundamentals) {
        match normalize_fundamentals(table) {
            Ok(normalized) => {
                sources.insert(
                    SourceKind::Fundamentals,
                    summary(table, normalized.records.len(), &normalized.issues),
                );
                issues.extend(normalized.issues);
                present = normalized.present;
                fundamentals = normalized.records;
            }
            Err(err) => dropped_source(table, &err, &mut sources, &mut issues),
        }
    }

    let ctx = EntityContext::new(config, present);
    let incremental = previous.is_some();
    let mut table = match previous {
        Some(previous) if previous.schema() != ctx.schema.as_ref() => {
            return Err(RunError::SchemaChanged)
        }
        Some(previous) => previous,
        None => FeatureTable::new(Arc::clone(&ctx.schema)),
    };
    issues.extend(ctx.engine.missing_inputs(&ctx.present));

    // ── Group ──
    let mut entities: BTreeMap<Ticker, EntityInputs> = BTreeMap::new();
    for bar in prices {
        entities
            .entry(bar.ticker.clone())
            .or_insert_with(|| EntityInputs::new(bar.ticker.clone()))
            .bars
            .push(bar);
    }
    let mut orphans = 0usize;
    for record in fundamentals {
        match entities.get_mut(&record.ticker) {
            Some(e) => e.fundamentals.push(record),
            None => orphans += 1,
        }
    }
    for point in market_caps {
        match entities.get_mut(&point.ticker) {
            Some(e) => e.market_caps.push(point),
            None => orphans += 1,
        }
    }
    for event in splits {
        match entities.get_mut(&event.ticker) {
            Some(e) => e.splits.push(event),
            None => orphans += 1,
        }
    }
    for info in sectors {
        match entities.get_mut(&info.ticker) {
            Some(e) => e.sectors.push(info),
            None => orphans += 1,
        }
    }
    if orphans > 0 {
        debug!(orphans, "low-frequency records for tickers without prices ignored");
    }

    // ── Fan out ──
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()?;
    let work: Vec<(&Ticker, &EntityInputs)> = entities.iter().collect();
    let results: Vec<(&Ticker, Result<Vec<FeatureRow>, EntityError>)> = pool.install(|| {
        work.par_iter()
            .map(|(ticker, inputs)| (*ticker, process_entity_guarded(inputs, &ctx)))
            .collect()
    });

    // ── Consolidate ──
    let mut rows_computed = 0usize;
    let mut entities_failed = 0usize;
    let lookback = ctx.engine.lookback();
    for (ticker, result) in results {
        match result {
            Ok(rows) => {
                debug!(%ticker, rows = rows.len(), "entity done");
                if incremental {
                    issues.extend(short_history(&table, ticker, &rows, lookback));
                }
                rows_computed += rows.len();
                table.extend(rows);
            }
            Err(err) => {
                warn!(%ticker, error = %err, "entity failed");
                entities_failed += 1;
                issues.extend(err.to_issues(ticker));
            }
        }
    }
    issues.extend(consolidate::validate(&table, &config.expected_columns));

    let report = PipelineReport {
        schema_version: SCHEMA_VERSION,
        config_fingerprint: config.fingerprint(),
        table_digest: table.digest(),
        sources,
        entities: entities.len(),
        entities_failed,
        rows_computed,
        rows_total: table.len(),
        issues,
    };
    info!(
        entities = report.entities,
        failed = report.entities_failed,
        rows = report.rows_total,
        issues = report.issues.len(),
        "pipeline run complete"
    );
    Ok(PipelineOutput { table, report })
}

/// Recomputed rows that overwrite stored history see only this batch's bars.
/// Flag entities whose batch is too short for the longest lookback.
fn short_history(
    table: &FeatureTable,
    ticker: &Ticker,
    rows: &[FeatureRow],
    lookback: usize,
) -> Option<Issue> {
    let first = rows.first()?.date();
    let has_earlier = table.entity(ticker).next().is_some_and(|row| row.date() < first);
    if !has_earlier || rows.len() > lookback {
        return None;
    }
    warn!(
        %ticker,
        rows = rows.len(),
        lookback,
        "incremental batch shorter than the feature lookback; rolling values will be null"
    );
    Some(Issue::ShortHistory {
        ticker: ticker.clone(),
        rows: rows.len(),
        lookback,
    })
}

fn normalize_source<T>(
    batch: &SourceBatch,
    kind: SourceKind,
    normalize: fn(&RawTable) -> Result<Normalized<T>, IngestError>,
    sources: &mut BTreeMap<SourceKind, SourceSummary>,
    issues: &mut Vec<Issue>,
) -> Vec<T> {
    let Some(table) = batch.get(kind) else {
        return Vec::new();
    };
    match normalize(table) {
        Ok(normalized) => {
            sources.insert(kind, summary(table, normalized.records.len(), &normalized.issues));
            issues.extend(normalized.issues);
            normalized.records
        }
        Err(err) => {
            dropped_source(table, &err, sources, issues);
            Vec::new()
        }
    }
}

fn summary(table: &RawTable, records: usize, issues: &[Issue]) -> SourceSummary {
    SourceSummary {
        rows_in: table.len(),
        records,
        skipped: issues
            .iter()
            .filter(|i| matches!(i, Issue::MalformedRecord { .. }))
            .count(),
        dropped: false,
    }
}

fn dropped_source(
    table: &RawTable,
    err: &IngestError,
    sources: &mut BTreeMap<SourceKind, SourceSummary>,
    issues: &mut Vec<Issue>,
) {
    warn!(source = %table.kind, error = %err, "source dropped");
    sources.insert(
        table.kind,
        SourceSummary {
            rows_in: table.len(),
            dropped: true,
            ..SourceSummary::default()
        },
    );
    issues.push(err.to_issue());
}
