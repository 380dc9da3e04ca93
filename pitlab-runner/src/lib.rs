//! pitlab runner: pipeline orchestration on top of `pitlab-core`.
//!
//! This crate provides:
//! - TOML pipeline configuration with a content fingerprint
//! - The batch runner (per-ticker fan-out on a rayon pool, panic isolation)
//! - The JSON run report
//! - Delimited-text persistence for raw inputs and the output table
//! - Deterministic synthetic input batches

pub mod config;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod synthetic;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{
    process_entity, process_entity_guarded, run_pipeline, EntityContext, EntityError,
    PipelineOutput, RunError, SourceBatch,
};
pub use report::{PipelineReport, SourceSummary};
pub use store::{read_raw_table, write_raw_table, CsvTableStore, StoreError, TableStore};
pub use synthetic::{generate, SyntheticSpec};
