//! Persistence collaborator: delimited-text tables on disk.
//!
//! The pipeline itself never touches the filesystem. A run is
//! `(previous table, new batch) -> new table`; this module only loads the
//! previous table and saves the new one, plus reading raw input tables.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use pitlab_core::consolidate::{Cell, FeatureRow, FeatureTable};
use pitlab_core::domain::Ticker;
use pitlab_core::ingest::{RawTable, SourceKind};
use pitlab_core::schema::OutputSchema;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("{path}: {source}")]
    Csv { path: String, source: csv::Error },
    #[error("{path}: stored table does not match the current schema: {}", errors.join("; "))]
    SchemaChanged { path: String, errors: Vec<String> },
    #[error("{path}: line {line}: {message}")]
    BadRow {
        path: String,
        line: u64,
        message: String,
    },
}

/// Where the consolidated table lives between runs.
pub trait TableStore {
    /// The previously saved table, or `None` if nothing was saved yet.
    fn load_previous(&self, schema: Arc<OutputSchema>) -> Result<Option<FeatureTable>, StoreError>;

    fn save(&self, table: &FeatureTable) -> Result<(), StoreError>;
}

// ─── Output table ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CsvTableStore {
    path: PathBuf,
    delimiter: u8,
}

impl CsvTableStore {
    pub fn new(path: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            path: path.into(),
            delimiter,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn path_string(&self) -> String {
        self.path.display().to_string()
    }

    fn csv_err(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.path_string(),
            source,
        }
    }

    fn bad_row(&self, line: u64, message: impl Into<String>) -> StoreError {
        StoreError::BadRow {
            path: self.path_string(),
            line,
            message: message.into(),
        }
    }
}

impl TableStore for CsvTableStore {
    fn load_previous(&self, schema: Arc<OutputSchema>) -> Result<Option<FeatureTable>, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no previous table");
            return Ok(None);
        }
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .from_path(&self.path)
            .map_err(|e| self.csv_err(e))?;

        let header = reader.headers().map_err(|e| self.csv_err(e))?.clone();
        let header: Vec<&str> = header.iter().collect();
        let check = schema.check_header(&header);
        if !check.is_valid {
            return Err(StoreError::SchemaChanged {
                path: self.path_string(),
                errors: check.errors,
            });
        }

        let kinds: Vec<_> = schema.columns().iter().map(|c| c.kind).collect();
        let mut table = FeatureTable::new(Arc::clone(&schema));
        for record in reader.records() {
            let record = record.map_err(|e| self.csv_err(e))?;
            let line = record.position().map_or(0, |p| p.line());
            let cells = record
                .iter()
                .zip(&kinds)
                .map(|(raw, kind)| Cell::parse(*kind, raw))
                .collect::<Result<Vec<Cell>, _>>()
                .map_err(|e| self.bad_row(line, e.to_string()))?;
            let ticker = cells
                .first()
                .and_then(Cell::as_str)
                .and_then(|s| Ticker::parse(s).ok())
                .ok_or_else(|| self.bad_row(line, "missing ticker"))?;
            let date = cells
                .get(1)
                .and_then(Cell::as_date)
                .ok_or_else(|| self.bad_row(line, "missing date"))?;
            table.upsert(FeatureRow::new(ticker, date, cells));
        }

        debug!(path = %self.path.display(), rows = table.len(), "loaded previous table");
        Ok(Some(table))
    }

    /// Written to a sibling temp file and renamed into place, so a failed
    /// save leaves the previous table intact.
    fn save(&self, table: &FeatureTable) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        let io_err = |source: io::Error| StoreError::Io {
            path: tmp.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(&tmp)
            .map_err(|e| self.csv_err(e))?;
        writer
            .write_record(table.schema().names())
            .map_err(|e| self.csv_err(e))?;
        for row in table.iter() {
            writer
                .write_record(row.cells().iter().map(|c| c.to_string()))
                .map_err(|e| self.csv_err(e))?;
        }
        writer.flush().map_err(io_err)?;
        drop(writer);

        std::fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path_string(),
            source,
        })?;
        debug!(path = %self.path.display(), rows = table.len(), "saved table");
        Ok(())
    }
}

// ─── Raw input tables ───────────────────────────────────────────────

/// Read a delimited input file as a `RawTable`. Ragged rows are accepted;
/// the normalizer reads missing trailing cells as empty.
pub fn read_raw_table(path: &Path, kind: SourceKind, delimiter: u8) -> Result<RawTable, StoreError> {
    let csv_err = |source: csv::Error| StoreError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let mut table = RawTable::new(kind, headers);
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        table.push_row(record.iter());
    }

    debug!(path = %path.display(), %kind, rows = table.len(), "read raw table");
    Ok(table)
}

pub fn write_raw_table(path: &Path, table: &RawTable, delimiter: u8) -> Result<(), StoreError> {
    let csv_err = |source: csv::Error| StoreError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    writer.write_record(&table.headers).map_err(csv_err)?;
    for row in &table.rows {
        writer.write_record(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })
}
