//! Consolidator: joins aligned rows with their features into flat output
//! rows and checks the finished table.

pub mod row;
pub mod table;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use crate::align::AlignedEntity;
use crate::domain::{FundamentalField, Ticker};
use crate::features::{Column, FeatureFrame};
use crate::report::Issue;
use crate::schema::OutputSchema;

pub use row::{Cell, CellParseError, FeatureRow};
pub use table::FeatureTable;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsolidateError {
    #[error("{ticker}: {rows} aligned rows but {features} feature rows")]
    LengthMismatch {
        ticker: Ticker,
        rows: usize,
        features: usize,
    },
    #[error("{ticker}: row {index} dated {aligned} but features dated {features}")]
    DateMismatch {
        ticker: Ticker,
        index: usize,
        aligned: NaiveDate,
        features: NaiveDate,
    },
    #[error("{ticker}: feature column {found:?} where the schema has {expected:?}")]
    ColumnMismatch {
        ticker: Ticker,
        expected: Option<String>,
        found: Option<String>,
    },
}

/// Join one entity's aligned rows with its feature frame, row by row.
pub fn merge(
    aligned: &AlignedEntity,
    frame: &FeatureFrame,
    schema: &OutputSchema,
) -> Result<Vec<FeatureRow>, ConsolidateError> {
    let ticker = &aligned.ticker;
    if aligned.rows.len() != frame.len() {
        return Err(ConsolidateError::LengthMismatch {
            ticker: ticker.clone(),
            rows: aligned.rows.len(),
            features: frame.len(),
        });
    }
    for (index, (row, &date)) in aligned.rows.iter().zip(frame.dates()).enumerate() {
        if row.bar.date != date {
            return Err(ConsolidateError::DateMismatch {
                ticker: ticker.clone(),
                index,
                aligned: row.bar.date,
                features: date,
            });
        }
    }

    let feature_names = schema
        .names()
        .skip(OutputSchema::attachment_width())
        .map(Some)
        .chain(std::iter::repeat(None));
    for (expected, found) in feature_names.zip(frame.names().map(Some).chain([None])) {
        if expected != found {
            return Err(ConsolidateError::ColumnMismatch {
                ticker: ticker.clone(),
                expected: expected.map(str::to_string),
                found: found.map(str::to_string),
            });
        }
        if found.is_none() {
            break;
        }
    }

    let rows = aligned
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let bar = &row.bar;
            let report = aligned.fundamentals_at(i);
            let sector = row.sector.as_ref();

            let mut cells = Vec::with_capacity(schema.len());
            cells.push(Cell::Text(ticker.to_string()));
            cells.push(Cell::Date(bar.date));
            cells.extend(
                [bar.open, bar.high, bar.low, bar.close, bar.volume]
                    .into_iter()
                    .map(Cell::float),
            );
            cells.push(Cell::date(row.fundamentals.map(|s| s.source_date)));
            cells.extend(
                FundamentalField::ALL
                    .iter()
                    .map(|field| Cell::float(report.and_then(|r| r.values.get(*field)))),
            );
            cells.push(Cell::float(row.market_cap.map(|s| s.value)));
            cells.push(Cell::date(row.market_cap.map(|s| s.source_date)));
            cells.push(Cell::float(row.split_ratio));
            cells.push(Cell::float(row.cumulative_split_factor.map(|s| s.value)));
            cells.push(Cell::date(row.cumulative_split_factor.map(|s| s.source_date)));
            cells.push(Cell::text(sector.and_then(|s| s.sector.as_deref())));
            cells.push(Cell::text(sector.and_then(|s| s.industry.as_deref())));
            cells.push(Cell::date(row.sector_as_of));

            for (_, column) in frame.columns() {
                cells.push(match column {
                    Column::Float(values) => Cell::float(values[i]),
                    Column::Flag(values) => Cell::Flag(values[i]),
                });
            }
            FeatureRow::new(ticker.clone(), bar.date, cells)
        })
        .collect();

    Ok(rows)
}

/// Post-run checks. An expected column the schema does not define is
/// `MissingOutputColumn`; a column null in every row is a
/// `ValidationWarning`. An empty table raises no warnings.
pub fn validate(table: &FeatureTable, expected: &[String]) -> Vec<Issue> {
    let schema = table.schema();
    let mut issues: Vec<Issue> = expected
        .iter()
        .filter(|name| !schema.contains(name))
        .map(|name| Issue::MissingOutputColumn {
            column: name.clone(),
        })
        .collect();

    if !table.is_empty() {
        for (index, spec) in schema.columns().iter().enumerate() {
            let all_null = table
                .iter()
                .all(|row| row.cell(index).map_or(true, Cell::is_null));
            if all_null {
                issues.push(Issue::ValidationWarning {
                    column: spec.name.clone(),
                });
            }
        }
    }

    for issue in &issues {
        match issue {
            Issue::MissingOutputColumn { column } => {
                warn!(%column, "expected column not in output schema")
            }
            Issue::ValidationWarning { column } => warn!(%column, "column is null in every row"),
            _ => {}
        }
    }
    issues
}
