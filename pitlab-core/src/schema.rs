//! Output table schema: the contract with the persistence collaborator.
//!
//! Column order is: key columns, bar columns, as-of attachments (with the
//! source dates that make look-ahead checkable), then feature columns in
//! engine order. The schema is fixed per `FeatureConfig`; data never adds or
//! removes a column.

use serde::{Deserialize, Serialize};

use crate::domain::FundamentalField;
use crate::features::FeatureEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Date,
    Float,
    Flag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Columns before the fundamentals line items.
pub const LEADING_COLUMNS: &[(&str, ColumnKind)] = &[
    ("ticker", ColumnKind::Text),
    ("date", ColumnKind::Date),
    ("open", ColumnKind::Float),
    ("high", ColumnKind::Float),
    ("low", ColumnKind::Float),
    ("close", ColumnKind::Float),
    ("volume", ColumnKind::Float),
    ("fundamentals_date", ColumnKind::Date),
];

/// Columns between the line items and the features.
pub const TRAILING_ATTACHMENT_COLUMNS: &[(&str, ColumnKind)] = &[
    ("market_cap", ColumnKind::Float),
    ("market_cap_date", ColumnKind::Date),
    ("split_ratio", ColumnKind::Float),
    ("cumulative_split_factor", ColumnKind::Float),
    ("split_factor_date", ColumnKind::Date),
    ("sector", ColumnKind::Text),
    ("industry", ColumnKind::Text),
    ("sector_date", ColumnKind::Date),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchema {
    columns: Vec<ColumnSpec>,
}

impl OutputSchema {
    pub fn new(feature_columns: impl IntoIterator<Item = (String, ColumnKind)>) -> Self {
        let spec = |name: &str, kind: ColumnKind| ColumnSpec {
            name: name.to_string(),
            kind,
        };
        let mut columns: Vec<ColumnSpec> = LEADING_COLUMNS
            .iter()
            .map(|&(name, kind)| spec(name, kind))
            .collect();
        columns.extend(
            FundamentalField::ALL
                .iter()
                .map(|field| spec(field.key(), ColumnKind::Float)),
        );
        columns.extend(
            TRAILING_ATTACHMENT_COLUMNS
                .iter()
                .map(|&(name, kind)| spec(name, kind)),
        );
        columns.extend(
            feature_columns
                .into_iter()
                .map(|(name, kind)| ColumnSpec { name, kind }),
        );
        Self { columns }
    }

    pub fn for_engine(engine: &FeatureEngine) -> Self {
        Self::new(engine.columns())
    }

    /// Number of columns that precede the feature columns.
    pub fn attachment_width() -> usize {
        LEADING_COLUMNS.len() + FundamentalField::COUNT + TRAILING_ATTACHMENT_COLUMNS.len()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Compare a stored header against this schema.
    pub fn check_header(&self, header: &[&str]) -> SchemaValidation {
        let mut errors = Vec::new();
        for name in self.names() {
            if !header.contains(&name) {
                errors.push(format!("missing column '{name}'"));
            }
        }
        for name in header {
            if !self.contains(name) {
                errors.push(format!("unexpected column '{name}'"));
            }
        }
        if errors.is_empty() && !header.iter().copied().eq(self.names()) {
            errors.push("columns out of order".to_string());
        }
        SchemaValidation {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureConfig;

    #[test]
    fn attachments_precede_features() {
        let schema = OutputSchema::for_engine(&FeatureEngine::new(FeatureConfig::default()));
        let width = OutputSchema::attachment_width();
        assert_eq!(schema.columns()[0].name, "ticker");
        assert_eq!(schema.columns()[width - 1].name, "sector_date");
        assert_eq!(schema.columns()[width].name, "sma_20");
        assert!(schema.contains("revenue"));
        assert!(schema.contains("p_e"));
    }

    #[test]
    fn names_are_unique() {
        let schema = OutputSchema::for_engine(&FeatureEngine::new(FeatureConfig::default()));
        let mut names: Vec<&str> = schema.names().collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), schema.len());
    }

    #[test]
    fn header_check_reports_missing_and_unexpected() {
        let schema = OutputSchema::new(vec![("x".to_string(), ColumnKind::Float)]);
        let mut header: Vec<&str> = schema.names().collect();
        assert!(schema.check_header(&header).is_valid);

        header.pop();
        header.push("y");
        let result = schema.check_header(&header);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
    }
}
