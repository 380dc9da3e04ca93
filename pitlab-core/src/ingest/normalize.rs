//! Per-source normalizers: `RawTable` → typed records.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::coerce::{parse_date, parse_label, parse_number, parse_ratio};
use super::columns::{self, find};
use super::{IngestError, Normalized, RawTable, SourceKind};
use crate::domain::{
    Bar, FieldSet, FundamentalField, Fundamentals, FundamentalsRecord, MarketCapPoint,
    SectorInfo, SectorLabel, SplitEvent, Ticker,
};
use crate::report::Issue;

/// Fundamentals records plus the line items that were present as columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFundamentals {
    pub records: Vec<FundamentalsRecord>,
    pub present: FieldSet,
    pub issues: Vec<Issue>,
}

pub fn normalize_prices(table: &RawTable) -> Result<Normalized<Bar>, IngestError> {
    let kind = SourceKind::Prices;
    let keys = KeyColumns::resolve(table, kind, true)?;
    let value_aliases = [
        columns::OPEN,
        columns::HIGH,
        columns::LOW,
        columns::CLOSE,
        columns::VOLUME,
    ];
    let [open, high, low, close, volume] = value_aliases.map(|aliases| find(&table.headers, aliases));
    if [open, high, low, close, volume].iter().all(Option::is_none) {
        return Err(mismatch(kind, &value_aliases));
    }

    let number = |row: usize, col: Option<usize>| col.and_then(|c| parse_number(table.cell(row, c)));

    let mut out = Normalized::default();
    for row in 0..table.len() {
        let Some((ticker, date)) = keys.dated_key(table, row, kind, &mut out.issues) else {
            continue;
        };
        out.records.push(Bar {
            ticker,
            date,
            open: number(row, open),
            high: number(row, high),
            low: number(row, low),
            close: number(row, close),
            volume: number(row, volume),
        });
    }
    finish(kind, table.len(), out)
}

/// Fundamentals arrive either wide (one column per line item) or long
/// (`Metric` / `Value` rows that are pivoted here). In the long form a later
/// row for the same ticker, date and line item overwrites an earlier one.
pub fn normalize_fundamentals(table: &RawTable) -> Result<NormalizedFundamentals, IngestError> {
    let kind = SourceKind::Fundamentals;
    let keys = KeyColumns::resolve(table, kind, true)?;

    let wide: Vec<(FundamentalField, usize)> = FundamentalField::ALL
        .iter()
        .filter_map(|&field| find(&table.headers, field.aliases()).map(|col| (field, col)))
        .collect();

    if !wide.is_empty() {
        return Ok(normalize_wide_fundamentals(table, &keys, &wide));
    }

    match (
        find(&table.headers, columns::METRIC),
        find(&table.headers, columns::METRIC_VALUE),
    ) {
        (Some(metric), Some(value)) => Ok(normalize_long_fundamentals(table, &keys, metric, value)),
        _ => {
            let expected = FundamentalField::ALL
                .iter()
                .map(|field| columns::primary(field.aliases()))
                .collect();
            let err = IngestError::SchemaMismatch { kind, expected };
            warn!(source = %kind, "no line-item columns in batch");
            Err(err)
        }
    }
}

fn normalize_wide_fundamentals(
    table: &RawTable,
    keys: &KeyColumns,
    wide: &[(FundamentalField, usize)],
) -> NormalizedFundamentals {
    let kind = SourceKind::Fundamentals;
    let mut out = NormalizedFundamentals {
        present: wide.iter().map(|(field, _)| *field).collect(),
        ..Default::default()
    };
    for row in 0..table.len() {
        let Some((ticker, date)) = keys.dated_key(table, row, kind, &mut out.issues) else {
            continue;
        };
        let mut values = Fundamentals::default();
        for &(field, col) in wide {
            values.set(field, parse_number(table.cell(row, col)));
        }
        out.records.push(FundamentalsRecord {
            ticker,
            date,
            values,
        });
    }
    debug!(
        source = %kind,
        rows = table.len(),
        records = out.records.len(),
        line_items = out.present.len(),
        "normalized wide fundamentals"
    );
    out
}

fn normalize_long_fundamentals(
    table: &RawTable,
    keys: &KeyColumns,
    metric_col: usize,
    value_col: usize,
) -> NormalizedFundamentals {
    let kind = SourceKind::Fundamentals;
    let mut out = NormalizedFundamentals::default();
    let mut slots: HashMap<(Ticker, NaiveDate), usize> = HashMap::new();
    let mut unknown = 0usize;

    for row in 0..table.len() {
        let Some((ticker, date)) = keys.dated_key(table, row, kind, &mut out.issues) else {
            continue;
        };
        let metric = table.cell(row, metric_col);
        let Some(field) = FundamentalField::ALL
            .iter()
            .copied()
            .find(|field| columns::matches(metric, field.aliases()))
        else {
            unknown += 1;
            continue;
        };

        out.present.insert(field);
        let slot = *slots.entry((ticker.clone(), date)).or_insert_with(|| {
            out.records.push(FundamentalsRecord {
                ticker,
                date,
                values: Fundamentals::default(),
            });
            out.records.len() - 1
        });
        let values = &mut out.records[slot].values;
        match parse_number(table.cell(row, value_col)) {
            Some(value) => values.set(field, Some(value)),
            // A bad duplicate never clears a value an earlier row parsed.
            None if values.get(field).is_some() => {
                out.issues
                    .push(malformed(kind, row, &format!("unparsable {} value", field.key())));
            }
            None => {}
        }
    }

    if unknown > 0 {
        debug!(source = %kind, unknown, "ignored rows with unrecognised line items");
    }
    debug!(
        source = %kind,
        rows = table.len(),
        records = out.records.len(),
        line_items = out.present.len(),
        "pivoted long fundamentals"
    );
    out
}

pub fn normalize_market_caps(table: &RawTable) -> Result<Normalized<MarketCapPoint>, IngestError> {
    let kind = SourceKind::MarketCap;
    let keys = KeyColumns::resolve(table, kind, true)?;
    let Some(value) = find(&table.headers, columns::MARKET_CAP) else {
        return Err(mismatch(kind, &[columns::MARKET_CAP]));
    };

    let mut out = Normalized::default();
    for row in 0..table.len() {
        let Some((ticker, date)) = keys.dated_key(table, row, kind, &mut out.issues) else {
            continue;
        };
        out.records.push(MarketCapPoint {
            ticker,
            date,
            market_cap: parse_number(table.cell(row, value)),
        });
    }
    finish(kind, table.len(), out)
}

pub fn normalize_splits(table: &RawTable) -> Result<Normalized<SplitEvent>, IngestError> {
    let kind = SourceKind::Splits;
    let keys = KeyColumns::resolve(table, kind, true)?;
    let Some(ratio) = find(&table.headers, columns::SPLIT_RATIO) else {
        return Err(mismatch(kind, &[columns::SPLIT_RATIO]));
    };

    let mut out = Normalized::default();
    for row in 0..table.len() {
        let Some((ticker, date)) = keys.dated_key(table, row, kind, &mut out.issues) else {
            continue;
        };
        out.records.push(SplitEvent {
            ticker,
            date,
            ratio: parse_ratio(table.cell(row, ratio)),
        });
    }
    finish(kind, table.len(), out)
}

/// Sector rows need no date column. A blank date cell marks the row as
/// static metadata; a non-blank date that does not parse is malformed.
pub fn normalize_sectors(table: &RawTable) -> Result<Normalized<SectorInfo>, IngestError> {
    let kind = SourceKind::Sectors;
    let keys = KeyColumns::resolve(table, kind, false)?;
    let sector = find(&table.headers, columns::SECTOR);
    let industry = find(&table.headers, columns::INDUSTRY);
    if sector.is_none() && industry.is_none() {
        return Err(mismatch(kind, &[columns::SECTOR, columns::INDUSTRY]));
    }

    let label = |row: usize, col: Option<usize>| col.and_then(|c| parse_label(table.cell(row, c)));

    let mut out = Normalized::default();
    for row in 0..table.len() {
        let Some(ticker) = keys.ticker(table, row, kind, &mut out.issues) else {
            continue;
        };
        let date = match keys.date {
            Some(col) if !table.cell(row, col).trim().is_empty() => {
                match parse_date(table.cell(row, col)) {
                    Some(date) => Some(date),
                    None => {
                        out.issues.push(malformed(kind, row, "unparsable date"));
                        continue;
                    }
                }
            }
            _ => None,
        };
        out.records.push(SectorInfo {
            ticker,
            date,
            label: SectorLabel {
                sector: label(row, sector),
                industry: label(row, industry),
            },
        });
    }
    finish(kind, table.len(), out)
}

struct KeyColumns {
    ticker: usize,
    date: Option<usize>,
}

impl KeyColumns {
    /// A batch without a ticker column (or a date column, when required)
    /// cannot yield a single record, so it is rejected as a whole.
    fn resolve(table: &RawTable, kind: SourceKind, require_date: bool) -> Result<Self, IngestError> {
        let ticker = find(&table.headers, columns::TICKER);
        let date = find(&table.headers, columns::DATE);
        match (ticker, date) {
            (Some(ticker), date) if date.is_some() || !require_date => Ok(Self { ticker, date }),
            (None, _) => Err(mismatch(kind, &[columns::TICKER])),
            (Some(_), _) => Err(mismatch(kind, &[columns::DATE])),
        }
    }

    fn ticker(
        &self,
        table: &RawTable,
        row: usize,
        kind: SourceKind,
        issues: &mut Vec<Issue>,
    ) -> Option<Ticker> {
        match Ticker::parse(table.cell(row, self.ticker)) {
            Ok(ticker) => Some(ticker),
            Err(_) => {
                issues.push(malformed(kind, row, "missing ticker"));
                None
            }
        }
    }

    fn dated_key(
        &self,
        table: &RawTable,
        row: usize,
        kind: SourceKind,
        issues: &mut Vec<Issue>,
    ) -> Option<(Ticker, NaiveDate)> {
        let ticker = self.ticker(table, row, kind, issues)?;
        let raw = self.date.map(|col| table.cell(row, col)).unwrap_or("");
        if raw.trim().is_empty() {
            issues.push(malformed(kind, row, "missing date"));
            return None;
        }
        match parse_date(raw) {
            Some(date) => Some((ticker, date)),
            None => {
                issues.push(malformed(kind, row, "unparsable date"));
                None
            }
        }
    }
}

fn malformed(kind: SourceKind, row: usize, reason: &str) -> Issue {
    Issue::MalformedRecord {
        source: kind,
        row,
        reason: reason.to_string(),
    }
}

fn mismatch(kind: SourceKind, alias_sets: &[&[&str]]) -> IngestError {
    let expected: Vec<String> = alias_sets.iter().map(|aliases| columns::primary(aliases)).collect();
    warn!(source = %kind, expected = ?expected, "batch has none of the expected columns");
    IngestError::SchemaMismatch { kind, expected }
}

fn finish<T>(
    kind: SourceKind,
    rows: usize,
    out: Normalized<T>,
) -> Result<Normalized<T>, IngestError> {
    if !out.issues.is_empty() {
        warn!(source = %kind, skipped = out.issues.len(), "skipped malformed rows");
    }
    debug!(source = %kind, rows, records = out.records.len(), "normalized batch");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(kind: SourceKind, headers: &[&str], rows: &[&[&str]]) -> RawTable {
        let mut t = RawTable::new(kind, headers.iter().copied());
        for row in rows {
            t.push_row(row.iter().copied());
        }
        t
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn prices_skip_rows_without_keys() {
        let t = table(
            SourceKind::Prices,
            &["Date", "Ticker", "Open", "Close", "Volume"],
            &[
                &["2024-01-02", "aaa", "10", "11", "1,000"],
                &["", "AAA", "10", "11", "5"],
                &["2024-01-03", " ", "10", "11", "5"],
                &["someday", "AAA", "10", "11", "5"],
                &["03/01/2024", "AAA", "x", "12", "N/A"],
            ],
        );
        let out = normalize_prices(&t).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.issues.len(), 3);

        let first = &out.records[0];
        assert_eq!(first.ticker.as_str(), "AAA");
        assert_eq!(first.volume, Some(1000.0));
        assert_eq!(first.high, None);

        let second = &out.records[1];
        assert_eq!(second.date, d(2024, 1, 3));
        assert_eq!(second.open, None);
        assert_eq!(second.close, Some(12.0));
        assert_eq!(second.volume, None);

        let reasons: Vec<_> = out
            .issues
            .iter()
            .map(|issue| match issue {
                Issue::MalformedRecord { row, reason, .. } => (*row, reason.as_str()),
                other => panic!("unexpected issue {other:?}"),
            })
            .collect();
        assert_eq!(
            reasons,
            vec![(1, "missing date"), (2, "missing ticker"), (3, "unparsable date")]
        );
    }

    #[test]
    fn prices_without_value_columns_mismatch() {
        let t = table(SourceKind::Prices, &["Ticker", "Date", "Comment"], &[]);
        let err = normalize_prices(&t).unwrap_err();
        let IngestError::SchemaMismatch { kind, expected } = err;
        assert_eq!(kind, SourceKind::Prices);
        assert_eq!(expected, vec!["Open", "High", "Low", "Close", "Volume"]);
    }

    #[test]
    fn missing_ticker_column_mismatch() {
        let t = table(SourceKind::MarketCap, &["Date", "Market Cap"], &[&["2024-01-02", "5"]]);
        assert!(normalize_market_caps(&t).is_err());
    }

    #[test]
    fn wide_fundamentals_record_present_fields() {
        let t = table(
            SourceKind::Fundamentals,
            &["Ticker", "Date", "Revenue", "EPS - Earnings Per Share", "Notes"],
            &[&["XYZ", "2023-12-31", "$1.5B", "", "hello"]],
        );
        let out = normalize_fundamentals(&t).unwrap();
        assert_eq!(
            out.present,
            [FundamentalField::Revenue, FundamentalField::Eps].into_iter().collect()
        );
        let values = &out.records[0].values;
        assert_eq!(values.get(FundamentalField::Revenue), Some(1.5e9));
        assert_eq!(values.get(FundamentalField::Eps), None);
    }

    #[test]
    fn long_fundamentals_are_pivoted() {
        let t = table(
            SourceKind::Fundamentals,
            &["Ticker", "Date", "Metric", "Value"],
            &[
                &["XYZ", "2023-12-31", "Revenue", "100"],
                &["XYZ", "2023-12-31", "EBITDA", "40"],
                &["XYZ", "2023-12-31", "Revenue", "120"],
                &["XYZ", "2024-03-31", "Revenue", "130"],
                &["XYZ", "2024-03-31", "Mystery", "1"],
            ],
        );
        let out = normalize_fundamentals(&t).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].values.get(FundamentalField::Revenue), Some(120.0));
        assert_eq!(out.records[0].values.get(FundamentalField::Ebitda), Some(40.0));
        assert_eq!(out.records[1].values.get(FundamentalField::Ebitda), None);
        assert_eq!(out.present.len(), 2);
    }

    #[test]
    fn unparsable_duplicate_keeps_parsed_value() {
        let t = table(
            SourceKind::Fundamentals,
            &["Ticker", "Date", "Metric", "Value"],
            &[
                &["XYZ", "2023-12-31", "Revenue", "100"],
                &["XYZ", "2023-12-31", "Revenue", "garbage"],
                &["XYZ", "2023-12-31", "EPS", "oops"],
            ],
        );
        let out = normalize_fundamentals(&t).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].values.get(FundamentalField::Revenue), Some(100.0));
        assert_eq!(out.records[0].values.get(FundamentalField::Eps), None);
        assert_eq!(out.issues.len(), 1);
        assert!(matches!(out.issues[0], Issue::MalformedRecord { row: 1, .. }));
    }

    #[test]
    fn fundamentals_without_line_items_mismatch() {
        let t = table(SourceKind::Fundamentals, &["Ticker", "Date", "Foo"], &[]);
        match normalize_fundamentals(&t) {
            Err(IngestError::SchemaMismatch { expected, .. }) => {
                assert_eq!(expected.len(), FundamentalField::COUNT)
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn market_cap_and_split_aliases() {
        let caps = table(SourceKind::MarketCap, &["Ticker", "d", "v1"], &[&["A", "2024-01-02", "2.5M"]]);
        let caps = normalize_market_caps(&caps).unwrap();
        assert_eq!(caps.records[0].market_cap, Some(2.5e6));

        let splits = table(
            SourceKind::Splits,
            &["Ticker", "Date", "Stock Split Value"],
            &[&["A", "2024-06-10", "4:1"], &["A", "2024-07-10", "bogus"]],
        );
        let splits = normalize_splits(&splits).unwrap();
        assert_eq!(splits.records[0].ratio, Some(4.0));
        assert_eq!(splits.records[1].ratio, None);
    }

    #[test]
    fn sectors_static_and_dated() {
        let t = table(
            SourceKind::Sectors,
            &["Ticker", "Sector", "Industry", "Date"],
            &[
                &["A", "Technology", "N/A", ""],
                &["A", "Energy", "Oil", "2024-02-01"],
                &["B", "Energy", "Oil", "garbage"],
            ],
        );
        let out = normalize_sectors(&t).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].date, None);
        assert_eq!(out.records[0].label.industry, None);
        assert_eq!(out.records[1].date, Some(d(2024, 2, 1)));
        assert_eq!(out.issues.len(), 1);
    }

    #[test]
    fn sectors_need_no_date_column() {
        let t = table(SourceKind::Sectors, &["Ticker", "Sector"], &[&["A", "Utilities"]]);
        let out = normalize_sectors(&t).unwrap();
        assert_eq!(out.records[0].label.sector.as_deref(), Some("Utilities"));
        assert_eq!(out.records[0].date, None);
    }
}
