//! Alias-based column resolution.
//!
//! Header matching ignores case and collapses internal whitespace, so
//! `" Market  cap"` resolves against the alias `"Market Cap"`. Aliases are
//! tried in order; the first alias with a matching header wins.

pub(crate) const TICKER: &[&str] = &["Ticker", "Ticker_x", "Symbol", "t"];
pub(crate) const DATE: &[&str] = &["Date", "Date_x", "Datetime", "Timestamp", "d"];

pub(crate) const OPEN: &[&str] = &["Open", "o"];
pub(crate) const HIGH: &[&str] = &["High", "h"];
pub(crate) const LOW: &[&str] = &["Low", "l"];
pub(crate) const CLOSE: &[&str] = &["Close", "c"];
pub(crate) const VOLUME: &[&str] = &["Volume", "v"];

pub(crate) const MARKET_CAP: &[&str] = &["Market Cap", "MarketCap", "Value", "v1"];
pub(crate) const SPLIT_RATIO: &[&str] = &["Ratio", "Stock Split Value", "Stock Splits", "Split", "c"];

pub(crate) const SECTOR: &[&str] = &["Sector"];
pub(crate) const INDUSTRY: &[&str] = &["Industry"];

/// Long-format fundamentals: one line item per row.
pub(crate) const METRIC: &[&str] = &["Metric", "Field", "Line Item"];
pub(crate) const METRIC_VALUE: &[&str] = &["Value", "Amount"];

pub(crate) fn canonical(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

/// Position of the first header matching any alias, in alias order.
pub(crate) fn find(headers: &[String], aliases: &[&str]) -> Option<usize> {
    let canonical_headers: Vec<String> = headers.iter().map(|h| canonical(h)).collect();
    aliases.iter().find_map(|alias| {
        let alias = canonical(alias);
        canonical_headers.iter().position(|h| *h == alias)
    })
}

/// True if `name` matches any alias.
pub(crate) fn matches(name: &str, aliases: &[&str]) -> bool {
    let name = canonical(name);
    aliases.iter().any(|alias| canonical(alias) == name)
}

/// First alias, used when reporting what was expected.
pub(crate) fn primary(aliases: &[&str]) -> String {
    aliases.first().copied().unwrap_or_default().to_string()
}
