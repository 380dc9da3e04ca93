//! Ticker — the entity identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A trimmed, uppercase ticker symbol. All temporal work is scoped per ticker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickerError {
    #[error("ticker is empty")]
    Empty,
}

impl Ticker {
    /// Normalize a raw identifier: trim surrounding whitespace and uppercase.
    pub fn parse(raw: &str) -> Result<Self, TickerError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(TickerError::Empty);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Ticker {
    type Error = TickerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_uppercases() {
        assert_eq!(Ticker::parse("  aapl ").unwrap().as_str(), "AAPL");
    }

    #[test]
    fn parse_rejects_blank() {
        assert_eq!(Ticker::parse("   "), Err(TickerError::Empty));
    }

    #[test]
    fn serde_goes_through_parse() {
        let t: Ticker = serde_json::from_str("\" msft\"").unwrap();
        assert_eq!(t.as_str(), "MSFT");
        assert!(serde_json::from_str::<Ticker>("\"\"").is_err());
    }
}
