//! Low-frequency records: market cap snapshots, split events, sector labels.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::series::Dated;
use super::ticker::Ticker;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCapPoint {
    pub ticker: Ticker,
    pub date: NaiveDate,
    pub market_cap: Option<f64>,
}

impl Dated for MarketCapPoint {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// A stock split taking effect on `date`. `ratio` is new shares per old
/// share (2.0 for a 2-for-1 split).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitEvent {
    pub ticker: Ticker,
    pub date: NaiveDate,
    pub ratio: Option<f64>,
}

impl Dated for SplitEvent {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorLabel {
    pub sector: Option<String>,
    pub industry: Option<String>,
}

/// Sector/industry classification. Undated rows are static metadata that
/// apply to the ticker's whole history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorInfo {
    pub ticker: Ticker,
    pub date: Option<NaiveDate>,
    pub label: SectorLabel,
}

/// Dated sector rows order by date; callers keep undated rows apart.
impl Dated for SectorInfo {
    fn date(&self) -> NaiveDate {
        self.date.unwrap_or(NaiveDate::MIN)
    }
}
