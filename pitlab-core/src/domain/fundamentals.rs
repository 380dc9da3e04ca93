//! Quarterly financial-statement line items.
//!
//! The set of line items is fixed at compile time. Each `FundamentalField`
//! knows its output key, its canonical source column and the aliases seen in
//! scraped statement exports.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::series::Dated;
use super::ticker::Ticker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundamentalField {
    Revenue,
    Eps,
    SharesOutstanding,
    BookValuePerShare,
    FreeCashFlowPerShare,
    CashOnHand,
    TotalLiabilities,
    TotalAssets,
    TotalCurrentAssets,
    TotalCurrentLiabilities,
    Inventory,
    Ebitda,
    Ebit,
    GrossMargin,
    OperatingMargin,
    NetProfitMargin,
    Roa,
    Roe,
    Roi,
    DebtToEquity,
    LongTermDebtToCapital,
    CurrentRatio,
    Dividends,
}

impl FundamentalField {
    pub const COUNT: usize = 23;

    pub const ALL: [FundamentalField; Self::COUNT] = [
        Self::Revenue,
        Self::Eps,
        Self::SharesOutstanding,
        Self::BookValuePerShare,
        Self::FreeCashFlowPerShare,
        Self::CashOnHand,
        Self::TotalLiabilities,
        Self::TotalAssets,
        Self::TotalCurrentAssets,
        Self::TotalCurrentLiabilities,
        Self::Inventory,
        Self::Ebitda,
        Self::Ebit,
        Self::GrossMargin,
        Self::OperatingMargin,
        Self::NetProfitMargin,
        Self::Roa,
        Self::Roe,
        Self::Roi,
        Self::DebtToEquity,
        Self::LongTermDebtToCapital,
        Self::CurrentRatio,
        Self::Dividends,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Column name in the output table.
    pub fn key(self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Eps => "eps",
            Self::SharesOutstanding => "shares_outstanding",
            Self::BookValuePerShare => "book_value_per_share",
            Self::FreeCashFlowPerShare => "free_cash_flow_per_share",
            Self::CashOnHand => "cash_on_hand",
            Self::TotalLiabilities => "total_liabilities",
            Self::TotalAssets => "total_assets",
            Self::TotalCurrentAssets => "total_current_assets",
            Self::TotalCurrentLiabilities => "total_current_liabilities",
            Self::Inventory => "inventory",
            Self::Ebitda => "ebitda",
            Self::Ebit => "ebit",
            Self::GrossMargin => "gross_margin",
            Self::OperatingMargin => "operating_margin",
            Self::NetProfitMargin => "net_profit_margin",
            Self::Roa => "roa",
            Self::Roe => "roe",
            Self::Roi => "roi",
            Self::DebtToEquity => "debt_to_equity",
            Self::LongTermDebtToCapital => "long_term_debt_to_capital",
            Self::CurrentRatio => "current_ratio",
            Self::Dividends => "dividends",
        }
    }

    /// Source column names accepted for this line item (matched
    /// case-insensitively). The first entry is the canonical export name.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Revenue => &["Revenue", "Total Revenue", "Sales"],
            Self::Eps => &["EPS - Earnings Per Share", "EPS", "Earnings Per Share"],
            Self::SharesOutstanding => &["Shares Outstanding", "Shares"],
            Self::BookValuePerShare => &["Book Value Per Share", "BVPS"],
            Self::FreeCashFlowPerShare => &["Free Cash Flow Per Share", "FCF Per Share"],
            Self::CashOnHand => &["Cash On Hand", "Cash", "Cash And Equivalents"],
            Self::TotalLiabilities => &["Total Liabilities"],
            Self::TotalAssets => &["Total Assets"],
            Self::TotalCurrentAssets => &["Total Current Assets"],
            Self::TotalCurrentLiabilities => &["Total Current Liabilities"],
            Self::Inventory => &["Inventory"],
            Self::Ebitda => &["EBITDA"],
            Self::Ebit => &["EBIT"],
            Self::GrossMargin => &["Gross Margin"],
            Self::OperatingMargin => &["Operating Margin"],
            Self::NetProfitMargin => &["Net Profit Margin"],
            Self::Roa => &["ROA - Return On Assets", "ROA"],
            Self::Roe => &["ROE - Return On Equity", "ROE"],
            Self::Roi => &["ROI - Return On Investment", "ROI"],
            Self::DebtToEquity => &["Debt/Equity Ratio", "Debt/Equity"],
            Self::LongTermDebtToCapital => &["Long-term Debt / Capital", "Long-Term Debt/Capital"],
            Self::CurrentRatio => &["Current Ratio"],
            Self::Dividends => &["Dividends", "Dividend"],
        }
    }
}

/// One value slot per `FundamentalField`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    values: [Option<f64>; FundamentalField::COUNT],
}

impl Fundamentals {
    pub fn get(&self, field: FundamentalField) -> Option<f64> {
        self.values[field.index()]
    }

    pub fn set(&mut self, field: FundamentalField, value: Option<f64>) {
        self.values[field.index()] = value;
    }

    pub fn with(mut self, field: FundamentalField, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// A fundamentals report for one ticker as of its report date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    pub ticker: Ticker,
    pub date: NaiveDate,
    pub values: Fundamentals,
}

impl Dated for FundamentalsRecord {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// The line items that were present as columns in a fundamentals batch.
pub type FieldSet = BTreeSet<FundamentalField>;
