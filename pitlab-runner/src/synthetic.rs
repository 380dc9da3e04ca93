//! Deterministic synthetic input batches for benches, tests and demos.
//!
//! Each ticker gets its own RNG seeded from BLAKE3 of `(seed, ticker)`, so a
//! ticker's data does not change when the universe grows. Cells are written
//! as strings in the shapes the normalizer sees in real exports: ISO dates
//! for prices, day-first dates for fundamentals, `2:1` split ratios.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pitlab_core::domain::FundamentalField;
use pitlab_core::ingest::{RawTable, SourceKind};

use crate::pipeline::SourceBatch;

const SECTORS: &[(&str, &str)] = &[
    ("Technology", "Software"),
    ("Technology", "Semiconductors"),
    ("Healthcare", "Pharmaceuticals"),
    ("Financials", "Banks"),
    ("Energy", "Oil & Gas"),
    ("Industrials", "Machinery"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub tickers: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            tickers: 5,
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or(NaiveDate::MIN),
            seed: 42,
        }
    }
}

pub fn ticker_name(index: usize) -> String {
    format!("SYN{index:03}")
}

/// Build a batch with all five sources.
pub fn generate(spec: &SyntheticSpec) -> SourceBatch {
    let mut prices = RawTable::new(
        SourceKind::Prices,
        ["Ticker", "Date", "Open", "High", "Low", "Close", "Volume"],
    );
    let mut fundamentals = RawTable::new(
        SourceKind::Fundamentals,
        ["Ticker", "Date"]
            .into_iter()
            .chain(FundamentalField::ALL.iter().map(|f| f.aliases()[0])),
    );
    let mut market_caps = RawTable::new(SourceKind::MarketCap, ["Ticker", "Date", "Market Cap"]);
    let mut splits = RawTable::new(SourceKind::Splits, ["Ticker", "Date", "Ratio"]);
    let mut sectors = RawTable::new(SourceKind::Sectors, ["Ticker", "Sector", "Industry"]);

    for index in 0..spec.tickers {
        let ticker = ticker_name(index);
        let seed = blake3::hash(format!("{}:{ticker}", spec.seed).as_bytes());
        let mut rng = StdRng::from_seed(*seed.as_bytes());

        let shares = rng.gen_range(50.0e6..2.0e9);
        let mut price: f64 = rng.gen_range(20.0..300.0);
        let mut current = spec.start;
        let mut trading_day = 0usize;
        while current <= spec.end {
            if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                current += Duration::days(1);
                continue;
            }
            let open = price * (1.0 + rng.gen_range(-0.005..0.005));
            let close = price * (1.0 + rng.gen_range(-0.03..0.03));
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(100_000..5_000_000u64);
            prices.push_row([
                ticker.clone(),
                current.format("%Y-%m-%d").to_string(),
                format!("{open:.4}"),
                format!("{high:.4}"),
                format!("{low:.4}"),
                format!("{close:.4}"),
                volume.to_string(),
            ]);
            if trading_day % 21 == 0 {
                market_caps.push_row([
                    ticker.clone(),
                    current.format("%Y-%m-%d").to_string(),
                    format!("{:.0}", close * shares),
                ]);
            }
            price = close;
            trading_day += 1;
            current += Duration::days(1);
        }

        // Quarterly reports, the first one before the price history starts.
        let mut report_date = spec.start - Duration::days(45);
        let mut revenue = rng.gen_range(1.0e8..5.0e10);
        while report_date <= spec.end {
            revenue *= 1.0 + rng.gen_range(-0.08..0.12);
            let row = report_row(&mut rng, revenue, shares);
            fundamentals.push_row(
                [ticker.clone(), report_date.format("%d/%m/%Y").to_string()]
                    .into_iter()
                    .chain(row),
            );
            report_date += Duration::days(91);
        }

        if rng.gen_bool(0.3) {
            let span = (spec.end - spec.start).num_days().max(1);
            let date = spec.start + Duration::days(rng.gen_range(0..span));
            splits.push_row([ticker.clone(), date.format("%Y-%m-%d").to_string(), "2:1".into()]);
        }

        let (sector, industry) = SECTORS[index % SECTORS.len()];
        sectors.push_row([ticker, sector.to_string(), industry.to_string()]);
    }

    SourceBatch::new()
        .with(prices)
        .with(fundamentals)
        .with(market_caps)
        .with(splits)
        .with(sectors)
}

/// One report's line items, in `FundamentalField::ALL` order.
fn report_row(rng: &mut StdRng, revenue: f64, shares: f64) -> Vec<String> {
    let gross_margin = rng.gen_range(0.2..0.7);
    let operating_margin = gross_margin * rng.gen_range(0.2..0.6);
    let net_margin = operating_margin * rng.gen_range(0.5..0.9);
    let total_assets = revenue * rng.gen_range(1.5..4.0);
    let total_liabilities = total_assets * rng.gen_range(0.3..0.8);
    let current_assets = total_assets * rng.gen_range(0.2..0.5);
    let current_liabilities = current_assets * rng.gen_range(0.4..1.2);
    let equity = total_assets - total_liabilities;
    let ebit = revenue * operating_margin;

    FundamentalField::ALL
        .iter()
        .map(|field| {
            let value = match field {
                FundamentalField::Revenue => revenue,
                FundamentalField::Eps => revenue * net_margin / shares,
                FundamentalField::SharesOutstanding => shares,
                FundamentalField::BookValuePerShare => equity / shares,
                FundamentalField::FreeCashFlowPerShare => ebit * 0.6 / shares,
                FundamentalField::CashOnHand => current_assets * 0.4,
                FundamentalField::TotalLiabilities => total_liabilities,
                FundamentalField::TotalAssets => total_assets,
                FundamentalField::TotalCurrentAssets => current_assets,
                FundamentalField::TotalCurrentLiabilities => current_liabilities,
                FundamentalField::Inventory => current_assets * 0.3,
                FundamentalField::Ebitda => ebit * 1.2,
                FundamentalField::Ebit => ebit,
                FundamentalField::GrossMargin => gross_margin,
                FundamentalField::OperatingMargin => operating_margin,
                FundamentalField::NetProfitMargin => net_margin,
                FundamentalField::Roa => revenue * net_margin / total_assets,
                FundamentalField::Roe => revenue * net_margin / equity,
                FundamentalField::Roi => ebit / (total_assets - current_liabilities),
                FundamentalField::DebtToEquity => total_liabilities / equity,
                FundamentalField::LongTermDebtToCapital => {
                    (total_liabilities - current_liabilities).max(0.0) / total_assets
                }
                FundamentalField::CurrentRatio => current_assets / current_liabilities,
                FundamentalField::Dividends => revenue * net_margin * 0.3,
            };
            format!("{value:.4}")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SyntheticSpec {
        SyntheticSpec {
            tickers: 3,
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 3, 31).unwrap(),
            seed: 7,
        }
    }

    #[test]
    fn same_seed_same_batch() {
        assert_eq!(generate(&small()), generate(&small()));
        let other = SyntheticSpec { seed: 8, ..small() };
        assert_ne!(generate(&small()), generate(&other));
    }

    #[test]
    fn ticker_data_is_stable_as_universe_grows() {
        let three = generate(&small());
        let four = generate(&SyntheticSpec { tickers: 4, ..small() });
        let rows = |batch: &SourceBatch| -> Vec<Vec<String>> {
            batch
                .get(SourceKind::Prices)
                .unwrap()
                .rows
                .iter()
                .filter(|r| r[0] == "SYN001")
                .cloned()
                .collect()
        };
        assert_eq!(rows(&three), rows(&four));
    }

    #[test]
    fn weekdays_only_and_reports_cover_start() {
        let batch = generate(&small());
        let prices = batch.get(SourceKind::Prices).unwrap();
        // 2023 Q1 has 65 weekdays.
        assert_eq!(prices.len(), 3 * 65);
        let fundamentals = batch.get(SourceKind::Fundamentals).unwrap();
        assert_eq!(fundamentals.headers.len(), 2 + FundamentalField::COUNT);
        assert_eq!(fundamentals.rows[0][1], "17/11/2022");
    }
}
