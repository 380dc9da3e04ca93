//! Valuation ratios, margins and growth rates.
//!
//! Every ratio is null-safe: a missing input or a zero denominator gives
//! `None`, never an infinity or NaN. A ratio whose line items are absent
//! from the whole fundamentals batch is disabled and reported once.

use super::pct_change;
use crate::domain::{FieldSet, FundamentalField, Fundamentals, FundamentalsRecord, Series};
use crate::report::Issue;
use FundamentalField as F;

/// Values visible on one row: its close, its as-of market cap and its as-of
/// fundamentals report.
#[derive(Debug, Clone, Copy, Default)]
pub struct RatioInputs<'a> {
    pub close: Option<f64>,
    pub market_cap: Option<f64>,
    pub fundamentals: Option<&'a Fundamentals>,
}

impl RatioInputs<'_> {
    fn get(&self, field: FundamentalField) -> Option<f64> {
        self.fundamentals?.get(field)
    }

    fn enterprise_value(&self) -> Option<f64> {
        Some(self.market_cap? + self.get(F::TotalLiabilities)? - self.get(F::CashOnHand)?)
    }
}

/// `numerator / denominator`, or `None` for a missing side or zero divisor.
pub fn safe_div(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d == 0.0 {
        return None;
    }
    let q = n / d;
    q.is_finite().then_some(q)
}

fn times(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? * b?)
}

fn percent(value: Option<f64>) -> Option<f64> {
    value.map(|v| v * 100.0)
}

pub struct RatioDef {
    pub name: &'static str,
    /// Line items this ratio reads.
    pub requires: &'static [FundamentalField],
    pub compute: fn(&RatioInputs<'_>) -> Option<f64>,
}

pub const RATIOS: &[RatioDef] = &[
    RatioDef {
        name: "p_s",
        requires: &[F::Revenue],
        compute: |r| safe_div(r.market_cap, r.get(F::Revenue)),
    },
    RatioDef {
        name: "p_b",
        requires: &[F::BookValuePerShare, F::SharesOutstanding],
        compute: |r| {
            safe_div(
                r.market_cap,
                times(r.get(F::BookValuePerShare), r.get(F::SharesOutstanding)),
            )
        },
    },
    RatioDef {
        name: "price_to_cash",
        requires: &[F::CashOnHand],
        compute: |r| safe_div(r.market_cap, r.get(F::CashOnHand)),
    },
    RatioDef {
        name: "price_to_fcf",
        requires: &[F::FreeCashFlowPerShare, F::SharesOutstanding],
        compute: |r| {
            safe_div(
                r.market_cap,
                times(r.get(F::FreeCashFlowPerShare), r.get(F::SharesOutstanding)),
            )
        },
    },
    RatioDef {
        name: "p_e",
        requires: &[F::Eps],
        compute: |r| safe_div(r.close, r.get(F::Eps)),
    },
    RatioDef {
        name: "enterprise_value",
        requires: &[F::TotalLiabilities, F::CashOnHand],
        compute: |r| r.enterprise_value(),
    },
    RatioDef {
        name: "ev_ebitda",
        requires: &[F::TotalLiabilities, F::CashOnHand, F::Ebitda],
        compute: |r| safe_div(r.enterprise_value(), r.get(F::Ebitda)),
    },
    RatioDef {
        name: "ev_sales",
        requires: &[F::TotalLiabilities, F::CashOnHand, F::Revenue],
        compute: |r| safe_div(r.enterprise_value(), r.get(F::Revenue)),
    },
    RatioDef {
        name: "roic",
        requires: &[F::Ebit, F::TotalAssets, F::TotalCurrentLiabilities],
        compute: |r| {
            let invested = Some(r.get(F::TotalAssets)? - r.get(F::TotalCurrentLiabilities)?);
            safe_div(r.get(F::Ebit), invested)
        },
    },
    RatioDef {
        name: "quick_ratio",
        requires: &[F::TotalCurrentAssets, F::Inventory, F::TotalCurrentLiabilities],
        compute: |r| {
            let liquid = Some(r.get(F::TotalCurrentAssets)? - r.get(F::Inventory)?);
            safe_div(liquid, r.get(F::TotalCurrentLiabilities))
        },
    },
    RatioDef {
        name: "gross_margin_pct",
        requires: &[F::GrossMargin],
        compute: |r| percent(r.get(F::GrossMargin)),
    },
    RatioDef {
        name: "operating_margin_pct",
        requires: &[F::OperatingMargin],
        compute: |r| percent(r.get(F::OperatingMargin)),
    },
    RatioDef {
        name: "net_margin_pct",
        requires: &[F::NetProfitMargin],
        compute: |r| percent(r.get(F::NetProfitMargin)),
    },
    RatioDef {
        name: "roa_pct",
        requires: &[F::Roa],
        compute: |r| percent(r.get(F::Roa)),
    },
    RatioDef {
        name: "roe_pct",
        requires: &[F::Roe],
        compute: |r| percent(r.get(F::Roe)),
    },
    RatioDef {
        name: "roi_pct",
        requires: &[F::Roi],
        compute: |r| percent(r.get(F::Roi)),
    },
];

/// Growth of a line item between reports of one entity.
pub struct GrowthDef {
    pub name: &'static str,
    pub field: FundamentalField,
    /// Reports back: 1 for quarter-on-quarter, 4 for year-on-year, 12 and
    /// 20 for three and five years.
    pub reports_back: usize,
}

pub const GROWTH: &[GrowthDef] = &[
    GrowthDef {
        name: "sales_growth_qoq",
        field: F::Revenue,
        reports_back: 1,
    },
    GrowthDef {
        name: "sales_growth_yoy",
        field: F::Revenue,
        reports_back: 4,
    },
    GrowthDef {
        name: "sales_growth_3y",
        field: F::Revenue,
        reports_back: 12,
    },
    GrowthDef {
        name: "sales_growth_5y",
        field: F::Revenue,
        reports_back: 20,
    },
    GrowthDef {
        name: "eps_growth_qoq",
        field: F::Eps,
        reports_back: 1,
    },
    GrowthDef {
        name: "eps_growth_yoy",
        field: F::Eps,
        reports_back: 4,
    },
    GrowthDef {
        name: "eps_growth_3y",
        field: F::Eps,
        reports_back: 12,
    },
    GrowthDef {
        name: "eps_growth_5y",
        field: F::Eps,
        reports_back: 20,
    },
    GrowthDef {
        name: "dividend_growth",
        field: F::Dividends,
        reports_back: 1,
    },
];

impl GrowthDef {
    /// Growth per report, index-aligned with `reports`.
    pub fn per_report(&self, reports: &Series<FundamentalsRecord>) -> Vec<Option<f64>> {
        let values: Vec<Option<f64>> = reports.iter().map(|r| r.values.get(self.field)).collect();
        (0..values.len())
            .map(|k| {
                let base = k.checked_sub(self.reports_back)?;
                pct_change(values[k], values[base])
            })
            .collect()
    }
}

/// One issue per (feature, absent line item) for features the batch
/// cannot support.
pub fn missing_inputs(present: &FieldSet) -> Vec<Issue> {
    let ratio_needs = RATIOS.iter().flat_map(|def| def.requires.iter().map(move |f| (def.name, *f)));
    let growth_needs = GROWTH.iter().map(|def| (def.name, def.field));
    ratio_needs
        .chain(growth_needs)
        .filter(|(_, field)| !present.contains(field))
        .map(|(feature, field)| Issue::MissingColumnForFeature {
            feature: feature.to_string(),
            column: field.key().to_string(),
        })
        .collect()
}

pub fn is_enabled(requires: &[FundamentalField], present: &FieldSet) -> bool {
    requires.iter().all(|field| present.contains(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Ticker;
    use chrono::NaiveDate;

    fn ratio(name: &str) -> &'static RatioDef {
        RATIOS.iter().find(|d| d.name == name).unwrap()
    }

    #[test]
    fn reported_ratios_pass_through_and_are_not_recomputed() {
        for field in [F::DebtToEquity, F::LongTermDebtToCapital, F::CurrentRatio] {
            assert!(RATIOS.iter().all(|d| d.name != field.key()), "{}", field.key());
        }
        let derived = RATIOS.iter().map(|d| d.name).chain(GROWTH.iter().map(|g| g.name));
        for name in derived {
            assert!(FundamentalField::ALL.iter().all(|f| f.key() != name), "{name}");
        }
    }

    fn inputs(close: f64, market_cap: f64, f: &Fundamentals) -> RatioInputs<'_> {
        RatioInputs {
            close: Some(close),
            market_cap: Some(market_cap),
            fundamentals: Some(f),
        }
    }

    #[test]
    fn zero_denominator_is_null() {
        let f = Fundamentals::default().with(F::Revenue, 0.0).with(F::Eps, 0.0);
        let r = inputs(10.0, 1000.0, &f);
        assert_eq!((ratio("p_s").compute)(&r), None);
        assert_eq!((ratio("p_e").compute)(&r), None);
    }

    #[test]
    fn missing_numerator_is_null() {
        let f = Fundamentals::default().with(F::Revenue, 50.0);
        let r = RatioInputs {
            close: Some(10.0),
            market_cap: None,
            fundamentals: Some(&f),
        };
        assert_eq!((ratio("p_s").compute)(&r), None);
        assert_eq!((ratio("p_e").compute)(&RatioInputs::default()), None);
    }

    #[test]
    fn valuation_formulas() {
        let f = Fundamentals::default()
            .with(F::Revenue, 200.0)
            .with(F::BookValuePerShare, 5.0)
            .with(F::SharesOutstanding, 10.0)
            .with(F::TotalLiabilities, 300.0)
            .with(F::CashOnHand, 100.0)
            .with(F::Ebitda, 120.0)
            .with(F::Eps, 2.0);
        let r = inputs(30.0, 1000.0, &f);
        assert_eq!((ratio("p_s").compute)(&r), Some(5.0));
        assert_eq!((ratio("p_b").compute)(&r), Some(20.0));
        assert_eq!((ratio("p_e").compute)(&r), Some(15.0));
        assert_eq!((ratio("enterprise_value").compute)(&r), Some(1200.0));
        assert_eq!((ratio("ev_ebitda").compute)(&r), Some(10.0));
        assert_eq!((ratio("ev_sales").compute)(&r), Some(6.0));
    }

    #[test]
    fn balance_sheet_ratios() {
        let f = Fundamentals::default()
            .with(F::Ebit, 50.0)
            .with(F::TotalAssets, 600.0)
            .with(F::TotalCurrentLiabilities, 100.0)
            .with(F::TotalCurrentAssets, 250.0)
            .with(F::Inventory, 50.0)
            .with(F::GrossMargin, 0.25);
        let r = inputs(1.0, 1.0, &f);
        assert_eq!((ratio("roic").compute)(&r), Some(0.1));
        assert_eq!((ratio("quick_ratio").compute)(&r), Some(2.0));
        assert_eq!((ratio("gross_margin_pct").compute)(&r), Some(25.0));
    }

    #[test]
    fn roic_with_zero_invested_capital_is_null() {
        let f = Fundamentals::default()
            .with(F::Ebit, 50.0)
            .with(F::TotalAssets, 100.0)
            .with(F::TotalCurrentLiabilities, 100.0);
        assert_eq!((ratio("roic").compute)(&inputs(1.0, 1.0, &f)), None);
    }

    #[test]
    fn growth_per_report() {
        let t = Ticker::parse("G").unwrap();
        let reports = Series::from_unsorted(
            [100.0, 110.0, 0.0, 120.0, 150.0]
                .iter()
                .enumerate()
                .map(|(q, revenue)| FundamentalsRecord {
                    ticker: t.clone(),
                    date: NaiveDate::from_ymd_opt(2023, 1 + 2 * q as u32, 1).unwrap(),
                    values: Fundamentals::default().with(F::Revenue, *revenue),
                })
                .collect(),
        );
        let qoq = GROWTH[0].per_report(&reports);
        assert_eq!(qoq[0], None);
        assert!((qoq[1].unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(qoq[3], None);
        let yoy = GROWTH[1].per_report(&reports);
        assert_eq!(&yoy[..4], &[None, None, None, None]);
        assert!((yoy[4].unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn missing_inputs_names_feature_and_column() {
        let present: FieldSet = [F::Revenue, F::Eps].into_iter().collect();
        let issues = missing_inputs(&present);
        assert!(issues.contains(&Issue::MissingColumnForFeature {
            feature: "p_b".into(),
            column: "book_value_per_share".into(),
        }));
        assert!(!issues.iter().any(|i| matches!(
            i,
            Issue::MissingColumnForFeature { feature, .. } if feature == "p_s" || feature == "p_e"
        )));
        assert!(is_enabled(&[F::Revenue], &present));
        assert!(!is_enabled(&[F::Revenue, F::Ebit], &present));
    }
}
