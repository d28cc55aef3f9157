//! Benchmark shadow simulation.
//!
//! Replays the investor's real cash-flow history into a reference
//! instrument: identical amounts, invested on identical days, at the
//! reference instrument's (currency-adjusted, forward-filled) price. The
//! output is a pair of parallel daily value series, the real portfolio
//! against the shadow position, plus an audit ledger of synthetic trades.
//!
//! One run is a single synchronous unit of work; the only await points are
//! the provider fetches for the reference and FX series. Completed runs are
//! memoized by reference ticker, window and input content hash.

pub mod cache;
pub mod series;
pub mod simulate;

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{self, Transaction};
use crate::error::TrackerError;
use crate::pricing::provider;
pub use series::{build_timeline, DailySeries};
pub use simulate::{evaluate, replicate, ShadowTrade, ValuationPoint};

/// Everything a simulation run needs, with all provider data already
/// fetched. Pure input to [`run_simulation`].
#[derive(Debug, Clone)]
pub struct BenchmarkInputs {
    pub ticker: String,
    pub home_currency: String,
    pub reference_currency: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub transactions: Vec<Transaction>,
    /// ISIN -> ticker for the user's own instruments
    pub mappings: HashMap<String, String>,
    pub reference: DailySeries,
    /// Home->reference-currency rates; None means unity conversion
    pub fx: Option<DailySeries>,
    /// Own price history per mapped ticker
    pub holdings_prices: HashMap<String, DailySeries>,
}

/// Result of a benchmark run: chart-ready points plus the audit ledger.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BenchmarkReport {
    pub ticker: String,
    pub home_currency: String,
    pub reference_currency: String,
    pub points: Vec<ValuationPoint>,
    pub trades: Vec<ShadowTrade>,
    pub final_units: Decimal,
}

impl BenchmarkReport {
    fn empty(ticker: &str, home_currency: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            home_currency: home_currency.to_string(),
            reference_currency: home_currency.to_string(),
            points: Vec::new(),
            trades: Vec::new(),
            final_units: Decimal::ZERO,
        }
    }
}

/// Run the full simulation against the database and the market-data
/// provider.
///
/// Fatal only when the provider has no data at all for the reference
/// instrument over the window (`DataUnavailable`); a missing FX series
/// falls back to a unity rate and per-day gaps are handled inside the
/// simulation.
pub async fn run_benchmark(
    conn: &Connection,
    config: &Config,
    ticker: &str,
) -> Result<BenchmarkReport> {
    let transactions = db::get_all_transactions(conn)?;
    let Some(start) = transactions.first().map(|tx| tx.trade_date) else {
        info!("No transactions recorded; nothing to simulate");
        return Ok(BenchmarkReport::empty(ticker, &config.home_currency));
    };

    let end = db::get_latest_price_date(conn)?
        .unwrap_or_else(|| chrono::Local::now().date_naive())
        .max(start);

    let mappings: HashMap<String, String> = db::get_mappings_by_isin(conn)?
        .into_iter()
        .map(|(isin, m)| (isin, m.ticker))
        .collect();

    // Own price histories for every mapped ticker that actually occurs in
    // the transaction log.
    let mut holdings_prices = HashMap::new();
    let mut price_rows = Vec::new();
    for ticker_name in transactions
        .iter()
        .filter_map(|tx| mappings.get(&tx.isin))
        .collect::<std::collections::BTreeSet<_>>()
    {
        let history = db::get_price_history(conn, ticker_name)?;
        for (date, close) in &history {
            price_rows.push((ticker_name.clone(), *date, *close));
        }
        holdings_prices.insert(ticker_name.clone(), DailySeries::from_observations(history));
    }

    let memo_key = cache::MemoKey {
        ticker: ticker.to_string(),
        start,
        end,
        fingerprint: cache::content_fingerprint(&transactions, &price_rows),
    };
    if let Some(report) = cache::get(&memo_key) {
        return Ok(report);
    }

    let reference_series = fetch_reference_series(ticker, start, end).await?;
    let reference_currency = reference_series.currency.clone();
    let reference = DailySeries::from_observations(
        reference_series
            .prices
            .iter()
            .map(|p| (p.date, p.close)),
    );

    let fx = if reference_currency != config.home_currency {
        fetch_fx(&config.home_currency, &reference_currency, start, end).await
    } else {
        None
    };

    let inputs = BenchmarkInputs {
        ticker: ticker.to_string(),
        home_currency: config.home_currency.clone(),
        reference_currency,
        start,
        end,
        transactions,
        mappings,
        reference,
        fx,
        holdings_prices,
    };

    let report = run_simulation(&inputs);
    cache::put(memo_key, report.clone());
    Ok(report)
}

/// The pure core of a run: timeline, replication, valuation.
pub fn run_simulation(inputs: &BenchmarkInputs) -> BenchmarkReport {
    let timeline = build_timeline(inputs.start, inputs.end);

    let replication = replicate(
        &timeline,
        &inputs.transactions,
        &inputs.mappings,
        &inputs.reference,
        inputs.fx.as_ref(),
        &inputs.reference_currency,
    );

    let points = evaluate(
        &timeline,
        &replication,
        &inputs.holdings_prices,
        &inputs.reference,
        inputs.fx.as_ref(),
    );

    BenchmarkReport {
        ticker: inputs.ticker.clone(),
        home_currency: inputs.home_currency.clone(),
        reference_currency: inputs.reference_currency.clone(),
        points,
        trades: replication.ledger,
        final_units: replication.final_units,
    }
}

/// Fetch the reference price series, normalizing every provider failure
/// (network, API error, empty result) into `DataUnavailable`. Nothing
/// below this boundary raises.
async fn fetch_reference_series(
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<provider::HistoricalSeries> {
    let series = match provider::fetch_historical_prices(ticker, start, end).await {
        Ok(series) => series,
        Err(e) => {
            warn!("Reference fetch for {} failed: {:#}", ticker, e);
            return Err(TrackerError::DataUnavailable {
                symbol: ticker.to_string(),
                from: start,
                to: end,
            }
            .into());
        }
    };

    if series.prices.is_empty() {
        return Err(TrackerError::DataUnavailable {
            symbol: ticker.to_string(),
            from: start,
            to: end,
        }
        .into());
    }

    Ok(series)
}

/// Fetch the FX series, degrading to None (unity conversion) when the
/// provider has nothing for the pair. Never fails the run.
async fn fetch_fx(
    home: &str,
    foreign: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<DailySeries> {
    match provider::fetch_fx_series(home, foreign, start, end).await {
        Ok(series) if !series.prices.is_empty() => Some(DailySeries::from_observations(
            series.prices.iter().map(|p| (p.date, p.close)),
        )),
        Ok(_) => {
            info!(
                "No {}/{} rates available; using unity conversion",
                home, foreign
            );
            None
        }
        Err(e) => {
            info!(
                "FX fetch for {}/{} failed ({:#}); using unity conversion",
                home, foreign, e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn tx(date: NaiveDate, isin: &str, quantity: Decimal, local_value: Decimal) -> Transaction {
        Transaction {
            id: None,
            content_hash: Transaction::compute_content_hash(
                date,
                isin,
                quantity,
                local_value,
                Decimal::ZERO,
                "EUR",
            ),
            trade_date: date,
            product: isin.to_string(),
            isin: isin.to_string(),
            quantity,
            local_value,
            fees: Decimal::ZERO,
            currency: "EUR".to_string(),
            source: "TEST".to_string(),
            created_at: Utc::now(),
        }
    }

    fn sample_inputs() -> BenchmarkInputs {
        let mut holdings_prices = HashMap::new();
        holdings_prices.insert(
            "IWDA.AS".to_string(),
            DailySeries::from_observations([(d(2024, 1, 1), dec!(100)), (d(2024, 1, 4), dec!(104))]),
        );

        BenchmarkInputs {
            ticker: "VWCE.DE".to_string(),
            home_currency: "EUR".to_string(),
            reference_currency: "EUR".to_string(),
            start: d(2024, 1, 1),
            end: d(2024, 1, 4),
            transactions: vec![tx(d(2024, 1, 1), "IE00B4L5Y983", dec!(10), dec!(-1000))],
            mappings: [("IE00B4L5Y983".to_string(), "IWDA.AS".to_string())]
                .into_iter()
                .collect(),
            reference: DailySeries::from_observations([
                (d(2024, 1, 1), dec!(50)),
                (d(2024, 1, 4), dec!(52)),
            ]),
            fx: None,
            holdings_prices,
        }
    }

    #[test]
    fn test_run_simulation_produces_parallel_series() {
        let report = run_simulation(&sample_inputs());

        assert_eq!(report.points.len(), 4);
        assert_eq!(report.final_units, dec!(20));
        assert_eq!(report.trades.len(), 1);

        // Day 4: real 10 * 104, shadow 20 * 52
        let last = report.points.last().unwrap();
        assert_eq!(last.real_value, dec!(1040));
        assert_eq!(last.reference_value, dec!(1040));
    }

    #[test]
    fn test_run_simulation_is_idempotent() {
        let inputs = sample_inputs();
        let a = run_simulation(&inputs);
        let b = run_simulation(&inputs);
        assert_eq!(a.points, b.points);
        assert_eq!(a.final_units, b.final_units);
    }

    #[test]
    fn test_empty_report_for_no_transactions() {
        let report = BenchmarkReport::empty("VWCE.DE", "EUR");
        assert!(report.points.is_empty());
        assert!(report.trades.is_empty());
        assert_eq!(report.final_units, Decimal::ZERO);
    }
}
