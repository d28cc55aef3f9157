//! Memoization of completed simulation runs.
//!
//! A run is keyed by the reference ticker, the simulation window and a
//! content fingerprint of the transaction and price tables, so a stale
//! entry can never be returned. The import and price-update write paths
//! additionally call [`clear`] so memory is not held for dead inputs.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use super::BenchmarkReport;
use crate::db::Transaction;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoKey {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub fingerprint: String,
}

static MEMO: Lazy<Mutex<HashMap<MemoKey, BenchmarkReport>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Fingerprint the simulation inputs: every transaction's content hash plus
/// every stored price row for the involved tickers.
pub fn content_fingerprint(
    transactions: &[Transaction],
    price_rows: &[(String, NaiveDate, rust_decimal::Decimal)],
) -> String {
    let mut hasher = blake3::Hasher::new();
    for tx in transactions {
        hasher.update(tx.content_hash.as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(b"--prices--\n");
    for (ticker, date, close) in price_rows {
        hasher.update(ticker.as_bytes());
        hasher.update(b"|");
        hasher.update(date.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(close.normalize().to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

pub fn get(key: &MemoKey) -> Option<BenchmarkReport> {
    let memo = MEMO.lock().unwrap();
    let hit = memo.get(key).cloned();
    if hit.is_some() {
        debug!("Benchmark memo hit for {}", key.ticker);
    }
    hit
}

pub fn put(key: MemoKey, report: BenchmarkReport) {
    let mut memo = MEMO.lock().unwrap();
    memo.insert(key, report);
}

/// Drop all memoized runs. Called whenever transactions or prices are
/// written.
pub fn clear() {
    let mut memo = MEMO.lock().unwrap();
    if !memo.is_empty() {
        debug!("Clearing {} memoized benchmark runs", memo.len());
    }
    memo.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn sample_tx(local_value: Decimal) -> Transaction {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        Transaction {
            id: None,
            content_hash: Transaction::compute_content_hash(
                date,
                "IE00B4L5Y983",
                dec!(1),
                local_value,
                Decimal::ZERO,
                "EUR",
            ),
            trade_date: date,
            product: "Test".to_string(),
            isin: "IE00B4L5Y983".to_string(),
            quantity: dec!(1),
            local_value,
            fees: Decimal::ZERO,
            currency: "EUR".to_string(),
            source: "TEST".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_fingerprint_changes_with_transactions() {
        let prices = vec![(
            "IWDA.AS".to_string(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            dec!(100),
        )];

        let a = content_fingerprint(&[sample_tx(dec!(-100))], &prices);
        let b = content_fingerprint(&[sample_tx(dec!(-200))], &prices);
        let again = content_fingerprint(&[sample_tx(dec!(-100))], &prices);

        assert_ne!(a, b);
        assert_eq!(a, again);
    }

    #[test]
    fn test_fingerprint_changes_with_price_rows() {
        let txs = vec![sample_tx(dec!(-100))];
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let a = content_fingerprint(&txs, &[("IWDA.AS".to_string(), date, dec!(100))]);
        let b = content_fingerprint(&txs, &[("IWDA.AS".to_string(), date, dec!(101))]);

        assert_ne!(a, b);
    }
}
