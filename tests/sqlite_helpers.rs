use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tempfile::TempDir;

use folio::db::{self, PriceObservation, Transaction};

pub fn db_path(home: &TempDir) -> PathBuf {
    home.path().join("data.db")
}

pub fn init_test_db(home: &TempDir) -> Result<Connection> {
    let path = db_path(home);
    db::init_database(Some(path.clone()))?;
    db::open_db(Some(path))
}

pub fn make_transaction(
    date: NaiveDate,
    isin: &str,
    quantity: Decimal,
    local_value: Decimal,
    currency: &str,
) -> Transaction {
    Transaction {
        id: None,
        content_hash: Transaction::compute_content_hash(
            date,
            isin,
            quantity,
            local_value,
            Decimal::ZERO,
            currency,
        ),
        trade_date: date,
        product: format!("Product {}", isin),
        isin: isin.to_string(),
        quantity,
        local_value,
        fees: Decimal::ZERO,
        currency: currency.to_string(),
        source: "TEST".to_string(),
        created_at: chrono::Utc::now(),
    }
}

pub fn store_price(conn: &Connection, ticker: &str, date: NaiveDate, close: Decimal) -> Result<()> {
    db::insert_price_observation(
        conn,
        &PriceObservation {
            id: None,
            ticker: ticker.to_string(),
            price_date: date,
            close_price: close,
            source: "TEST".to_string(),
            created_at: chrono::Utc::now(),
        },
    )?;
    Ok(())
}
