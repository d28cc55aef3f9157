// Database module - SQLite connection and stores

pub mod models;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

pub use models::{Category, InstrumentMapping, PriceObservation, Transaction};

/// Get the default database path (~/.folio/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let folio_dir = PathBuf::from(home).join(".folio");

    std::fs::create_dir_all(&folio_dir).context("Failed to create .folio directory")?;

    Ok(folio_dir.join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = db_path.unwrap_or(get_default_db_path()?);
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Initialize the database with schema
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = db_path.unwrap_or(get_default_db_path()?);

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;

    let schema_sql = include_str!("schema.sql");
    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")?;

    Ok(())
}

/// Insert a transaction. Returns true if the row was inserted, false if a
/// row with the same content hash already existed (duplicate import).
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO transactions (
            content_hash, trade_date, product, isin,
            quantity, local_value, fees, currency, source
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            tx.content_hash,
            tx.trade_date,
            tx.product,
            tx.isin,
            tx.quantity.to_string(),
            tx.local_value.to_string(),
            tx.fees.to_string(),
            tx.currency,
            tx.source,
        ],
    )?;

    Ok(changed > 0)
}

/// Get all transactions in chronological order
pub fn get_all_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, content_hash, trade_date, product, isin,
                quantity, local_value, fees, currency, source, created_at
         FROM transactions
         ORDER BY trade_date ASC, id ASC",
    )?;

    let transactions = stmt
        .query_map([], |row| {
            Ok(Transaction {
                id: Some(row.get(0)?),
                content_hash: row.get(1)?,
                trade_date: row.get(2)?,
                product: row.get(3)?,
                isin: row.get(4)?,
                quantity: get_decimal_value(row, 5)?,
                local_value: get_decimal_value(row, 6)?,
                fees: get_decimal_value(row, 7)?,
                currency: row.get(8)?,
                source: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// Get the earliest transaction date
pub fn get_earliest_transaction_date(conn: &Connection) -> Result<Option<NaiveDate>> {
    let mut stmt = conn.prepare("SELECT MIN(trade_date) FROM transactions")?;

    // MIN() returns a single row with NULL when the table is empty
    let result: Option<Option<NaiveDate>> = stmt.query_row([], |row| row.get(0)).optional()?;

    Ok(result.flatten())
}

/// Replace the full mapping table with the given rows.
///
/// Mapping saves are all-or-nothing; there is no partial update path.
pub fn replace_mappings(conn: &mut Connection, mappings: &[InstrumentMapping]) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM instrument_mappings", [])?;
    for mapping in mappings {
        tx.execute(
            "INSERT INTO instrument_mappings (isin, ticker, category) VALUES (?1, ?2, ?3)",
            params![mapping.isin, mapping.ticker, mapping.category.as_str()],
        )?;
    }

    tx.commit()?;
    info!("Saved {} instrument mappings", mappings.len());
    Ok(())
}

/// Get all instrument mappings
pub fn get_mappings(conn: &Connection) -> Result<Vec<InstrumentMapping>> {
    let mut stmt =
        conn.prepare("SELECT isin, ticker, category FROM instrument_mappings ORDER BY isin")?;

    let mappings = stmt
        .query_map([], |row| {
            Ok(InstrumentMapping {
                isin: row.get(0)?,
                ticker: row.get(1)?,
                category: row
                    .get::<_, String>(2)?
                    .parse::<Category>()
                    .unwrap_or(Category::Other),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(mappings)
}

/// Get mappings keyed by ISIN
pub fn get_mappings_by_isin(conn: &Connection) -> Result<HashMap<String, InstrumentMapping>> {
    Ok(get_mappings(conn)?
        .into_iter()
        .map(|m| (m.isin.clone(), m))
        .collect())
}

/// Insert a price observation, replacing any earlier write for the same
/// (ticker, date) key.
pub fn insert_price_observation(conn: &Connection, price: &PriceObservation) -> Result<i64> {
    conn.execute(
        "INSERT OR REPLACE INTO price_history (ticker, price_date, close_price, source)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            price.ticker,
            price.price_date,
            price.close_price.to_string(),
            price.source,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Get the full stored price history for a ticker, ordered by date
pub fn get_price_history(conn: &Connection, ticker: &str) -> Result<Vec<(NaiveDate, Decimal)>> {
    let mut stmt = conn.prepare(
        "SELECT price_date, close_price FROM price_history
         WHERE ticker = ?1
         ORDER BY price_date ASC",
    )?;

    let prices = stmt
        .query_map([ticker], |row| Ok((row.get(0)?, get_decimal_value(row, 1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(prices)
}

/// Get the latest price observation on or before a given date
pub fn get_price_on_or_before(
    conn: &Connection,
    ticker: &str,
    as_of_date: NaiveDate,
) -> Result<Option<PriceObservation>> {
    let mut stmt = conn.prepare(
        "SELECT id, ticker, price_date, close_price, source, created_at
         FROM price_history
         WHERE ticker = ?1 AND price_date <= ?2
         ORDER BY price_date DESC
         LIMIT 1",
    )?;

    let result = stmt
        .query_row(params![ticker, as_of_date], |row| {
            Ok(PriceObservation {
                id: Some(row.get(0)?),
                ticker: row.get(1)?,
                price_date: row.get(2)?,
                close_price: get_decimal_value(row, 3)?,
                source: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(result)
}

/// Get the latest stored price for a ticker
pub fn get_latest_price(conn: &Connection, ticker: &str) -> Result<Option<PriceObservation>> {
    let mut stmt = conn.prepare(
        "SELECT id, ticker, price_date, close_price, source, created_at
         FROM price_history
         WHERE ticker = ?1
         ORDER BY price_date DESC
         LIMIT 1",
    )?;

    let result = stmt
        .query_row([ticker], |row| {
            Ok(PriceObservation {
                id: Some(row.get(0)?),
                ticker: row.get(1)?,
                price_date: row.get(2)?,
                close_price: get_decimal_value(row, 3)?,
                source: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(result)
}

/// Latest price date across all stored history. Defines the end of the
/// simulation window.
pub fn get_latest_price_date(conn: &Connection) -> Result<Option<NaiveDate>> {
    let mut stmt = conn.prepare("SELECT MAX(price_date) FROM price_history")?;

    let result: Option<Option<NaiveDate>> = stmt.query_row([], |row| row.get(0)).optional()?;

    Ok(result.flatten())
}

/// Latest stored price date for one ticker (used to resume fetching)
pub fn get_latest_price_date_for(conn: &Connection, ticker: &str) -> Result<Option<NaiveDate>> {
    let mut stmt = conn.prepare("SELECT MAX(price_date) FROM price_history WHERE ticker = ?1")?;

    let result: Option<Option<NaiveDate>> =
        stmt.query_row([ticker], |row| row.get(0)).optional()?;

    Ok(result.flatten())
}

/// Helper to read Decimal from SQLite (handles INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Decimal::from_str(s).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => {
            Decimal::try_from(f).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            rusqlite::types::Type::Null,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(include_str!("schema.sql")).unwrap();
        conn
    }

    fn sample_transaction(date: NaiveDate, isin: &str, local_value: Decimal) -> Transaction {
        let quantity = dec!(10);
        let fees = dec!(1);
        Transaction {
            id: None,
            content_hash: Transaction::compute_content_hash(
                date,
                isin,
                quantity,
                local_value,
                fees,
                "EUR",
            ),
            trade_date: date,
            product: "Test Product".to_string(),
            isin: isin.to_string(),
            quantity,
            local_value,
            fees,
            currency: "EUR".to_string(),
            source: "TEST".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_transaction_dedup_by_content_hash() {
        let conn = test_conn();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let tx = sample_transaction(date, "IE00B4L5Y983", dec!(-1000));

        assert!(insert_transaction(&conn, &tx).unwrap());
        assert!(!insert_transaction(&conn, &tx).unwrap());

        let all = get_all_transactions(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].local_value, dec!(-1000));
    }

    #[test]
    fn test_earliest_transaction_date() {
        let conn = test_conn();
        assert!(get_earliest_transaction_date(&conn).unwrap().is_none());

        let d1 = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        insert_transaction(&conn, &sample_transaction(d1, "IE00B4L5Y983", dec!(-500))).unwrap();
        insert_transaction(&conn, &sample_transaction(d2, "IE00B4L5Y983", dec!(-700))).unwrap();

        assert_eq!(get_earliest_transaction_date(&conn).unwrap(), Some(d2));
    }

    #[test]
    fn test_replace_mappings_is_full_table_replace() {
        let mut conn = test_conn();

        replace_mappings(
            &mut conn,
            &[
                InstrumentMapping {
                    isin: "IE00B4L5Y983".to_string(),
                    ticker: "IWDA.AS".to_string(),
                    category: Category::Etf,
                },
                InstrumentMapping {
                    isin: "US0378331005".to_string(),
                    ticker: "AAPL".to_string(),
                    category: Category::Stock,
                },
            ],
        )
        .unwrap();
        assert_eq!(get_mappings(&conn).unwrap().len(), 2);

        // A second save fully replaces the first, including removals
        replace_mappings(
            &mut conn,
            &[InstrumentMapping {
                isin: "IE00B4L5Y983".to_string(),
                ticker: "SWDA.MI".to_string(),
                category: Category::Etf,
            }],
        )
        .unwrap();

        let mappings = get_mappings(&conn).unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].ticker, "SWDA.MI");
    }

    #[test]
    fn test_price_history_latest_write_wins() {
        let conn = test_conn();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        for close in [dec!(100), dec!(101.5)] {
            insert_price_observation(
                &conn,
                &PriceObservation {
                    id: None,
                    ticker: "IWDA.AS".to_string(),
                    price_date: date,
                    close_price: close,
                    source: "TEST".to_string(),
                    created_at: Utc::now(),
                },
            )
            .unwrap();
        }

        let history = get_price_history(&conn, "IWDA.AS").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].1, dec!(101.5));
    }

    #[test]
    fn test_get_price_on_or_before_forward_fills() {
        let conn = test_conn();
        let observed = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        insert_price_observation(
            &conn,
            &PriceObservation {
                id: None,
                ticker: "IWDA.AS".to_string(),
                price_date: observed,
                close_price: dec!(95.25),
                source: "TEST".to_string(),
                created_at: Utc::now(),
            },
        )
        .unwrap();

        // A later day resolves to the most recent observation
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        let hit = get_price_on_or_before(&conn, "IWDA.AS", sunday).unwrap();
        assert_eq!(hit.unwrap().close_price, dec!(95.25));

        // A day before the first observation yields nothing
        let before = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        assert!(get_price_on_or_before(&conn, "IWDA.AS", before)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_latest_price_date_across_tickers() {
        let conn = test_conn();
        assert!(get_latest_price_date(&conn).unwrap().is_none());

        for (ticker, day) in [("IWDA.AS", 10), ("AAPL", 12)] {
            insert_price_observation(
                &conn,
                &PriceObservation {
                    id: None,
                    ticker: ticker.to_string(),
                    price_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                    close_price: dec!(50),
                    source: "TEST".to_string(),
                    created_at: Utc::now(),
                },
            )
            .unwrap();
        }

        assert_eq!(
            get_latest_price_date(&conn).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 12)
        );
        assert_eq!(
            get_latest_price_date_for(&conn, "IWDA.AS").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 10)
        );
    }
}
