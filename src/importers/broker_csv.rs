use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::db::Transaction;

/// A transaction row as parsed from the broker export, before it is keyed
/// and stored. `local_value` keeps the broker's sign convention: negative =
/// cash out (purchase), positive = cash in (sale, dividend).
#[derive(Debug, Clone)]
pub struct RawTransaction {
    pub trade_date: NaiveDate,
    pub product: String,
    pub isin: String,
    pub quantity: Decimal,
    pub local_value: Decimal,
    pub fees: Decimal,
    pub currency: String,
}

impl RawTransaction {
    /// Convert to the storable model, computing the content hash
    pub fn to_transaction(&self, source: &str) -> Transaction {
        Transaction {
            id: None,
            content_hash: Transaction::compute_content_hash(
                self.trade_date,
                &self.isin,
                self.quantity,
                self.local_value,
                self.fees,
                &self.currency,
            ),
            trade_date: self.trade_date,
            product: self.product.clone(),
            isin: self.isin.clone(),
            quantity: self.quantity,
            local_value: self.local_value,
            fees: self.fees,
            currency: self.currency.clone(),
            source: source.to_string(),
            created_at: chrono::Utc::now(),
        }
    }
}

/// Parse a brokerage transactions CSV export
pub fn parse_broker_csv<P: AsRef<Path>>(file_path: P) -> Result<Vec<RawTransaction>> {
    let path = file_path.as_ref();
    info!("Parsing broker CSV file: {:?}", path);

    let mut reader = ReaderBuilder::new()
        .flexible(true) // Allow variable number of columns
        .from_path(path)
        .context("Failed to open CSV file")?;

    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();

    debug!("CSV headers: {:?}", headers);

    let column_mapping = find_columns(&headers)?;
    debug!("Column mapping: {:?}", column_mapping);

    let mut transactions = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read CSV record")?;

        match parse_csv_row(&record, &column_mapping, idx + 2) {
            Ok(Some(transaction)) => {
                transactions.push(transaction);
            }
            Ok(None) => {
                continue;
            }
            Err(e) => {
                warn!("Skipping row {}: {}", idx + 2, e);
                continue;
            }
        }
    }

    info!(
        "Successfully parsed {} transactions from CSV",
        transactions.len()
    );
    Ok(transactions)
}

#[derive(Debug)]
struct CsvColumnMapping {
    date: usize,
    product: Option<usize>,
    isin: usize,
    quantity: usize,
    local_value: usize,
    fees: Option<usize>,
    currency: Option<usize>,
}

fn find_columns(headers: &csv::StringRecord) -> Result<CsvColumnMapping> {
    let mut date_idx = None;
    let mut product_idx = None;
    let mut isin_idx = None;
    let mut quantity_idx = None;
    let mut value_idx = None;
    let mut fees_idx = None;
    let mut currency_idx = None;

    for (idx, header) in headers.iter().enumerate() {
        let text = header.to_lowercase();

        if text.contains("date") && date_idx.is_none() {
            date_idx = Some(idx);
        }

        if text.contains("product") || text.contains("description") || text.contains("name") {
            product_idx = product_idx.or(Some(idx));
        }

        if text.contains("isin") {
            isin_idx = Some(idx);
        }

        if text.contains("quantity") || text.contains("qty") || text.contains("shares") {
            quantity_idx = Some(idx);
        }

        // Prefer the broker's local value column; fall back to a plain value
        if text.contains("local value") {
            value_idx = Some(idx);
        } else if text.contains("value") && value_idx.is_none() {
            value_idx = Some(idx);
        }

        if text.contains("fee") || text.contains("cost") || text.contains("commission") {
            fees_idx = fees_idx.or(Some(idx));
        }

        if text.contains("currency") || text == "ccy" {
            currency_idx = currency_idx.or(Some(idx));
        }
    }

    Ok(CsvColumnMapping {
        date: date_idx.ok_or_else(|| anyhow!("Date column not found"))?,
        product: product_idx,
        isin: isin_idx.ok_or_else(|| anyhow!("ISIN column not found"))?,
        quantity: quantity_idx.ok_or_else(|| anyhow!("Quantity column not found"))?,
        local_value: value_idx.ok_or_else(|| anyhow!("Local value column not found"))?,
        fees: fees_idx,
        currency: currency_idx,
    })
}

fn parse_csv_row(
    record: &csv::StringRecord,
    mapping: &CsvColumnMapping,
    row_num: usize,
) -> Result<Option<RawTransaction>> {
    // ISIN - skip rows without one (cash movements, interest lines)
    let isin = record
        .get(mapping.isin)
        .ok_or_else(|| anyhow!("Missing ISIN at row {}", row_num))?
        .trim()
        .to_uppercase();

    if isin.is_empty() {
        return Ok(None);
    }

    let date_str = record
        .get(mapping.date)
        .ok_or_else(|| anyhow!("Missing date at row {}", row_num))?;
    let trade_date = parse_csv_date(date_str)?;

    let product = mapping
        .product
        .and_then(|idx| record.get(idx))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| isin.clone());

    let quantity_str = record
        .get(mapping.quantity)
        .ok_or_else(|| anyhow!("Missing quantity at row {}", row_num))?;
    let quantity = parse_csv_decimal(quantity_str)?;

    let value_str = record
        .get(mapping.local_value)
        .ok_or_else(|| anyhow!("Missing local value at row {}", row_num))?;
    let local_value = parse_csv_decimal(value_str)?;

    let fees = mapping
        .fees
        .and_then(|idx| record.get(idx))
        .and_then(|s| parse_csv_decimal(s).ok())
        .unwrap_or(Decimal::ZERO);

    let currency = mapping
        .currency
        .and_then(|idx| record.get(idx))
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "EUR".to_string());

    Ok(Some(RawTransaction {
        trade_date,
        product,
        isin,
        quantity,
        local_value,
        fees,
        currency,
    }))
}

fn parse_csv_date(date_str: &str) -> Result<NaiveDate> {
    let date_str = date_str.trim();

    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%d-%m-%Y") {
        return Ok(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%d/%m/%Y") {
        return Ok(date);
    }

    Err(anyhow!("Could not parse date: {}", date_str))
}

fn parse_csv_decimal(text: &str) -> Result<Decimal> {
    let cleaned = text.replace(' ', "");

    // Comma-decimal exports: "1.234,56" -> "1234.56"
    let cleaned = if cleaned.contains(',') {
        if cleaned.contains('.') {
            cleaned.replace('.', "").replace(',', ".")
        } else {
            cleaned.replace(',', ".")
        }
    } else {
        cleaned
    };

    Decimal::from_str(&cleaned).context("Failed to parse decimal")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn write_temp_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_csv_decimal() {
        assert_eq!(parse_csv_decimal("1234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_csv_decimal("1.234,56").unwrap(), dec!(1234.56));
        assert_eq!(parse_csv_decimal("-1000,00").unwrap(), dec!(-1000.00));
    }

    #[test]
    fn test_parse_csv_date() {
        assert_eq!(
            parse_csv_date("2025-03-15").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
        );
        assert_eq!(
            parse_csv_date("15-03-2025").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
        );
        assert_eq!(
            parse_csv_date("15/03/2025").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
        );
    }

    #[test]
    fn test_parse_broker_csv_basic() {
        let file = write_temp_csv(
            "Date,Product,ISIN,Quantity,Local value,Fee,Currency\n\
             2024-01-02,Core MSCI World,IE00B4L5Y983,10,-1000.00,-2.50,EUR\n\
             2024-02-05,Apple Inc,US0378331005,5,-850.00,-1.00,USD\n",
        );

        let transactions = parse_broker_csv(file.path()).unwrap();
        assert_eq!(transactions.len(), 2);

        assert_eq!(transactions[0].isin, "IE00B4L5Y983");
        assert_eq!(transactions[0].quantity, dec!(10));
        assert_eq!(transactions[0].local_value, dec!(-1000.00));
        assert_eq!(transactions[0].fees, dec!(-2.50));
        assert_eq!(transactions[0].currency, "EUR");

        assert_eq!(transactions[1].product, "Apple Inc");
        assert_eq!(transactions[1].currency, "USD");
    }

    #[test]
    fn test_rows_without_isin_are_skipped() {
        let file = write_temp_csv(
            "Date,Product,ISIN,Quantity,Local value,Fee,Currency\n\
             2024-01-02,Interest payment,,0,1.23,0,EUR\n\
             2024-01-03,Core MSCI World,IE00B4L5Y983,4,-400.00,0,EUR\n",
        );

        let transactions = parse_broker_csv(file.path()).unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].isin, "IE00B4L5Y983");
    }

    #[test]
    fn test_malformed_rows_are_skipped_not_fatal() {
        let file = write_temp_csv(
            "Date,Product,ISIN,Quantity,Local value,Fee,Currency\n\
             not-a-date,Broken,IE00B4L5Y983,1,-10,0,EUR\n\
             2024-01-03,Core MSCI World,IE00B4L5Y983,4,-400.00,0,EUR\n",
        );

        let transactions = parse_broker_csv(file.path()).unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].quantity, dec!(4));
    }

    #[test]
    fn test_to_transaction_carries_sign_and_hash() {
        let raw = RawTransaction {
            trade_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            product: "Core MSCI World".to_string(),
            isin: "IE00B4L5Y983".to_string(),
            quantity: dec!(10),
            local_value: dec!(-1000),
            fees: dec!(-2.50),
            currency: "EUR".to_string(),
        };

        let tx = raw.to_transaction("CSV");
        assert_eq!(tx.local_value, dec!(-1000));
        assert_eq!(tx.source, "CSV");
        assert!(!tx.content_hash.is_empty());

        // Same raw row always keys identically
        assert_eq!(tx.content_hash, raw.to_transaction("CSV").content_hash);
    }
}
