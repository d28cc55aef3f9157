use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{info, warn};

use crate::db::{Category, InstrumentMapping};

/// Parse an {isin, ticker, category} mapping CSV.
///
/// The whole file describes the whole mapping table; saving it replaces any
/// previous mapping set.
pub fn parse_mapping_csv<P: AsRef<Path>>(file_path: P) -> Result<Vec<InstrumentMapping>> {
    let path = file_path.as_ref();
    info!("Parsing mapping CSV file: {:?}", path);

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("Failed to open mapping CSV file")?;

    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();

    let mut isin_idx = None;
    let mut ticker_idx = None;
    let mut category_idx = None;

    for (idx, header) in headers.iter().enumerate() {
        let text = header.to_lowercase();
        if text.contains("isin") {
            isin_idx = Some(idx);
        }
        if text.contains("ticker") || text.contains("symbol") {
            ticker_idx = Some(idx);
        }
        if text.contains("category") || text.contains("type") {
            category_idx = Some(idx);
        }
    }

    let isin_idx = isin_idx.ok_or_else(|| anyhow!("ISIN column not found"))?;
    let ticker_idx = ticker_idx.ok_or_else(|| anyhow!("Ticker column not found"))?;

    let mut mappings = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read CSV record")?;

        let isin = record
            .get(isin_idx)
            .map(|s| s.trim().to_uppercase())
            .unwrap_or_default();
        let ticker = record
            .get(ticker_idx)
            .map(|s| s.trim().to_uppercase())
            .unwrap_or_default();

        if isin.is_empty() || ticker.is_empty() {
            warn!("Skipping mapping row {}: missing isin or ticker", idx + 2);
            continue;
        }

        let category = category_idx
            .and_then(|i| record.get(i))
            .and_then(|s| s.parse::<Category>().ok())
            .unwrap_or(Category::Other);

        mappings.push(InstrumentMapping {
            isin,
            ticker,
            category,
        });
    }

    info!("Parsed {} instrument mappings", mappings.len());
    Ok(mappings)
}
