// Import module - brokerage CSV parsers

pub mod broker_csv;
pub mod mapping_csv;

use anyhow::{anyhow, Result};
use std::path::Path;
use tracing::info;

pub use broker_csv::RawTransaction;

/// Import transactions from a brokerage export file
pub fn import_file<P: AsRef<Path>>(file_path: P) -> Result<Vec<RawTransaction>> {
    let path = file_path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| anyhow!("File has no extension"))?
        .to_lowercase();

    info!("Importing broker file: {:?} (type: {})", path, extension);

    match extension.as_str() {
        "csv" | "txt" => broker_csv::parse_broker_csv(path),
        _ => Err(anyhow!(
            "Unsupported file format: {}. Supported formats: .csv",
            extension
        )),
    }
}
