//! Error handling for Folio
//!
//! Defines custom error types and establishes a unified Result type
//! using anyhow for context chaining and error propagation.

use chrono::NaiveDate;
use thiserror::Error;

/// Core error types for tracker operations
#[derive(Error, Debug)]
pub enum TrackerError {
    /// The market-data provider returned nothing usable for the requested
    /// instrument and range. Fatal to a benchmark run; never retried here.
    #[error("no market data available for {symbol} between {from} and {to}")]
    DataUnavailable {
        symbol: String,
        from: NaiveDate,
        to: NaiveDate,
    },

    #[error("database error: {0}")]
    DbError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("pricing error: {0}")]
    PricingError(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias for tracker operations
pub type Result<T> = anyhow::Result<T>;
