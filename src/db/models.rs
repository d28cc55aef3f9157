use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Instrument categories used for allocation and rebalancing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Etf,
    Stock,
    Fund,
    Bond,
    Crypto,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Etf => "ETF",
            Category::Stock => "STOCK",
            Category::Fund => "FUND",
            Category::Bond => "BOND",
            Category::Crypto => "CRYPTO",
            Category::Other => "OTHER",
        }
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ETF" => Ok(Category::Etf),
            "STOCK" | "SHARE" | "EQUITY" => Ok(Category::Stock),
            "FUND" => Ok(Category::Fund),
            "BOND" => Ok(Category::Bond),
            "CRYPTO" => Ok(Category::Crypto),
            "OTHER" => Ok(Category::Other),
            _ => Err(()),
        }
    }
}

/// A single brokerage transaction.
///
/// `local_value` is signed: negative = cash outflow (purchase), positive =
/// inflow (sale, dividend). Rows are immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<i64>,
    pub content_hash: String,
    pub trade_date: NaiveDate,
    pub product: String,
    pub isin: String,
    pub quantity: Decimal,
    pub local_value: Decimal,
    pub fees: Decimal,
    pub currency: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Content-derived identifier over the fields that make a transaction
    /// distinct. Used to keep repeated imports of the same export idempotent.
    pub fn compute_content_hash(
        trade_date: NaiveDate,
        isin: &str,
        quantity: Decimal,
        local_value: Decimal,
        fees: Decimal,
        currency: &str,
    ) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(trade_date.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(isin.as_bytes());
        hasher.update(b"|");
        hasher.update(quantity.normalize().to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(local_value.normalize().to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(fees.normalize().to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(currency.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

/// ISIN to market ticker mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentMapping {
    pub isin: String,
    pub ticker: String,
    pub category: Category,
}

/// Daily close price observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    pub id: Option<i64>,
    pub ticker: String,
    pub price_date: NaiveDate,
    pub close_price: Decimal,
    pub source: String,
    pub created_at: DateTime<Utc>,
}
