// Pricing module - market-data provider client

pub mod provider;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Global singleton spot-price fetcher with 24-hour cache, shared across
/// all calls within a process.
static GLOBAL_FETCHER: Lazy<PriceFetcher> = Lazy::new(PriceFetcher::new);

#[derive(Debug, Clone)]
struct CacheEntry {
    price: rust_decimal::Decimal,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// Spot-price fetcher with caching (24hr TTL)
pub struct PriceFetcher {
    cache: Arc<Mutex<HashMap<String, CacheEntry>>>,
    cache_ttl_hours: i64,
}

impl Default for PriceFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceFetcher {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(Mutex::new(HashMap::new())),
            cache_ttl_hours: 24,
        }
    }

    /// Fetch current price with caching
    pub async fn fetch_price(&self, symbol: &str) -> Result<rust_decimal::Decimal> {
        {
            let cache = self.cache.lock().unwrap();
            if let Some(entry) = cache.get(symbol) {
                let age = Utc::now().signed_duration_since(entry.timestamp);
                if age < Duration::hours(self.cache_ttl_hours) {
                    debug!(
                        "Using cached price for {} (age: {}h)",
                        symbol,
                        age.num_hours()
                    );
                    return Ok(entry.price);
                }
            }
        }

        info!("Fetching fresh price for {}", symbol);
        let price_data = provider::fetch_current_price(symbol)
            .await
            .context("Provider price fetch failed")?;

        let mut cache = self.cache.lock().unwrap();
        cache.insert(
            symbol.to_string(),
            CacheEntry {
                price: price_data.price,
                timestamp: Utc::now(),
            },
        );
        Ok(price_data.price)
    }

    #[allow(dead_code)]
    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock().unwrap();
        cache.clear();
        info!("Price cache cleared");
    }

    #[allow(dead_code)]
    pub fn cache_size(&self) -> usize {
        let cache = self.cache.lock().unwrap();
        cache.len()
    }
}

/// Convenience function to fetch a price using the global shared fetcher.
pub async fn fetch_price(symbol: &str) -> Result<rust_decimal::Decimal> {
    GLOBAL_FETCHER.fetch_price(symbol).await
}
