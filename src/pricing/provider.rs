use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Chart API response shape
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    result: Option<Vec<ChartResult>>,
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    currency: Option<String>,
    #[allow(dead_code)]
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    code: String,
    description: String,
}

/// Spot quote
#[derive(Debug, Clone, Serialize)]
pub struct PriceData {
    pub symbol: String,
    pub price: Decimal,
    pub currency: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Single daily close
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalPrice {
    pub date: NaiveDate,
    pub close: Decimal,
}

/// A daily close series with the currency the instrument trades in.
/// Gaps on non-trading days are expected; callers forward-fill.
#[derive(Debug, Clone)]
pub struct HistoricalSeries {
    pub symbol: String,
    pub currency: String,
    pub prices: Vec<HistoricalPrice>,
}

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent("Mozilla/5.0 (compatible; FolioBot/1.0)")
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch the current price for a symbol
pub async fn fetch_current_price(symbol: &str) -> Result<PriceData> {
    info!("Fetching current price for {}", symbol);

    let client = build_client()?;
    let url = format!("{}/{}", BASE_URL, symbol);

    let result = request_chart(&client, &url).await?;

    let price = result
        .meta
        .regular_market_price
        .ok_or_else(|| anyhow!("No price data available for {}", symbol))?;

    let currency = result.meta.currency.unwrap_or_else(|| "USD".to_string());

    Ok(PriceData {
        symbol: symbol.to_string(),
        price: Decimal::from_f64_retain(price).ok_or_else(|| anyhow!("Invalid price value"))?,
        currency,
        timestamp: chrono::Utc::now(),
    })
}

/// Fetch daily close prices for a symbol over [from, to]
pub async fn fetch_historical_prices(
    symbol: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<HistoricalSeries> {
    info!(
        "Fetching historical prices for {} from {} to {}",
        symbol, from, to
    );

    let client = build_client()?;

    let from_timestamp = from
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("Invalid from date"))?
        .and_utc()
        .timestamp();

    let to_timestamp = to
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| anyhow!("Invalid to date"))?
        .and_utc()
        .timestamp();

    let url = format!(
        "{}/{}?period1={}&period2={}&interval=1d",
        BASE_URL, symbol, from_timestamp, to_timestamp
    );

    let result = request_chart(&client, &url).await?;

    let currency = result
        .meta
        .currency
        .clone()
        .unwrap_or_else(|| "USD".to_string());

    let timestamps = result
        .timestamp
        .ok_or_else(|| anyhow!("No timestamp data for {}", symbol))?;

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No quote data for {}", symbol))?;

    let closes = quote
        .close
        .ok_or_else(|| anyhow!("No close prices for {}", symbol))?;

    let mut prices = Vec::new();

    for (i, &timestamp) in timestamps.iter().enumerate() {
        // Normalize the provider timestamp to day resolution
        let date = chrono::DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| anyhow!("Invalid timestamp"))?
            .date_naive();

        // Null closes appear inside otherwise valid ranges; skip them and
        // let the caller forward-fill.
        let Some(close) = closes.get(i).and_then(|&v| v) else {
            continue;
        };

        prices.push(HistoricalPrice {
            date,
            close: Decimal::from_f64_retain(close)
                .ok_or_else(|| anyhow!("Invalid close price"))?,
        });
    }

    debug!("Fetched {} historical prices for {}", prices.len(), symbol);

    Ok(HistoricalSeries {
        symbol: symbol.to_string(),
        currency,
        prices,
    })
}

/// Fetch the daily exchange-rate series for a currency pair over [from, to].
///
/// The returned rate converts `home` into `foreign`:
/// `amount_foreign = amount_home * rate`.
pub async fn fetch_fx_series(
    home: &str,
    foreign: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<HistoricalSeries> {
    let pair = format!("{}{}=X", home.to_uppercase(), foreign.to_uppercase());
    fetch_historical_prices(&pair, from, to).await
}

async fn request_chart(client: &Client, url: &str) -> Result<ChartResult> {
    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send request to market-data provider")?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Market-data provider returned error status: {}",
            response.status()
        ));
    }

    let data: ChartResponse = response
        .json()
        .await
        .context("Failed to parse provider response")?;

    if let Some(error) = data.chart.error {
        return Err(anyhow!(
            "Provider API error: {} - {}",
            error.code,
            error.description
        ));
    }

    data.chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| anyhow!("No data returned from provider"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn should_skip_online_tests() -> bool {
        std::env::var("FOLIO_SKIP_ONLINE_TESTS")
            .map(|v| v != "0")
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn test_fetch_current_price() {
        if should_skip_online_tests() {
            return;
        }

        let result = fetch_current_price("AAPL").await;
        if let Err(e) = &result {
            eprintln!("Skipping current price test: {}", e);
            return;
        }
        let price_data = result.unwrap();

        assert_eq!(price_data.symbol, "AAPL");
        assert!(price_data.price > Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_fetch_historical_prices() {
        if should_skip_online_tests() {
            return;
        }

        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();

        let result = fetch_historical_prices("AAPL", from, to).await;
        if let Err(e) = &result {
            eprintln!("Skipping historical prices test: {}", e);
            return;
        }
        let series = result.unwrap();

        assert!(!series.prices.is_empty());
        assert_eq!(series.currency, "USD");
    }

    #[tokio::test]
    async fn test_fetch_fx_series_symbol_format() {
        if should_skip_online_tests() {
            return;
        }

        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();

        let result = fetch_fx_series("EUR", "USD", from, to).await;
        if let Err(e) = &result {
            eprintln!("Skipping FX series test: {}", e);
            return;
        }
        assert_eq!(result.unwrap().symbol, "EURUSD=X");
    }
}
