//! Venue price readers: Kalshi and Polymarket REST clients.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::cache::IdentifierCache;
use super::discovery::{
    fetch_identifiers_from_slug, fetch_newest_open_ticker, IdentifierResolver, TickerResolver,
};
use super::types::{InstrumentIdentifiers, KalshiMarket, KalshiMarketResponse, Venue};
use crate::config::Config;
use crate::error::MarketError;
use crate::metrics;
use crate::orderbook::PriceSnapshot;

/// Reads the current best asks for both outcomes from one venue.
#[async_trait]
pub trait VenueReader: Send + Sync {
    /// Which venue this reader talks to.
    fn venue(&self) -> Venue;

    /// Best asks for `key` (Kalshi ticker or Polymarket slug).
    async fn read(&self, key: &str) -> Result<PriceSnapshot, MarketError>;
}

/// Build the shared HTTP client with low-latency settings.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, MarketError> {
    let http = reqwest::Client::builder()
        .timeout(timeout)
        // Fast connection establishment
        .connect_timeout(Duration::from_millis(500))
        // TCP_NODELAY for low-latency (disable Nagle's algorithm)
        .tcp_nodelay(true)
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()?;
    Ok(http)
}

/// Kalshi trade API client (reads only).
#[derive(Debug, Clone)]
pub struct KalshiClient {
    http: reqwest::Client,
    base_url: String,
    series: String,
}

impl KalshiClient {
    /// Create a client from config.
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.kalshi_api_url.trim_end_matches('/').to_string(),
            series: config.kalshi_series_ticker.clone(),
        }
    }

    /// Get a single market by ticker.
    #[instrument(skip(self))]
    pub async fn get_market(&self, ticker: &str) -> Result<KalshiMarket, MarketError> {
        let url = format!("{}/markets/{}", self.base_url, ticker);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MarketError::FetchFailed {
                key: ticker.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let body: KalshiMarketResponse = response.json().await.map_err(|e| {
            MarketError::ParseError(format!("Failed to parse Kalshi market: {}", e))
        })?;

        Ok(body.market)
    }
}

/// Normalize a Kalshi cents ask; 0, 100 or missing means no resting asks.
pub fn kalshi_ask(cents: Option<i64>, ticker: &str) -> Result<Decimal, MarketError> {
    match cents {
        Some(c) if (1..=99).contains(&c) => Ok(Decimal::new(c, 2)),
        _ => Err(MarketError::NoLiquidity {
            venue: Venue::Kalshi,
            key: ticker.to_string(),
        }),
    }
}

#[async_trait]
impl VenueReader for KalshiClient {
    fn venue(&self) -> Venue {
        Venue::Kalshi
    }

    async fn read(&self, ticker: &str) -> Result<PriceSnapshot, MarketError> {
        let start = Instant::now();
        let market = self.get_market(ticker).await;
        metrics::record_venue_read_latency(start, Venue::Kalshi);
        let market = market?;

        Ok(PriceSnapshot {
            up_ask: kalshi_ask(market.yes_ask, ticker)?,
            down_ask: kalshi_ask(market.no_ask, ticker)?,
            captured_at: Utc::now(),
        })
    }
}

#[async_trait]
impl TickerResolver for KalshiClient {
    async fn resolve_ticker(&self) -> Result<String, MarketError> {
        fetch_newest_open_ticker(&self.http, &self.base_url, &self.series).await
    }
}

/// Order book response from the CLOB API.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookResponse {
    /// Bid levels.
    pub bids: Option<Vec<OrderLevel>>,
    /// Ask levels.
    pub asks: Option<Vec<OrderLevel>>,
    /// Asset ID.
    pub asset_id: Option<String>,
}

/// Single price level in order book.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrderLevel {
    /// Price at this level.
    pub price: String,
    /// Size available at this level.
    pub size: String,
}

/// Lowest ask with positive size, ignoring unparseable levels.
pub fn best_ask(levels: &[OrderLevel]) -> Option<Decimal> {
    levels
        .iter()
        .filter_map(|level| {
            let price: Decimal = level.price.parse().ok()?;
            let size: Decimal = level.size.parse().ok()?;
            (size > Decimal::ZERO).then_some(price)
        })
        .min()
}

/// Resolves slugs against the Gamma API.
#[derive(Debug, Clone)]
pub struct GammaResolver {
    http: reqwest::Client,
    gamma_url: String,
}

impl GammaResolver {
    /// Create a resolver from config.
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            gamma_url: config.polymarket_gamma_url.clone(),
        }
    }
}

#[async_trait]
impl IdentifierResolver for GammaResolver {
    async fn resolve(&self, slug: &str) -> Result<InstrumentIdentifiers, MarketError> {
        fetch_identifiers_from_slug(&self.http, &self.gamma_url, slug).await
    }
}

/// Polymarket CLOB client (reads only).
///
/// Slugs go through the identifier cache, so a steady-state read is two book
/// requests and no resolution.
#[derive(Debug)]
pub struct PolymarketClient {
    http: reqwest::Client,
    clob_url: String,
    cache: Mutex<IdentifierCache>,
}

impl PolymarketClient {
    /// Create a client reading books from `config.polymarket_clob_url`.
    pub fn new(http: reqwest::Client, config: &Config, resolver: Arc<dyn IdentifierResolver>) -> Self {
        Self {
            http,
            clob_url: config.polymarket_clob_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(IdentifierCache::new(resolver)),
        }
    }

    /// Resolve identifiers for `slug` through the cache.
    pub async fn identifiers(&self, slug: &str) -> Result<InstrumentIdentifiers, MarketError> {
        self.cache.lock().await.resolve(slug).await
    }

    /// Get the best ask for a token.
    #[instrument(skip(self), fields(token_id = %token_id))]
    pub async fn get_best_ask(&self, token_id: &str) -> Result<Decimal, MarketError> {
        let url = format!("{}/book", self.clob_url);

        let response = self
            .http
            .get(&url)
            .query(&[("token_id", token_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MarketError::FetchFailed {
                key: token_id.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let book: OrderBookResponse = response.json().await.map_err(|e| {
            MarketError::ParseError(format!("Failed to parse order book: {}", e))
        })?;

        let ask = best_ask(book.asks.as_deref().unwrap_or_default());
        debug!(ask = ?ask, "Polymarket best ask");

        ask.ok_or_else(|| MarketError::NoLiquidity {
            venue: Venue::Polymarket,
            key: token_id.to_string(),
        })
    }
}

#[async_trait]
impl IdentifierResolver for PolymarketClient {
    async fn resolve(&self, slug: &str) -> Result<InstrumentIdentifiers, MarketError> {
        self.identifiers(slug).await
    }
}

#[async_trait]
impl VenueReader for PolymarketClient {
    fn venue(&self) -> Venue {
        Venue::Polymarket
    }

    async fn read(&self, slug: &str) -> Result<PriceSnapshot, MarketError> {
        let ids = self.identifiers(slug).await?;

        let start = Instant::now();
        let (up, down) = tokio::join!(
            self.get_best_ask(&ids.up_token_id),
            self.get_best_ask(&ids.down_token_id),
        );
        metrics::record_venue_read_latency(start, Venue::Polymarket);

        Ok(PriceSnapshot {
            up_ask: up?,
            down_ask: down?,
            captured_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: &str, size: &str) -> OrderLevel {
        OrderLevel {
            price: price.to_string(),
            size: size.to_string(),
        }
    }

    #[test]
    fn kalshi_ask_normalizes_cents() {
        assert_eq!(kalshi_ask(Some(40), "T").unwrap(), dec!(0.40));
        assert_eq!(kalshi_ask(Some(99), "T").unwrap(), dec!(0.99));
    }

    #[test]
    fn kalshi_ask_without_liquidity_is_error() {
        assert!(kalshi_ask(Some(0), "T").is_err());
        assert!(kalshi_ask(Some(100), "T").is_err());
        assert!(kalshi_ask(None, "T").is_err());
    }

    #[test]
    fn best_ask_picks_lowest_positive_size() {
        let levels = vec![
            level("0.99", "100"),
            level("0.47", "0"),
            level("0.48", "12"),
            level("garbage", "5"),
        ];
        assert_eq!(best_ask(&levels), Some(dec!(0.48)));
        assert_eq!(best_ask(&[]), None);
    }

    #[test]
    fn order_book_response_parses() {
        let json = r#"{"asset_id":"1","bids":[{"price":"0.40","size":"5"}],"asks":[{"price":"0.52","size":"10"},{"price":"0.51","size":"3"}]}"#;
        let book: OrderBookResponse = serde_json::from_str(json).unwrap();
        assert_eq!(best_ask(book.asks.as_deref().unwrap()), Some(dec!(0.51)));
    }
}
