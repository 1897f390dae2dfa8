//! Mock venue collaborators for unit and integration testing.
//!
//! Nothing here touches the network. Each mock counts its calls and can be
//! scripted to fail or to add latency.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::client::VenueReader;
use super::discovery::{IdentifierResolver, TickerResolver};
use super::slot::Clock;
use super::types::{InstrumentIdentifiers, Venue};
use crate::error::{MarketError, TradingError};
use crate::orderbook::PriceSnapshot;
use crate::trading::{
    KalshiOrder, KalshiOrderSubmitter, OrderAck, PolymarketOrder, PolymarketOrderSubmitter,
};

/// Scripted venue reader.
#[derive(Debug)]
pub struct MockVenueReader {
    venue: Venue,
    quote: Mutex<Option<(Decimal, Decimal)>>,
    fail: AtomicBool,
    latency_ms: AtomicU64,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    keys: Mutex<Vec<String>>,
}

impl MockVenueReader {
    /// Reader that fails until a quote is set.
    pub fn new(venue: Venue) -> Self {
        Self {
            venue,
            quote: Mutex::new(None),
            fail: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            keys: Mutex::new(Vec::new()),
        }
    }

    /// Reader returning the given up/down asks.
    pub fn quoting(venue: Venue, up: Decimal, down: Decimal) -> Self {
        let reader = Self::new(venue);
        reader.set_quote(up, down);
        reader
    }

    /// Set the asks returned by subsequent reads.
    pub fn set_quote(&self, up: Decimal, down: Decimal) {
        *self.quote.lock().unwrap() = Some((up, down));
    }

    /// Make subsequent reads fail with a transport-style error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Delay each read by `ms` milliseconds (tokio time).
    pub fn set_latency_ms(&self, ms: u64) {
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Number of reads issued.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of reads observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Keys passed to each read, in order.
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl VenueReader for MockVenueReader {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn read(&self, key: &str) -> Result<PriceSnapshot, MarketError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(key.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(latency)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(MarketError::FetchFailed {
                key: key.to_string(),
                reason: "Mock read failure".to_string(),
            });
        }

        let quote = *self.quote.lock().unwrap();
        match quote {
            Some((up, down)) => Ok(PriceSnapshot {
                up_ask: up,
                down_ask: down,
                captured_at: Utc::now(),
            }),
            None => Err(MarketError::NoLiquidity {
                venue: self.venue,
                key: key.to_string(),
            }),
        }
    }
}

/// Resolver deriving token IDs from the slug itself.
#[derive(Debug, Default)]
pub struct MockIdentifierResolver {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl MockIdentifierResolver {
    /// Create a succeeding resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent resolutions fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of resolutions issued.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentifierResolver for MockIdentifierResolver {
    async fn resolve(&self, slug: &str) -> Result<InstrumentIdentifiers, MarketError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MarketError::FetchFailed {
                key: slug.to_string(),
                reason: "Mock resolution failure".to_string(),
            });
        }
        Ok(InstrumentIdentifiers {
            slug: slug.to_string(),
            up_token_id: format!("{}-up", slug),
            down_token_id: format!("{}-down", slug),
        })
    }
}

/// Ticker resolver returning a scripted sequence of tickers.
#[derive(Debug, Default)]
pub struct MockTickerResolver {
    tickers: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl MockTickerResolver {
    /// Resolver that answers with `tickers` in order, then fails.
    pub fn new<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tickers: Mutex::new(tickers.into_iter().map(|t| Ok(t.into())).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a failing answer.
    pub fn push_failure(&self, reason: &str) {
        self.tickers.lock().unwrap().push_back(Err(reason.to_string()));
    }

    /// Queue a ticker.
    pub fn push_ticker(&self, ticker: &str) {
        self.tickers.lock().unwrap().push_back(Ok(ticker.to_string()));
    }

    /// Number of resolutions issued.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TickerResolver for MockTickerResolver {
    async fn resolve_ticker(&self) -> Result<String, MarketError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.tickers.lock().unwrap().pop_front() {
            Some(Ok(ticker)) => Ok(ticker),
            Some(Err(reason)) => Err(MarketError::FetchFailed {
                key: "series".to_string(),
                reason,
            }),
            None => Err(MarketError::NoOpenMarket {
                series: "mock".to_string(),
            }),
        }
    }
}

/// Clock set by hand.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Clock starting at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Submitter recording every order it receives.
#[derive(Debug, Default)]
pub struct RecordingSubmitter {
    kalshi: Mutex<Vec<KalshiOrder>>,
    polymarket: Mutex<Vec<PolymarketOrder>>,
    fail_kalshi: AtomicBool,
    fail_polymarket: AtomicBool,
}

impl RecordingSubmitter {
    /// Submitter accepting every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject Kalshi orders.
    pub fn set_kalshi_failing(&self, fail: bool) {
        self.fail_kalshi.store(fail, Ordering::SeqCst);
    }

    /// Reject Polymarket orders.
    pub fn set_polymarket_failing(&self, fail: bool) {
        self.fail_polymarket.store(fail, Ordering::SeqCst);
    }

    /// Kalshi orders received.
    pub fn kalshi_orders(&self) -> Vec<KalshiOrder> {
        self.kalshi.lock().unwrap().clone()
    }

    /// Polymarket orders received.
    pub fn polymarket_orders(&self) -> Vec<PolymarketOrder> {
        self.polymarket.lock().unwrap().clone()
    }
}

#[async_trait]
impl KalshiOrderSubmitter for RecordingSubmitter {
    async fn submit_order(&self, order: &KalshiOrder) -> Result<OrderAck, TradingError> {
        let mut orders = self.kalshi.lock().unwrap();
        orders.push(order.clone());
        if self.fail_kalshi.load(Ordering::SeqCst) {
            return Err(TradingError::OrderRejected {
                reason: "Mock rejection".to_string(),
            });
        }
        Ok(OrderAck {
            order_id: format!("kalshi-{}", orders.len()),
        })
    }
}

#[async_trait]
impl PolymarketOrderSubmitter for RecordingSubmitter {
    async fn submit_order(&self, order: &PolymarketOrder) -> Result<OrderAck, TradingError> {
        let mut orders = self.polymarket.lock().unwrap();
        orders.push(order.clone());
        if self.fail_polymarket.load(Ordering::SeqCst) {
            return Err(TradingError::OrderRejected {
                reason: "Mock rejection".to_string(),
            });
        }
        Ok(OrderAck {
            order_id: format!("poly-{}", orders.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn mock_reader_returns_quote_and_counts() {
        let reader = MockVenueReader::quoting(Venue::Kalshi, dec!(0.40), dec!(0.55));

        let snap = reader.read("T").await.unwrap();

        assert_eq!(snap.up_ask, dec!(0.40));
        assert_eq!(snap.down_ask, dec!(0.55));
        assert_eq!(reader.calls(), 1);
        assert_eq!(reader.keys(), vec!["T".to_string()]);
    }

    #[tokio::test]
    async fn mock_reader_failure() {
        let reader = MockVenueReader::quoting(Venue::Polymarket, dec!(0.40), dec!(0.55));
        reader.set_failing(true);

        assert!(reader.read("slug").await.is_err());
    }

    #[tokio::test]
    async fn mock_ticker_resolver_sequence() {
        let resolver = MockTickerResolver::new(["A"]);
        resolver.push_failure("down");

        assert_eq!(resolver.resolve_ticker().await.unwrap(), "A");
        assert!(resolver.resolve_ticker().await.is_err());
        assert!(resolver.resolve_ticker().await.is_err());
        assert_eq!(resolver.calls(), 3);
    }
}
