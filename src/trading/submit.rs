//! Order submission interfaces for both venues.
//!
//! Authentication and signing live behind these traits; the engine only
//! needs "submit this priced order and tell me the exchange ID or why not".

use async_trait::async_trait;
use tracing::debug;

use super::order::{KalshiOrder, OrderAck, PolymarketOrder};
use crate::error::TradingError;
use crate::market::Venue;

/// Submits Kalshi buy orders.
#[async_trait]
pub trait KalshiOrderSubmitter: Send + Sync {
    /// Submit one limit order; the price is already clamped to the valid range.
    async fn submit_order(&self, order: &KalshiOrder) -> Result<OrderAck, TradingError>;
}

/// Submits Polymarket buy orders.
#[async_trait]
pub trait PolymarketOrderSubmitter: Send + Sync {
    /// Submit one limit order; the caller has checked minimum notional.
    async fn submit_order(&self, order: &PolymarketOrder) -> Result<OrderAck, TradingError>;
}

/// Submitter used when no venue credentials are wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredSubmitter;

#[async_trait]
impl KalshiOrderSubmitter for UnconfiguredSubmitter {
    async fn submit_order(&self, order: &KalshiOrder) -> Result<OrderAck, TradingError> {
        debug!(ticker = %order.ticker, "Kalshi submitter not configured");
        Err(TradingError::NotConfigured(Venue::Kalshi))
    }
}

#[async_trait]
impl PolymarketOrderSubmitter for UnconfiguredSubmitter {
    async fn submit_order(&self, order: &PolymarketOrder) -> Result<OrderAck, TradingError> {
        debug!(token_id = %order.token_id, "Polymarket submitter not configured");
        Err(TradingError::NotConfigured(Venue::Polymarket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::order::{KalshiSide, TimeInForce};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn unconfigured_submitter_reports_venue() {
        let submitter = UnconfiguredSubmitter;

        let kalshi = KalshiOrder {
            ticker: "KXBTC15M-T".to_string(),
            side: KalshiSide::Yes,
            count: 1,
            limit_cents: 41,
            client_order_id: "id".to_string(),
        };
        let err = KalshiOrderSubmitter::submit_order(&submitter, &kalshi)
            .await
            .unwrap_err();
        assert!(matches!(err, TradingError::NotConfigured(Venue::Kalshi)));

        let poly = PolymarketOrder {
            token_id: "token".to_string(),
            price: dec!(0.49),
            size: dec!(5),
            time_in_force: TimeInForce::FOK,
        };
        let err = PolymarketOrderSubmitter::submit_order(&submitter, &poly)
            .await
            .unwrap_err();
        assert!(matches!(err, TradingError::NotConfigured(Venue::Polymarket)));
    }
}
