//! Order types for both venues and limit price construction.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::market::Outcome;

/// Lowest Kalshi limit price in cents.
pub const KALSHI_MIN_CENTS: u8 = 1;
/// Highest Kalshi limit price in cents.
pub const KALSHI_MAX_CENTS: u8 = 99;

/// Polymarket price tick.
pub const POLY_TICK: Decimal = dec!(0.01);
/// Highest Polymarket limit price.
pub const POLY_MAX_PRICE: Decimal = dec!(0.99);

/// Order time-in-force.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Fill-or-kill: must fill entirely or cancel.
    #[default]
    #[strum(serialize = "FOK", serialize = "fok")]
    FOK,
    /// Fill-and-kill: fill what's available, cancel rest.
    #[strum(serialize = "FAK", serialize = "fak")]
    FAK,
    /// Good-till-cancelled: stays on book until filled or cancelled.
    #[strum(serialize = "GTC", serialize = "gtc")]
    GTC,
}

/// Kalshi contract side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum KalshiSide {
    /// YES contract (pays if up).
    #[strum(serialize = "yes")]
    Yes,
    /// NO contract (pays if down).
    #[strum(serialize = "no")]
    No,
}

impl From<Outcome> for KalshiSide {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Up => KalshiSide::Yes,
            Outcome::Down => KalshiSide::No,
        }
    }
}

/// Buy order for one side of a Kalshi market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KalshiOrder {
    /// Market ticker.
    pub ticker: String,
    /// Contract side.
    pub side: KalshiSide,
    /// Number of contracts.
    pub count: u32,
    /// Limit price in cents, already clamped to 1..=99.
    pub limit_cents: u8,
    /// Idempotency key.
    pub client_order_id: String,
}

/// Buy order for one Polymarket outcome token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolymarketOrder {
    /// CLOB token ID.
    pub token_id: String,
    /// Limit price on the 0.01 tick.
    pub price: Decimal,
    /// Shares.
    pub size: Decimal,
    /// Time in force.
    pub time_in_force: TimeInForce,
}

impl PolymarketOrder {
    /// Order value in dollars.
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// Exchange acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrderAck {
    /// Exchange order ID.
    #[serde(alias = "orderID", alias = "orderId", alias = "id")]
    pub order_id: String,
}

/// Kalshi limit in cents: `ask + buffer`, rounded to a whole cent, clamped to 1..=99.
pub fn kalshi_limit_cents(ask: Decimal, buffer: Decimal) -> u8 {
    let cents = ((ask + buffer) * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let lo = Decimal::from(KALSHI_MIN_CENTS);
    let hi = Decimal::from(KALSHI_MAX_CENTS);
    cents.max(lo).min(hi).to_u8().unwrap_or(KALSHI_MAX_CENTS)
}

/// Polymarket limit: `ask + buffer` on the 0.01 tick, clamped to 0.01..=0.99.
pub fn polymarket_limit_price(ask: Decimal, buffer: Decimal) -> Decimal {
    (ask + buffer)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .max(POLY_TICK)
        .min(POLY_MAX_PRICE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kalshi_limit_adds_buffer_in_cents() {
        assert_eq!(kalshi_limit_cents(dec!(0.40), dec!(0.01)), 41);
        assert_eq!(kalshi_limit_cents(dec!(0.555), dec!(0)), 56);
    }

    #[test]
    fn kalshi_limit_is_capped() {
        assert_eq!(kalshi_limit_cents(dec!(0.99), dec!(0.05)), 99);
        assert_eq!(kalshi_limit_cents(dec!(0), dec!(0)), 1);
    }

    #[test]
    fn polymarket_limit_rounds_to_tick_and_caps() {
        assert_eq!(polymarket_limit_price(dec!(0.48), dec!(0.01)), dec!(0.49));
        assert_eq!(polymarket_limit_price(dec!(0.483), dec!(0.01)), dec!(0.49));
        assert_eq!(polymarket_limit_price(dec!(0.985), dec!(0.02)), dec!(0.99));
    }

    #[test]
    fn outcome_maps_to_kalshi_side() {
        assert_eq!(KalshiSide::from(Outcome::Up), KalshiSide::Yes);
        assert_eq!(KalshiSide::from(Outcome::Down), KalshiSide::No);
    }

    #[test]
    fn order_ack_accepts_aliases() {
        let ack: OrderAck = serde_json::from_str(r#"{"orderID":"abc"}"#).unwrap();
        assert_eq!(ack.order_id, "abc");
    }
}
