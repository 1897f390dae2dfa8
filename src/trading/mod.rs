//! Trading module: order types and venue submission interfaces.
//!
//! This module handles:
//! - Order types and limit price construction for both venues
//! - Submission traits implemented by the venue order collaborators

pub mod order;
pub mod submit;

pub use order::{
    kalshi_limit_cents, polymarket_limit_price, KalshiOrder, KalshiSide, OrderAck,
    PolymarketOrder, TimeInForce,
};
pub use submit::{KalshiOrderSubmitter, PolymarketOrderSubmitter, UnconfiguredSubmitter};
