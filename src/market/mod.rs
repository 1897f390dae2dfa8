//! Market module for recurring 15-minute up/down markets.
//!
//! This module handles:
//! - Shared market types and the two venues
//! - 15-minute slot keys and rollover decisions
//! - Instrument discovery (Kalshi ticker, Polymarket token IDs)
//! - The single-entry identifier cache
//! - Venue price readers
//! - Mock collaborators for testing

pub mod cache;
pub mod client;
pub mod discovery;
pub mod mock;
pub mod slot;
pub mod types;

pub use cache::IdentifierCache;
pub use client::{build_http_client, GammaResolver, KalshiClient, PolymarketClient, VenueReader};
pub use discovery::{IdentifierResolver, TickerResolver};
pub use slot::{classify_transition, Clock, MarketSlotKey, SlotChange, SlotTransition, SystemClock};
pub use types::{InstrumentIdentifiers, Outcome, Venue};
