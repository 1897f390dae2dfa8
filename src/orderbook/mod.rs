//! Price snapshot module for cross-venue market data.
//!
//! This module handles:
//! - Per-venue price snapshots and absent reads
//! - The combined two-venue snapshot
//! - Concurrent fetching of both venues

pub mod fetcher;
pub mod types;

pub use fetcher::DualPriceFetcher;
pub use types::{DualSnapshot, PriceSnapshot, VenueRead};
