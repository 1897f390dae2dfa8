//! Kalshi/Polymarket 15-minute cross-venue arbitrage engine.
//!
//! Both venues list a binary "BTC up or down" market for every 15-minute
//! slot. Buying the up outcome on one venue and the down outcome on the other
//! pays exactly $1.00 at settlement, whichever way the price moves:
//!
//! ```text
//! leg 1: Kalshi UP  + Polymarket DOWN
//! leg 2: Kalshi DOWN + Polymarket UP
//!
//! Kalshi UP ask:       $0.40
//! Polymarket DOWN ask: $0.48
//! ──────────────────────────
//! Leg 1 sum:           $0.88  in [0.75, 0.92) -> buy both, once
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`market`]: Venue clients, slot keys and identifier resolution
//! - [`orderbook`]: Price snapshots and the dual-venue fetcher
//! - [`scheduler`]: Self-pacing poll loop with rollover detection
//! - [`arbitrage`]: Leg detection and at-most-once execution
//! - [`trading`]: Order types and submission traits
//! - [`pipeline`]: Snapshot handler tying it together
//! - [`lifecycle`]: Single-instance lock and process handoff
//! - [`logsink`]: Append-only per-slot text log
//! - [`api`]: HTTP API for health/status/metrics
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod arbitrage;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logsink;
pub mod market;
pub mod metrics;
pub mod orderbook;
pub mod pipeline;
pub mod scheduler;
pub mod trading;
pub mod utils;

pub use config::Config;
pub use error::{BotError, Result};
