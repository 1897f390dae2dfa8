//! Unified error types for the arbitrage engine.

use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::market::Venue;

/// Unified error type for the arbitrage engine.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Market discovery, identifier resolution and price read errors.
#[derive(Error, Debug)]
pub enum MarketError {
    /// No open market could be found for the series.
    #[error("no open market found for series {series}")]
    NoOpenMarket {
        /// Series that was searched.
        series: String,
    },

    /// Failed to fetch market information.
    #[error("failed to fetch market {key}: {reason}")]
    FetchFailed {
        /// Ticker, slug or token that failed.
        key: String,
        /// Reason for failure.
        reason: String,
    },

    /// The book has no usable ask for an outcome.
    #[error("no liquidity on {venue} for {key}")]
    NoLiquidity {
        /// Venue that returned an empty side.
        venue: Venue,
        /// Instrument key.
        key: String,
    },

    /// Failed to parse market data.
    #[error("failed to parse market data: {0}")]
    ParseError(String),

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Order construction and submission errors.
#[derive(Error, Debug)]
pub enum TradingError {
    /// No submitter is wired for the venue.
    #[error("order submission not configured for {0}")]
    NotConfigured(Venue),

    /// The order could not be built or sent.
    #[error("order submission failed: {0}")]
    SubmissionFailed(String),

    /// Order rejected by the exchange.
    #[error("order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason from the exchange.
        reason: String,
    },

    /// Order value below the venue minimum.
    #[error("order notional {notional} below minimum {minimum}")]
    BelowMinimumNotional {
        /// price * size of the attempted order.
        notional: Decimal,
        /// Venue minimum.
        minimum: Decimal,
    },
}

/// Exclusivity lock and process replacement errors.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Another process holds the lock.
    #[error("lock {path} already held (pid {holder})")]
    AlreadyHeld {
        /// Lock file path.
        path: PathBuf,
        /// Holder pid as recorded in the file, or "unknown".
        holder: String,
    },

    /// Lock file could not be created or removed.
    #[error("lock {path}: {source}")]
    LockIo {
        /// Lock file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Could not capture the current invocation.
    #[error("failed to capture invocation: {0}")]
    Invocation(#[source] std::io::Error),

    /// Replacement process failed to start.
    #[error("failed to spawn replacement process: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, BotError>;
