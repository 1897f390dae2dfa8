//! Market-related types shared by both venues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Outcome of a 15-minute up/down market.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Price finishes up (Kalshi YES).
    #[strum(serialize = "up", serialize = "yes", serialize = "UP", serialize = "YES")]
    #[default]
    Up,
    /// Price finishes down (Kalshi NO).
    #[strum(serialize = "down", serialize = "no", serialize = "DOWN", serialize = "NO")]
    Down,
}

impl Outcome {
    /// Get the opposite outcome.
    pub fn opposite(&self) -> Self {
        match self {
            Outcome::Up => Outcome::Down,
            Outcome::Down => Outcome::Up,
        }
    }
}

/// Price venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    /// Venue A: ticker-addressed, integer cents.
    #[strum(serialize = "kalshi")]
    Kalshi,
    /// Venue B: token-addressed, fractional prices.
    #[strum(serialize = "polymarket")]
    Polymarket,
}

/// Polymarket token IDs for one slot. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentIdentifiers {
    /// Lookup key (event slug) these were resolved from.
    pub slug: String,
    /// UP token ID for CLOB.
    pub up_token_id: String,
    /// DOWN token ID for CLOB.
    pub down_token_id: String,
}

impl InstrumentIdentifiers {
    /// Get the token ID for a given outcome.
    pub fn token_id(&self, outcome: Outcome) -> &str {
        match outcome {
            Outcome::Up => &self.up_token_id,
            Outcome::Down => &self.down_token_id,
        }
    }
}

/// Market entry from the Kalshi markets endpoints.
///
/// Prices are integer cents; Kalshi reports 0 on a side with no asks.
#[derive(Debug, Clone, Deserialize)]
pub struct KalshiMarket {
    /// Market ticker.
    pub ticker: String,
    /// Market status (open, active, closed, settled).
    #[serde(default)]
    pub status: Option<String>,
    /// Best YES ask in cents.
    #[serde(default)]
    pub yes_ask: Option<i64>,
    /// Best NO ask in cents.
    #[serde(default)]
    pub no_ask: Option<i64>,
    /// Trading opens.
    #[serde(default)]
    pub open_time: Option<DateTime<Utc>>,
    /// Trading closes.
    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,
}

impl KalshiMarket {
    /// Whether the market accepts orders at `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        let status_open = matches!(self.status.as_deref(), None | Some("open") | Some("active"));
        let started = self.open_time.map(|t| t <= now).unwrap_or(true);
        let not_closed = self.close_time.map(|t| now < t).unwrap_or(true);
        status_open && started && not_closed
    }
}

/// `GET /markets` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct KalshiMarketsResponse {
    /// Markets in the page.
    #[serde(default)]
    pub markets: Vec<KalshiMarket>,
}

/// `GET /markets/{ticker}` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct KalshiMarketResponse {
    /// The market.
    pub market: KalshiMarket,
}

/// Market info from the Gamma API.
#[derive(Debug, Clone, Deserialize)]
pub struct GammaMarket {
    /// Market slug.
    pub slug: Option<String>,
    /// Whether market is closed.
    pub closed: Option<bool>,
    /// Outcome labels. Gamma sends a JSON-encoded string array.
    pub outcomes: Option<serde_json::Value>,
    /// CLOB token IDs, same encoding and order as `outcomes`.
    #[serde(rename = "clobTokenIds")]
    pub clob_token_ids: Option<serde_json::Value>,
}
