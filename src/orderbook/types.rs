//! Price snapshot types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::market::{MarketSlotKey, Outcome};

/// Best asks for both outcomes on one venue, as probabilities in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceSnapshot {
    /// Best ask for the up outcome.
    pub up_ask: Decimal,
    /// Best ask for the down outcome.
    pub down_ask: Decimal,
    /// When the venue answered.
    pub captured_at: DateTime<Utc>,
}

impl PriceSnapshot {
    /// Ask for the given outcome.
    pub fn ask(&self, outcome: Outcome) -> Decimal {
        match outcome {
            Outcome::Up => self.up_ask,
            Outcome::Down => self.down_ask,
        }
    }
}

/// One venue's contribution to a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VenueRead {
    /// The venue returned usable prices.
    Quoted(PriceSnapshot),
    /// The venue had no usable prices this tick.
    Absent {
        /// Why the read produced nothing.
        reason: String,
    },
}

impl VenueRead {
    /// Absent read with a reason.
    pub fn absent(reason: impl Into<String>) -> Self {
        Self::Absent {
            reason: reason.into(),
        }
    }

    /// The snapshot if quoted.
    pub fn quote(&self) -> Option<&PriceSnapshot> {
        match self {
            Self::Quoted(snapshot) => Some(snapshot),
            Self::Absent { .. } => None,
        }
    }

    /// Whether the read produced prices.
    pub fn is_quoted(&self) -> bool {
        matches!(self, Self::Quoted(_))
    }
}

/// Combined result of one fetch across both venues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DualSnapshot {
    /// Venue A (Kalshi) market ticker.
    pub ticker: String,
    /// Slot the fetch was made for.
    pub slot: MarketSlotKey,
    /// Venue B (Polymarket) event slug derived from the slot.
    pub slug: String,
    /// Venue A result.
    pub venue_a: VenueRead,
    /// Venue B result.
    pub venue_b: VenueRead,
    /// When both reads had completed.
    pub fetched_at: DateTime<Utc>,
}

impl DualSnapshot {
    /// Both quotes, if both venues produced one.
    pub fn both(&self) -> Option<(&PriceSnapshot, &PriceSnapshot)> {
        Some((self.venue_a.quote()?, self.venue_b.quote()?))
    }

    /// Whether both venues produced quotes.
    pub fn is_complete(&self) -> bool {
        self.both().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(up: Decimal, down: Decimal) -> VenueRead {
        VenueRead::Quoted(PriceSnapshot {
            up_ask: up,
            down_ask: down,
            captured_at: Utc::now(),
        })
    }

    #[test]
    fn ask_by_outcome() {
        let snap = PriceSnapshot {
            up_ask: dec!(0.40),
            down_ask: dec!(0.62),
            captured_at: Utc::now(),
        };
        assert_eq!(snap.ask(Outcome::Up), dec!(0.40));
        assert_eq!(snap.ask(Outcome::Down), dec!(0.62));
    }

    #[test]
    fn dual_snapshot_completeness() {
        let slot = MarketSlotKey::from_time(Utc::now());
        let mut dual = DualSnapshot {
            ticker: "T".to_string(),
            slug: "btc-updown-15m-0".to_string(),
            slot,
            venue_a: quote(dec!(0.40), dec!(0.61)),
            venue_b: quote(dec!(0.58), dec!(0.43)),
            fetched_at: Utc::now(),
        };
        assert!(dual.is_complete());

        dual.venue_b = VenueRead::absent("timeout");
        assert!(!dual.is_complete());
        assert!(dual.both().is_none());
    }

    #[test]
    fn absent_serializes_with_reason() {
        let json = serde_json::to_value(VenueRead::absent("no liquidity")).unwrap();
        assert_eq!(json["status"], "absent");
        assert_eq!(json["reason"], "no liquidity");
    }
}
