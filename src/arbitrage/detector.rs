//! Arbitrage opportunity detection.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use super::calculator::{leg_sum, ArbOpportunity, Leg};
use crate::orderbook::DualSnapshot;

/// Qualifying band for leg sums: `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArbBand {
    /// Inclusive lower bound.
    pub low: Decimal,
    /// Exclusive upper bound.
    pub high: Decimal,
}

impl ArbBand {
    /// Create a band.
    pub fn new(low: Decimal, high: Decimal) -> Self {
        Self { low, high }
    }

    /// Whether `sum` qualifies.
    pub fn contains(&self, sum: Decimal) -> bool {
        self.low <= sum && sum < self.high
    }
}

/// Both leg sums for one complete snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LegSums {
    /// Kalshi up + Polymarket down.
    pub leg1: Decimal,
    /// Kalshi down + Polymarket up.
    pub leg2: Decimal,
}

impl LegSums {
    /// Sums for a snapshot, `None` unless both venues quoted.
    pub fn from_snapshot(snapshot: &DualSnapshot) -> Option<Self> {
        let (kalshi, polymarket) = snapshot.both()?;
        Some(Self {
            leg1: leg_sum(kalshi, polymarket, Leg::One),
            leg2: leg_sum(kalshi, polymarket, Leg::Two),
        })
    }
}

/// Detection result for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// At least one venue is absent; nothing may be acted upon.
    Incomplete,
    /// Neither leg is in the band.
    NoOpportunity(LegSums),
    /// The leg to act on.
    Opportunity(ArbOpportunity),
}

/// Pick at most one qualifying leg. Leg 1 wins whenever it qualifies.
pub fn detect(snapshot: &DualSnapshot, band: ArbBand, buffer: Decimal) -> Detection {
    let Some((kalshi, polymarket)) = snapshot.both() else {
        return Detection::Incomplete;
    };

    let sums = LegSums {
        leg1: leg_sum(kalshi, polymarket, Leg::One),
        leg2: leg_sum(kalshi, polymarket, Leg::Two),
    };

    for (leg, sum) in [(Leg::One, sums.leg1), (Leg::Two, sums.leg2)] {
        if band.contains(sum) {
            let opportunity = ArbOpportunity::new(leg, kalshi, polymarket, buffer);
            info!(
                ticker = %snapshot.ticker,
                leg = %leg,
                sum = %sum,
                low = %band.low,
                high = %band.high,
                "Arbitrage opportunity detected"
            );
            return Detection::Opportunity(opportunity);
        }
    }

    debug!(leg1 = %sums.leg1, leg2 = %sums.leg2, "No arbitrage opportunity");
    Detection::NoOpportunity(sums)
}
