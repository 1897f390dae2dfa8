//! Leg sums and limit prices for cross-venue opportunities.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::market::Outcome;
use crate::orderbook::PriceSnapshot;
use crate::trading::{kalshi_limit_cents, polymarket_limit_price};

/// One of the two complementary cross-venue directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    /// Kalshi up (YES) + Polymarket down.
    One,
    /// Kalshi down (NO) + Polymarket up.
    Two,
}

impl Leg {
    /// Outcome bought on Kalshi.
    pub fn kalshi_outcome(self) -> Outcome {
        match self {
            Leg::One => Outcome::Up,
            Leg::Two => Outcome::Down,
        }
    }

    /// Outcome bought on Polymarket.
    pub fn polymarket_outcome(self) -> Outcome {
        self.kalshi_outcome().opposite()
    }

    /// Short label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Leg::One => "leg1",
            Leg::Two => "leg2",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sum of the two asks bought by `leg`.
pub fn leg_sum(kalshi: &PriceSnapshot, polymarket: &PriceSnapshot, leg: Leg) -> Decimal {
    kalshi.ask(leg.kalshi_outcome()) + polymarket.ask(leg.polymarket_outcome())
}

/// A qualifying leg with the limit prices to submit. Derived per tick, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArbOpportunity {
    /// Direction.
    pub leg: Leg,
    /// Sum of the two observed asks.
    pub sum: Decimal,
    /// Observed Kalshi ask.
    pub kalshi_ask: Decimal,
    /// Observed Polymarket ask.
    pub polymarket_ask: Decimal,
    /// Kalshi limit in cents.
    pub kalshi_limit_cents: u8,
    /// Polymarket limit on the 0.01 tick.
    pub polymarket_limit: Decimal,
}

impl ArbOpportunity {
    /// Build the opportunity for `leg`, pricing each venue at its ask plus `buffer`.
    pub fn new(
        leg: Leg,
        kalshi: &PriceSnapshot,
        polymarket: &PriceSnapshot,
        buffer: Decimal,
    ) -> Self {
        let kalshi_ask = kalshi.ask(leg.kalshi_outcome());
        let polymarket_ask = polymarket.ask(leg.polymarket_outcome());
        Self {
            leg,
            sum: kalshi_ask + polymarket_ask,
            kalshi_ask,
            polymarket_ask,
            kalshi_limit_cents: kalshi_limit_cents(kalshi_ask, buffer),
            polymarket_limit: polymarket_limit_price(polymarket_ask, buffer),
        }
    }

    /// Gross edge per pair at the observed asks (payout is 1.00).
    pub fn edge(&self) -> Decimal {
        Decimal::ONE - self.sum
    }

    /// Worst-case cost per pair at the submitted limits.
    pub fn limit_cost(&self) -> Decimal {
        Decimal::new(i64::from(self.kalshi_limit_cents), 2) + self.polymarket_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn snap(up: Decimal, down: Decimal) -> PriceSnapshot {
        PriceSnapshot {
            up_ask: up,
            down_ask: down,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn legs_pair_opposite_outcomes() {
        assert_eq!(Leg::One.kalshi_outcome(), Outcome::Up);
        assert_eq!(Leg::One.polymarket_outcome(), Outcome::Down);
        assert_eq!(Leg::Two.kalshi_outcome(), Outcome::Down);
        assert_eq!(Leg::Two.polymarket_outcome(), Outcome::Up);
    }

    #[test]
    fn leg_sums_cross_venues() {
        let kalshi = snap(dec!(0.40), dec!(0.55));
        let poly = snap(dec!(0.38), dec!(0.48));

        assert_eq!(leg_sum(&kalshi, &poly, Leg::One), dec!(0.88));
        assert_eq!(leg_sum(&kalshi, &poly, Leg::Two), dec!(0.93));
    }

    #[test]
    fn opportunity_limits_include_buffer() {
        let kalshi = snap(dec!(0.40), dec!(0.55));
        let poly = snap(dec!(0.38), dec!(0.48));

        let opp = ArbOpportunity::new(Leg::One, &kalshi, &poly, dec!(0.01));

        assert_eq!(opp.sum, dec!(0.88));
        assert_eq!(opp.kalshi_limit_cents, 41);
        assert_eq!(opp.polymarket_limit, dec!(0.49));
        assert_eq!(opp.edge(), dec!(0.12));
        assert_eq!(opp.limit_cost(), dec!(0.90));
    }

    #[test]
    fn opportunity_limits_are_capped() {
        let kalshi = snap(dec!(0.99), dec!(0.01));
        let poly = snap(dec!(0.01), dec!(0.99));

        let opp = ArbOpportunity::new(Leg::One, &kalshi, &poly, dec!(0.05));

        assert_eq!(opp.kalshi_limit_cents, 99);
        assert_eq!(opp.polymarket_limit, dec!(0.99));
    }
}
