//! 15-minute market slots and rollover decisions.

use std::fmt;

use chrono::{DateTime, Duration, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::config::RolloverMode;

/// Slot length in seconds.
pub const SLOT_SECONDS: i64 = 900;

static SLUG_TS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\d+)$").expect("valid regex"));

/// Source of wall-clock time for slot computation.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall-clock time truncated to a 15-minute boundary.
///
/// Formats as `YYYY-MM-DD_HH-MM` with minute in {00,15,30,45}. Names both the
/// log bucket and the market instance trading during that window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketSlotKey {
    start: DateTime<Utc>,
    key: String,
}

impl MarketSlotKey {
    /// Slot containing `time`.
    pub fn from_time(time: DateTime<Utc>) -> Self {
        let excess = time.timestamp().rem_euclid(SLOT_SECONDS);
        let start = time - Duration::seconds(excess);
        let start = start.with_nanosecond(0).unwrap_or(start);
        let key = start.format("%Y-%m-%d_%H-%M").to_string();
        Self { start, key }
    }

    /// Slot containing the clock's current time.
    pub fn current(clock: &dyn Clock) -> Self {
        Self::from_time(clock.now())
    }

    /// Key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Slot start.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Slot end (exclusive).
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::seconds(SLOT_SECONDS)
    }

    /// The following slot.
    pub fn next(&self) -> Self {
        Self::from_time(self.end())
    }

    /// Polymarket event slug for this slot, e.g. `btc-updown-15m-1735733700`.
    pub fn polymarket_slug(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.start.timestamp())
    }

    /// Time left in the slot at `now`, zero once it has ended.
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.end() - now).to_std().unwrap_or_default()
    }
}

impl fmt::Display for MarketSlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl Serialize for MarketSlotKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key)
    }
}

/// Extract the unix start timestamp from a `<prefix>-<ts>` slug.
pub fn slug_start_timestamp(slug: &str) -> Option<i64> {
    SLUG_TS
        .captures(slug)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// A slot boundary crossed between two ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChange {
    /// Previously observed slot.
    pub from: MarketSlotKey,
    /// Slot observed now.
    pub to: MarketSlotKey,
}

/// How a tick should react to the slot it observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotTransition {
    /// First observation; nothing to roll over.
    Initial,
    /// Same slot as the previous tick.
    Unchanged,
    /// Slot changed but the ticker is fixed; keep polling it.
    Pinned(SlotChange),
    /// Re-resolve the ticker and continue in this process.
    Refresh(SlotChange),
    /// Hand off to a replacement process before fetching.
    Handoff(SlotChange),
}

/// Decide what a slot observation means. Pure; the caller acts on it.
pub fn classify_transition(
    previous: Option<&MarketSlotKey>,
    current: &MarketSlotKey,
    auto_resolve: bool,
    mode: RolloverMode,
) -> SlotTransition {
    let Some(previous) = previous else {
        return SlotTransition::Initial;
    };

    if previous == current {
        return SlotTransition::Unchanged;
    }

    let change = SlotChange {
        from: previous.clone(),
        to: current.clone(),
    };

    if !auto_resolve {
        return SlotTransition::Pinned(change);
    }

    match mode {
        RolloverMode::RefreshInPlace => SlotTransition::Refresh(change),
        RolloverMode::RestartProcess => SlotTransition::Handoff(change),
    }
}
