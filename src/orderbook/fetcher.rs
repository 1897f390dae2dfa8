//! Concurrent two-venue price fetch.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use super::types::{DualSnapshot, PriceSnapshot, VenueRead};
use crate::error::MarketError;
use crate::market::{MarketSlotKey, VenueReader};
use crate::metrics;

/// Reads both venues for one slot and merges the results.
///
/// A failing venue never fails the fetch; it shows up as [`VenueRead::Absent`].
#[derive(Clone)]
pub struct DualPriceFetcher {
    venue_a: Arc<dyn VenueReader>,
    venue_b: Arc<dyn VenueReader>,
    slug_prefix: String,
}

impl DualPriceFetcher {
    /// Create a fetcher over venue A (ticker-keyed) and venue B (slug-keyed).
    pub fn new(
        venue_a: Arc<dyn VenueReader>,
        venue_b: Arc<dyn VenueReader>,
        slug_prefix: impl Into<String>,
    ) -> Self {
        Self {
            venue_a,
            venue_b,
            slug_prefix: slug_prefix.into(),
        }
    }

    /// Issue both reads concurrently; total latency is the slower of the two.
    pub async fn fetch(&self, ticker: &str, slot: &MarketSlotKey) -> DualSnapshot {
        let slug = slot.polymarket_slug(&self.slug_prefix);

        let (a, b) = tokio::join!(self.venue_a.read(ticker), self.venue_b.read(&slug));

        let venue_a = settle(self.venue_a.as_ref(), ticker, a);
        let venue_b = settle(self.venue_b.as_ref(), &slug, b);

        debug!(
            ticker = %ticker,
            slot = %slot,
            a_quoted = venue_a.is_quoted(),
            b_quoted = venue_b.is_quoted(),
            "Fetched dual snapshot"
        );

        DualSnapshot {
            ticker: ticker.to_string(),
            slot: slot.clone(),
            slug,
            venue_a,
            venue_b,
            fetched_at: Utc::now(),
        }
    }
}

fn settle(
    reader: &dyn VenueReader,
    key: &str,
    result: Result<PriceSnapshot, MarketError>,
) -> VenueRead {
    match result {
        Ok(snapshot) => VenueRead::Quoted(snapshot),
        Err(e) => {
            let venue = reader.venue();
            warn!(venue = %venue, key = %key, error = %e, "Venue read failed");
            metrics::inc_venue_read_failures(venue);
            VenueRead::absent(e.to_string())
        }
    }
}

impl std::fmt::Debug for DualPriceFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualPriceFetcher")
            .field("venue_a", &self.venue_a.venue())
            .field("venue_b", &self.venue_b.venue())
            .field("slug_prefix", &self.slug_prefix)
            .finish()
    }
}
