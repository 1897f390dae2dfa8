//! Instrument discovery for both venues.
//!
//! Polymarket identifiers are resolved from the slot slug via the Gamma API.
//! The Kalshi ticker is the newest open market in the configured series.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use super::slot::slug_start_timestamp;
use super::types::{GammaMarket, InstrumentIdentifiers, KalshiMarket, KalshiMarketsResponse};
use crate::error::MarketError;

/// Resolves a slot lookup key (event slug) into Polymarket token IDs.
#[async_trait]
pub trait IdentifierResolver: Send + Sync {
    /// Resolve `slug`; errors propagate to the caller.
    async fn resolve(&self, slug: &str) -> Result<InstrumentIdentifiers, MarketError>;
}

/// Finds the active Kalshi market ticker.
#[async_trait]
pub trait TickerResolver: Send + Sync {
    /// Ticker of the newest open market.
    async fn resolve_ticker(&self) -> Result<String, MarketError>;
}

/// Fetch Polymarket identifiers for a slug from the Gamma API.
#[instrument(skip(client))]
pub async fn fetch_identifiers_from_slug(
    client: &reqwest::Client,
    gamma_url: &str,
    slug: &str,
) -> Result<InstrumentIdentifiers, MarketError> {
    // Strip query params if present
    let slug = slug.split('?').next().unwrap_or(slug);
    if slug_start_timestamp(slug).is_none() {
        return Err(MarketError::ParseError(format!(
            "slug {} has no slot timestamp",
            slug
        )));
    }
    let url = format!("{}/markets", gamma_url.trim_end_matches('/'));

    let response = client
        .get(&url)
        .query(&[("slug", slug)])
        .header("User-Agent", "Mozilla/5.0")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(MarketError::FetchFailed {
            key: slug.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let markets: Vec<GammaMarket> = response.json().await.map_err(|e| {
        MarketError::ParseError(format!("Failed to parse Gamma API response: {}", e))
    })?;

    let market = markets
        .into_iter()
        .find(|m| m.slug.as_deref() == Some(slug))
        .ok_or_else(|| MarketError::FetchFailed {
            key: slug.to_string(),
            reason: "slug not returned by Gamma API".to_string(),
        })?;

    identifiers_from_gamma(slug, &market)
}

/// Map Gamma's parallel `outcomes` / `clobTokenIds` arrays to up/down tokens.
pub fn identifiers_from_gamma(
    slug: &str,
    market: &GammaMarket,
) -> Result<InstrumentIdentifiers, MarketError> {
    let tokens = market
        .clob_token_ids
        .as_ref()
        .map(string_list)
        .transpose()?
        .ok_or_else(|| MarketError::ParseError("No clobTokenIds".to_string()))?;

    if tokens.len() != 2 {
        return Err(MarketError::ParseError(format!(
            "Expected 2 token IDs, got {}",
            tokens.len()
        )));
    }

    let outcomes = market
        .outcomes
        .as_ref()
        .map(string_list)
        .transpose()?
        .unwrap_or_else(|| vec!["Up".to_string(), "Down".to_string()]);

    if outcomes.len() != tokens.len() {
        return Err(MarketError::ParseError(format!(
            "{} outcomes for {} token IDs",
            outcomes.len(),
            tokens.len()
        )));
    }

    let up_index = outcomes
        .iter()
        .position(|o| o.eq_ignore_ascii_case("up") || o.eq_ignore_ascii_case("yes"))
        .unwrap_or(0);
    let down_index = 1 - up_index.min(1);

    match (tokens.get(up_index), tokens.get(down_index)) {
        (Some(up), Some(down)) => Ok(InstrumentIdentifiers {
            slug: slug.to_string(),
            up_token_id: up.clone(),
            down_token_id: down.clone(),
        }),
        _ => Err(MarketError::ParseError(format!(
            "up outcome index {} out of range",
            up_index
        ))),
    }
}

/// Gamma encodes list fields either as a JSON array or as a string holding one.
fn string_list(value: &serde_json::Value) -> Result<Vec<String>, MarketError> {
    let parsed = match value {
        serde_json::Value::String(s) => serde_json::from_str::<Vec<String>>(s),
        other => serde_json::from_value::<Vec<String>>(other.clone()),
    };
    parsed.map_err(|e| MarketError::ParseError(format!("bad list field: {}", e)))
}

/// Fetch open markets for a Kalshi series and pick the newest open one.
#[instrument(skip(client))]
pub async fn fetch_newest_open_ticker(
    client: &reqwest::Client,
    kalshi_url: &str,
    series: &str,
) -> Result<String, MarketError> {
    let url = format!("{}/markets", kalshi_url.trim_end_matches('/'));

    let response = client
        .get(&url)
        .query(&[("series_ticker", series), ("status", "open")])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(MarketError::FetchFailed {
            key: series.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let body: KalshiMarketsResponse = response.json().await.map_err(|e| {
        MarketError::ParseError(format!("Failed to parse Kalshi markets: {}", e))
    })?;

    debug!(count = body.markets.len(), "Kalshi open markets");

    let ticker = select_newest_open(&body.markets, Utc::now())
        .map(|m| m.ticker.clone())
        .ok_or_else(|| MarketError::NoOpenMarket {
            series: series.to_string(),
        })?;

    info!(ticker = %ticker, "Resolved Kalshi ticker");
    Ok(ticker)
}

/// Newest market (latest open time) that is open at `now`.
pub fn select_newest_open(markets: &[KalshiMarket], now: DateTime<Utc>) -> Option<&KalshiMarket> {
    markets
        .iter()
        .filter(|m| m.is_open_at(now))
        .max_by_key(|m| (m.open_time, m.close_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn kalshi(ticker: &str, open_min: u32, close_min: u32) -> KalshiMarket {
        KalshiMarket {
            ticker: ticker.to_string(),
            status: Some("active".to_string()),
            yes_ask: None,
            no_ask: None,
            open_time: Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, open_min, 0).unwrap()),
            close_time: Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, close_min, 0).unwrap()),
        }
    }

    #[test]
    fn gamma_string_encoded_lists_are_parsed() {
        let market: GammaMarket = serde_json::from_value(json!({
            "slug": "btc-updown-15m-900",
            "closed": false,
            "outcomes": "[\"Up\", \"Down\"]",
            "clobTokenIds": "[\"111\", \"222\"]"
        }))
        .unwrap();

        let ids = identifiers_from_gamma("btc-updown-15m-900", &market).unwrap();
        assert_eq!(ids.up_token_id, "111");
        assert_eq!(ids.down_token_id, "222");
    }

    #[test]
    fn gamma_outcome_order_is_respected() {
        let market: GammaMarket = serde_json::from_value(json!({
            "slug": "s-1",
            "outcomes": ["Down", "Up"],
            "clobTokenIds": ["111", "222"]
        }))
        .unwrap();

        let ids = identifiers_from_gamma("s-1", &market).unwrap();
        assert_eq!(ids.up_token_id, "222");
        assert_eq!(ids.down_token_id, "111");
    }

    #[test]
    fn gamma_wrong_token_count_is_error() {
        let market: GammaMarket = serde_json::from_value(json!({
            "slug": "s-1",
            "clobTokenIds": ["111"]
        }))
        .unwrap();

        assert!(identifiers_from_gamma("s-1", &market).is_err());
    }

    #[test]
    fn gamma_outcome_count_mismatch_is_error() {
        let market: GammaMarket = serde_json::from_value(json!({
            "slug": "s-1",
            "outcomes": ["Down", "Other", "Up"],
            "clobTokenIds": ["111", "222"]
        }))
        .unwrap();

        let err = identifiers_from_gamma("s-1", &market).unwrap_err();
        assert!(matches!(err, MarketError::ParseError(_)));
    }

    #[test]
    fn newest_open_market_wins() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 20, 0).unwrap();
        let markets = vec![
            kalshi("OLD", 0, 15),
            kalshi("CURRENT", 15, 30),
            kalshi("FUTURE", 30, 45),
        ];

        assert_eq!(select_newest_open(&markets, now).unwrap().ticker, "CURRENT");
    }

    #[test]
    fn no_open_market_is_none() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 50, 0).unwrap();
        let markets = vec![kalshi("OLD", 0, 15)];

        assert!(select_newest_open(&markets, now).is_none());
    }

    #[tokio::test]
    async fn slug_without_timestamp_is_rejected_before_request() {
        let client = reqwest::Client::new();
        let err = fetch_identifiers_from_slug(&client, "http://127.0.0.1:9", "btc-updown-15m")
            .await
            .unwrap_err();

        assert!(matches!(err, MarketError::ParseError(_)));
    }
}
