//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use strum::{Display, EnumString};

use crate::arbitrage::ArbBand;
use crate::error::BotError;
use crate::trading::order::TimeInForce;

/// What to do when the 15-minute slot rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RolloverMode {
    /// Re-resolve the Kalshi ticker and keep polling in this process.
    #[serde(alias = "refresh")]
    #[strum(serialize = "refresh-in-place", serialize = "refresh")]
    RefreshInPlace,
    /// Release the lock and replace the whole process.
    #[default]
    #[serde(alias = "restart")]
    #[strum(serialize = "restart-process", serialize = "restart")]
    RestartProcess,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Kalshi (venue A) ===
    /// Kalshi trade API base URL.
    #[serde(default = "default_kalshi_url")]
    pub kalshi_api_url: String,

    /// Series searched for the newest open market.
    #[serde(default = "default_series")]
    pub kalshi_series_ticker: String,

    /// Fixed market ticker. Disables auto-resolution and rollover.
    #[serde(default)]
    pub kalshi_ticker: Option<String>,

    // === Polymarket (venue B) ===
    /// Gamma API base URL (slug -> token ids).
    #[serde(default = "default_gamma_url")]
    pub polymarket_gamma_url: String,

    /// CLOB API base URL (order books).
    #[serde(default = "default_clob_url")]
    pub polymarket_clob_url: String,

    /// Event slug prefix; the slot start timestamp is appended.
    #[serde(default = "default_slug_prefix")]
    pub polymarket_slug_prefix: String,

    // === Polling ===
    /// Target start-to-start poll interval in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Slot rollover behaviour.
    #[serde(default)]
    pub rollover_mode: RolloverMode,

    // === Trading Parameters ===
    /// Inclusive lower bound of the qualifying sum.
    #[serde(default = "default_arb_low")]
    pub arb_low: Decimal,

    /// Exclusive upper bound of the qualifying sum.
    #[serde(default = "default_arb_high")]
    pub arb_high: Decimal,

    /// Added to each observed ask to form the limit price.
    #[serde(default = "default_price_buffer")]
    pub price_buffer: Decimal,

    /// Kalshi contracts per order.
    #[serde(default = "default_kalshi_contracts")]
    pub kalshi_contracts: u32,

    /// Polymarket shares per order.
    #[serde(default = "default_poly_shares")]
    pub polymarket_shares: Decimal,

    /// Polymarket minimum order value (price * size).
    #[serde(default = "default_min_notional")]
    pub polymarket_min_notional: Decimal,

    /// Polymarket time in force: FOK, FAK, or GTC.
    #[serde(default)]
    pub polymarket_order_type: TimeInForce,

    // === Operation Modes ===
    /// Detect and log without submitting orders.
    #[serde(default = "default_true")]
    pub dry_run: bool,

    /// Single-instance lock file.
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,

    /// Directory for the per-slot append-only log.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Per-request HTTP timeout in milliseconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,

    // === Server Configuration ===
    /// HTTP server port for health/status/metrics endpoints.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_kalshi_url() -> String {
    "https://api.elections.kalshi.com/trade-api/v2".to_string()
}

fn default_series() -> String {
    "KXBTC15M".to_string()
}

fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_clob_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_slug_prefix() -> String {
    "btc-updown-15m".to_string()
}

fn default_poll_interval() -> u64 {
    200
}

fn default_arb_low() -> Decimal {
    Decimal::new(75, 2) // 0.75
}

fn default_arb_high() -> Decimal {
    Decimal::new(92, 2) // 0.92
}

fn default_price_buffer() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_kalshi_contracts() -> u32 {
    1
}

fn default_poly_shares() -> Decimal {
    Decimal::new(5, 0)
}

fn default_min_notional() -> Decimal {
    Decimal::ONE
}

fn default_true() -> bool {
    true
}

fn default_lock_path() -> PathBuf {
    PathBuf::from("dual-venue-arb.lock")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_http_timeout() -> u64 {
    2000
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kalshi_api_url: default_kalshi_url(),
            kalshi_series_ticker: default_series(),
            kalshi_ticker: None,
            polymarket_gamma_url: default_gamma_url(),
            polymarket_clob_url: default_clob_url(),
            polymarket_slug_prefix: default_slug_prefix(),
            poll_interval_ms: default_poll_interval(),
            rollover_mode: RolloverMode::default(),
            arb_low: default_arb_low(),
            arb_high: default_arb_high(),
            price_buffer: default_price_buffer(),
            kalshi_contracts: default_kalshi_contracts(),
            polymarket_shares: default_poly_shares(),
            polymarket_min_notional: default_min_notional(),
            polymarket_order_type: TimeInForce::default(),
            dry_run: default_true(),
            lock_path: default_lock_path(),
            log_dir: default_log_dir(),
            http_timeout_ms: default_http_timeout(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env()?)
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> crate::Result<()> {
        self.check().map_err(BotError::InvalidConfig)
    }

    fn check(&self) -> Result<(), String> {
        if self.arb_low < Decimal::ZERO {
            return Err("ARB_LOW must not be negative".to_string());
        }

        if self.arb_low >= self.arb_high {
            return Err(format!(
                "ARB_LOW ({}) must be below ARB_HIGH ({})",
                self.arb_low, self.arb_high
            ));
        }

        if self.arb_high > Decimal::TWO {
            return Err("ARB_HIGH must be at most 2".to_string());
        }

        if self.price_buffer < Decimal::ZERO || self.price_buffer >= Decimal::ONE {
            return Err("PRICE_BUFFER must be in [0, 1)".to_string());
        }

        if self.poll_interval_ms == 0 {
            return Err("POLL_INTERVAL_MS must be positive".to_string());
        }

        if self.kalshi_contracts == 0 {
            return Err("KALSHI_CONTRACTS must be at least 1".to_string());
        }

        if self.polymarket_shares <= Decimal::ZERO {
            return Err("POLYMARKET_SHARES must be positive".to_string());
        }

        if self.polymarket_min_notional < Decimal::ZERO {
            return Err("POLYMARKET_MIN_NOTIONAL must not be negative".to_string());
        }

        if let Some(ticker) = &self.kalshi_ticker {
            if ticker.trim().is_empty() {
                return Err("KALSHI_TICKER must not be empty when set".to_string());
            }
        }

        for (name, value) in [
            ("KALSHI_API_URL", &self.kalshi_api_url),
            ("POLYMARKET_GAMMA_URL", &self.polymarket_gamma_url),
            ("POLYMARKET_CLOB_URL", &self.polymarket_clob_url),
        ] {
            url::Url::parse(value).map_err(|e| format!("{} is not a valid URL: {}", name, e))?;
        }

        Ok(())
    }

    /// Whether the Kalshi ticker is re-resolved from the series every slot.
    pub fn auto_resolve(&self) -> bool {
        self.kalshi_ticker.is_none()
    }

    /// Target poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-request HTTP timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Qualifying band for leg sums.
    pub fn band(&self) -> ArbBand {
        ArbBand::new(self.arb_low, self.arb_high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_values_are_sensible() {
        let config = Config::default();
        assert_eq!(config.arb_low, dec!(0.75));
        assert_eq!(config.arb_high, dec!(0.92));
        assert_eq!(config.price_buffer, dec!(0.01));
        assert_eq!(config.rollover_mode, RolloverMode::RestartProcess);
        assert!(config.dry_run);
        assert!(config.auto_resolve());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_band() {
        let config = Config {
            arb_low: dec!(0.95),
            arb_high: dec!(0.92),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let config = Config {
            poll_interval_ms: 0,
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_fixed_ticker() {
        let config = Config {
            kalshi_ticker: Some("  ".to_string()),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_url() {
        let config = Config {
            polymarket_clob_url: "not a url".to_string(),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_min_notional() {
        let config = Config {
            polymarket_min_notional: dec!(-1),
            ..Config::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, BotError::InvalidConfig(ref msg) if msg.contains("POLYMARKET_MIN_NOTIONAL")));

        let zero = Config {
            polymarket_min_notional: Decimal::ZERO,
            ..Config::default()
        };
        assert!(zero.validate().is_ok());
    }

    #[test]
    fn fixed_ticker_disables_auto_resolution() {
        let config = Config {
            kalshi_ticker: Some("KXBTC15M-25JAN011215-15".to_string()),
            ..Config::default()
        };

        assert!(!config.auto_resolve());
    }

    #[test]
    fn rollover_mode_parses_aliases() {
        use std::str::FromStr;
        assert_eq!(RolloverMode::from_str("refresh").unwrap(), RolloverMode::RefreshInPlace);
        assert_eq!(
            RolloverMode::from_str("restart-process").unwrap(),
            RolloverMode::RestartProcess
        );
    }
}
