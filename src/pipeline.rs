//! Snapshot handler wiring the executor to the log sink and API state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::api::AppState;
use crate::arbitrage::{ArbitrageExecutor, EvaluateOutcome, LegSums};
use crate::logsink::LogSink;
use crate::orderbook::{DualSnapshot, VenueRead};
use crate::scheduler::SnapshotHandler;

/// Handles each snapshot: log prices, evaluate, publish status.
pub struct SnapshotPipeline {
    executor: Arc<ArbitrageExecutor>,
    log: Arc<dyn LogSink>,
    state: Option<AppState>,
}

impl SnapshotPipeline {
    /// Pipeline without an HTTP side server.
    pub fn new(executor: Arc<ArbitrageExecutor>, log: Arc<dyn LogSink>) -> Self {
        Self {
            executor,
            log,
            state: None,
        }
    }

    /// Publish ticker, slot and stats to `state` after every snapshot.
    pub fn with_state(mut self, state: AppState) -> Self {
        self.state = Some(state);
        self
    }

    /// Executor driven by this pipeline.
    pub fn executor(&self) -> &Arc<ArbitrageExecutor> {
        &self.executor
    }

    async fn publish(&self, snapshot: &DualSnapshot) {
        let Some(state) = &self.state else {
            return;
        };

        {
            let mut polling = state.polling.write().await;
            polling.ticker = Some(snapshot.ticker.clone());
            polling.slot = Some(snapshot.slot.clone());
            polling.last_snapshot_at = Some(snapshot.fetched_at);
        }
        *state.stats.write().await = self.executor.stats();
        state.set_ready(true);
    }
}

/// One log line for a snapshot.
pub fn price_line(snapshot: &DualSnapshot) -> String {
    let sums = match LegSums::from_snapshot(snapshot) {
        Some(sums) => format!("leg1={} leg2={}", sums.leg1, sums.leg2),
        None => "leg1=- leg2=-".to_string(),
    };
    format!(
        "PRICES ticker={} slug={} kalshi[{}] polymarket[{}] {}",
        snapshot.ticker,
        snapshot.slug,
        describe_read(&snapshot.venue_a),
        describe_read(&snapshot.venue_b),
        sums,
    )
}

fn describe_read(read: &VenueRead) -> String {
    match read {
        VenueRead::Quoted(quote) => format!("up={} down={}", quote.up_ask, quote.down_ask),
        VenueRead::Absent { reason } => format!("absent: {}", reason),
    }
}

#[async_trait]
impl SnapshotHandler for SnapshotPipeline {
    async fn on_snapshot(&self, snapshot: DualSnapshot) -> anyhow::Result<()> {
        let line = price_line(&snapshot);
        debug!("{}", line);
        self.log.record(snapshot.fetched_at, line);

        match self.executor.evaluate(&snapshot).await {
            EvaluateOutcome::Executed(execution) if execution.submission.is_partial() => {
                debug!(ticker = %execution.ticker, leg = %execution.opportunity.leg, "Leg partially filled");
            }
            outcome => debug!(?outcome, "Snapshot evaluated"),
        }

        self.publish(&snapshot).await;
        Ok(())
    }
}

impl std::fmt::Debug for SnapshotPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotPipeline")
            .field("executor", &self.executor)
            .field("publishes", &self.state.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::{ArbBand, ArbExecutionState, ExecutorSettings};
    use crate::logsink::MemoryLogSink;
    use crate::market::mock::{MockIdentifierResolver, RecordingSubmitter};
    use crate::market::MarketSlotKey;
    use crate::orderbook::PriceSnapshot;
    use crate::trading::TimeInForce;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    fn quoted(up: Decimal, down: Decimal) -> VenueRead {
        VenueRead::Quoted(PriceSnapshot {
            up_ask: up,
            down_ask: down,
            captured_at: Utc::now(),
        })
    }

    fn snapshot(venue_b: VenueRead) -> DualSnapshot {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 3, 0).unwrap();
        let slot = MarketSlotKey::from_time(at);
        DualSnapshot {
            ticker: "KXBTC15M-TEST".to_string(),
            slug: slot.polymarket_slug("btc-updown-15m"),
            slot,
            venue_a: quoted(dec!(0.40), dec!(0.55)),
            venue_b,
            fetched_at: at,
        }
    }

    fn pipeline(log: Arc<MemoryLogSink>) -> SnapshotPipeline {
        let submitter = Arc::new(RecordingSubmitter::new());
        let executor = ArbitrageExecutor::new(
            ExecutorSettings {
                band: ArbBand::new(dec!(0.75), dec!(0.92)),
                buffer: dec!(0.01),
                dry_run: true,
                kalshi_contracts: 1,
                polymarket_shares: dec!(5),
                polymarket_min_notional: dec!(1),
                time_in_force: TimeInForce::FOK,
            },
            Arc::new(Mutex::new(ArbExecutionState::new())),
            submitter.clone(),
            submitter,
            Arc::new(MockIdentifierResolver::new()),
            log.clone(),
        );
        SnapshotPipeline::new(Arc::new(executor), log)
    }

    #[test]
    fn price_line_shows_sums_for_complete_snapshot() {
        let line = price_line(&snapshot(quoted(dec!(0.38), dec!(0.56))));
        assert!(line.starts_with("PRICES ticker=KXBTC15M-TEST"));
        assert!(line.contains("kalshi[up=0.40 down=0.55]"));
        assert!(line.contains("leg1=0.96 leg2=0.93"));
    }

    #[test]
    fn price_line_marks_absent_venue() {
        let line = price_line(&snapshot(VenueRead::absent("timeout")));
        assert!(line.contains("polymarket[absent: timeout]"));
        assert!(line.contains("leg1=- leg2=-"));
    }

    #[tokio::test]
    async fn snapshot_updates_app_state() {
        let log = Arc::new(MemoryLogSink::new());
        let state = AppState::new(true);
        let pipeline = pipeline(log.clone()).with_state(state.clone());

        pipeline
            .on_snapshot(snapshot(quoted(dec!(0.38), dec!(0.48))))
            .await
            .unwrap();

        assert!(state.is_ready());
        let polling = state.polling.read().await.clone();
        assert_eq!(polling.ticker.as_deref(), Some("KXBTC15M-TEST"));
        assert_eq!(state.stats.read().await.legs_executed, 1);

        let lines = log.lines();
        assert!(lines[0].contains("PRICES"));
        assert!(lines.iter().any(|l| l.contains("ARB leg1")));
    }

    #[tokio::test]
    async fn absent_read_is_logged_without_trading() {
        let log = Arc::new(MemoryLogSink::new());
        let pipeline = pipeline(log.clone());

        pipeline
            .on_snapshot(snapshot(VenueRead::absent("HTTP 503")))
            .await
            .unwrap();

        assert_eq!(pipeline.executor().stats().legs_executed, 0);
        assert_eq!(log.lines().len(), 1);
    }
}
