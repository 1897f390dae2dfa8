//! Arbitrage trade execution with an at-most-once guarantee per (ticker, leg).

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::calculator::{ArbOpportunity, Leg};
use super::detector::{detect, ArbBand, Detection, LegSums};
use crate::config::Config;
use crate::error::TradingError;
use crate::logsink::LogSink;
use crate::market::{IdentifierResolver, Venue};
use crate::metrics;
use crate::orderbook::DualSnapshot;
use crate::trading::{
    KalshiOrder, KalshiOrderSubmitter, KalshiSide, OrderAck, PolymarketOrder,
    PolymarketOrderSubmitter, TimeInForce,
};

/// Which (ticker, leg) pairs have already been attempted.
///
/// Grows for the life of the process and is never pruned.
#[derive(Debug, Default)]
pub struct ArbExecutionState {
    leg1: HashSet<String>,
    leg2: HashSet<String>,
}

impl ArbExecutionState {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, leg: Leg) -> &HashSet<String> {
        match leg {
            Leg::One => &self.leg1,
            Leg::Two => &self.leg2,
        }
    }

    /// Whether the leg was already attempted for `ticker`.
    pub fn is_executed(&self, ticker: &str, leg: Leg) -> bool {
        self.set(leg).contains(ticker)
    }

    /// Mark the leg attempted. Returns `false` if it already was.
    pub fn try_mark(&mut self, ticker: &str, leg: Leg) -> bool {
        let set = match leg {
            Leg::One => &mut self.leg1,
            Leg::Two => &mut self.leg2,
        };
        set.insert(ticker.to_string())
    }

    /// Number of attempted pairs.
    pub fn len(&self) -> usize {
        self.leg1.len() + self.leg2.len()
    }

    /// Whether nothing has been attempted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Execution state shared between the executor and its owner.
pub type SharedExecutionState = Arc<Mutex<ArbExecutionState>>;

/// Sizing, pricing and mode settings for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Qualifying band.
    pub band: ArbBand,
    /// Added to each ask.
    pub buffer: Decimal,
    /// Detect and mark without submitting.
    pub dry_run: bool,
    /// Kalshi contracts per order.
    pub kalshi_contracts: u32,
    /// Polymarket shares per order.
    pub polymarket_shares: Decimal,
    /// Polymarket minimum `price * size`.
    pub polymarket_min_notional: Decimal,
    /// Polymarket time in force.
    pub time_in_force: TimeInForce,
}

impl ExecutorSettings {
    /// Settings from config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            band: config.band(),
            buffer: config.price_buffer,
            dry_run: config.dry_run,
            kalshi_contracts: config.kalshi_contracts,
            polymarket_shares: config.polymarket_shares,
            polymarket_min_notional: config.polymarket_min_notional,
            time_in_force: config.polymarket_order_type,
        }
    }
}

/// What happened to the two orders of an executed leg.
#[derive(Debug)]
pub enum Submission {
    /// Dry-run: nothing was sent.
    DryRun,
    /// Both venues were attempted; each result is independent.
    Live {
        /// Kalshi result.
        kalshi: Result<OrderAck, TradingError>,
        /// Polymarket result.
        polymarket: Result<OrderAck, TradingError>,
    },
}

impl Submission {
    /// Whether exactly one venue accepted its order.
    pub fn is_partial(&self) -> bool {
        match self {
            Submission::DryRun => false,
            Submission::Live { kalshi, polymarket } => kalshi.is_ok() != polymarket.is_ok(),
        }
    }
}

/// Report for a leg that was marked and dispatched.
#[derive(Debug)]
pub struct LegExecution {
    /// Market instance.
    pub ticker: String,
    /// What was detected and priced.
    pub opportunity: ArbOpportunity,
    /// Order results.
    pub submission: Submission,
}

/// Result of evaluating one snapshot.
#[derive(Debug)]
pub enum EvaluateOutcome {
    /// A venue was absent; nothing happened.
    Incomplete,
    /// Neither leg in band.
    NoOpportunity(LegSums),
    /// The qualifying leg had already been attempted for this ticker.
    AlreadyExecuted {
        /// Market instance.
        ticker: String,
        /// Leg that qualified again.
        leg: Leg,
    },
    /// A leg was marked and dispatched.
    Executed(LegExecution),
}

/// Executor statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutorStats {
    /// Snapshots passed to `evaluate`.
    pub snapshots_evaluated: u64,
    /// Snapshots with a qualifying leg (including duplicates).
    pub opportunities_found: u64,
    /// Legs marked and dispatched.
    pub legs_executed: u64,
    /// Qualifying legs skipped as already executed.
    pub duplicates_suppressed: u64,
    /// Orders accepted by a venue.
    pub orders_submitted: u64,
    /// Orders that failed or were rejected locally.
    pub orders_failed: u64,
}

/// Detects opportunities and fires each (ticker, leg) at most once.
pub struct ArbitrageExecutor {
    settings: ExecutorSettings,
    state: SharedExecutionState,
    kalshi: Arc<dyn KalshiOrderSubmitter>,
    polymarket: Arc<dyn PolymarketOrderSubmitter>,
    identifiers: Arc<dyn IdentifierResolver>,
    log: Arc<dyn LogSink>,
    stats: Mutex<ExecutorStats>,
}

impl ArbitrageExecutor {
    /// Create an executor over injected state and collaborators.
    ///
    /// `identifiers` maps the snapshot's slug to Polymarket token IDs; in
    /// production it is the caching Polymarket client, so lookups are local.
    pub fn new(
        settings: ExecutorSettings,
        state: SharedExecutionState,
        kalshi: Arc<dyn KalshiOrderSubmitter>,
        polymarket: Arc<dyn PolymarketOrderSubmitter>,
        identifiers: Arc<dyn IdentifierResolver>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            settings,
            state,
            kalshi,
            polymarket,
            identifiers,
            log,
            stats: Mutex::new(ExecutorStats::default()),
        }
    }

    /// Executor settings.
    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Evaluate one snapshot and act on at most one leg.
    #[instrument(skip_all, fields(ticker = %snapshot.ticker, slot = %snapshot.slot))]
    pub async fn evaluate(&self, snapshot: &DualSnapshot) -> EvaluateOutcome {
        self.bump(|s| s.snapshots_evaluated += 1);

        let opportunity = match detect(snapshot, self.settings.band, self.settings.buffer) {
            Detection::Incomplete => return EvaluateOutcome::Incomplete,
            Detection::NoOpportunity(sums) => return EvaluateOutcome::NoOpportunity(sums),
            Detection::Opportunity(opportunity) => opportunity,
        };
        self.bump(|s| s.opportunities_found += 1);
        metrics::inc_opportunities_detected();

        let ticker = snapshot.ticker.clone();
        let leg = opportunity.leg;

        // Mark before any order goes out; a failed order is not retried.
        let newly_marked = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_mark(&ticker, leg);
        if !newly_marked {
            info!(leg = %leg, "Leg already executed for this market, skipping");
            self.bump(|s| s.duplicates_suppressed += 1);
            metrics::inc_duplicates_suppressed();
            return EvaluateOutcome::AlreadyExecuted { ticker, leg };
        }

        self.bump(|s| s.legs_executed += 1);
        metrics::inc_legs_executed(leg.as_str());
        self.log_opportunity(snapshot, &opportunity);

        let submission = if self.settings.dry_run {
            info!(leg = %leg, "DRY RUN - orders not submitted");
            Submission::DryRun
        } else {
            self.submit_leg(snapshot, &opportunity).await
        };

        self.log_submission(&ticker, &opportunity, &submission);

        EvaluateOutcome::Executed(LegExecution {
            ticker,
            opportunity,
            submission,
        })
    }

    /// Submit both venue orders concurrently; failures are independent.
    async fn submit_leg(&self, snapshot: &DualSnapshot, opportunity: &ArbOpportunity) -> Submission {
        let leg = opportunity.leg;
        let kalshi_order = KalshiOrder {
            ticker: snapshot.ticker.clone(),
            side: KalshiSide::from(leg.kalshi_outcome()),
            count: self.settings.kalshi_contracts,
            limit_cents: opportunity.kalshi_limit_cents,
            client_order_id: format!(
                "{}-{}-{}",
                snapshot.ticker,
                leg,
                Utc::now().timestamp_millis()
            ),
        };

        info!(
            leg = %leg,
            kalshi_side = %kalshi_order.side,
            kalshi_limit_cents = kalshi_order.limit_cents,
            polymarket_outcome = %leg.polymarket_outcome(),
            polymarket_limit = %opportunity.polymarket_limit,
            "Submitting paired orders"
        );

        let (kalshi, polymarket) = tokio::join!(
            self.submit_kalshi(&kalshi_order),
            self.submit_polymarket(&snapshot.slug, opportunity),
        );

        Submission::Live { kalshi, polymarket }
    }

    async fn submit_kalshi(&self, order: &KalshiOrder) -> Result<OrderAck, TradingError> {
        let start = Instant::now();
        let result = self.kalshi.submit_order(order).await;
        metrics::record_order_submit_latency(start, Venue::Kalshi);
        self.count_order(Venue::Kalshi, &result);
        result
    }

    async fn submit_polymarket(
        &self,
        slug: &str,
        opportunity: &ArbOpportunity,
    ) -> Result<OrderAck, TradingError> {
        let result = self.build_and_submit_polymarket(slug, opportunity).await;
        self.count_order(Venue::Polymarket, &result);
        result
    }

    async fn build_and_submit_polymarket(
        &self,
        slug: &str,
        opportunity: &ArbOpportunity,
    ) -> Result<OrderAck, TradingError> {
        let ids = self
            .identifiers
            .resolve(slug)
            .await
            .map_err(|e| TradingError::SubmissionFailed(format!("token lookup failed: {}", e)))?;

        let order = PolymarketOrder {
            token_id: ids.token_id(opportunity.leg.polymarket_outcome()).to_string(),
            price: opportunity.polymarket_limit,
            size: self.settings.polymarket_shares,
            time_in_force: self.settings.time_in_force,
        };

        let notional = order.notional();
        if notional < self.settings.polymarket_min_notional {
            return Err(TradingError::BelowMinimumNotional {
                notional,
                minimum: self.settings.polymarket_min_notional,
            });
        }

        let start = Instant::now();
        let result = self.polymarket.submit_order(&order).await;
        metrics::record_order_submit_latency(start, Venue::Polymarket);
        result
    }

    fn count_order(&self, venue: Venue, result: &Result<OrderAck, TradingError>) {
        match result {
            Ok(ack) => {
                info!(venue = %venue, order_id = %ack.order_id, "Order accepted");
                self.bump(|s| s.orders_submitted += 1);
                metrics::inc_orders_submitted(venue);
            }
            Err(e) => {
                error!(venue = %venue, error = %e, "Order failed");
                self.bump(|s| s.orders_failed += 1);
                metrics::inc_orders_failed(venue);
            }
        }
    }

    fn log_opportunity(&self, snapshot: &DualSnapshot, opportunity: &ArbOpportunity) {
        info!("========================================");
        info!("ARBITRAGE OPPORTUNITY {}", opportunity.leg);
        info!("========================================");
        info!("Ticker:               {}", snapshot.ticker);
        info!("Kalshi {} ask:        {}", opportunity.leg.kalshi_outcome(), opportunity.kalshi_ask);
        info!("Polymarket {} ask:    {}", opportunity.leg.polymarket_outcome(), opportunity.polymarket_ask);
        info!("Sum:                  {}", opportunity.sum);
        info!("Edge per pair:        {}", opportunity.edge());
        info!("Limit cost per pair:  {}", opportunity.limit_cost());
        info!("Kalshi limit:         {}c x {}", opportunity.kalshi_limit_cents, self.settings.kalshi_contracts);
        info!("Polymarket limit:     {} x {}", opportunity.polymarket_limit, self.settings.polymarket_shares);
        info!("========================================");

        self.log.record(
            snapshot.fetched_at,
            format!(
                "ARB {} ticker={} sum={} kalshi_{}={} polymarket_{}={} limits={}c/{} dry_run={}",
                opportunity.leg,
                snapshot.ticker,
                opportunity.sum,
                opportunity.leg.kalshi_outcome(),
                opportunity.kalshi_ask,
                opportunity.leg.polymarket_outcome(),
                opportunity.polymarket_ask,
                opportunity.kalshi_limit_cents,
                opportunity.polymarket_limit,
                self.settings.dry_run,
            ),
        );
    }

    fn log_submission(&self, ticker: &str, opportunity: &ArbOpportunity, submission: &Submission) {
        let Submission::Live { kalshi, polymarket } = submission else {
            return;
        };

        if submission.is_partial() {
            warn!(ticker = %ticker, leg = %opportunity.leg, "Partial execution: one venue failed");
        }

        self.log.record(
            Utc::now(),
            format!(
                "ORDERS {} ticker={} kalshi={} polymarket={}",
                opportunity.leg,
                ticker,
                describe(kalshi),
                describe(polymarket),
            ),
        );
    }

    fn bump(&self, f: impl FnOnce(&mut ExecutorStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Get statistics summary.
    pub fn stats(&self) -> ExecutorStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn describe(result: &Result<OrderAck, TradingError>) -> String {
    match result {
        Ok(ack) => format!("ok:{}", ack.order_id),
        Err(e) => format!("failed:{}", e),
    }
}

impl std::fmt::Debug for ArbitrageExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArbitrageExecutor")
            .field("settings", &self.settings)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logsink::MemoryLogSink;
    use crate::market::mock::{MockIdentifierResolver, RecordingSubmitter};
    use crate::market::MarketSlotKey;
    use crate::orderbook::{PriceSnapshot, VenueRead};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    struct Harness {
        executor: ArbitrageExecutor,
        state: SharedExecutionState,
        submitter: Arc<RecordingSubmitter>,
        log: Arc<MemoryLogSink>,
    }

    fn harness(dry_run: bool) -> Harness {
        let config = Config {
            dry_run,
            ..Config::default()
        };
        let state = SharedExecutionState::default();
        let submitter = Arc::new(RecordingSubmitter::new());
        let log = Arc::new(MemoryLogSink::new());
        let executor = ArbitrageExecutor::new(
            ExecutorSettings::from_config(&config),
            state.clone(),
            submitter.clone(),
            submitter.clone(),
            Arc::new(MockIdentifierResolver::new()),
            log.clone(),
        );
        Harness {
            executor,
            state,
            submitter,
            log,
        }
    }

    fn quote(up: Decimal, down: Decimal) -> VenueRead {
        VenueRead::Quoted(PriceSnapshot {
            up_ask: up,
            down_ask: down,
            captured_at: Utc::now(),
        })
    }

    fn snapshot(ticker: &str, a: VenueRead, b: VenueRead) -> DualSnapshot {
        DualSnapshot {
            ticker: ticker.to_string(),
            slot: MarketSlotKey::from_time(Utc::now()),
            slug: "btc-updown-15m-900".to_string(),
            venue_a: a,
            venue_b: b,
            fetched_at: Utc::now(),
        }
    }

    fn firing(ticker: &str) -> DualSnapshot {
        snapshot(ticker, quote(dec!(0.40), dec!(0.55)), quote(dec!(0.38), dec!(0.48)))
    }

    #[test]
    fn execution_state_marks_once() {
        let mut state = ArbExecutionState::new();
        assert!(state.try_mark("T", Leg::One));
        assert!(!state.try_mark("T", Leg::One));
        assert!(state.try_mark("T", Leg::Two));
        assert!(state.is_executed("T", Leg::One));
        assert!(!state.is_executed("U", Leg::One));
        assert_eq!(state.len(), 2);
    }

    #[tokio::test]
    async fn fires_leg_once_with_buffered_prices() {
        let h = harness(false);

        let first = h.executor.evaluate(&firing("KXBTC15M-T")).await;
        let second = h.executor.evaluate(&firing("KXBTC15M-T")).await;

        let EvaluateOutcome::Executed(report) = first else {
            panic!("expected execution");
        };
        assert!(matches!(report.submission, Submission::Live { .. }));
        assert!(matches!(second, EvaluateOutcome::AlreadyExecuted { leg: Leg::One, .. }));

        let kalshi = h.submitter.kalshi_orders();
        let poly = h.submitter.polymarket_orders();
        assert_eq!(kalshi.len(), 1);
        assert_eq!(poly.len(), 1);
        assert_eq!(kalshi[0].side, KalshiSide::Yes);
        assert_eq!(kalshi[0].limit_cents, 41);
        assert_eq!(kalshi[0].count, 1);
        assert_eq!(poly[0].token_id, "btc-updown-15m-900-down");
        assert_eq!(poly[0].price, dec!(0.49));
        assert_eq!(poly[0].size, dec!(5));

        let stats = h.executor.stats();
        assert_eq!(stats.legs_executed, 1);
        assert_eq!(stats.duplicates_suppressed, 1);
        assert_eq!(stats.orders_submitted, 2);
    }

    #[tokio::test]
    async fn new_ticker_fires_again() {
        let h = harness(false);

        h.executor.evaluate(&firing("A")).await;
        h.executor.evaluate(&firing("B")).await;

        assert_eq!(h.submitter.kalshi_orders().len(), 2);
        assert!(h.state.lock().unwrap().is_executed("B", Leg::One));
    }

    #[tokio::test]
    async fn no_opportunity_has_no_side_effects() {
        let h = harness(false);
        let snap = snapshot("T", quote(dec!(0.40), dec!(0.55)), quote(dec!(0.38), dec!(0.56)));

        let outcome = h.executor.evaluate(&snap).await;

        assert!(matches!(outcome, EvaluateOutcome::NoOpportunity(_)));
        assert!(h.state.lock().unwrap().is_empty());
        assert!(h.submitter.kalshi_orders().is_empty());
        assert!(h.log.lines().is_empty());
    }

    #[tokio::test]
    async fn absent_venue_has_no_side_effects() {
        let h = harness(false);
        let snap = snapshot("T", quote(dec!(0.40), dec!(0.55)), VenueRead::absent("timeout"));

        let outcome = h.executor.evaluate(&snap).await;

        assert!(matches!(outcome, EvaluateOutcome::Incomplete));
        assert!(h.state.lock().unwrap().is_empty());
        assert!(h.submitter.polymarket_orders().is_empty());
    }

    #[tokio::test]
    async fn dry_run_marks_but_does_not_submit() {
        let h = harness(true);

        let outcome = h.executor.evaluate(&firing("T")).await;

        assert!(matches!(
            outcome,
            EvaluateOutcome::Executed(LegExecution {
                submission: Submission::DryRun,
                ..
            })
        ));
        assert!(h.state.lock().unwrap().is_executed("T", Leg::One));
        assert!(h.submitter.kalshi_orders().is_empty());
        assert!(h.submitter.polymarket_orders().is_empty());
        assert_eq!(h.log.lines().len(), 1);
        assert!(h.log.lines()[0].starts_with("ARB leg1"));
    }

    #[tokio::test]
    async fn venue_failures_are_independent_and_not_retried() {
        let h = harness(false);
        h.submitter.set_kalshi_failing(true);

        let outcome = h.executor.evaluate(&firing("T")).await;

        let EvaluateOutcome::Executed(report) = outcome else {
            panic!("expected execution");
        };
        assert!(report.submission.is_partial());
        let Submission::Live { kalshi, polymarket } = &report.submission else {
            panic!("expected live submission");
        };
        assert!(kalshi.is_err());
        assert!(polymarket.is_ok());

        // Still marked: the failed leg is not retried.
        h.submitter.set_kalshi_failing(false);
        let again = h.executor.evaluate(&firing("T")).await;
        assert!(matches!(again, EvaluateOutcome::AlreadyExecuted { .. }));
        assert_eq!(h.submitter.kalshi_orders().len(), 1);

        let stats = h.executor.stats();
        assert_eq!(stats.orders_failed, 1);
        assert_eq!(stats.orders_submitted, 1);
    }

    #[tokio::test]
    async fn below_minimum_notional_is_rejected_locally() {
        let config = Config {
            dry_run: false,
            polymarket_shares: dec!(1),
            ..Config::default()
        };
        let submitter = Arc::new(RecordingSubmitter::new());
        let executor = ArbitrageExecutor::new(
            ExecutorSettings::from_config(&config),
            SharedExecutionState::default(),
            submitter.clone(),
            submitter.clone(),
            Arc::new(MockIdentifierResolver::new()),
            Arc::new(MemoryLogSink::new()),
        );

        let EvaluateOutcome::Executed(report) = executor.evaluate(&firing("T")).await else {
            panic!("expected execution");
        };
        let Submission::Live { kalshi, polymarket } = report.submission else {
            panic!("expected live submission");
        };
        assert!(kalshi.is_ok());
        assert!(matches!(
            polymarket,
            Err(TradingError::BelowMinimumNotional { .. })
        ));
        assert!(submitter.polymarket_orders().is_empty());
    }

    #[tokio::test]
    async fn token_lookup_failure_fails_only_polymarket_order() {
        let config = Config {
            dry_run: false,
            ..Config::default()
        };
        let submitter = Arc::new(RecordingSubmitter::new());
        let identifiers = Arc::new(MockIdentifierResolver::new());
        identifiers.set_failing(true);
        let executor = ArbitrageExecutor::new(
            ExecutorSettings::from_config(&config),
            SharedExecutionState::default(),
            submitter.clone(),
            submitter.clone(),
            identifiers,
            Arc::new(MemoryLogSink::new()),
        );

        let EvaluateOutcome::Executed(report) = executor.evaluate(&firing("T")).await else {
            panic!("expected execution");
        };
        let Submission::Live { kalshi, polymarket } = report.submission else {
            panic!("expected live submission");
        };
        assert!(kalshi.is_ok());
        assert!(matches!(polymarket, Err(TradingError::SubmissionFailed(_))));
        assert!(submitter.polymarket_orders().is_empty());
    }

    #[tokio::test]
    async fn leg_two_buys_kalshi_no_and_polymarket_up() {
        let h = harness(false);
        let snap = snapshot("T", quote(dec!(0.60), dec!(0.45)), quote(dec!(0.40), dec!(0.40)));

        h.executor.evaluate(&snap).await;

        assert_eq!(h.submitter.kalshi_orders()[0].side, KalshiSide::No);
        assert_eq!(h.submitter.kalshi_orders()[0].limit_cents, 46);
        assert_eq!(h.submitter.polymarket_orders()[0].token_id, "btc-updown-15m-900-up");
        assert_eq!(h.submitter.polymarket_orders()[0].price, dec!(0.41));
    }

    #[tokio::test]
    async fn executed_leg_one_still_shadows_qualifying_leg_two() {
        let h = harness(false);
        let both = || snapshot("T", quote(dec!(0.40), dec!(0.40)), quote(dec!(0.40), dec!(0.40)));

        let first = h.executor.evaluate(&both()).await;
        let second = h.executor.evaluate(&both()).await;

        assert!(matches!(
            first,
            EvaluateOutcome::Executed(LegExecution {
                opportunity: ArbOpportunity { leg: Leg::One, .. },
                ..
            })
        ));
        assert!(matches!(second, EvaluateOutcome::AlreadyExecuted { leg: Leg::One, .. }));
        assert_eq!(h.submitter.kalshi_orders().len(), 1);
        assert_eq!(h.submitter.kalshi_orders()[0].side, KalshiSide::Yes);

        let state = h.state.lock().unwrap();
        assert!(state.is_executed("T", Leg::One));
        assert!(!state.is_executed("T", Leg::Two));
    }
}
