//! Self-pacing poll scheduler with slot rollover detection.
//!
//! One tick = compute the slot, react to a slot change, fetch both venues,
//! hand the snapshot to the handler. Ticks never overlap: a tick that starts
//! while another is in flight is skipped, not queued. The gap between tick
//! starts is `max(0, interval - elapsed)`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{Config, RolloverMode};
use crate::market::{
    classify_transition, Clock, MarketSlotKey, SlotChange, SlotTransition, TickerResolver,
};
use crate::metrics;
use crate::orderbook::{DualPriceFetcher, DualSnapshot};

/// Receives every snapshot the scheduler produces.
#[async_trait]
pub trait SnapshotHandler: Send + Sync {
    /// Handle one snapshot. Errors and panics are reported via
    /// [`SnapshotHandler::on_error`] and never stop the loop.
    async fn on_snapshot(&self, snapshot: DualSnapshot) -> anyhow::Result<()>;

    /// Error hook.
    fn on_error(&self, error: &anyhow::Error) {
        error!(error = %error, "Snapshot handler failed");
    }
}

/// Cooperative stop flag shared between the loop and its owner.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    /// New, not stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. In-flight work completes; no further tick starts.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_stopped() {
            return;
        }
        notified.await;
    }

    /// Sleep for `duration` unless stopped first. Returns `false` on stop.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_stopped() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = notified => false,
        }
    }
}

/// Delay before the next tick, measured from the current tick's start.
pub fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Scheduler settings.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Target start-to-start interval.
    pub interval: Duration,
    /// Whether the ticker follows the slot (no fixed ticker configured).
    pub auto_resolve: bool,
    /// What to do on a slot change when auto-resolving.
    pub rollover: RolloverMode,
}

impl SchedulerSettings {
    /// Settings from config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.poll_interval(),
            auto_resolve: config.auto_resolve(),
            rollover: config.rollover_mode,
        }
    }
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Fetched and handled.
    Completed,
    /// Another tick was in flight.
    Skipped,
    /// Stop was requested before the tick started.
    Stopped,
    /// Handler returned an error (already reported).
    HandlerFailed,
    /// Slot changed in refresh mode but the new ticker could not be resolved;
    /// nothing was fetched and the next tick retries.
    RefreshFailed,
    /// Slot changed in restart mode; nothing was fetched.
    Handoff(SlotChange),
}

/// Why the run loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollExit {
    /// Stop signal observed.
    Stopped,
    /// The process should be replaced.
    Handoff(SlotChange),
}

struct Cursor {
    ticker: String,
    last_slot: Option<MarketSlotKey>,
}

/// Resets the in-flight flag when the tick ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives the dual fetcher at a fixed cadence.
pub struct PollScheduler {
    fetcher: DualPriceFetcher,
    tickers: Arc<dyn TickerResolver>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
    stop: Arc<StopSignal>,
    in_flight: AtomicBool,
    cursor: Mutex<Cursor>,
}

impl PollScheduler {
    /// Create a scheduler polling `initial_ticker` on venue A.
    pub fn new(
        fetcher: DualPriceFetcher,
        tickers: Arc<dyn TickerResolver>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
        stop: Arc<StopSignal>,
        initial_ticker: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            tickers,
            clock,
            settings,
            stop,
            in_flight: AtomicBool::new(false),
            cursor: Mutex::new(Cursor {
                ticker: initial_ticker.into(),
                last_slot: None,
            }),
        }
    }

    /// Ticker currently polled on venue A.
    pub async fn current_ticker(&self) -> String {
        self.cursor.lock().await.ticker.clone()
    }

    /// Run ticks until stopped or a handoff is due.
    pub async fn run(&self, handler: &dyn SnapshotHandler) -> PollExit {
        info!(
            interval_ms = self.settings.interval.as_millis() as u64,
            auto_resolve = self.settings.auto_resolve,
            rollover = %self.settings.rollover,
            "Poll loop started"
        );

        loop {
            if self.stop.is_stopped() {
                return PollExit::Stopped;
            }

            let started = Instant::now();
            match self.tick(handler).await {
                TickOutcome::Handoff(change) => return PollExit::Handoff(change),
                TickOutcome::Stopped => return PollExit::Stopped,
                _ => {}
            }

            if self.stop.is_stopped() {
                return PollExit::Stopped;
            }

            let delay = next_delay(self.settings.interval, started.elapsed());
            if !self.stop.sleep(delay).await {
                return PollExit::Stopped;
            }
        }
    }

    /// Run one tick. Safe to call concurrently: overlapping calls are skipped.
    pub async fn tick(&self, handler: &dyn SnapshotHandler) -> TickOutcome {
        if self.stop.is_stopped() {
            return TickOutcome::Stopped;
        }

        let Some(_guard) = InFlight::try_acquire(&self.in_flight) else {
            debug!("Previous tick still in flight, skipping");
            metrics::inc_ticks_skipped();
            return TickOutcome::Skipped;
        };
        let _timer = metrics::timer_tick();

        let slot = MarketSlotKey::current(self.clock.as_ref());
        let mut cursor = self.cursor.lock().await;

        match classify_transition(
            cursor.last_slot.as_ref(),
            &slot,
            self.settings.auto_resolve,
            self.settings.rollover,
        ) {
            SlotTransition::Initial => {
                info!(slot = %slot, ticker = %cursor.ticker, "First slot observed");
            }
            SlotTransition::Unchanged => {}
            SlotTransition::Pinned(change) => {
                metrics::inc_slot_transitions();
                info!(from = %change.from, to = %change.to, ticker = %cursor.ticker, "Slot changed, ticker is fixed");
            }
            SlotTransition::Refresh(change) => match self.tickers.resolve_ticker().await {
                Ok(ticker) => {
                    metrics::inc_slot_transitions();
                    info!(
                        from = %change.from,
                        to = %change.to,
                        old_ticker = %cursor.ticker,
                        new_ticker = %ticker,
                        "Slot changed, ticker refreshed"
                    );
                    cursor.ticker = ticker;
                }
                Err(e) => {
                    warn!(to = %change.to, error = %e, "Ticker refresh failed, retrying next tick");
                    return TickOutcome::RefreshFailed;
                }
            },
            SlotTransition::Handoff(change) => {
                metrics::inc_slot_transitions();
                info!(from = %change.from, to = %change.to, "Slot changed, handing off");
                return TickOutcome::Handoff(change);
            }
        }

        cursor.last_slot = Some(slot.clone());
        let ticker = cursor.ticker.clone();
        drop(cursor);

        let snapshot = self.fetcher.fetch(&ticker, &slot).await;
        let handled = AssertUnwindSafe(handler.on_snapshot(snapshot))
            .catch_unwind()
            .await;
        match handled {
            Ok(Ok(())) => TickOutcome::Completed,
            Ok(Err(e)) => {
                handler.on_error(&e);
                TickOutcome::HandlerFailed
            }
            Err(panic) => {
                let e = anyhow::anyhow!("snapshot handler panicked: {}", panic_message(&*panic));
                handler.on_error(&e);
                TickOutcome::HandlerFailed
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string payload"
    }
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("fetcher", &self.fetcher)
            .field("settings", &self.settings)
            .finish()
    }
}
