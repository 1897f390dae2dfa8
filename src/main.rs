//! Kalshi/Polymarket 15-minute arbitrage engine entry point.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dual_venue_arb::api::{create_router, AppState};
use dual_venue_arb::arbitrage::{
    ArbExecutionState, ArbitrageExecutor, ExecutorSettings, ExecutorStats, LegSums,
};
use dual_venue_arb::config::{Config, RolloverMode};
use dual_venue_arb::lifecycle::{CommandLauncher, FileLock, LifecycleManager};
use dual_venue_arb::logsink::{FileLogSink, LogSink};
use dual_venue_arb::market::{
    build_http_client, Clock, GammaResolver, KalshiClient, MarketSlotKey, PolymarketClient,
    SystemClock, TickerResolver,
};
use dual_venue_arb::metrics;
use dual_venue_arb::orderbook::{DualPriceFetcher, VenueRead};
use dual_venue_arb::pipeline::SnapshotPipeline;
use dual_venue_arb::scheduler::{PollExit, PollScheduler, SchedulerSettings, StopSignal};
use dual_venue_arb::trading::UnconfiguredSubmitter;
use dual_venue_arb::utils::{format_remaining, shutdown_signal};

/// Kalshi/Polymarket 15-minute arbitrage engine.
#[derive(Parser, Debug)]
#[command(name = "dual-venue-arb")]
#[command(about = "Cross-venue arbitrage for BTC 15-minute markets on Kalshi and Polymarket")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// Run in dry-run mode (no real orders).
    #[arg(long)]
    dry_run: Option<bool>,

    /// HTTP server port for health/metrics.
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the poll loop (default).
    Run {
        /// Run in dry-run mode (no real orders).
        #[arg(long)]
        dry_run: Option<bool>,

        /// HTTP server port for health/metrics.
        #[arg(short, long)]
        port: Option<u16>,

        /// Rollover mode: restart-process or refresh-in-place.
        #[arg(long)]
        rollover: Option<RolloverMode>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Resolve the current slot on both venues.
    DiscoverMarket,

    /// Fetch one snapshot and print both legs without trading.
    Snapshot,
}

/// CLI overrides applied on top of the environment.
#[derive(Debug, Default)]
struct Overrides {
    dry_run: Option<bool>,
    port: Option<u16>,
    rollover: Option<RolloverMode>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("dual_venue_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if args.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    // Handle subcommands
    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::DiscoverMarket) => cmd_discover_market().await,
        Some(Command::Snapshot) => cmd_snapshot().await,
        Some(Command::Run {
            dry_run,
            port,
            rollover,
        }) => {
            cmd_run(Overrides {
                dry_run,
                port,
                rollover,
            })
            .await
        }
        None => {
            cmd_run(Overrides {
                dry_run: args.dry_run,
                port: args.port,
                rollover: None,
            })
            .await
        }
    }
}

/// Load and validate configuration; both failures are fatal.
fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    Ok(config)
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("DUAL VENUE ARB - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    match &config.kalshi_ticker {
        Some(ticker) => println!("  Kalshi Ticker: {} (fixed)", ticker),
        None => println!("  Kalshi Series: {} (auto-resolve)", config.kalshi_series_ticker),
    }
    println!("  Polymarket Slug Prefix: {}", config.polymarket_slug_prefix);
    println!("  Poll Interval: {}ms", config.poll_interval_ms);
    println!("  Rollover: {}", config.rollover_mode);
    println!("  Band: [{}, {})", config.arb_low, config.arb_high);
    println!("  Price Buffer: {}", config.price_buffer);
    println!("  Kalshi Contracts: {}", config.kalshi_contracts);
    println!(
        "  Polymarket Shares: {} (min notional ${}, {})",
        config.polymarket_shares, config.polymarket_min_notional, config.polymarket_order_type
    );
    println!("  Dry Run: {}", config.dry_run);
    println!("  Lock: {}", config.lock_path.display());
    println!("  Log Dir: {}", config.log_dir.display());
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Resolve the current slot on both venues.
async fn cmd_discover_market() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("DUAL VENUE ARB - MARKET DISCOVERY");
    println!("======================================================================");

    let config = load_config()?;
    let http = build_http_client(config.http_timeout())?;
    let kalshi = KalshiClient::new(http.clone(), &config);
    let gamma = GammaResolver::new(http.clone(), &config);
    let polymarket = PolymarketClient::new(http, &config, Arc::new(gamma));

    let clock = SystemClock;
    let slot = MarketSlotKey::current(&clock);
    let slug = slot.polymarket_slug(&config.polymarket_slug_prefix);

    println!("  Slot: {}", slot);
    println!("  Time Remaining: {}", format_remaining(slot.remaining(clock.now())));
    println!("----------------------------------------------------------------------");

    match &config.kalshi_ticker {
        Some(ticker) => println!("  Kalshi Ticker: {} (fixed)", ticker),
        None => match kalshi.resolve_ticker().await {
            Ok(ticker) => println!("  Kalshi Ticker: {}", ticker),
            Err(e) => println!("  Kalshi: NO OPEN MARKET ({})", e),
        },
    }

    println!("  Polymarket Slug: {}", slug);
    match polymarket.identifiers(&slug).await {
        Ok(ids) => {
            println!("  UP Token: {}", ids.up_token_id);
            println!("  DOWN Token: {}", ids.down_token_id);
        }
        Err(e) => println!("  Polymarket: NOT RESOLVED ({})", e),
    }
    println!("======================================================================");

    Ok(())
}

/// Fetch one snapshot and print both legs.
async fn cmd_snapshot() -> anyhow::Result<()> {
    let config = load_config()?;
    let http = build_http_client(config.http_timeout())?;
    let kalshi = Arc::new(KalshiClient::new(http.clone(), &config));
    let gamma = Arc::new(GammaResolver::new(http.clone(), &config));
    let polymarket = Arc::new(PolymarketClient::new(http, &config, gamma));

    let ticker = initial_ticker(&config, kalshi.as_ref()).await?;
    let slot = MarketSlotKey::current(&SystemClock);
    let fetcher = DualPriceFetcher::new(kalshi, polymarket, config.polymarket_slug_prefix.clone());
    let snapshot = fetcher.fetch(&ticker, &slot).await;

    println!("======================================================================");
    println!("DUAL VENUE ARB - SNAPSHOT {}", snapshot.slot);
    println!("======================================================================");
    for (name, read) in [("Kalshi", &snapshot.venue_a), ("Polymarket", &snapshot.venue_b)] {
        match read {
            VenueRead::Quoted(q) => println!("  {:<11} UP {}  DOWN {}", name, q.up_ask, q.down_ask),
            VenueRead::Absent { reason } => println!("  {:<11} ABSENT ({})", name, reason),
        }
    }
    println!("----------------------------------------------------------------------");
    match LegSums::from_snapshot(&snapshot) {
        Some(sums) => {
            let band = config.band();
            println!("  Leg 1 (Kalshi UP + Polymarket DOWN): {}{}", sums.leg1, in_band(band.contains(sums.leg1)));
            println!("  Leg 2 (Kalshi DOWN + Polymarket UP): {}{}", sums.leg2, in_band(band.contains(sums.leg2)));
        }
        None => println!("  Incomplete snapshot, no leg sums"),
    }
    println!("======================================================================");

    Ok(())
}

fn in_band(qualifies: bool) -> &'static str {
    if qualifies {
        "  <- IN BAND"
    } else {
        ""
    }
}

/// Fixed ticker from config, or the newest open market in the series.
async fn initial_ticker(config: &Config, kalshi: &dyn TickerResolver) -> anyhow::Result<String> {
    if let Some(ticker) = &config.kalshi_ticker {
        return Ok(ticker.clone());
    }

    kalshi.resolve_ticker().await.map_err(|e| {
        error!("Failed to resolve initial Kalshi ticker: {}", e);
        anyhow::anyhow!("No open Kalshi market: {}", e)
    })
}

/// Run the poll loop until stopped or handed off.
async fn cmd_run(overrides: Overrides) -> anyhow::Result<()> {
    // Load configuration
    info!("Loading configuration...");
    let mut config = load_config()?;

    // Override with CLI args if provided
    if let Some(dry_run) = overrides.dry_run {
        config.dry_run = dry_run;
    }
    if let Some(port) = overrides.port {
        config.port = port;
    }
    if let Some(rollover) = overrides.rollover {
        config.rollover_mode = rollover;
    }

    info!("Configuration loaded successfully");
    info!("Mode: {}", if config.dry_run { "DRY RUN" } else { "LIVE TRADING" });
    info!("Band: [{}, {}) buffer {}", config.arb_low, config.arb_high, config.price_buffer);
    info!("Poll interval: {}ms, rollover: {}", config.poll_interval_ms, config.rollover_mode);

    // Single instance
    let lifecycle = LifecycleManager::new(
        Arc::new(FileLock::new(config.lock_path.clone())),
        Arc::new(CommandLauncher::current()?),
    );
    lifecycle.acquire().map_err(|e| {
        error!("{}", e);
        e
    })?;

    let result = run_engine(&config).await;
    match &result {
        Ok(PollExit::Handoff(change)) => {
            lifecycle.hand_off(change)?;
            info!("Exiting after handoff to slot {}", change.to);
        }
        Ok(PollExit::Stopped) => {
            lifecycle.shutdown();
            info!("Shutdown complete");
        }
        Err(_) => lifecycle.shutdown(),
    }

    result.map(|_| ())
}

/// Build the engine, serve HTTP and poll. The lock is already held.
async fn run_engine(config: &Config) -> anyhow::Result<PollExit> {
    let prometheus = match metrics::install_prometheus() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus exporter unavailable: {}", e);
            metrics::init_metrics();
            None
        }
    };

    // Clients
    let http = build_http_client(config.http_timeout())?;
    let kalshi = Arc::new(KalshiClient::new(http.clone(), config));
    let gamma = Arc::new(GammaResolver::new(http.clone(), config));
    let polymarket = Arc::new(PolymarketClient::new(http, config, gamma));

    let ticker = initial_ticker(config, kalshi.as_ref()).await?;
    info!("Initial Kalshi ticker: {}", ticker);

    // App state and HTTP server
    let mut app_state = AppState::new(config.dry_run);
    if let Some(handle) = prometheus {
        app_state = app_state.with_metrics(handle);
    }

    let stop = Arc::new(StopSignal::new());
    let server = spawn_http_server(config.port, app_state.clone(), stop.clone()).await;

    // Stop on Ctrl+C / SIGTERM
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown requested, finishing current tick...");
            stop.stop();
        });
    }

    // Append-only log
    let (sink, writer) = FileLogSink::spawn(config.log_dir.clone());
    let log: Arc<dyn LogSink> = Arc::new(sink);

    if !config.dry_run {
        warn!("LIVE mode without order credentials: every order will be reported as failed");
    }
    let submitter = Arc::new(UnconfiguredSubmitter);
    let executor = Arc::new(ArbitrageExecutor::new(
        ExecutorSettings::from_config(config),
        Arc::new(Mutex::new(ArbExecutionState::new())),
        submitter.clone(),
        submitter,
        polymarket.clone(),
        log.clone(),
    ));
    let pipeline = SnapshotPipeline::new(executor.clone(), log).with_state(app_state);

    let fetcher = DualPriceFetcher::new(
        kalshi.clone(),
        polymarket,
        config.polymarket_slug_prefix.clone(),
    );
    let scheduler = PollScheduler::new(
        fetcher,
        kalshi,
        Arc::new(SystemClock),
        SchedulerSettings::from_config(config),
        stop.clone(),
        ticker,
    );

    info!("========================================");
    info!("DUAL VENUE ARBITRAGE ENGINE STARTED");
    info!("========================================");

    let exit = scheduler.run(&pipeline).await;

    log_summary(&executor.stats());

    // Free the port and flush the log before exiting or handing off.
    stop.stop();
    if let Some(server) = server {
        if tokio::time::timeout(Duration::from_secs(2), server).await.is_err() {
            warn!("HTTP server did not stop in time");
        }
    }
    drop(pipeline);
    drop(executor);
    if tokio::time::timeout(Duration::from_secs(2), writer).await.is_err() {
        warn!("Log writer did not flush in time");
    }

    Ok(exit)
}

/// Bind and serve the HTTP side server. A bind failure is not fatal.
async fn spawn_http_server(
    port: u16,
    state: AppState,
    stop: Arc<StopSignal>,
) -> Option<tokio::task::JoinHandle<()>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!("HTTP server disabled, cannot bind {}: {}", addr, e);
            return None;
        }
    };
    info!("HTTP server listening on {}", addr);

    let router = create_router(state);
    Some(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(async move { stop.stopped().await })
            .await
        {
            error!("HTTP server error: {}", e);
        }
    }))
}

fn log_summary(stats: &ExecutorStats) {
    info!("========================================");
    info!("SESSION SUMMARY");
    info!("========================================");
    info!("Snapshots evaluated:    {}", stats.snapshots_evaluated);
    info!("Opportunities found:    {}", stats.opportunities_found);
    info!("Legs executed:          {}", stats.legs_executed);
    info!("Duplicates suppressed:  {}", stats.duplicates_suppressed);
    info!("Orders submitted:       {}", stats.orders_submitted);
    info!("Orders failed:          {}", stats.orders_failed);
    info!("========================================");
}
