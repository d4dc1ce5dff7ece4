// Trade Cost Estimator - Unified CLI
// Live estimation against the OKX book feed, plus an offline simulation mode

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use trade_cost_estimator::clients::okx_ws::{
    INITIAL_RECONNECT_DELAY_SECS, MAX_RECONNECT_DELAY_SECS,
};
use trade_cost_estimator::clients::{handle_event_message, parse_book_message};
use trade_cost_estimator::{
    BookAction, BookError, BookMessage, Config, CostEngine, CostError, CostEstimateRequest,
    CostEstimateResult, OkxRestClient, OkxWebSocketClient, PriceLevelBook, SharedBook, TradeSide,
};

#[derive(Parser)]
#[command(name = "cost-estimator")]
#[command(version = "0.1.0")]
#[command(about = "Real-time trade cost estimation from live order book data", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Stream the live book and estimate costs on every update
    Run {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Estimate against a synthetic random-walk book (no network)
    Simulate {
        /// Number of book updates to simulate
        #[arg(short, long, default_value = "500")]
        updates: usize,

        #[command(flatten)]
        request: RequestArgs,
    },
}

/// Request overrides; anything omitted falls back to the config file.
#[derive(Debug, clap::Args)]
struct RequestArgs {
    /// Order size in base units
    #[arg(short, long)]
    size: Option<f64>,

    /// Order side: buy or sell
    #[arg(long)]
    side: Option<String>,

    /// Annualized volatility (derived from the price window when omitted)
    #[arg(long)]
    volatility: Option<f64>,

    /// Execution horizon
    #[arg(long)]
    time_horizon: Option<f64>,

    /// Passive-placement dial in [0, 1]
    #[arg(long)]
    strategy_param: Option<f64>,
}

impl RequestArgs {
    fn apply(&self, config: &Config) -> Result<CostEstimateRequest, String> {
        let mut request = config.request.to_request();
        if let Some(size) = self.size {
            request.size = size;
        }
        if let Some(side) = &self.side {
            request.side = match side.to_lowercase().as_str() {
                "buy" => TradeSide::Buy,
                "sell" => TradeSide::Sell,
                other => return Err(format!("unknown side '{other}', expected buy or sell")),
            };
        }
        if self.volatility.is_some() {
            request.volatility = self.volatility;
        }
        if let Some(horizon) = self.time_horizon {
            request.time_horizon = horizon;
        }
        if let Some(strategy) = self.strategy_param {
            request.strategy_param = strategy;
        }
        Ok(request)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    std::env::set_var("RUST_LOG", log_level);
    tracing_subscriber::fmt::init();

    match cli.command {
        Commands::Init { force } => {
            init_config(&cli.config, force)?;
        }
        Commands::Run { request } => {
            let config = load_config_or_exit(&cli.config);
            let request = request_or_exit(&request, &config);
            run_live(config, request).await?;
        }
        Commands::Simulate { updates, request } => {
            let config = load_config_or_exit(&cli.config);
            let request = request_or_exit(&request, &config);
            simulate(config, request, updates)?;
        }
    }

    Ok(())
}

fn init_config(path: &str, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if std::path::Path::new(path).exists() && !force {
        warn!("config file {path} already exists (use --force to overwrite)");
        return Ok(());
    }
    Config::default().to_file(path)?;
    info!("wrote default configuration to {path}");
    Ok(())
}

fn load_config_or_exit(path: &str) -> Config {
    match Config::load_or_create(path) {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {e}");
            error!("run 'cost-estimator init' to create a fresh config file");
            std::process::exit(1);
        }
    }
}

fn request_or_exit(args: &RequestArgs, config: &Config) -> CostEstimateRequest {
    match args.apply(config) {
        Ok(request) => match request.validate() {
            Ok(()) => request,
            Err(e) => {
                error!("invalid request: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}

/// Outcome of one feed session, distinguishing operator shutdown from a
/// dropped connection.
enum SessionEnd {
    Shutdown,
    Disconnected,
}

async fn run_live(
    config: Config,
    request: CostEstimateRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let instrument = config.feed.instrument.clone();
    info!(
        instrument = %instrument,
        size = request.size,
        side = %request.side,
        "starting live cost estimation"
    );

    let book = SharedBook::new(PriceLevelBook::new(instrument.clone()));
    let mut engine = CostEngine::from_config(&config.model, config.metrics.latency_capacity)?;
    let rest = OkxRestClient::new(config.feed.rest_url.clone());

    let mut reconnect_delay = INITIAL_RECONNECT_DELAY_SECS;
    loop {
        match run_session(&config, &book, &mut engine, &rest, &request).await {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Disconnected) => {
                warn!("feed disconnected, reconnecting in {reconnect_delay}s");
            }
            Err(e) => {
                warn!("feed session failed ({e}), reconnecting in {reconnect_delay}s");
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(reconnect_delay)) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
        reconnect_delay = (reconnect_delay * 2).min(MAX_RECONNECT_DELAY_SECS);
    }

    shutdown_report(&engine, &config);
    Ok(())
}

async fn run_session(
    config: &Config,
    book: &SharedBook,
    engine: &mut CostEngine,
    rest: &OkxRestClient,
    request: &CostEstimateRequest,
) -> Result<SessionEnd, Box<dyn std::error::Error>> {
    // Seed from a REST snapshot so estimates are meaningful before the
    // websocket snapshot arrives, and so reconnects resume from full state
    match rest
        .fetch_book_snapshot(&config.feed.instrument, config.feed.snapshot_depth)
        .await
    {
        Ok(snapshot) => {
            apply_message(book, engine, &snapshot);
        }
        Err(e) => warn!("snapshot bootstrap failed ({e}), waiting for feed snapshot"),
    }

    let mut client = OkxWebSocketClient::connect(&config.feed.ws_url).await?;
    client.subscribe_to_books(&config.feed.instrument).await?;

    let mut ping_interval = tokio::time::interval(Duration::from_secs(20));
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(SessionEnd::Shutdown),
            _ = ping_interval.tick() => {
                client.send_ping().await?;
            }
            frame = client.next_text() => {
                let Some(text) = frame? else {
                    return Ok(SessionEnd::Disconnected);
                };
                let Ok(value) = serde_json::from_str::<Value>(&text) else {
                    debug!("skipping unparsable frame");
                    continue;
                };
                match parse_book_message(&value) {
                    Some(message) => {
                        if apply_message(book, engine, &message) {
                            estimate_and_log(book, engine, config, request);
                        }
                    }
                    None => handle_event_message(&value),
                }
            }
        }
    }
}

/// Apply one feed message to the shared book, recording apply latency.
/// Returns whether the book advanced.
fn apply_message(book: &SharedBook, engine: &mut CostEngine, message: &BookMessage) -> bool {
    let started = Instant::now();
    let applied = book.apply_message(message);
    engine.record_latency("book_apply", started.elapsed());

    match applied {
        Ok(_) => {
            if let Ok(mid) = book.mid_price() {
                engine.observe_price(mid);
            }
            true
        }
        Err(BookError::Stale { .. }) => false,
        Err(e) => {
            warn!("rejected book message: {e}");
            false
        }
    }
}

fn estimate_and_log(
    book: &SharedBook,
    engine: &mut CostEngine,
    config: &Config,
    request: &CostEstimateRequest,
) {
    if book.is_stale(config.feed.max_book_age_secs) {
        warn!("book is stale, skipping estimate");
        return;
    }

    let snapshot = book.snapshot();
    match engine.estimate(&snapshot, request) {
        Ok(result) => log_result(&result),
        Err(CostError::InsufficientLiquidity { requested, filled, .. }) => {
            warn!(requested, filled, "book too shallow for requested size");
        }
        Err(CostError::Book(e)) => debug!("estimate skipped: {e}"),
        Err(e @ CostError::InvalidParameter { .. }) => {
            // Validated at startup, so this cannot clear on its own
            error!("estimate failed: {e}");
            std::process::exit(1);
        }
    }
}

fn log_result(result: &CostEstimateResult) {
    info!(
        seq = result.book_sequence,
        latency_us = result.latency.total_us,
        "vwap {:.4} | slippage {:.3} bps | impact {:.3} bps | maker {:.1}% | fee {:.6} | net cost {:.6}",
        result.vwap,
        result.slippage * 10_000.0,
        result.impact_cost * 10_000.0,
        result.maker_proportion * 100.0,
        result.fee,
        result.net_cost,
    );
}

fn shutdown_report(engine: &CostEngine, config: &Config) {
    for name in engine.latency().metric_names() {
        if let Some(stats) = engine.latency().statistics(name) {
            info!(
                metric = name,
                count = stats.count,
                mean_us = stats.mean.as_micros() as u64,
                p95_us = stats.p95.as_micros() as u64,
                p99_us = stats.p99.as_micros() as u64,
                "latency summary"
            );
        }
    }
    match engine.latency().export_csv(&config.metrics.export_path) {
        Ok(()) => info!("latency metrics written to {}", config.metrics.export_path),
        Err(e) => warn!("failed to write latency metrics: {e}"),
    }
}

/// Drive the pipeline from a synthetic random-walk book, no network needed.
fn simulate(
    config: Config,
    request: CostEstimateRequest,
    updates: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    use rand::Rng;

    info!(updates, "running synthetic book simulation");

    let mut engine = CostEngine::from_config(&config.model, config.metrics.latency_capacity)?;
    let mut book = PriceLevelBook::new(config.feed.instrument.clone());
    let mut rng = rand::thread_rng();

    let mut mid = 100.0_f64;
    let tick = 0.05;
    let levels_per_side = 25;

    book.apply_message(&synthetic_snapshot(mid, tick, levels_per_side, &mut rng))?;

    let mut last_result = None;
    for seq in 0..updates {
        mid *= 1.0 + rng.gen_range(-0.0005..0.0005);
        let message = synthetic_update(mid, tick, levels_per_side, seq as u64 + 2, &mut rng);

        let started = Instant::now();
        if book.apply_message(&message).is_err() {
            continue;
        }
        engine.record_latency("book_apply", started.elapsed());

        if let Ok(current_mid) = book.mid_price() {
            engine.observe_price(current_mid);
        }

        match engine.estimate(&book.snapshot(), &request) {
            Ok(result) => last_result = Some(result),
            Err(CostError::InsufficientLiquidity { requested, filled, .. }) => {
                warn!(requested, filled, "synthetic book too shallow");
            }
            Err(e) => debug!("estimate skipped: {e}"),
        }
    }

    match last_result {
        Some(result) => log_result(&result),
        None => warn!("no estimate produced; try a smaller --size"),
    }
    shutdown_report(&engine, &config);
    Ok(())
}

fn synthetic_snapshot(
    mid: f64,
    tick: f64,
    levels: usize,
    rng: &mut impl rand::Rng,
) -> BookMessage {
    BookMessage {
        action: BookAction::Snapshot,
        bids: (1..=levels)
            .map(|i| (mid - tick * i as f64, rng.gen_range(0.5..20.0)))
            .collect(),
        asks: (1..=levels)
            .map(|i| (mid + tick * i as f64, rng.gen_range(0.5..20.0)))
            .collect(),
        timestamp: chrono::Utc::now(),
        sequence: Some(1),
    }
}

fn synthetic_update(
    mid: f64,
    tick: f64,
    levels: usize,
    sequence: u64,
    rng: &mut impl rand::Rng,
) -> BookMessage {
    // Touch a handful of levels per tick, occasionally clearing one
    let mut bids = Vec::new();
    let mut asks = Vec::new();
    for _ in 0..4 {
        let offset = tick * rng.gen_range(1..=levels) as f64;
        let size = if rng.gen_bool(0.1) {
            0.0
        } else {
            rng.gen_range(0.5..20.0)
        };
        if rng.gen_bool(0.5) {
            bids.push((mid - offset, size));
        } else {
            asks.push((mid + offset, size));
        }
    }
    BookMessage {
        action: BookAction::Update,
        bids,
        asks,
        timestamp: chrono::Utc::now(),
        sequence: Some(sequence),
    }
}
