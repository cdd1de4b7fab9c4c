use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flowmeter::config::FlowmeterConfig;
use flowmeter::shaper::TokenBucketLimiter;
use flowmeter::stats::{RollingWindowCounter, StatsReporter};

/// Shape synthetic packet traffic through a token bucket and print throughput.
#[derive(Debug, Parser)]
#[command(name = "flowmeter", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Refill events per second
    #[arg(long)]
    rate: Option<u32>,

    /// Bucket capacity in bytes
    #[arg(long)]
    limit: Option<u64>,

    /// Seconds between report rows
    #[arg(long)]
    interval: Option<u64>,

    /// Seconds of history kept per counter
    #[arg(long)]
    window: Option<usize>,

    /// Log filter directive
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_tracing(&config);

    info!("Starting flowmeter");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        rate = config.shaper.rate,
        limit = config.shaper.limit,
        interval_secs = config.stats.interval_secs,
        window_secs = config.stats.window_secs,
        "Configuration loaded"
    );

    let window = config.stats.window_secs;
    let offered = Arc::new(RollingWindowCounter::new("offered", window)?);
    let accepted = Arc::new(RollingWindowCounter::new("accepted", window)?);
    let dropped = Arc::new(RollingWindowCounter::new("dropped", window)?);

    let mut reporter = StatsReporter::with_policy(
        std::io::stdout(),
        config.stats.interval_secs,
        config.stats.schedule,
    );
    reporter.add_counter(Arc::clone(&dropped));
    reporter.add_counter(Arc::clone(&accepted));
    reporter.add_counter(Arc::clone(&offered));
    reporter.launch()?;

    let limiter = Arc::new(TokenBucketLimiter::with_policy(
        config.shaper.rate,
        config.shaper.limit,
        config.shaper.schedule,
    ));

    let producer = tokio::spawn(produce(
        Arc::clone(&limiter),
        offered,
        accepted,
        dropped,
    ));

    shutdown_signal().await;

    producer.abort();
    if producer.await.is_ok() {
        warn!("Producer exited before shutdown");
    }
    reporter.teardown();
    drop(limiter);

    info!("flowmeter stopped");
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<FlowmeterConfig> {
    let mut config = FlowmeterConfig::load(args.config.as_deref())?;

    if let Some(rate) = args.rate {
        config.shaper.rate = rate;
    }
    if let Some(limit) = args.limit {
        config.shaper.limit = limit;
    }
    if let Some(interval) = args.interval {
        config.stats.interval_secs = interval;
    }
    if let Some(window) = args.window {
        config.stats.window_secs = window;
    }
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json = true;
    }

    config.validate()?;
    Ok(config)
}

/// Logs go to stderr so the report table owns stdout.
fn init_tracing(config: &FlowmeterConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Offer bursts of random sized packets every millisecond, counting what
/// the limiter lets through and what it drops.
async fn produce(
    limiter: Arc<TokenBucketLimiter>,
    offered: Arc<RollingWindowCounter>,
    accepted: Arc<RollingWindowCounter>,
    dropped: Arc<RollingWindowCounter>,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(1));
    loop {
        ticker.tick().await;

        let burst = rand::thread_rng().gen_range(1..=64);
        for _ in 0..burst {
            let size = rand::thread_rng().gen_range(64..=1500u64);
            offered.accum(size);
            if limiter.request(size) {
                accepted.accum(size);
            } else {
                dropped.accum(size);
            }
        }
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
