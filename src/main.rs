use std::sync::Arc;

use arb_scanner::alert::{AlertConfig, AlertDispatcher};
use arb_scanner::cache::memory::MemoryCache;
use arb_scanner::cache::redis::RedisCache;
use arb_scanner::cache::Cache;
use arb_scanner::config::{CacheBackendConfig, Config};
use arb_scanner::orchestrator::ScanOrchestrator;
use arb_scanner::platform::kalshi::KalshiAdapter;
use arb_scanner::platform::manifold::ManifoldAdapter;
use arb_scanner::platform::polymarket::PolymarketAdapter;
use arb_scanner::platform::PlatformAdapter;
use arb_scanner::queue::Queue;
use arb_scanner::scheduler::Scheduler;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "arb-scanner", about = "Cross-platform prediction-market arbitrage scanner")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config.logging.level);

    info!("arb-scanner starting");

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();

    tokio::select! {
        result = run(config, run_cancel) => {
            if let Err(e) = result {
                error!(error = %e, "fatal error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
            cancel.cancel();
        }
    }

    info!("arb-scanner stopped");
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();
}

async fn run(config: Config, cancel: CancellationToken) -> arb_scanner::error::Result<()> {
    let http = reqwest::Client::new();

    let adapters: Vec<Arc<dyn PlatformAdapter>> = vec![
        Arc::new(PolymarketAdapter::new(http.clone(), config.fetching.polymarket_base_url.clone())),
        Arc::new(KalshiAdapter::new(http.clone(), config.fetching.kalshi_base_url.clone())),
        Arc::new(ManifoldAdapter::new(http.clone(), config.fetching.manifold_base_url.clone())),
    ];

    match config.cache.clone() {
        CacheBackendConfig::Memory => {
            let cache = Arc::new(MemoryCache::new());
            run_with_cache(config, adapters, http, cache, cancel).await
        }
        CacheBackendConfig::Redis { host, port, password } => {
            let cache = Arc::new(RedisCache::connect(&host, port, password.as_deref()).await?);
            run_with_cache(config, adapters, http, cache, cancel).await
        }
    }
}

async fn run_with_cache<C: Cache + 'static>(
    config: Config,
    adapters: Vec<Arc<dyn PlatformAdapter>>,
    http: reqwest::Client,
    cache: Arc<C>,
    cancel: CancellationToken,
) -> arb_scanner::error::Result<()> {
    let alerts = Arc::new(AlertDispatcher::new(
        http,
        cache.clone(),
        AlertConfig {
            webhook_url: config.alerts.webhook_url.clone(),
            min_roi_percent: config.alerts.min_roi_percent,
            min_profit_amount: config.alerts.min_profit_amount,
            cooldown_seconds: config.alerts.cooldown_seconds,
        },
    ));
    let orchestrator = Arc::new(ScanOrchestrator::new(adapters, cache, alerts));
    let queue = Arc::new(Queue::new());
    let scheduler = Scheduler::new(queue, orchestrator, config.fetching.markets_per_fetch);
    scheduler.run(cancel).await
}
