mod config;
mod lockfile;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kairos_clock::SystemClock;
use kairos_coordinator::ExecutionCoordinator;
use kairos_exchange::{AdapterLimits, CoinoneAdapter};
use kairos_exchange::coinone::CoinoneCredentials;
use kairos_ports::Clock;
use kairos_store::SqliteStore;

use crate::config::AppConfig;
use crate::lockfile::SingletonGuard;

fn print_help() {
    eprintln!(
        r#"kairos - crypto portfolio rebalancing engine

USAGE:
    kairos [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from a TOML file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    COINONE_API_KEY     Exchange API key (required)
    COINONE_SECRET_KEY  Exchange secret key (required)
    COINONE_BASE_URL    Exchange base URL (default: https://api.coinone.co.kr)
    KAIROS__*           Overrides any configuration key, e.g. KAIROS__SCHEDULER__TICK_CADENCE_MINUTES
    RUST_LOG            Log level filter
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kairos_app=info,kairos_coordinator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                let path = args.get(i).ok_or_else(|| anyhow::anyhow!("--config requires a path argument"))?;
                config_path = Some(path.clone());
            }
            arg => {
                eprintln!("unknown argument: {arg}");
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let app_config = AppConfig::load(config_path.as_deref())?;

    // Singleton invariant: at most one coordinator may write to this store.
    // Held for the process lifetime; refuses to start if already held.
    let _lock_guard = SingletonGuard::acquire(&app_config.lock_path)?;
    tracing::info!(lock_path = %app_config.lock_path, "acquired singleton lock");

    let credentials = CoinoneCredentials {
        api_key: std::env::var("COINONE_API_KEY").map_err(|_| anyhow::anyhow!("COINONE_API_KEY not set"))?,
        secret_key: std::env::var("COINONE_SECRET_KEY").map_err(|_| anyhow::anyhow!("COINONE_SECRET_KEY not set"))?,
        base_url: std::env::var("COINONE_BASE_URL").unwrap_or_else(|_| "https://api.coinone.co.kr".to_string()),
    };

    let limits = AdapterLimits {
        max_retries: app_config.adapter.max_retries,
        safety_margin: app_config.adapter.safety_margin,
        ..AdapterLimits::default()
    };

    let clock = SystemClock::new();
    let exchange = Arc::new(CoinoneAdapter::with_limits(credentials, limits));
    let store = Arc::new(SqliteStore::connect(&app_config.database_url).await?);

    let coordinator = ExecutionCoordinator::new(
        exchange.clone(),
        store.clone(),
        exchange.clone(),
        app_config.scheduler_config(),
        app_config.coordinator_config(),
    );

    tracing::info!("recovering any in-flight schedule from a prior run");
    coordinator.recover(clock.now()).await?;

    let cadence = app_config.scheduler.tick_cadence_minutes.max(1) as u64;
    tracing::info!(cadence_minutes = cadence, database_url = %app_config.database_url, "starting tick loop");

    let mut interval = tokio::time::interval(StdDuration::from_secs(cadence * 60));
    loop {
        interval.tick().await;
        let now = clock.now();
        match coordinator.tick(now).await {
            Ok(report) => {
                tracing::info!(
                    season = ?report.season,
                    season_changed = report.season_changed,
                    action = ?report.action,
                    "tick completed"
                );
            }
            Err(err) => {
                tracing::error!(error = %err, "tick failed");
            }
        }
    }
}
