use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::time::Interval;

use detector_client::config::watcher::ConfigWatcher;
use detector_client::config::{load_config, ClientConfig, HealthCheckConfig};
use detector_client::health::{run_check, strategy_for, HealthCheckService};
use detector_client::lifecycle::Shutdown;
use detector_client::observability::logging;
use detector_client::{ChannelPool, TcpFactory};

#[derive(Parser)]
#[command(name = "detector-health")]
#[command(about = "Health checks and connection pool diagnostics for a detection service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "detector.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured health check once and exit non-zero on failure
    Check,
    /// Keep monitoring and print a stats snapshot every interval
    Monitor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init(&config.observability.log_level);

    match cli.command {
        Commands::Check => {
            let healthy = check_once(&config).await?;
            if !healthy {
                std::process::exit(1);
            }
        }
        Commands::Monitor => monitor(&cli.config, config).await?,
    }

    Ok(())
}

async fn check_once(config: &ClientConfig) -> Result<bool, Box<dyn std::error::Error>> {
    let health_check = config.health_check.clone().normalized();
    let strategy = strategy_for(&health_check);
    let result = run_check(strategy.as_ref(), &health_check.addresses, health_check.timeout()).await;

    let report = json!({
        "ok": result.is_ok(),
        "protocol": health_check.protocol,
        "addresses": health_check.addresses,
        "detail": result.as_ref().err().map(ToString::to_string).unwrap_or_default(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(result.is_ok())
}

async fn monitor(path: &Path, config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pool = ChannelPool::new(&config.pool, TcpFactory::from_config(&config.detector)).await?;
    let service = HealthCheckService::start();
    service.update_config(config.health_check.clone())?;

    let (watcher, mut updates) = ConfigWatcher::new(path);
    let _watcher = watcher.run()?;

    let shutdown = Arc::new(Shutdown::new());
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move { shutdown.trigger_on_ctrl_c().await }
    });

    let mut ticker = tokio::time::interval(config.health_check.clone().normalized().interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let pool_ok = round_trip(&pool).await;
                let report = json!({
                    "healthy": service.is_healthy(),
                    "stats": service.stats(),
                    "pool": pool.status(),
                    "pool_round_trip": pool_ok,
                });
                println!("{}", report);
            }
            Some(new_config) = updates.recv() => {
                retune(&mut ticker, &new_config.health_check);
                if let Err(e) = service.update_config(new_config.health_check) {
                    tracing::error!(error = %e, "Health check service rejected new config");
                    break;
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }

    service.close().await;
    pool.release().await;
    Ok(())
}

/// Follow the check interval of a reloaded configuration.
fn retune(ticker: &mut Interval, health_check: &HealthCheckConfig) -> bool {
    let interval = health_check.clone().normalized().interval();
    if interval == ticker.period() {
        return false;
    }
    tracing::info!(interval_secs = interval.as_secs(), "Report interval changed");
    *ticker = tokio::time::interval(interval);
    true
}

/// Borrow a connection, heartbeat it and hand it back.
async fn round_trip(pool: &ChannelPool<TcpFactory>) -> bool {
    let mut conn = match pool.get().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to borrow connection");
            return false;
        }
    };
    match pool.ping(&mut conn).await {
        Ok(()) => {
            if let Err(e) = pool.put(conn).await {
                tracing::debug!(error = %e, "Failed to return connection");
            }
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "Pooled connection failed heartbeat");
            let _ = pool.close(conn).await;
            false
        }
    }
}
