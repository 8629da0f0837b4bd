use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tinxyd::Config;
use tinxyd::SyncCoordinator;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Tinxy device state synchronisation daemon
#[derive(Parser, Debug)]
#[command(name = "tinxyd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "tinxyd.toml")]
    config: PathBuf,

    /// Sync the catalog, poll once, print the result as JSON and exit
    #[arg(long)]
    once: bool,
}

fn init_logging(config: &Config) {
    let mut filter = Targets::new().with_default(LevelFilter::from(config.logging.level));
    for (target, level) in &config.logging.overrides {
        filter = filter.with_target(target.clone(), LevelFilter::from(*level));
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_once(coordinator: &SyncCoordinator) -> anyhow::Result<()> {
    let report = coordinator.poll_once().await;
    for (name, error) in &report.failed {
        tracing::warn!("{} failed: {}", name, error);
    }

    let output = serde_json::json!({
        "catalog": coordinator.catalog().entities(),
        "devices": coordinator.catalog().devices(),
        "snapshot": coordinator.current_snapshot().as_ref(),
        "report": report,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    init_logging(&config);

    tracing::info!("tinxyd starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    let integrations = tinxyd::integrations_from_config(&config)
        .context("Failed to set up integrations")?;
    let coordinator = Arc::new(SyncCoordinator::new(
        integrations,
        config.sync.request_timeout(),
    ));

    match coordinator.sync_catalog().await {
        Ok(count) => tracing::info!("Catalog synced: {} entities", count),
        Err(e) if args.once => return Err(e).context("Initial catalog sync failed"),
        Err(e) => tracing::warn!("Initial catalog sync failed, will retry: {}", e),
    }

    if args.once {
        return run_once(&coordinator).await;
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let api = tokio::spawn(tinxyd::api::serve(
        config.api.listen,
        config.api.port,
        coordinator.clone(),
        shutdown_rx,
    ));

    tracing::info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = coordinator.run(config.sync.poll_interval(), config.sync.catalog_interval()) => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("Received shutdown signal"),
                Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    shutdown_tx.send(()).ok();
    match api.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("HTTP API server failed: {}", e),
        Err(e) => tracing::error!("HTTP API task panicked: {}", e),
    }

    tracing::info!("tinxyd shutdown complete");

    Ok(())
}
