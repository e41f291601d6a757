//! siphond — the siphon daemon.
//!
//! Assembles the scheduler loop with an environment and a dashboard.
//! Standalone mode runs against the built-in simulation, which is enough
//! to watch the engine classify, pack, and re-snapshot a small fleet.
//!
//! # Usage
//!
//! ```text
//! siphond standalone --config siphon.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use siphon_core::EngineConfig;
use siphon_dashboard::ConsoleDashboard;
use siphon_engine::SchedulerLoop;
use siphond::sim::{Sim, TargetSpec};

#[derive(Parser)]
#[command(name = "siphond", about = "Siphon scheduling daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler loop against the built-in simulation.
    Standalone {
        /// Path to a siphon.toml config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the refresh interval in milliseconds.
        #[arg(long)]
        refresh_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,siphond=debug,siphon=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone { config, refresh_ms } => run_standalone(config, refresh_ms).await,
    }
}

async fn run_standalone(
    config_path: Option<PathBuf>,
    refresh_ms: Option<u64>,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => {
            let config = EngineConfig::from_file(&path)?;
            info!(path = ?path, "config loaded");
            config
        }
        None => EngineConfig {
            filler_target: "depot-c".to_string(),
            home_reserve: 64.0,
            refresh_interval_ms: 1_000,
            ..EngineConfig::default()
        },
    };
    if let Some(ms) = refresh_ms {
        config.refresh_interval_ms = ms;
    }

    let sim = demo_world(&config);
    info!("simulated fleet initialized");

    let scheduler = SchedulerLoop::new(sim.clone(), config.clone())
        .with_dashboard(Box::new(ConsoleDashboard));

    // ── Shutdown signal ────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let clock_shutdown = shutdown_rx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // Advance simulated time in step with wall-clock time so launched
    // jobs eventually complete and free their capacity.
    let interval = config.refresh_interval_ms;
    let clock_handle = tokio::spawn(async move {
        let mut shutdown = clock_shutdown;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_millis(interval)) => {
                    sim.advance_ms(interval);
                }
                _ = shutdown.changed() => break,
            }
        }
    });

    scheduler.run(shutdown_rx).await;
    let _ = clock_handle.await;

    info!("siphond stopped");
    Ok(())
}

/// A small fleet with enough variety to exercise every classifier branch.
fn demo_world(config: &EngineConfig) -> Sim {
    let sim = Sim::new(config.costs.clone());

    sim.add_home("home", 512.0);
    sim.add_node("relay-01", 128.0);
    sim.add_node("relay-02", 64.0);

    // Freshly cracked: degraded and drained, will need Degrade then Grow.
    sim.add_target(
        "vault-a",
        TargetSpec {
            capacity: 32.0,
            max_resource: 2_000_000.0,
            current_resource: 400_000.0,
            current_degradation: 9.0,
            completion_ms: 4_000.0,
            ..TargetSpec::default()
        },
    );

    // Steady state: harvestable immediately.
    sim.add_target(
        "vault-b",
        TargetSpec {
            capacity: 16.0,
            max_resource: 800_000.0,
            current_resource: 800_000.0,
            completion_ms: 2_500.0,
            ..TargetSpec::default()
        },
    );

    // Low-value filler sink for idle capacity.
    sim.add_target(
        "depot-c",
        TargetSpec {
            capacity: 8.0,
            max_resource: 50_000.0,
            current_resource: 50_000.0,
            completion_ms: 1_500.0,
            ..TargetSpec::default()
        },
    );

    sim
}
