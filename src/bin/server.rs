//! gate-sync-server binary
//!
//! Runs the gate lock authority behind a line-delimited JSON TCP listener.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key / flag                     | Default         | Description                      |
//! |--------------------------------|-----------------|----------------------------------|
//! | `--config` / `GATE_CONFIG`     | *(none)*        | Optional TOML settings file      |
//! | `--listen` / `GATE_LISTEN`     | from settings   | Listen address                   |
//! | `--stats-interval-secs`        | from settings   | Authority stats log period       |
//! | `GATE__*`                      |                 | Overrides for any settings key   |

use anyhow::{Context, Result};
use clap::Parser;
use gate_sync::{
    bus::{AuthorityBusAgent, AuthorityBusConfig},
    registry::NoDimensions,
    settings::GateSettings,
    transport, LockAuthority,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "gate-sync-server", about = "Gate lock authority", version)]
struct Args {
    /// TOML settings file
    #[arg(long, env = "GATE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides the settings file)
    #[arg(long, env = "GATE_LISTEN")]
    listen: Option<String>,

    /// Stats log period in seconds (overrides the settings file)
    #[arg(long, env = "GATE_STATS_INTERVAL_SECS")]
    stats_interval_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gate_sync=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut settings =
        GateSettings::load(args.config.as_deref()).context("failed to load gate settings")?;
    if let Some(listen) = args.listen {
        settings.listen = listen;
    }
    if let Some(secs) = args.stats_interval_secs {
        settings.stats_interval_secs = secs;
    }

    // The authority never reads the catalog, but a broken one should stop
    // startup rather than surface later in every client.
    let registry = settings
        .registry(&NoDimensions)
        .context("invalid gate catalog")?;

    log::info!(
        "Starting gate-sync-server (listen='{}', gates={}, stats every {:?})",
        settings.listen,
        registry.len(),
        settings.stats_interval(),
    );

    let listener = TcpListener::bind(&settings.listen)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen))?;

    let (inbound_tx, inbound_rx) = mpsc::channel(1024);
    let acceptor = tokio::spawn(transport::serve(listener, inbound_tx));

    let authority = Arc::new(Mutex::new(LockAuthority::new()));
    let bus_config = AuthorityBusConfig {
        stats_interval: settings.stats_interval(),
    };
    let agent = AuthorityBusAgent::new(bus_config, Arc::clone(&authority));

    // Run until shutdown
    tokio::select! {
        result = agent.run(inbound_rx) => result?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutdown requested");
        }
    }

    acceptor.abort();
    let stats = authority.lock().stats();
    log::info!(
        "gate-sync-server stopped after {} toggle(s) and {} breach(es)",
        stats.toggles,
        stats.breaches
    );
    Ok(())
}
