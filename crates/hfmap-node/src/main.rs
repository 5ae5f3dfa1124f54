//! hfmap - passive HF network topology mapper
//!
//! Listens to a JS8-style modem's UDP JSON API, infers which stations
//! exist, where they are, and who hears whom, and keeps an append-only
//! callbook of learned positions across sessions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use hfmap_node::{
    LogRenderer, LogTransmitter, Node, NodeConfig, UdpActivitySource,
};

#[derive(Parser)]
#[command(
    name = "hfmap",
    about = "Passive HF network topology mapper for JS8-style activity",
    version
)]
struct Cli {
    /// The operator's callsign; required for heard-me tracking and
    /// exploratory transmission
    #[arg(short, long)]
    call: Option<String>,

    /// The operator's grid locator, overriding the callbook
    #[arg(short, long)]
    grid: Option<String>,

    /// Callbook file path
    #[arg(short, long, default_value = "callbook.dat")]
    data: String,

    /// UDP port the modem broadcasts its JSON API on
    #[arg(short, long, default_value = "2242")]
    port: u16,

    /// Minutes of silence before a link is dropped
    #[arg(long, default_value = "15")]
    link_timeout: u64,

    /// Minutes of silence before a station starts fading
    #[arg(long, default_value = "30")]
    station_timeout: u64,

    /// Allow exploratory GRID?/HEARING? queries to be transmitted
    #[arg(long)]
    tx: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let mut config = NodeConfig::default()
        .with_callbook_path(&cli.data)
        .with_link_timeout(Duration::from_secs(cli.link_timeout * 60))
        .with_station_timeout(Duration::from_secs(cli.station_timeout * 60))
        .with_tx_enabled(cli.tx);
    config.port = cli.port;
    if let Some(call) = cli.call {
        config = config.with_station(call, cli.grid);
    } else if cli.grid.is_some() {
        warn!("--grid has no effect without --call");
    }

    let port = config.port;
    let station_timeout = config.station_timeout;
    let node = Arc::new(Node::new(config)?);
    let source = UdpActivitySource::bind(port)
        .await
        .with_context(|| format!("failed to bind UDP port {port}"))?;

    let (shutdown, _) = broadcast::channel(1);
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            let _ = ctrl_c_shutdown.send(());
        }
    });

    node.run(
        Box::new(source),
        Arc::new(LogTransmitter),
        Arc::new(LogRenderer::new(station_timeout)),
        shutdown,
    )
    .await?;

    Ok(())
}
