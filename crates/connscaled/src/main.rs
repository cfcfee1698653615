//! connscaled: the connscale daemon.
//!
//! Single binary that assembles the monitor and its surroundings:
//! - Connection monitor (watch registry, live thresholds, hysteresis)
//! - Signal consumer (JSON lines on stdout, optional gate re-arm)
//! - REST API for registration, thresholds, gates and event ingestion
//! - Optional line-delimited JSON event ingestion on stdin
//!
//! # Usage
//!
//! ```text
//! connscaled run --config /etc/connscale/connscale.toml --port 9400
//! connscaled scaffold > connscale.toml
//! ```

mod consumer;
mod ingest;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use connscale_core::ConnscaleConfig;
use connscale_monitor::ConnectionMonitor;

use crate::consumer::SignalConsumer;

const DEFAULT_LOG_FILTER: &str = "info,connscaled=debug,connscale=debug";

#[derive(Parser)]
#[command(name = "connscaled", about = "connscale daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitor and its API server.
    Run {
        /// Path to connscale.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port for the REST API.
        #[arg(long, default_value = "9400")]
        port: u16,

        /// Also read line-delimited JSON events from stdin.
        #[arg(long)]
        stdin_events: bool,
    },
    /// Print a starter connscale.toml.
    Scaffold,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // Logs go to stderr; stdout carries consumed signals.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run {
            config,
            port,
            stdin_events,
        } => run(config, port, stdin_events).await,
        Command::Scaffold => {
            print!("{}", ConnscaleConfig::scaffold().to_toml_string()?);
            Ok(())
        }
    }
}

async fn run(config_path: Option<PathBuf>, port: u16, stdin_events: bool) -> anyhow::Result<()> {
    info!("connscale daemon starting");

    // ── Configuration ──────────────────────────────────────────

    let config = match &config_path {
        Some(path) => ConnscaleConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConnscaleConfig::default(),
    };
    let rearm_after = config.consumer.rearm_after()?;

    // ── Monitor ────────────────────────────────────────────────

    let (monitor, stream) = ConnectionMonitor::new(&config.monitor);
    let monitor = match config.thresholds {
        Some(thresholds) => {
            info!(
                lower_limit = thresholds.lower_limit,
                upper_limit = thresholds.upper_limit,
                buffer_length = thresholds.buffer_length,
                "thresholds loaded"
            );
            monitor.with_thresholds(thresholds)?
        }
        None => {
            warn!("no thresholds configured, events are ignored until set via the API");
            monitor
        }
    };
    let monitor = Arc::new(monitor);

    for key in &config.watch.keys {
        monitor
            .register(*key)
            .with_context(|| format!("pre-registering {key}"))?;
    }
    info!(
        keys = config.watch.keys.len(),
        gate = ?config.monitor.gate,
        max_keys = config.monitor.max_keys,
        signal_slots = config.monitor.signal_slots,
        "monitor initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let consumer = SignalConsumer::new(Arc::clone(&monitor), stream).with_rearm_after(rearm_after);
    let consumer_handle = tokio::spawn(consumer.run(shutdown_rx.clone()));

    let ingest_handle = stdin_events.then(|| {
        let monitor = Arc::clone(&monitor);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = ingest::ingest_stdin(monitor, shutdown).await {
                tracing::error!(error = %e, "stdin event ingestion failed");
            }
        })
    });

    // ── Start API server ───────────────────────────────────────

    let router = connscale_api::build_router(Arc::clone(&monitor));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = consumer_handle.await;
    if let Some(handle) = ingest_handle {
        let _ = handle.await;
    }

    info!("connscale daemon stopped");
    Ok(())
}
