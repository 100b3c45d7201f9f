//! Postillon Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use postillon_observability::{logging_initialisieren, LogAusgabe};
use postillon_server::config::{ServerConfig, STANDARD_CONFIG_PFAD};
use postillon_server::Server;
use tokio_util::sync::CancellationToken;

/// Postillon Relay-Server
#[derive(Debug, Parser)]
#[command(name = "postillon-server", version, about)]
struct Cli {
    /// TCP-Port
    port: u16,
    /// Listen-Backlog [Standard: 10]
    max_pending_connections: Option<u32>,
    /// Anzahl Worker [Standard: 10]
    worker_count: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("POSTILLON_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(STANDARD_CONFIG_PFAD));

    let mut config = ServerConfig::laden(&config_pfad)?;
    config.cli_anwenden(cli.port, cli.max_pending_connections, cli.worker_count);

    logging_initialisieren(&config.logging.level, config.logging.format, LogAusgabe::Stdout);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad.display(),
        port = config.server.port,
        "Postillon Server wird initialisiert"
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(fehler = %e, "Ctrl-C-Handler nicht verfuegbar");
            return;
        }
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
        signal.cancel();
    });

    if let Err(e) = Server::neu(config).starten(shutdown).await {
        tracing::error!(fehler = %format!("{e:#}"), "Serverstart fehlgeschlagen");
        return Err(e);
    }
    Ok(())
}
