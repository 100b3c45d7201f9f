//! Postillon Client – Einstiegspunkt
//!
//! Liest Befehle zeilenweise von stdin und gibt Ereignisse auf stdout aus.
//! Logs gehen nach stderr.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use postillon_client::config::{ClientConfig, STANDARD_CONFIG_PFAD};
use postillon_client::{Befehl, Client, Ereignis, ParseFehler, Steuerung};
use postillon_observability::{logging_initialisieren, LogAusgabe};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Postillon Client
#[derive(Debug, Parser)]
#[command(name = "postillon-client", version, about)]
struct Cli {
    /// IP-Adresse des Servers
    server_ip: IpAddr,
    /// Port des Servers
    server_port: u16,
    /// Port fuer eingehende Direktverbindungen (0 = beliebig)
    my_listen_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_pfad = std::env::var("POSTILLON_CLIENT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(STANDARD_CONFIG_PFAD));
    let config = ClientConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, config.logging.format, LogAusgabe::Stderr);

    let server = SocketAddr::new(cli.server_ip, cli.server_port);
    let (mut client, mut ereignisse) = Client::starten(config, server, cli.my_listen_port)
        .await
        .with_context(|| format!("Verbindung zu {server} fehlgeschlagen"))?;

    println!(
        "Verbunden mit {server} als Client {} (Direkt-Port {}). 'help' zeigt alle Befehle.",
        client.id().inner(),
        client.direkt_adresse().port()
    );

    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            zeile = zeilen.next_line() => {
                let zeile = match zeile {
                    Ok(Some(zeile)) => zeile,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(fehler = %e, "stdin nicht lesbar");
                        break;
                    }
                };
                let befehl = match Befehl::parse(&zeile) {
                    Ok(befehl) => befehl,
                    Err(ParseFehler::Leer) => continue,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                match client.ausfuehren(befehl).await {
                    Ok(Steuerung::Beenden) => break,
                    Ok(Steuerung::Weiter(Some(ausgabe))) => println!("{ausgabe}"),
                    Ok(Steuerung::Weiter(None)) => {}
                    Err(e) => println!("Fehler: {e}"),
                }
            }
            ereignis = ereignisse.recv() => match ereignis {
                Some(Ereignis::ServerGetrennt) | None => {
                    println!("{}", Ereignis::ServerGetrennt);
                    break;
                }
                Some(ereignis) => println!("{ereignis}"),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.beenden().await;
    Ok(())
}
