//! Direktmodus – Verbindungen zwischen Clients ohne Server
//!
//! Jeder Client lauscht auf seinem Listen-Port. Eingehende Verbindungen
//! werden nacheinander bedient: Handshake, Records bis EOF, dann die
//! naechste. Ausgehend wird pro Befehl eine neue Verbindung aufgebaut.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use postillon_core::ClientId;
use postillon_crypto::{ChannelAcceptor, ChannelConnector, Kanal};
use postillon_protocol::read_record;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::empfang::{record_verarbeiten, EmpfangsKontext, Herkunft};
use crate::error::ClientResult;

/// Im Direktmodus ist die ID des Gegenuebers unbekannt
pub const UNBEKANNTE_ID: ClientId = ClientId(0);

const HANDSHAKE_FRIST: Duration = Duration::from_secs(10);

/// Pause, nach der eine stille Direktverbindung aufgegeben wird
const LEERLAUF_FRIST: Duration = Duration::from_secs(60);

pub struct DirektListener {
    listener: TcpListener,
    acceptor: Arc<dyn ChannelAcceptor>,
}

impl DirektListener {
    /// Bindet auf allen Schnittstellen
    pub async fn binden(port: u16, acceptor: Arc<dyn ChannelAcceptor>) -> ClientResult<Self> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        tracing::info!(adresse = %listener.local_addr()?, "Direkt-Listener gebunden");
        Ok(Self { listener, acceptor })
    }

    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Nimmt Verbindungen an, bis `token` ausloest
    pub async fn lauschen(self, ctx: EmpfangsKontext, token: CancellationToken) {
        loop {
            let angenommen = tokio::select! {
                _ = token.cancelled() => break,
                r = self.listener.accept() => r,
            };
            match angenommen {
                Ok((stream, peer)) => {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = self.bedienen(stream, peer, &ctx) => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(fehler = %e, "Direkt-Accept fehlgeschlagen");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
        tracing::debug!("Direkt-Listener beendet");
    }

    async fn bedienen(&self, stream: TcpStream, peer: SocketAddr, ctx: &EmpfangsKontext) {
        let mut kanal = match tokio::time::timeout(HANDSHAKE_FRIST, self.acceptor.accept(stream)).await {
            Ok(Ok(kanal)) => kanal,
            Ok(Err(e)) => {
                tracing::warn!(peer = %peer, fehler = %e, "Direkt-Handshake fehlgeschlagen");
                return;
            }
            Err(_) => {
                tracing::warn!(peer = %peer, "Direkt-Handshake-Timeout");
                return;
            }
        };

        loop {
            let record = match tokio::time::timeout(LEERLAUF_FRIST, read_record(&mut kanal)).await {
                Ok(Ok(record)) => record,
                Ok(Err(e)) => {
                    tracing::debug!(peer = %peer, fehler = %e, "Direktverbindung beendet");
                    return;
                }
                Err(_) => {
                    tracing::debug!(peer = %peer, "Direktverbindung still, wird geschlossen");
                    return;
                }
            };
            if let Err(e) = record_verarbeiten(record, &mut kanal, Herkunft::Direkt(peer), ctx).await {
                tracing::warn!(peer = %peer, fehler = %e, "Direktverbindung abgebrochen");
                return;
            }
        }
    }
}

/// Baut ausgehende Direktverbindungen auf
pub struct DirektVerbinder {
    connector: Arc<dyn ChannelConnector>,
    server_name: String,
}

impl DirektVerbinder {
    pub fn neu(connector: Arc<dyn ChannelConnector>, server_name: impl Into<String>) -> Self {
        Self {
            connector,
            server_name: server_name.into(),
        }
    }

    pub async fn verbinden(&self, ziel: SocketAddr) -> ClientResult<Kanal> {
        let stream = TcpStream::connect(ziel).await?;
        Ok(self.connector.connect(stream, &self.server_name).await?)
    }
}
