//! TCP-Listener – bindet den Socket und nimmt Verbindungen an
//!
//! Der Accept-Task fuehrt fuer jede Verbindung den Kanal-Handshake in einem
//! eigenen kurzlebigen Task aus und reicht die fertige Sitzung an den
//! Worker-Pool weiter. Ein Worker bedient genau eine Sitzung bis zu deren
//! Ende.
//!
//! ## Shutdown
//! Wird das Shutdown-Token ausgeloest, nimmt der Listener keine neuen
//! Verbindungen mehr an. Laufende Sitzungen haengen an Kind-Tokens und
//! beenden sich; danach wird der Pool gestoppt.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::connection::ClientSession;
use crate::error::SignalingResult;
use crate::pool::WorkerPool;
use crate::server_state::SignalingState;

/// TCP-Signaling-Server
pub struct SignalingServer {
    state: Arc<SignalingState>,
    listener: TcpListener,
    pool: Arc<WorkerPool>,
}

impl SignalingServer {
    /// Bindet den Socket mit `max_pending` als Backlog und startet den Pool
    ///
    /// Muss innerhalb einer tokio-Runtime aufgerufen werden.
    pub fn binden(state: Arc<SignalingState>, adresse: SocketAddr) -> SignalingResult<Self> {
        let socket = if adresse.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(adresse)?;
        let listener = socket.listen(state.config.max_pending.max(1))?;

        let pool = Arc::new(WorkerPool::start(state.config.worker_count));

        tracing::info!(
            adresse = %listener.local_addr()?,
            backlog = state.config.max_pending,
            worker = pool.worker_count(),
            kanal = state.acceptor.bezeichnung(),
            "Signaling-Server gebunden"
        );

        Ok(Self {
            state,
            listener,
            pool,
        })
    }

    /// Tatsaechlich gebundene Adresse (Port 0 wird hier aufgeloest)
    pub fn lokale_adresse(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> &Arc<SignalingState> {
        &self.state
    }

    /// Nimmt Verbindungen an, bis `shutdown` ausgeloest wird
    pub async fn starten(self, shutdown: CancellationToken) -> SignalingResult<()> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Signaling-Server: Shutdown-Signal empfangen");
                    break;
                }
                ergebnis = self.listener.accept() => match ergebnis {
                    Ok((stream, peer_addr)) => {
                        tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");
                        self.annehmen(stream, peer_addr, shutdown.child_token());
                    }
                    Err(e) => {
                        tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
            }
        }

        drop(self.listener);
        self.pool.stop().await;
        tracing::info!(
            clients = self.state.registry.len(),
            "Signaling-Server gestoppt"
        );
        Ok(())
    }

    /// Handshake ausfuehren und die Sitzung in die Pool-Queue stellen
    fn annehmen(&self, stream: TcpStream, peer_addr: SocketAddr, token: CancellationToken) {
        let state = Arc::clone(&self.state);
        let pool = Arc::clone(&self.pool);

        tokio::spawn(async move {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
            }

            let handshake = tokio::time::timeout(
                state.config.zeitlimits.handshake,
                state.acceptor.accept(stream),
            );
            let kanal = tokio::select! {
                _ = token.cancelled() => return,
                ergebnis = handshake => match ergebnis {
                    Ok(Ok(kanal)) => kanal,
                    Ok(Err(e)) => {
                        tracing::warn!(peer = %peer_addr, fehler = %e, "Handshake fehlgeschlagen");
                        return;
                    }
                    Err(_) => {
                        tracing::warn!(peer = %peer_addr, "Handshake-Timeout");
                        return;
                    }
                },
            };

            let sitzung = ClientSession::neu(state, peer_addr, token);
            let aufgabe = async move {
                sitzung.verarbeiten(kanal).await;
            };
            if let Err(e) = pool.add_task(aufgabe) {
                tracing::warn!(peer = %peer_addr, fehler = %e, "Sitzung nicht angenommen");
            }
        });
    }
}
