//! Client-Sitzung – Zustandsmaschine einer Verbindung
//!
//! ## Zustaende
//! ```text
//! WartetAufJoin --JOIN--> Aktiv --Trennung/Timeout/Shutdown--> Geschlossen
//!       |
//!       +--kein JOIN, Timeout--> Geschlossen
//! ```
//!
//! ## Zeitlimits
//! - Das JOIN muss innerhalb von `zeitlimits.join` eintreffen
//! - Im Zustand `Aktiv` darf zwischen zwei Records hoechstens
//!   `zeitlimits.leerlauf` vergehen (falls gesetzt)
//!
//! Laufende Subprotokolle (Transfer, Stream) sind nur durch den Shutdown
//! begrenzt, nicht durch das Leerlauf-Limit.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use postillon_core::ClientId;
use postillon_crypto::Kanal;
use postillon_protocol::{read_record, ClientRequest, Record, RecordKind};
use tokio::io::{AsyncRead, ReadHalf};
use tokio_util::sync::CancellationToken;

use crate::dispatcher::{MessageDispatcher, SessionKontext};
use crate::registry::ChannelHandle;
use crate::server_state::SignalingState;

/// Zustand einer Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionZustand {
    WartetAufJoin,
    Aktiv,
    Geschlossen,
}

/// Eine Sitzung pro angenommener Verbindung
pub struct ClientSession {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
    token: CancellationToken,
    zustand: SessionZustand,
}

impl ClientSession {
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr, token: CancellationToken) -> Self {
        Self {
            state,
            peer_addr,
            token,
            zustand: SessionZustand::WartetAufJoin,
        }
    }

    pub fn zustand(&self) -> SessionZustand {
        self.zustand
    }

    /// Bedient die Verbindung bis zur Trennung und gibt den Endzustand zurueck
    pub async fn verarbeiten(mut self, kanal: Kanal) -> SessionZustand {
        let peer = self.peer_addr;
        let (mut leser, schreiber) = tokio::io::split(kanal);
        let handle = ChannelHandle::neu(schreiber);

        let Some(client_id) = self.join_abwarten(&mut leser, &handle).await else {
            self.zustand = SessionZustand::Geschlossen;
            return self.zustand;
        };
        self.zustand = SessionZustand::Aktiv;

        let mut ctx = SessionKontext {
            client_id,
            peer_addr: peer,
            username: None,
            kanal: handle.clone(),
        };
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));
        let leerlauf = self.state.config.zeitlimits.leerlauf;

        loop {
            let gelesen = tokio::select! {
                _ = self.token.cancelled() => {
                    tracing::info!(peer = %peer, client_id = client_id.inner(), "Shutdown – Verbindung wird getrennt");
                    break;
                }
                r = lesen_begrenzt(&mut leser, leerlauf) => r,
            };

            let record = match gelesen {
                Ok(record) => record,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::info!(peer = %peer, client_id = client_id.inner(), "Verbindung vom Client getrennt");
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    tracing::warn!(peer = %peer, client_id = client_id.inner(), "Leerlauf-Timeout");
                    break;
                }
                Err(e) => {
                    tracing::warn!(peer = %peer, client_id = client_id.inner(), fehler = %e, "Lesefehler");
                    break;
                }
            };

            let ergebnis = tokio::select! {
                _ = self.token.cancelled() => break,
                r = dispatcher.dispatch(record, &mut leser, &mut ctx) => r,
            };
            if let Err(e) = ergebnis {
                tracing::warn!(peer = %peer, client_id = client_id.inner(), fehler = %e, "Sitzung abgebrochen");
                break;
            }
        }

        self.state.registry.mark_offline(&handle);
        self.zustand = SessionZustand::Geschlossen;
        tracing::debug!(
            peer = %peer,
            client_id = client_id.inner(),
            online = self.state.registry.online_count(),
            "Sitzung beendet"
        );
        self.zustand
    }

    /// Liest das JOIN, registriert die Sitzung und bestaetigt die ID
    async fn join_abwarten(
        &self,
        leser: &mut ReadHalf<Kanal>,
        handle: &ChannelHandle,
    ) -> Option<ClientId> {
        let peer = self.peer_addr;
        let zeitlimits = self.state.config.zeitlimits;

        let gelesen = tokio::select! {
            _ = self.token.cancelled() => return None,
            r = lesen_begrenzt(leser, Some(zeitlimits.join)) => r,
        };
        let record = match gelesen {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(peer = %peer, fehler = %e, "Kein JOIN empfangen");
                return None;
            }
        };

        let listen_port = match ClientRequest::from_record(record) {
            ClientRequest::Join { listen_port } => listen_port,
            ClientRequest::Malformed { grund, .. } => {
                tracing::warn!(peer = %peer, grund = %grund, "Ungueltiges JOIN");
                return None;
            }
            andere => {
                tracing::warn!(peer = %peer, anfrage = ?andere, "Erster Record ist kein JOIN");
                return None;
            }
        };

        let client_id = self
            .state
            .registry
            .register_session(peer.ip(), listen_port, handle.clone());

        let bestaetigung = Record::leer(RecordKind::Join, ClientId::SERVER, client_id);
        if let Err(e) = handle.senden(&bestaetigung, zeitlimits.schreiben).await {
            tracing::warn!(peer = %peer, client_id = client_id.inner(), fehler = %e, "JOIN-Bestaetigung fehlgeschlagen");
            self.state.registry.mark_offline(handle);
            return None;
        }

        tracing::info!(
            peer = %peer,
            client_id = client_id.inner(),
            listen_port,
            "Client beigetreten"
        );
        Some(client_id)
    }
}

/// Liest einen Record, hoechstens `frist` lang
async fn lesen_begrenzt<R>(leser: &mut R, frist: Option<Duration>) -> io::Result<Record>
where
    R: AsyncRead + Unpin,
{
    match frist {
        Some(dauer) => tokio::time::timeout(dauer, read_record(leser))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "Zeitlimit beim Lesen"))?,
        None => read_record(leser).await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
