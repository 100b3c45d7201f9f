//! Client-Registry – Wer ist verbunden, unter welcher ID, auf welchem Kanal
//!
//! Jede Verbindung, die ein gueltiges JOIN sendet, bekommt einen Eintrag.
//! Eintraege werden waehrend der Server-Laufzeit nie entfernt; getrennte
//! Clients bleiben mit `online = false` erhalten, damit IDs eindeutig
//! bleiben.
//!
//! Alle Operationen nehmen eine einzige synchrone Sperre fuer ihre gesamte
//! Dauer. Unter der Sperre findet keine IO statt; `lookup` gibt deshalb eine
//! Kopie samt geklontem Kanal-Handle zurueck.

use std::collections::BTreeMap;
use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use postillon_core::ClientId;
use postillon_crypto::Kanal;
use postillon_protocol::stream::begrenzt;
use postillon_protocol::{write_record, Record, PAYLOAD_CAPACITY};
use thiserror::Error;
use tokio::io::WriteHalf;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Client nicht gefunden: {0}")]
    NotFound(ClientId),
}

// ---------------------------------------------------------------------------
// ChannelHandle
// ---------------------------------------------------------------------------

static NAECHSTE_VERBINDUNG: AtomicU64 = AtomicU64::new(1);

/// Geteilte Schreibseite eines Kanals
///
/// Schreibvorgaenge ueber alle Klone sind durch eine async Sperre
/// serialisiert. Die Verbindungsnummer ist prozessweit eindeutig.
#[derive(Clone)]
pub struct ChannelHandle {
    nummer: u64,
    schreiber: Arc<tokio::sync::Mutex<WriteHalf<Kanal>>>,
}

impl ChannelHandle {
    pub fn neu(schreiber: WriteHalf<Kanal>) -> Self {
        Self {
            nummer: NAECHSTE_VERBINDUNG.fetch_add(1, Ordering::Relaxed),
            schreiber: Arc::new(tokio::sync::Mutex::new(schreiber)),
        }
    }

    pub fn nummer(&self) -> u64 {
        self.nummer
    }

    /// Sperrt die Schreibseite exklusiv, hoechstens `frist` lang wartend
    ///
    /// Solange die Sperre gehalten wird, kann kein anderer Task auf diesen
    /// Kanal schreiben.
    pub async fn sperren(
        &self,
        frist: Option<Duration>,
    ) -> Option<tokio::sync::MutexGuard<'_, WriteHalf<Kanal>>> {
        match frist {
            Some(dauer) => tokio::time::timeout(dauer, self.schreiber.lock()).await.ok(),
            None => Some(self.schreiber.lock().await),
        }
    }

    /// Schreibt einen Record auf den eigenen Kanal
    ///
    /// Wartet ohne Frist auf die Sperre, etwa hinter einem laufenden Relay
    /// in diesen Kanal. Die Frist gilt nur fuer das Schreiben selbst.
    pub async fn senden(&self, record: &Record, frist: Option<Duration>) -> io::Result<()> {
        let mut schreiber = self.schreiber.lock().await;
        begrenzt(frist, write_record(&mut *schreiber, record)).await
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("nummer", &self.nummer)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Eintraege
// ---------------------------------------------------------------------------

/// Kopie eines Registry-Eintrags
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: ClientId,
    pub ip: IpAddr,
    /// Port fuer eingehende Direktverbindungen
    pub listen_port: u16,
    pub kanal: ChannelHandle,
    pub online: bool,
    /// Leer solange nicht angemeldet
    pub username: String,
}

/// Eine Zeile im Peer-Roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    pub username: String,
    pub id: ClientId,
    pub ip: IpAddr,
    pub port: u16,
}

impl std::fmt::Display for PeerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}:{}", self.username, self.id.inner(), self.ip, self.port)
    }
}

impl PeerEntry {
    /// Zeilenweises Roster, das in eine Record-Payload passt
    ///
    /// Zu lange Listen werden an einer Zeilengrenze abgeschnitten.
    pub fn roster(eintraege: &[PeerEntry]) -> String {
        let mut text = String::new();
        for eintrag in eintraege {
            let zeile = eintrag.to_string();
            let zusatz = if text.is_empty() { 0 } else { 1 };
            if text.len() + zusatz + zeile.len() > PAYLOAD_CAPACITY {
                tracing::debug!(gesamt = eintraege.len(), "Peer-Roster gekuerzt");
                break;
            }
            if zusatz == 1 {
                text.push('\n');
            }
            text.push_str(&zeile);
        }
        text
    }
}

// ---------------------------------------------------------------------------
// ClientRegistry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct RegistryInner {
    naechste_id: ClientId,
    sitzungen: BTreeMap<ClientId, SessionSnapshot>,
}

/// Thread-sichere Zuordnung ClientId -> Sitzung
#[derive(Debug)]
pub struct ClientRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

impl ClientRegistry {
    pub fn neu() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                naechste_id: ClientId::ERSTE,
                sitzungen: BTreeMap::new(),
            }),
        }
    }

    /// Legt eine neue Online-Sitzung an und vergibt die naechste ID
    pub fn register_session(&self, ip: IpAddr, listen_port: u16, kanal: ChannelHandle) -> ClientId {
        let mut inner = self.inner.lock();
        let id = inner.naechste_id;
        inner.naechste_id = id.naechste();
        inner.sitzungen.insert(
            id,
            SessionSnapshot {
                id,
                ip,
                listen_port,
                kanal,
                online: true,
                username: String::new(),
            },
        );
        id
    }

    /// Markiert die Sitzung mit diesem Kanal als offline
    pub fn mark_offline(&self, kanal: &ChannelHandle) -> Option<ClientId> {
        let mut inner = self.inner.lock();
        inner
            .sitzungen
            .values_mut()
            .find(|s| s.kanal.nummer() == kanal.nummer())
            .map(|s| {
                s.online = false;
                s.id
            })
    }

    /// Setzt Benutzername und Online-Status nach erfolgreichem Login
    pub fn set_authenticated(&self, id: ClientId, username: &str) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let sitzung = inner.sitzungen.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        sitzung.username = username.to_string();
        sitzung.online = true;
        Ok(())
    }

    /// Loescht den Benutzernamen und setzt die Sitzung offline
    pub fn clear_authenticated(&self, id: ClientId) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let sitzung = inner.sitzungen.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        sitzung.username.clear();
        sitzung.online = false;
        Ok(())
    }

    pub fn lookup(&self, id: ClientId) -> Result<SessionSnapshot, RegistryError> {
        self.inner
            .lock()
            .sitzungen
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    /// Alle angemeldeten Online-Sitzungen, nach ID sortiert
    pub fn snapshot_online_named(&self) -> Vec<PeerEntry> {
        self.inner
            .lock()
            .sitzungen
            .values()
            .filter(|s| s.online && !s.username.is_empty())
            .map(|s| PeerEntry {
                username: s.username.clone(),
                id: s.id,
                ip: s.ip,
                port: s.listen_port,
            })
            .collect()
    }

    /// Anzahl aller jemals registrierten Sitzungen
    pub fn len(&self) -> usize {
        self.inner.lock().sitzungen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn online_count(&self) -> usize {
        self.inner.lock().sitzungen.values().filter(|s| s.online).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
