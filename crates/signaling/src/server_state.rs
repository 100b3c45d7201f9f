//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt alle geteilten Services als Arc-Referenzen, die sicher zwischen
//! tokio-Tasks geteilt werden koennen.

use std::sync::Arc;
use std::time::Duration;

use postillon_auth::CredentialStore;
use postillon_crypto::ChannelAcceptor;

use crate::registry::ClientRegistry;
use crate::router::RelayRouter;

/// Zeitlimits einer Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zeitlimits {
    /// Maximale Dauer des TLS-Handshakes
    pub handshake: Duration,
    /// Maximale Wartezeit auf das JOIN nach dem Handshake
    pub join: Duration,
    /// Maximale Pause zwischen zwei Records (`None` = unbegrenzt)
    pub leerlauf: Option<Duration>,
    /// Frist fuer jeden Schreibvorgang auf einen fremden Kanal
    pub schreiben: Option<Duration>,
}

impl Default for Zeitlimits {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(10),
            join: Duration::from_secs(10),
            leerlauf: None,
            schreiben: Some(Duration::from_secs(10)),
        }
    }
}

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Anzahl Worker-Tasks (gleichzeitig bediente Sitzungen)
    pub worker_count: usize,
    /// Listen-Backlog des TCP-Sockets
    pub max_pending: u32,
    pub zeitlimits: Zeitlimits,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            max_pending: 10,
            zeitlimits: Zeitlimits::default(),
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Verbundene Clients
    pub registry: Arc<ClientRegistry>,
    /// Registrierte Benutzer
    pub credentials: Arc<CredentialStore>,
    /// Weiterleitung an andere Clients
    pub router: RelayRouter,
    /// Handshake fuer neue Verbindungen
    pub acceptor: Arc<dyn ChannelAcceptor>,
}

impl SignalingState {
    pub fn neu(
        config: SignalingConfig,
        credentials: Arc<CredentialStore>,
        acceptor: Arc<dyn ChannelAcceptor>,
    ) -> Self {
        let registry = Arc::new(ClientRegistry::neu());
        let router = RelayRouter::neu(Arc::clone(&registry), config.zeitlimits.schreiben);
        Self {
            config: Arc::new(config),
            registry,
            credentials,
            router,
            acceptor,
        }
    }
}

impl std::fmt::Debug for SignalingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingState")
            .field("config", &self.config)
            .field("clients", &self.registry.len())
            .field("kanal", &self.acceptor.bezeichnung())
            .finish()
    }
}
