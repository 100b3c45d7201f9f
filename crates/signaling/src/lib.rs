//! postillon-signaling – Sitzungs- und Relay-Service
//!
//! Dieser Crate implementiert den Server-Teil von Postillon: Verbindungen
//! annehmen, Clients registrieren, Benutzer anmelden und Chats, Dateien
//! und Streams zwischen Clients weiterleiten.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |  Handshake (ChannelAcceptor)
//!     v
//! WorkerPool  --  ein Worker bedient eine ClientSession
//!     |  WartetAufJoin -> Aktiv -> Geschlossen
//!     v
//! MessageDispatcher
//!     |
//!     +-- AuthHandler   (Register, Login, Logout)
//!     +-- ChatHandler   (Chat)
//!     +-- PeerHandler   (Request-Peer)
//!     +-- RelayHandler  (Dateien, Streams)
//!
//! ClientRegistry – ID, Adresse, Kanal und Anmeldestatus je Client
//! RelayRouter    – Zustellung an den Kanal eines anderen Clients
//! ```

pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod pool;
pub mod registry;
pub mod router;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use connection::{ClientSession, SessionZustand};
pub use dispatcher::{MessageDispatcher, SessionKontext};
pub use error::{SignalingError, SignalingResult};
pub use pool::{PoolError, WorkerPool};
pub use registry::{ChannelHandle, ClientRegistry, PeerEntry, RegistryError, SessionSnapshot};
pub use router::{RelayRouter, TransferRelay, Zustellung};
pub use server_state::{SignalingConfig, SignalingState, Zeitlimits};
pub use tcp::SignalingServer;
