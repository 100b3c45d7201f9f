//! postillon-client – interaktiver Client
//!
//! Verbindet sich mit dem Relay-Server, nimmt gleichzeitig Direkt-
//! verbindungen anderer Clients an und fuehrt Befehle der Kommandozeile aus.
//!
//! ## Module
//! - `client` - Sitzung und Befehlsausfuehrung
//! - `commands` - Parser fuer Befehlszeilen
//! - `connection` - Serververbindung und JOIN
//! - `direct` - Direkt-Listener und ausgehende Direktverbindungen
//! - `empfang` - Verarbeitung eingehender Records
//! - `ereignis` - Meldungen an die Kommandozeile
//! - `media` - Datei als Frame-Quelle und -Senke

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod direct;
pub mod empfang;
pub mod ereignis;
pub mod error;
pub mod media;

pub use client::{Client, Steuerung};
pub use commands::{Befehl, ParseFehler, HILFE};
pub use config::ClientConfig;
pub use ereignis::Ereignis;
pub use error::{ClientError, ClientResult};
