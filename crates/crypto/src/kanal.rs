//! Gesicherter Kanal als austauschbare Abstraktion
//!
//! Server und Client sehen nur einen `Kanal` (Byte-Stream). Ob darunter TLS
//! oder Klartext laeuft, entscheidet die Implementierung von
//! `ChannelAcceptor` bzw. `ChannelConnector`.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Alles, was als bidirektionaler Byte-Stream taugt
pub trait KanalStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> KanalStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Ein aufgebauter, ggf. verschluesselter Kanal
pub type Kanal = Box<dyn KanalStream>;

/// Serverseitiger Handshake auf einer angenommenen TCP-Verbindung
#[async_trait]
pub trait ChannelAcceptor: Send + Sync {
    async fn accept(&self, stream: TcpStream) -> io::Result<Kanal>;

    /// Kurzname fuer Logs
    fn bezeichnung(&self) -> &'static str;
}

/// Clientseitiger Handshake auf einer ausgehenden TCP-Verbindung
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self, stream: TcpStream, server_name: &str) -> io::Result<Kanal>;

    fn bezeichnung(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Klartext (Entwicklung und Tests)
// ---------------------------------------------------------------------------

/// Reicht die TCP-Verbindung unverschluesselt durch
#[derive(Debug, Clone, Copy, Default)]
pub struct KlartextAcceptor;

#[async_trait]
impl ChannelAcceptor for KlartextAcceptor {
    async fn accept(&self, stream: TcpStream) -> io::Result<Kanal> {
        Ok(Box::new(stream))
    }

    fn bezeichnung(&self) -> &'static str {
        "klartext"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KlartextConnector;

#[async_trait]
impl ChannelConnector for KlartextConnector {
    async fn connect(&self, stream: TcpStream, _server_name: &str) -> io::Result<Kanal> {
        Ok(Box::new(stream))
    }

    fn bezeichnung(&self) -> &'static str {
        "klartext"
    }
}
