//! Ereignisse aus den Empfangs-Tasks
//!
//! Server- und Direkt-Listener melden alles, was der Benutzer sehen soll,
//! ueber einen Kanal an die Kommandozeile. Die `Display`-Ausgabe ist der
//! Text, der auf stdout landet.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use postillon_core::ClientId;
use postillon_protocol::RecordKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ereignis {
    Chat { from: ClientId, text: String },
    PeerInfo(String),
    /// RESPONSE des Servers
    Antwort(String),
    Angemeldet(String),
    DirektNachricht { peer: SocketAddr, text: String },
    DateiEmpfangen { pfad: PathBuf, bytes: u64 },
    TransferFehlgeschlagen(String),
    /// Ein Stream liegt vollstaendig in der Queue
    StreamEmpfangen { kind: RecordKind, frames: u64 },
    StreamFehlgeschlagen(String),
    WiedergabeBeendet { pfad: PathBuf, frames: u64 },
    WiedergabeFehlgeschlagen(String),
    Unbekannt(RecordKind),
    ServerGetrennt,
}

impl fmt::Display for Ereignis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ereignis::Chat { from, text } => write!(f, "Received chat from {}: {text}", from.inner()),
            Ereignis::PeerInfo(liste) if liste.is_empty() => write!(f, "Peer info: (niemand angemeldet)"),
            Ereignis::PeerInfo(liste) => write!(f, "Peer info:\n{liste}"),
            Ereignis::Antwort(text) => write!(f, "Server: {text}"),
            Ereignis::Angemeldet(name) => write!(f, "Angemeldet als {name}"),
            Ereignis::DirektNachricht { peer, text } => {
                write!(f, "Direct message received from {peer}: {text}")
            }
            Ereignis::DateiEmpfangen { pfad, bytes } => {
                write!(f, "Datei empfangen: {} ({bytes} Bytes)", pfad.display())
            }
            Ereignis::TransferFehlgeschlagen(grund) => write!(f, "Dateiempfang fehlgeschlagen: {grund}"),
            Ereignis::StreamEmpfangen { kind, frames } => {
                write!(f, "{kind} empfangen: {frames} Frames (receive_streaming zum Abspielen)")
            }
            Ereignis::StreamFehlgeschlagen(grund) => write!(f, "Stream abgebrochen: {grund}"),
            Ereignis::WiedergabeBeendet { pfad, frames } => {
                write!(f, "Wiedergabe beendet: {frames} Frames nach {}", pfad.display())
            }
            Ereignis::WiedergabeFehlgeschlagen(grund) => write!(f, "Wiedergabe fehlgeschlagen: {grund}"),
            Ereignis::Unbekannt(kind) => write!(f, "Unknown message type: {kind}"),
            Ereignis::ServerGetrennt => write!(f, "Disconnected from server."),
        }
    }
}
