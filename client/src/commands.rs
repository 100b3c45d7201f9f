//! Befehle der interaktiven Kommandozeile
//!
//! Eine Zeile wird in einen `Befehl` uebersetzt; die Ausfuehrung liegt in
//! `client.rs`.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use postillon_core::ClientId;
use postillon_protocol::Zugangsdaten;
use thiserror::Error;

pub const HILFE: &str = "\
Befehle:
  quit                                      Beenden
  whoami                                    Eigene ID und Benutzername
  register <user> <pass>                    Konto anlegen
  login <user> <pass>                       Anmelden
  logout                                    Abmelden
  chat <to_id> <message>                    Nachricht ueber den Server
  request_peer <to_id>                      Liste der angemeldeten Clients
  direct_send <ip> <port> <message>         Nachricht direkt an einen Client
  direct_send_file <ip> <port> <path>       Datei direkt senden
  relay_send_file <to_id> <path>            Datei ueber den Server senden
  direct_streaming <ip> <port> <path>       Datei als Video-Stream direkt senden
  relay_streaming <to_id> <path>            Datei als Stream ueber den Server senden
  receive_streaming                         Empfangene Streams wiedergeben
  direct_audio_streaming <ip> <port> <path> Datei als Audio-Stream direkt senden
  help                                      Diese Hilfe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Befehl {
    Quit,
    Whoami,
    Help,
    Register(Zugangsdaten),
    Login(Zugangsdaten),
    Logout,
    Chat { to: ClientId, text: String },
    RequestPeer { to: ClientId },
    DirectSend { ziel: SocketAddr, text: String },
    DirectSendFile { ziel: SocketAddr, pfad: PathBuf },
    RelaySendFile { to: ClientId, pfad: PathBuf },
    DirectStreaming { ziel: SocketAddr, pfad: PathBuf },
    RelayStreaming { to: ClientId, pfad: PathBuf },
    ReceiveStreaming,
    DirectAudioStreaming { ziel: SocketAddr, pfad: PathBuf },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseFehler {
    #[error("Leere Eingabe")]
    Leer,

    #[error("Unknown command: {0}")]
    Unbekannt(String),

    #[error("Usage: {0}")]
    Nutzung(&'static str),
}

/// Trennt am ersten Leerzeichen; der Rest behaelt innere Leerzeichen
fn kopf(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((kopf, rest)) => (kopf, rest.trim_start()),
        None => (text, ""),
    }
}

fn client_id(text: &str) -> Option<ClientId> {
    text.parse::<i32>().ok().map(ClientId)
}

/// `<ip> <port> <rest>` mit nicht-leerem Rest
fn direkt_ziel(rest: &str) -> Option<(SocketAddr, &str)> {
    let (ip, rest) = kopf(rest);
    let (port, rest) = kopf(rest);
    let ip: IpAddr = ip.parse().ok()?;
    let port: u16 = port.parse().ok()?;
    (!rest.is_empty()).then_some((SocketAddr::new(ip, port), rest))
}

/// `<to_id> <rest>` mit nicht-leerem Rest
fn relay_ziel(rest: &str) -> Option<(ClientId, &str)> {
    let (to, rest) = kopf(rest);
    let to = client_id(to)?;
    (!rest.is_empty()).then_some((to, rest))
}

impl Befehl {
    pub fn parse(zeile: &str) -> Result<Befehl, ParseFehler> {
        let zeile = zeile.trim_end_matches(['\r', '\n']);
        let (befehl, rest) = kopf(zeile);
        use ParseFehler::Nutzung;

        let ergebnis = match befehl {
            "" => return Err(ParseFehler::Leer),
            "quit" => Befehl::Quit,
            "whoami" => Befehl::Whoami,
            "help" => Befehl::Help,
            "logout" => Befehl::Logout,
            "receive_streaming" => Befehl::ReceiveStreaming,
            "register" => Befehl::Register(
                Zugangsdaten::parse(rest).map_err(|_| Nutzung("register <user> <pass>"))?,
            ),
            "login" => Befehl::Login(
                Zugangsdaten::parse(rest).map_err(|_| Nutzung("login <user> <pass>"))?,
            ),
            "chat" => {
                let (to, text) = relay_ziel(rest).ok_or(Nutzung("chat <to_id> <message>"))?;
                Befehl::Chat {
                    to,
                    text: text.to_string(),
                }
            }
            "request_peer" => {
                let to = client_id(rest.trim()).ok_or(Nutzung("request_peer <to_id>"))?;
                Befehl::RequestPeer { to }
            }
            "direct_send" => {
                let (ziel, text) =
                    direkt_ziel(rest).ok_or(Nutzung("direct_send <ip> <port> <message>"))?;
                Befehl::DirectSend {
                    ziel,
                    text: text.to_string(),
                }
            }
            "direct_send_file" => {
                let (ziel, pfad) =
                    direkt_ziel(rest).ok_or(Nutzung("direct_send_file <ip> <port> <path>"))?;
                Befehl::DirectSendFile {
                    ziel,
                    pfad: PathBuf::from(pfad.trim_end()),
                }
            }
            "relay_send_file" => {
                let (to, pfad) =
                    relay_ziel(rest).ok_or(Nutzung("relay_send_file <to_id> <path>"))?;
                Befehl::RelaySendFile {
                    to,
                    pfad: PathBuf::from(pfad.trim_end()),
                }
            }
            "direct_streaming" => {
                let (ziel, pfad) =
                    direkt_ziel(rest).ok_or(Nutzung("direct_streaming <ip> <port> <path>"))?;
                Befehl::DirectStreaming {
                    ziel,
                    pfad: PathBuf::from(pfad.trim_end()),
                }
            }
            "relay_streaming" => {
                let (to, pfad) =
                    relay_ziel(rest).ok_or(Nutzung("relay_streaming <to_id> <path>"))?;
                Befehl::RelayStreaming {
                    to,
                    pfad: PathBuf::from(pfad.trim_end()),
                }
            }
            "direct_audio_streaming" => {
                let (ziel, pfad) = direkt_ziel(rest)
                    .ok_or(Nutzung("direct_audio_streaming <ip> <port> <path>"))?;
                Befehl::DirectAudioStreaming {
                    ziel,
                    pfad: PathBuf::from(pfad.trim_end()),
                }
            }
            andere => return Err(ParseFehler::Unbekannt(andere.to_string())),
        };
        Ok(ergebnis)
    }
}
