//! Interpretation eingehender Records auf dem Server
//!
//! Jeder Record wird genau einer Variante zugeordnet; der Dispatcher hat pro
//! Variante einen Handler.

use postillon_core::ClientId;

use crate::record::{Record, RecordKind};

/// Benutzername und Passwort aus REGISTER/LOGIN
#[derive(Clone, PartialEq, Eq)]
pub struct Zugangsdaten {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Zugangsdaten {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zugangsdaten")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Zugangsdaten {
    /// Parst `"<benutzer> <passwort>"`; beide Teile duerfen keine
    /// Leerzeichen enthalten
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut teile = text.split_whitespace();
        match (teile.next(), teile.next(), teile.next()) {
            (Some(username), Some(password), None) => Ok(Self {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err("Expected '<username> <password>'".to_string()),
        }
    }

    pub fn to_payload(&self) -> String {
        format!("{} {}", self.username, self.password)
    }
}

/// Ein eingehender Record, nach Typ aufgeschluesselt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// Port, auf dem der Client Direktverbindungen annimmt
    Join { listen_port: u16 },
    Register(Zugangsdaten),
    Login(Zugangsdaten),
    Logout,
    /// Wird unveraendert an `to_id` weitergereicht
    Chat(Record),
    RequestPeer { to_id: ClientId },
    /// Ankuendigung eines weiterzuleitenden Dateitransfers
    RelaySendFile(Record),
    /// Ankuendigung eines weiterzuleitenden Streams (Video oder Audio)
    RelayStream(Record),
    /// Nur zwischen Peers gueltig
    Direct(RecordKind),
    /// Typ ist in diesem Kontext nicht vorgesehen
    Unexpected(RecordKind),
    /// Payload passt nicht zum Typ
    Malformed { kind: RecordKind, grund: String },
}

impl ClientRequest {
    pub fn from_record(record: Record) -> Self {
        let kind = record.kind;
        match kind {
            RecordKind::Join => {
                let text = record.payload_text();
                match text.trim().parse::<u16>() {
                    Ok(listen_port) => ClientRequest::Join { listen_port },
                    Err(_) => ClientRequest::Malformed {
                        kind,
                        grund: format!("Invalid listen port '{}'", text.trim()),
                    },
                }
            }
            RecordKind::Register | RecordKind::Login => {
                match Zugangsdaten::parse(&record.payload_text()) {
                    Ok(daten) if kind == RecordKind::Register => ClientRequest::Register(daten),
                    Ok(daten) => ClientRequest::Login(daten),
                    Err(grund) => ClientRequest::Malformed { kind, grund },
                }
            }
            RecordKind::Logout => ClientRequest::Logout,
            RecordKind::Chat => ClientRequest::Chat(record),
            RecordKind::RequestPeer => ClientRequest::RequestPeer {
                to_id: record.to_id,
            },
            RecordKind::RelaySendFile => ClientRequest::RelaySendFile(record),
            RecordKind::RelayStream | RecordKind::RelayAudioStream => {
                ClientRequest::RelayStream(record)
            }
            k if k.ist_direkt() => ClientRequest::Direct(k),
            k => ClientRequest::Unexpected(k),
        }
    }
}
