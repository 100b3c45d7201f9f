//! Handler fuer eingehende Records
//!
//! Jeder Handler ist fuer einen Record-Typ zustaendig und bekommt den
//! gemeinsamen `SignalingState` sowie den Kontext der eigenen Sitzung.
//! Antworten an den Absender werden als Record zurueckgegeben; der
//! Dispatcher schreibt sie.

pub mod auth_handler;
pub mod chat_handler;
pub mod peer_handler;
pub mod relay_handler;

use postillon_core::ClientId;
use postillon_protocol::{Record, RecordKind, PAYLOAD_CAPACITY};

/// Server-Antwort an `to`; zu lange Texte werden an einer Zeichengrenze
/// gekuerzt
pub(crate) fn antwort(kind: RecordKind, to: ClientId, text: &str) -> Record {
    let mut ende = text.len().min(PAYLOAD_CAPACITY);
    while !text.is_char_boundary(ende) {
        ende -= 1;
    }
    Record::new(kind, ClientId::SERVER, to, text[..ende].as_bytes().to_vec())
        .unwrap_or_else(|_| Record::leer(kind, ClientId::SERVER, to))
}
