//! Peer-Handler – Liste der angemeldeten Clients

use postillon_core::ClientId;
use postillon_protocol::{Record, RecordKind};

use super::antwort;
use crate::dispatcher::SessionKontext;
use crate::registry::PeerEntry;
use crate::server_state::SignalingState;

/// Verarbeitet REQUEST_PEER
///
/// `to_id` der Anfrage wird nur protokolliert; die Antwort enthaelt immer
/// alle angemeldeten Online-Sitzungen.
pub fn handle_request_peer(to_id: ClientId, ctx: &SessionKontext, state: &SignalingState) -> Record {
    let eintraege = state.registry.snapshot_online_named();
    tracing::debug!(
        client_id = ctx.client_id.inner(),
        angefragt = to_id.inner(),
        anzahl = eintraege.len(),
        "Peer-Liste angefordert"
    );
    antwort(RecordKind::PeerInfo, ctx.client_id, &PeerEntry::roster(&eintraege))
}
