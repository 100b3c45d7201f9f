//! Chat-Handler – leitet CHAT-Records unveraendert an `to_id` weiter

use postillon_protocol::Record;

use crate::dispatcher::SessionKontext;
use crate::router::Zustellung;
use crate::server_state::SignalingState;

/// Verarbeitet CHAT; der Absender bekommt keine Rueckmeldung
pub async fn handle_chat(record: Record, ctx: &SessionKontext, state: &SignalingState) {
    match state.router.zustellen(&record).await {
        Zustellung::Zugestellt => {
            tracing::debug!(
                client_id = ctx.client_id.inner(),
                an = record.to_id.inner(),
                bytes = record.payload_len(),
                "Chat zugestellt"
            );
        }
        Zustellung::EmpfaengerOffline => {
            tracing::info!(
                client_id = ctx.client_id.inner(),
                an = record.to_id.inner(),
                "Chat-Empfaenger nicht online, Nachricht verworfen"
            );
        }
        // Bereits im Router protokolliert
        Zustellung::ZielBeschaeftigt | Zustellung::Fehlgeschlagen => {}
    }
}
