//! Auth-Handler – Registrierung, Login, Logout
//!
//! Delegiert an den `CredentialStore`. Ergebnisse gehen als RESPONSE-Text
//! an den Client, ein erfolgreicher Login als LOGIN-Record mit dem
//! Benutzernamen.

use postillon_auth::{AuthError, ERFOLG_TEXT};
use postillon_protocol::{Record, RecordKind, Zugangsdaten};

use super::antwort;
use crate::dispatcher::SessionKontext;
use crate::server_state::SignalingState;

/// Verarbeitet REGISTER
pub async fn handle_register(
    daten: Zugangsdaten,
    ctx: &SessionKontext,
    state: &SignalingState,
) -> Record {
    let text = match state.credentials.register(&daten.username, &daten.password).await {
        Ok(()) => {
            tracing::info!(
                client_id = ctx.client_id.inner(),
                username = %daten.username,
                "Benutzer registriert"
            );
            ERFOLG_TEXT.to_string()
        }
        Err(e) => {
            tracing::info!(
                client_id = ctx.client_id.inner(),
                username = %daten.username,
                fehler = %e,
                "Registrierung abgelehnt"
            );
            e.protocol_text().to_string()
        }
    };
    antwort(RecordKind::Response, ctx.client_id, &text)
}

/// Verarbeitet LOGIN
///
/// Bei Erfolg wird die Sitzung in der Registry als angemeldet markiert und
/// der Benutzername im Kontext gemerkt.
pub async fn handle_login(
    daten: Zugangsdaten,
    ctx: &mut SessionKontext,
    state: &SignalingState,
) -> Record {
    if let Err(e) = state.credentials.verify(&daten.username, &daten.password).await {
        tracing::info!(
            client_id = ctx.client_id.inner(),
            username = %daten.username,
            fehler = %e,
            "Login abgelehnt"
        );
        return antwort(RecordKind::Response, ctx.client_id, e.protocol_text());
    }

    if let Err(e) = state.registry.set_authenticated(ctx.client_id, &daten.username) {
        tracing::error!(client_id = ctx.client_id.inner(), fehler = %e, "Sitzung fehlt in der Registry");
        return antwort(
            RecordKind::Response,
            ctx.client_id,
            AuthError::intern(e.to_string()).protocol_text(),
        );
    }

    tracing::info!(
        client_id = ctx.client_id.inner(),
        username = %daten.username,
        "Benutzer angemeldet"
    );
    let record = antwort(RecordKind::Login, ctx.client_id, &daten.username);
    ctx.username = Some(daten.username);
    record
}

/// Verarbeitet LOGOUT; es gibt keine Antwort
pub fn handle_logout(ctx: &mut SessionKontext, state: &SignalingState) {
    let vorher = ctx.username.take();
    if let Err(e) = state.registry.clear_authenticated(ctx.client_id) {
        tracing::error!(client_id = ctx.client_id.inner(), fehler = %e, "Logout ohne Sitzung");
        return;
    }
    tracing::info!(
        client_id = ctx.client_id.inner(),
        username = vorher.as_deref().unwrap_or(""),
        "Benutzer abgemeldet"
    );
}

/// Antwort auf REGISTER/LOGIN mit unbrauchbarer Payload
pub fn handle_malformed(kind: RecordKind, grund: &str, ctx: &SessionKontext) -> Record {
    tracing::debug!(client_id = ctx.client_id.inner(), kind = %kind, grund, "Ungueltige Eingabe");
    antwort(
        RecordKind::Response,
        ctx.client_id,
        &format!("{}: {grund}", AuthError::UngueltigeEingabe(grund.to_string()).protocol_text()),
    )
}
