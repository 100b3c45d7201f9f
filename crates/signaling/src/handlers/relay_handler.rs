//! Relay-Handler – Dateitransfers und Streams ueber den Server
//!
//! Beide Subprotokolle lesen weiter vom Kanal des Absenders. Fehler beim
//! Lesen beenden die Sitzung des Absenders, Fehler beim Ziel nicht.

use postillon_protocol::Record;
use tokio::io::AsyncRead;

use crate::dispatcher::SessionKontext;
use crate::error::SignalingResult;
use crate::server_state::SignalingState;

/// Verarbeitet RELAY_SEND_FILE samt Header und Datenbloecken
pub async fn handle_relay_file<R>(
    ankuendigung: Record,
    leser: &mut R,
    ctx: &SessionKontext,
    state: &SignalingState,
) -> SignalingResult<()>
where
    R: AsyncRead + Unpin + Send,
{
    let ergebnis = state.router.datei_weiterleiten(&ankuendigung, leser).await?;
    tracing::info!(
        client_id = ctx.client_id.inner(),
        an = ankuendigung.to_id.inner(),
        datei = %ergebnis.dateiname,
        bytes = ergebnis.bytes,
        zugestellt = ergebnis.zugestellt,
        "Dateitransfer weitergeleitet"
    );
    Ok(())
}

/// Verarbeitet RELAY_STREAM und RELAY_AUDIO_STREAM bis EOF
pub async fn handle_relay_stream<R>(
    ankuendigung: Record,
    leser: &mut R,
    ctx: &SessionKontext,
    state: &SignalingState,
) -> SignalingResult<()>
where
    R: AsyncRead + Unpin + Send,
{
    let statistik = state.router.stream_weiterleiten(&ankuendigung, leser).await?;
    tracing::info!(
        client_id = ctx.client_id.inner(),
        an = ankuendigung.to_id.inner(),
        kind = %ankuendigung.kind,
        frames = statistik.frames,
        bytes = statistik.bytes,
        zugestellt = !statistik.ziel_abgebrochen,
        "Stream weitergeleitet"
    );
    Ok(())
}
