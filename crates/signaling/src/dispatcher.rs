//! Message-Dispatcher – ordnet eingehende Records ihren Handlern zu
//!
//! Der Dispatcher bekommt jeden Record einer aktiven Sitzung, schlaegt ihn
//! ueber `ClientRequest` auf und ruft den passenden Handler. Antworten der
//! Handler werden auf den Kanal des Absenders geschrieben.
//!
//! Ein Fehler im Ergebnis bedeutet immer, dass der Lesekanal des Absenders
//! nicht mehr auf einer Record-Grenze steht. Alles andere, auch eine nicht
//! zustellbare Antwort, wird nur protokolliert.

use std::net::SocketAddr;
use std::sync::Arc;

use postillon_core::ClientId;
use postillon_protocol::{ClientRequest, Record};
use tokio::io::AsyncRead;

use crate::error::SignalingResult;
use crate::handlers::{auth_handler, chat_handler, peer_handler, relay_handler};
use crate::registry::ChannelHandle;
use crate::server_state::SignalingState;

/// Kontext der Sitzung, deren Record gerade verarbeitet wird
#[derive(Debug, Clone)]
pub struct SessionKontext {
    /// Beim JOIN vergebene ID
    pub client_id: ClientId,
    pub peer_addr: SocketAddr,
    /// Gesetzt nach erfolgreichem Login
    pub username: Option<String>,
    /// Schreibseite der eigenen Verbindung
    pub kanal: ChannelHandle,
}

/// Zentraler Dispatcher, einer pro Sitzung
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Verarbeitet einen Record
    ///
    /// Relay-Ankuendigungen lesen das folgende Subprotokoll von `leser`.
    pub async fn dispatch<R>(
        &self,
        record: Record,
        leser: &mut R,
        ctx: &mut SessionKontext,
    ) -> SignalingResult<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let state = self.state.as_ref();
        tracing::trace!(client_id = ctx.client_id.inner(), kind = %record.kind, "Record empfangen");

        let antwort = match ClientRequest::from_record(record) {
            ClientRequest::Register(daten) => {
                Some(auth_handler::handle_register(daten, ctx, state).await)
            }
            ClientRequest::Login(daten) => Some(auth_handler::handle_login(daten, ctx, state).await),
            ClientRequest::Logout => {
                auth_handler::handle_logout(ctx, state);
                None
            }
            ClientRequest::Malformed { kind, grund } => {
                Some(auth_handler::handle_malformed(kind, &grund, ctx))
            }
            ClientRequest::Chat(record) => {
                chat_handler::handle_chat(record, ctx, state).await;
                None
            }
            ClientRequest::RequestPeer { to_id } => {
                Some(peer_handler::handle_request_peer(to_id, ctx, state))
            }
            ClientRequest::RelaySendFile(ankuendigung) => {
                relay_handler::handle_relay_file(ankuendigung, leser, ctx, state).await?;
                None
            }
            ClientRequest::RelayStream(ankuendigung) => {
                relay_handler::handle_relay_stream(ankuendigung, leser, ctx, state).await?;
                None
            }
            ClientRequest::Direct(kind) => {
                tracing::warn!(
                    client_id = ctx.client_id.inner(),
                    kind = %kind,
                    "Direkt-Record an den Server ignoriert"
                );
                None
            }
            ClientRequest::Join { .. } => {
                tracing::warn!(client_id = ctx.client_id.inner(), "Wiederholtes JOIN ignoriert");
                None
            }
            ClientRequest::Unexpected(kind) => {
                tracing::warn!(
                    client_id = ctx.client_id.inner(),
                    kind = %kind,
                    "Unerwarteter Record ignoriert"
                );
                None
            }
        };

        // Ein toter Kanal faellt beim naechsten Lesen auf
        if let Some(antwort) = antwort {
            if let Err(e) = ctx
                .kanal
                .senden(&antwort, state.config.zeitlimits.schreiben)
                .await
            {
                tracing::warn!(
                    client_id = ctx.client_id.inner(),
                    kind = %antwort.kind,
                    fehler = %e,
                    "Antwort nicht zugestellt"
                );
            }
        }
        Ok(())
    }
}
