//! Verarbeitung eingehender Records, gleich ob vom Server oder direkt
//!
//! Datei-Ankuendigungen schreiben nach `download_verzeichnis`, Stream-
//! Ankuendigungen fuellen die gemeinsame `StreamingQueue`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use postillon_protocol::stream::enqueue_frames;
use postillon_protocol::transfer::receive_file;
use postillon_protocol::{Record, RecordKind, StreamingQueue, TransferError};
use tokio::io::AsyncRead;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::ClientResult;
use crate::ereignis::Ereignis;

/// Woher ein Record kam
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Herkunft {
    Server,
    Direkt(SocketAddr),
}

/// Gemeinsamer Zustand der Empfangs-Tasks
#[derive(Clone)]
pub struct EmpfangsKontext {
    pub ereignisse: UnboundedSender<Ereignis>,
    pub queue: StreamingQueue,
    pub download: PathBuf,
    /// Vom Server bestaetigter Benutzername
    pub username: Arc<Mutex<Option<String>>>,
}

impl EmpfangsKontext {
    pub fn melden(&self, ereignis: Ereignis) {
        // Ohne Empfaenger laeuft der Client gerade herunter
        let _ = self.ereignisse.send(ereignis);
    }
}

/// Verarbeitet einen Record samt eventuell folgendem Subprotokoll
///
/// Ein Fehler bedeutet, dass `leser` nicht mehr auf einer Record-Grenze
/// steht und die Verbindung aufgegeben werden muss.
pub async fn record_verarbeiten<R>(
    record: Record,
    leser: &mut R,
    herkunft: Herkunft,
    ctx: &EmpfangsKontext,
) -> ClientResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut record = record;
    loop {
        match einzeln_verarbeiten(record, leser, herkunft, ctx).await? {
            // Ein abgebrochener Transfer hat den naechsten Record schon gelesen
            Some(naechster) => record = naechster,
            None => return Ok(()),
        }
    }
}

async fn einzeln_verarbeiten<R>(
    record: Record,
    leser: &mut R,
    herkunft: Herkunft,
    ctx: &EmpfangsKontext,
) -> ClientResult<Option<Record>>
where
    R: AsyncRead + Unpin,
{
    match record.kind {
        RecordKind::Chat => ctx.melden(Ereignis::Chat {
            from: record.from_id,
            text: record.payload_text().into_owned(),
        }),
        RecordKind::PeerInfo => ctx.melden(Ereignis::PeerInfo(record.payload_text().into_owned())),
        RecordKind::Response => ctx.melden(Ereignis::Antwort(record.payload_text().into_owned())),
        RecordKind::Login => {
            let name = record.payload_text().into_owned();
            *ctx.username.lock() = Some(name.clone());
            ctx.melden(Ereignis::Angemeldet(name));
        }
        RecordKind::DirectMsg => match herkunft {
            Herkunft::Direkt(peer) => ctx.melden(Ereignis::DirektNachricht {
                peer,
                text: record.payload_text().into_owned(),
            }),
            Herkunft::Server => ctx.melden(Ereignis::Unbekannt(record.kind)),
        },
        RecordKind::RelaySendFile | RecordKind::DirectSendFile => {
            return datei_empfangen(leser, ctx).await;
        }
        kind if kind.ist_stream_ankuendigung() => {
            match enqueue_frames(&ctx.queue, leser).await {
                Ok(frames) => {
                    tracing::debug!(kind = %kind, frames, ?herkunft, "Stream empfangen");
                    ctx.melden(Ereignis::StreamEmpfangen { kind, frames });
                }
                Err(e) => {
                    ctx.melden(Ereignis::StreamFehlgeschlagen(e.to_string()));
                    return Err(e.into());
                }
            }
        }
        kind => ctx.melden(Ereignis::Unbekannt(kind)),
    }
    Ok(None)
}

/// Empfaengt eine Datei; liefert einen mitgelesenen fremden Record zurueck
async fn datei_empfangen<R>(leser: &mut R, ctx: &EmpfangsKontext) -> ClientResult<Option<Record>>
where
    R: AsyncRead + Unpin,
{
    match receive_file(leser, &ctx.download).await {
        Ok(summary) => {
            ctx.melden(Ereignis::DateiEmpfangen {
                pfad: ctx.download.join(&summary.filename),
                bytes: summary.bytes,
            });
            Ok(None)
        }
        Err(e) => {
            tracing::warn!(fehler = %e, "Dateiempfang fehlgeschlagen");
            ctx.melden(Ereignis::TransferFehlgeschlagen(e.to_string()));
            match e {
                TransferError::UnexpectedRecord(record) => Ok(Some(*record)),
                // Verbindung ist weg oder steht mitten in Daten
                TransferError::Io(_) | TransferError::Incomplete { .. } => Err(e.into()),
                _ => Ok(None),
            }
        }
    }
}
