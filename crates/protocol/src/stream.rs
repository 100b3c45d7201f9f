//! Stream-Subprotokoll
//!
//! Nach einer Stream-Ankuendigung (DIRECT_STREAM, RELAY_STREAM, ...) wechselt
//! die Verbindung vom Record-Format auf Frames variabler Laenge:
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Daten      |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Ein Frame der Laenge 0 beendet den Stream. Danach folgen wieder Records.

use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::media::{FrameSink, FrameSource};
use crate::queue::StreamingQueue;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Maximale Frame-Groesse (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),

    #[error("Frame zu gross: {groesse} Bytes (Maximum: {maximum} Bytes)")]
    ZuGross { groesse: usize, maximum: usize },

    #[error("Wiedergabe fehlgeschlagen: {0}")]
    Wiedergabe(io::Error),
}

pub type FrameResult<T> = Result<T, FrameError>;

/// Zaehler eines abgeschlossenen Streams (ohne EOF-Frame)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStatistik {
    pub frames: u64,
    pub bytes: u64,
    /// `true` wenn das Ziel waehrend des Weiterleitens ausgefallen ist
    pub ziel_abgebrochen: bool,
}

impl StreamStatistik {
    fn zaehlen(&mut self, frame: &[u8]) {
        self.frames += 1;
        self.bytes += frame.len() as u64;
    }
}

// ---------------------------------------------------------------------------
// Einzelne Frames
// ---------------------------------------------------------------------------

/// Sendet einen Frame
///
/// Ein leerer Frame ist die EOF-Markierung; fuer Daten nur nicht-leere Frames
/// verwenden.
pub async fn send_frame<W>(writer: &mut W, daten: &[u8]) -> FrameResult<()>
where
    W: AsyncWrite + Unpin,
{
    if daten.len() > MAX_FRAME_SIZE {
        return Err(FrameError::ZuGross {
            groesse: daten.len(),
            maximum: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&(daten.len() as u32).to_be_bytes()).await?;
    writer.write_all(daten).await?;
    writer.flush().await?;
    Ok(())
}

/// Sendet die EOF-Markierung
pub async fn send_eof<W>(writer: &mut W) -> FrameResult<()>
where
    W: AsyncWrite + Unpin,
{
    send_frame(writer, &[]).await
}

/// Empfaengt einen Frame; ein leerer Frame bedeutet EOF
pub async fn receive_frame<R>(reader: &mut R, max_frame_size: usize) -> FrameResult<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; LENGTH_FIELD_SIZE];
    reader.read_exact(&mut len_buf).await?;
    let laenge = u32::from_be_bytes(len_buf) as usize;

    if laenge > max_frame_size {
        return Err(FrameError::ZuGross {
            groesse: laenge,
            maximum: max_frame_size,
        });
    }

    let mut daten = BytesMut::zeroed(laenge);
    reader.read_exact(&mut daten).await?;
    Ok(daten.freeze())
}

// ---------------------------------------------------------------------------
// Zeitbegrenzte Schreibvorgaenge
// ---------------------------------------------------------------------------

/// Fuehrt einen Schreibvorgang mit optionaler Frist aus
///
/// Eine abgelaufene Frist wird als `TimedOut` gemeldet.
pub async fn begrenzt<F, T, E>(frist: Option<Duration>, vorgang: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<io::Error>,
{
    match frist {
        Some(dauer) => tokio::time::timeout(dauer, vorgang).await.map_err(|_| {
            E::from(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("Schreibvorgang nach {dauer:?} abgebrochen"),
            ))
        })?,
        None => vorgang.await,
    }
}

// ---------------------------------------------------------------------------
// Weiterleitung, Puffern, Senden, Wiedergabe
// ---------------------------------------------------------------------------

/// Leitet einen Stream von `quelle` nach `ziel` weiter
///
/// Es liegt immer nur ein Frame im Speicher. Faellt das Ziel aus, wird die
/// Quelle trotzdem bis EOF gelesen, damit ihr Record-Strom synchron bleibt.
/// Lesefehler der Quelle beenden die Weiterleitung mit Fehler; das Ziel
/// bekommt vorher noch EOF, damit es wieder auf einer Record-Grenze steht.
pub async fn relay_stream<R, W>(
    quelle: &mut R,
    ziel: &mut W,
    schreib_frist: Option<Duration>,
) -> FrameResult<StreamStatistik>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut statistik = StreamStatistik::default();

    loop {
        let frame = match receive_frame(quelle, MAX_FRAME_SIZE).await {
            Ok(frame) => frame,
            Err(e) => {
                if !statistik.ziel_abgebrochen {
                    if let Err(fehler) = begrenzt(schreib_frist, send_eof(ziel)).await {
                        tracing::debug!(fehler = %fehler, "EOF an Stream-Ziel nicht zugestellt");
                    }
                }
                return Err(e);
            }
        };
        let eof = frame.is_empty();

        if !statistik.ziel_abgebrochen {
            if let Err(e) = begrenzt(schreib_frist, send_frame(ziel, &frame)).await {
                tracing::warn!(fehler = %e, "Stream-Ziel ausgefallen, Quelle wird geleert");
                statistik.ziel_abgebrochen = true;
            }
        }

        if eof {
            return Ok(statistik);
        }
        statistik.zaehlen(&frame);
    }
}

/// Liest Frames und legt sie in die Queue
///
/// Bei EOF oder Lesefehler wird die EOF-Markierung eingereiht, damit der
/// Konsument nie endlos wartet.
pub async fn enqueue_frames<R>(queue: &StreamingQueue, reader: &mut R) -> FrameResult<u64>
where
    R: AsyncRead + Unpin,
{
    let mut anzahl = 0u64;
    loop {
        match receive_frame(reader, MAX_FRAME_SIZE).await {
            Ok(frame) if frame.is_empty() => {
                queue.push_eof();
                return Ok(anzahl);
            }
            Ok(frame) => {
                queue.push(frame);
                anzahl += 1;
            }
            Err(e) => {
                queue.push_eof();
                return Err(e);
            }
        }
    }
}

/// Sendet alle Frames einer Quelle und danach EOF
pub async fn stream_from_source<W>(
    writer: &mut W,
    quelle: &mut dyn FrameSource,
) -> FrameResult<StreamStatistik>
where
    W: AsyncWrite + Unpin,
{
    let mut statistik = StreamStatistik::default();
    while let Some(frame) = quelle.next_frame().await? {
        // Leere Frames wuerden den Stream vorzeitig beenden
        if frame.is_empty() {
            continue;
        }
        send_frame(writer, &frame).await?;
        statistik.zaehlen(&frame);
    }
    send_eof(writer).await?;
    Ok(statistik)
}

/// Entnimmt Frames (blockierend) und stellt sie dar, bis EOF
///
/// Nur auf einem blockierenden Thread aufrufen.
pub fn play(queue: &StreamingQueue, senke: &mut dyn FrameSink) -> FrameResult<u64> {
    let mut anzahl = 0u64;
    while let Some(frame) = queue.pop() {
        senke.render(&frame).map_err(FrameError::Wiedergabe)?;
        anzahl += 1;
    }
    senke.finish().map_err(FrameError::Wiedergabe)?;
    Ok(anzahl)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
