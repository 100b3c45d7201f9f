//! Streaming-Queue zwischen Netzwerk-Empfang und Wiedergabe
//!
//! Ein Produzent (Empfangs-Task) schiebt Frames hinein, ein Konsument
//! (blockierender Wiedergabe-Thread) entnimmt sie in FIFO-Reihenfolge.
//! Ein leerer Frame markiert das Stream-Ende.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Zeitueberschreitung bei `pop_timeout`
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Kein Frame innerhalb von {0:?} verfuegbar")]
pub struct Zeitueberschreitung(pub Duration);

#[derive(Debug, Default)]
struct Inner {
    frames: Mutex<VecDeque<Bytes>>,
    signal: Condvar,
}

/// Unbegrenzte, thread-sichere FIFO-Queue fuer Stream-Frames
///
/// Klone teilen sich denselben Puffer.
#[derive(Debug, Clone, Default)]
pub struct StreamingQueue {
    inner: Arc<Inner>,
}

impl StreamingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Haengt einen Frame an und weckt einen wartenden Konsumenten
    ///
    /// Ein leerer Frame wirkt wie `push_eof`.
    pub fn push(&self, frame: Bytes) {
        self.inner.frames.lock().push_back(frame);
        self.inner.signal.notify_one();
    }

    /// Haengt die EOF-Markierung an
    pub fn push_eof(&self) {
        self.push(Bytes::new());
    }

    /// Entnimmt den aeltesten Frame, blockiert solange die Queue leer ist
    ///
    /// `None` bedeutet Stream-Ende.
    pub fn pop(&self) -> Option<Bytes> {
        let mut frames = self.inner.frames.lock();
        loop {
            if let Some(frame) = frames.pop_front() {
                return nicht_leer(frame);
            }
            self.inner.signal.wait(&mut frames);
        }
    }

    /// Wie `pop`, wartet aber hoechstens `dauer`
    pub fn pop_timeout(&self, dauer: Duration) -> Result<Option<Bytes>, Zeitueberschreitung> {
        let frist = Instant::now() + dauer;
        let mut frames = self.inner.frames.lock();
        loop {
            if let Some(frame) = frames.pop_front() {
                return Ok(nicht_leer(frame));
            }
            if self.inner.signal.wait_until(&mut frames, frist).timed_out() {
                // Ein Frame kann zeitgleich mit dem Timeout angekommen sein
                return match frames.pop_front() {
                    Some(frame) => Ok(nicht_leer(frame)),
                    None => Err(Zeitueberschreitung(dauer)),
                };
            }
        }
    }

    /// Anzahl gepufferter Eintraege (inklusive EOF-Markierung)
    pub fn len(&self) -> usize {
        self.inner.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.frames.lock().is_empty()
    }
}

fn nicht_leer(frame: Bytes) -> Option<Bytes> {
    if frame.is_empty() {
        None
    } else {
        Some(frame)
    }
}
