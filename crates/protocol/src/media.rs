//! Schnittstellen zu Medienquellen und -senken
//!
//! Das Protokoll behandelt Frames als undurchsichtige Bytes. Kodierung,
//! Aufnahme und Darstellung liegen hinter diesen Traits.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;

/// Liefert Frames fuer einen ausgehenden Stream
#[async_trait]
pub trait FrameSource: Send {
    /// Naechster Frame; `None` wenn die Quelle erschoepft ist
    async fn next_frame(&mut self) -> io::Result<Option<Bytes>>;
}

/// Stellt empfangene Frames dar
///
/// Wird vom blockierenden Wiedergabe-Thread aufgerufen.
pub trait FrameSink: Send {
    fn render(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Wird nach dem letzten Frame einmal aufgerufen
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}
