//! Record-Format (Message Codec)
//!
//! Jede Nachricht des Anwendungsprotokolls ist ein Record fester Groesse.
//! Es gibt keine Laengenpraefixe ausserhalb des eingebetteten
//! `payload_len`-Felds; das haelt das Framing trivial.
//!
//! ## Record-Format
//!
//! ```text
//! +--------+---------+--------+-------------+--------------------+
//! | kind   | from_id | to_id  | payload_len | payload (1024 B)   |
//! | i32    | i32     | i32    | i32         | nur 0..payload_len |
//! +--------+---------+--------+-------------+--------------------+
//! ```
//!
//! Die vier Ganzzahlen stehen in nativer Byte-Reihenfolge. Client und Server
//! werden gemeinsam versioniert; jede Aenderung am Layout ist ein
//! inkompatibler Protokollwechsel.

use std::borrow::Cow;
use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use postillon_core::ClientId;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Kapazitaet des Payload-Bereichs in Bytes
pub const PAYLOAD_CAPACITY: usize = 1024;

/// Groesse des Headers (kind, from_id, to_id, payload_len)
pub const HEADER_SIZE: usize = 16;

/// Gesamtgroesse eines Records auf dem Draht
pub const RECORD_SIZE: usize = HEADER_SIZE + PAYLOAD_CAPACITY;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Formatfehler beim Kodieren oder Dekodieren eines Records
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Unbekannter Record-Typ: {0}")]
    UnbekannterTyp(i32),

    #[error("Ungueltige Payload-Laenge: {0} (erlaubt: 0..={PAYLOAD_CAPACITY})")]
    UngueltigeLaenge(i32),

    #[error("Payload zu gross: {0} Bytes (Maximum: {PAYLOAD_CAPACITY} Bytes)")]
    PayloadZuGross(usize),

    #[error("Record unvollstaendig: {0} Bytes (erwartet: {RECORD_SIZE} Bytes)")]
    Unvollstaendig(usize),
}

impl From<RecordError> for io::Error {
    fn from(e: RecordError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}

/// Result-Alias fuer Record-Operationen
pub type RecordResult<T> = Result<T, RecordError>;

// ---------------------------------------------------------------------------
// RecordKind
// ---------------------------------------------------------------------------

/// Geschlossene Menge aller Record-Typen
///
/// Die Diskriminanten sind die Wire-Werte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RecordKind {
    /// Erster Record jeder Verbindung, Payload = Listen-Port
    Join = 1,
    /// Relay-Chatnachricht
    Chat = 2,
    /// Anfrage nach Peer-Informationen
    RequestPeer = 3,
    /// Antwort mit Peer-Roster
    PeerInfo = 4,
    /// Direktnachricht (nur Peer-zu-Peer)
    DirectMsg = 5,
    Register = 6,
    Login = 7,
    Logout = 8,
    /// Menschenlesbare Antwort des Servers
    Response = 9,
    DirectSendFile = 10,
    RelaySendFile = 11,
    /// Metadaten- oder Datenblock eines Dateitransfers
    TransferChunk = 12,
    DirectStream = 13,
    RelayStream = 14,
    DirectAudioStream = 15,
    RelayAudioStream = 16,
}

impl RecordKind {
    /// Alle Typen in Wire-Reihenfolge
    pub const ALLE: [RecordKind; 16] = [
        RecordKind::Join,
        RecordKind::Chat,
        RecordKind::RequestPeer,
        RecordKind::PeerInfo,
        RecordKind::DirectMsg,
        RecordKind::Register,
        RecordKind::Login,
        RecordKind::Logout,
        RecordKind::Response,
        RecordKind::DirectSendFile,
        RecordKind::RelaySendFile,
        RecordKind::TransferChunk,
        RecordKind::DirectStream,
        RecordKind::RelayStream,
        RecordKind::DirectAudioStream,
        RecordKind::RelayAudioStream,
    ];

    /// Gibt den Wire-Wert zurueck
    pub fn wire_wert(self) -> i32 {
        self as i32
    }

    /// Wandelt einen Wire-Wert in einen Typ um
    pub fn from_wire(wert: i32) -> Option<Self> {
        Self::ALLE.iter().copied().find(|k| k.wire_wert() == wert)
    }

    /// `true` fuer Typen, die nur auf Peer-zu-Peer-Verbindungen Sinn ergeben
    pub fn ist_direkt(self) -> bool {
        matches!(
            self,
            RecordKind::DirectMsg
                | RecordKind::DirectSendFile
                | RecordKind::DirectStream
                | RecordKind::DirectAudioStream
        )
    }

    /// `true` fuer Ankuendigungen, denen ein Stream-Subprotokoll folgt
    pub fn ist_stream_ankuendigung(self) -> bool {
        matches!(
            self,
            RecordKind::DirectStream
                | RecordKind::RelayStream
                | RecordKind::DirectAudioStream
                | RecordKind::RelayAudioStream
        )
    }

    /// Protokollname in Grossbuchstaben (fuer Logs)
    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Join => "JOIN",
            RecordKind::Chat => "CHAT",
            RecordKind::RequestPeer => "REQUEST_PEER",
            RecordKind::PeerInfo => "PEER_INFO",
            RecordKind::DirectMsg => "DIRECT_MSG",
            RecordKind::Register => "REGISTER",
            RecordKind::Login => "LOGIN",
            RecordKind::Logout => "LOGOUT",
            RecordKind::Response => "RESPONSE",
            RecordKind::DirectSendFile => "DIRECT_SEND_FILE",
            RecordKind::RelaySendFile => "RELAY_SEND_FILE",
            RecordKind::TransferChunk => "TRANSFER_CHUNK",
            RecordKind::DirectStream => "DIRECT_STREAM",
            RecordKind::RelayStream => "RELAY_STREAM",
            RecordKind::DirectAudioStream => "DIRECT_AUDIO_STREAM",
            RecordKind::RelayAudioStream => "RELAY_AUDIO_STREAM",
        }
    }
}

impl TryFrom<i32> for RecordKind {
    type Error = RecordError;

    fn try_from(wert: i32) -> Result<Self, Self::Error> {
        Self::from_wire(wert).ok_or(RecordError::UnbekannterTyp(wert))
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Eine Protokollnachricht
///
/// Die Payload-Laenge ergibt sich aus `payload.len()` und ist durch
/// `PAYLOAD_CAPACITY` begrenzt; Bytes jenseits davon existieren im Speicher
/// nicht.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordKind,
    pub from_id: ClientId,
    pub to_id: ClientId,
    payload: Bytes,
}

impl Record {
    /// Erstellt einen Record und prueft die Payload-Groesse
    pub fn new(
        kind: RecordKind,
        from_id: ClientId,
        to_id: ClientId,
        payload: impl Into<Bytes>,
    ) -> RecordResult<Self> {
        let payload = payload.into();
        if payload.len() > PAYLOAD_CAPACITY {
            return Err(RecordError::PayloadZuGross(payload.len()));
        }
        Ok(Self {
            kind,
            from_id,
            to_id,
            payload,
        })
    }

    /// Erstellt einen Record mit Text-Payload
    pub fn text(
        kind: RecordKind,
        from_id: ClientId,
        to_id: ClientId,
        text: &str,
    ) -> RecordResult<Self> {
        Self::new(kind, from_id, to_id, Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Erstellt einen Record ohne Payload
    pub fn leer(kind: RecordKind, from_id: ClientId, to_id: ClientId) -> Self {
        Self {
            kind,
            from_id,
            to_id,
            payload: Bytes::new(),
        }
    }

    /// Gibt die gueltigen Payload-Bytes zurueck
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Anzahl gueltiger Payload-Bytes
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Payload als Text (ungueltiges UTF-8 wird ersetzt)
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Verbraucht den Record und gibt die Payload zurueck
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Schreibt den Record im Wire-Format in `dst`
    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(RECORD_SIZE);
        dst.put_slice(&self.kind.wire_wert().to_ne_bytes());
        dst.put_slice(&self.from_id.inner().to_ne_bytes());
        dst.put_slice(&self.to_id.inner().to_ne_bytes());
        dst.put_slice(&(self.payload.len() as i32).to_ne_bytes());
        dst.put_slice(&self.payload);
        dst.put_bytes(0, PAYLOAD_CAPACITY - self.payload.len());
    }

    /// Kodiert den Record in einen eigenen Buffer fester Groesse
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RECORD_SIZE);
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Dekodiert genau einen Record aus den ersten `RECORD_SIZE` Bytes
    pub fn decode(src: &[u8]) -> RecordResult<Self> {
        if src.len() < RECORD_SIZE {
            return Err(RecordError::Unvollstaendig(src.len()));
        }

        let kind = RecordKind::try_from(lese_i32(src, 0))?;
        let from_id = ClientId(lese_i32(src, 4));
        let to_id = ClientId(lese_i32(src, 8));
        let payload_len = lese_i32(src, 12);

        // payload_len niemals ungeprueft als Index verwenden
        if payload_len < 0 || payload_len as usize > PAYLOAD_CAPACITY {
            return Err(RecordError::UngueltigeLaenge(payload_len));
        }

        let ende = HEADER_SIZE + payload_len as usize;
        Ok(Self {
            kind,
            from_id,
            to_id,
            payload: Bytes::copy_from_slice(&src[HEADER_SIZE..ende]),
        })
    }
}

fn lese_i32(src: &[u8], offset: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&src[offset..offset + 4]);
    i32::from_ne_bytes(bytes)
}

// ---------------------------------------------------------------------------
// RecordCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer Records fester Groesse
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordCodec;

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < RECORD_SIZE {
            src.reserve(RECORD_SIZE - src.len());
            return Ok(None);
        }

        let bytes = src.split_to(RECORD_SIZE);
        Ok(Some(Record::decode(&bytes)?))
    }
}

impl Encoder<Record> for RecordCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Record, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_into(dst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen fuer direktes async Lesen/Schreiben
// ---------------------------------------------------------------------------

/// Liest genau einen Record aus einem `AsyncRead`
///
/// # Fehler
/// - `UnexpectedEof` wenn die Verbindung vor Abschluss des Records endet
/// - `InvalidData` bei unbekanntem Typ oder ungueltiger Payload-Laenge
pub async fn read_record<R>(reader: &mut R) -> io::Result<Record>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::zeroed(RECORD_SIZE);
    reader.read_exact(&mut buf).await?;

    RecordCodec.decode(&mut buf)?.ok_or_else(|| {
        io::Error::new(io::ErrorKind::UnexpectedEof, "Record unvollstaendig")
    })
}

/// Schreibt einen Record in einen `AsyncWrite` und flusht
pub async fn write_record<W>(writer: &mut W, record: &Record) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(RECORD_SIZE);
    RecordCodec.encode(record.clone(), &mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
