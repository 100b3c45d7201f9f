//! Dateitransfer-Subprotokoll
//!
//! Ablauf nach der Ankuendigung (DIRECT_SEND_FILE oder RELAY_SEND_FILE):
//!
//! 1. Ein TRANSFER_CHUNK mit der Payload `"<dateiname> <groesse>"`
//! 2. TRANSFER_CHUNK-Records mit Dateidaten (je hoechstens 1024 Bytes),
//!    bis die Summe der Payloads der angekuendigten Groesse entspricht
//!
//! Es gibt keine Pruefsumme; Abbrueche werden nur ueber die Byte-Zahl erkannt.

use std::io;
use std::path::Path;

use bytes::Bytes;
use postillon_core::ClientId;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::record::{read_record, write_record, Record, RecordError, RecordKind, PAYLOAD_CAPACITY};

/// Maximale Datenmenge pro Transfer-Block
pub const CHUNK_SIZE: usize = PAYLOAD_CAPACITY;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),

    #[error("Ungueltiger Transfer-Header: {0}")]
    UngueltigerHeader(String),

    #[error("Transfer unvollstaendig: {received} von {expected} Bytes empfangen")]
    Incomplete { expected: u64, received: u64 },

    #[error("Transfer-Block ueberschreitet die angekuendigte Groesse von {expected} Bytes")]
    Overrun { expected: u64 },

    /// Enthaelt den gelesenen Record, damit er normal verarbeitet werden kann
    #[error("Unerwarteter Record waehrend des Transfers: {}", .0.kind)]
    UnexpectedRecord(Box<Record>),

    #[error("Record-Fehler: {0}")]
    Record(#[from] RecordError),
}

pub type TransferResult<T> = Result<T, TransferError>;

// ---------------------------------------------------------------------------
// TransferHeader
// ---------------------------------------------------------------------------

/// Metadaten des ersten Transfer-Blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferHeader {
    /// Nur die letzte Pfadkomponente
    pub filename: String,
    pub total_size: u64,
}

impl TransferHeader {
    /// Erstellt einen Header; Verzeichnisanteile von `name` werden verworfen
    pub fn new(name: &str, total_size: u64) -> TransferResult<Self> {
        let filename = letzte_komponente(name);
        if filename.is_empty() || filename == "." || filename == ".." {
            return Err(TransferError::UngueltigerHeader(format!(
                "ungueltiger Dateiname '{name}'"
            )));
        }
        Ok(Self {
            filename: filename.to_string(),
            total_size,
        })
    }

    /// Parst `"<dateiname> <groesse>"`; die Groesse steht hinter dem letzten
    /// Leerzeichen, Dateinamen duerfen also Leerzeichen enthalten
    pub fn parse(payload: &[u8]) -> TransferResult<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| TransferError::UngueltigerHeader("kein gueltiges UTF-8".into()))?;
        let (name, groesse) = text
            .rsplit_once(' ')
            .ok_or_else(|| TransferError::UngueltigerHeader(format!("'{text}'")))?;
        let total_size = groesse
            .trim()
            .parse::<u64>()
            .map_err(|_| TransferError::UngueltigerHeader(format!("ungueltige Groesse '{groesse}'")))?;
        Self::new(name, total_size)
    }

    pub fn to_payload(&self) -> String {
        format!("{} {}", self.filename, self.total_size)
    }

    /// Header als TRANSFER_CHUNK-Record
    pub fn to_record(&self, from_id: ClientId, to_id: ClientId) -> TransferResult<Record> {
        Ok(Record::text(
            RecordKind::TransferChunk,
            from_id,
            to_id,
            &self.to_payload(),
        )?)
    }
}

fn letzte_komponente(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Ergebnis eines abgeschlossenen Transfers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub filename: String,
    pub bytes: u64,
    pub chunks: u64,
}

// ---------------------------------------------------------------------------
// Senden
// ---------------------------------------------------------------------------

/// Sendet Ankuendigung, Header und Datenbloecke einer Datei
///
/// `ankuendigung` ist DIRECT_SEND_FILE oder RELAY_SEND_FILE.
pub async fn send_file<W>(
    writer: &mut W,
    ankuendigung: RecordKind,
    from_id: ClientId,
    to_id: ClientId,
    pfad: &Path,
) -> TransferResult<TransferSummary>
where
    W: AsyncWrite + Unpin,
{
    let mut datei = tokio::fs::File::open(pfad).await?;
    let total_size = datei.metadata().await?.len();
    let name = pfad
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransferError::UngueltigerHeader(format!("{}", pfad.display())))?;

    let header = TransferHeader::new(name, total_size)?;
    let header_record = header.to_record(from_id, to_id)?;

    write_record(writer, &Record::leer(ankuendigung, from_id, to_id)).await?;
    write_record(writer, &header_record).await?;

    let mut gesendet = 0u64;
    let mut chunks = 0u64;
    let mut puffer = vec![0u8; CHUNK_SIZE];
    while gesendet < total_size {
        let rest = (total_size - gesendet).min(CHUNK_SIZE as u64) as usize;
        let n = datei.read(&mut puffer[..rest]).await?;
        if n == 0 {
            // Datei ist waehrend des Sendens geschrumpft
            return Err(TransferError::Incomplete {
                expected: total_size,
                received: gesendet,
            });
        }

        let chunk = Record::new(
            RecordKind::TransferChunk,
            from_id,
            to_id,
            Bytes::copy_from_slice(&puffer[..n]),
        )?;
        write_record(writer, &chunk).await?;
        gesendet += n as u64;
        chunks += 1;
    }

    tracing::debug!(datei = %header.filename, bytes = gesendet, chunks, "Datei gesendet");
    Ok(TransferSummary {
        filename: header.filename,
        bytes: gesendet,
        chunks,
    })
}

// ---------------------------------------------------------------------------
// Empfangen
// ---------------------------------------------------------------------------

/// Liest einen laufenden Transfer Block fuer Block
///
/// Wird sowohl vom Empfaenger als auch beim Weiterleiten auf dem Server
/// verwendet.
#[derive(Debug)]
pub struct TransferReader {
    header: TransferHeader,
    empfangen: u64,
    chunks: u64,
}

impl TransferReader {
    /// Liest den Header-Block
    pub async fn begin<R>(reader: &mut R) -> TransferResult<Self>
    where
        R: AsyncRead + Unpin,
    {
        let record = read_record(reader).await?;
        Self::from_header_record(&record)
    }

    pub fn from_header_record(record: &Record) -> TransferResult<Self> {
        if record.kind != RecordKind::TransferChunk {
            return Err(TransferError::UnexpectedRecord(Box::new(record.clone())));
        }
        Ok(Self {
            header: TransferHeader::parse(record.payload())?,
            empfangen: 0,
            chunks: 0,
        })
    }

    pub fn header(&self) -> &TransferHeader {
        &self.header
    }

    pub fn received(&self) -> u64 {
        self.empfangen
    }

    pub fn is_complete(&self) -> bool {
        self.empfangen >= self.header.total_size
    }

    /// Liest den naechsten Datenblock; `None` sobald die angekuendigte
    /// Groesse erreicht ist
    pub async fn next_chunk<R>(&mut self, reader: &mut R) -> TransferResult<Option<Record>>
    where
        R: AsyncRead + Unpin,
    {
        if self.is_complete() {
            return Ok(None);
        }

        let record = match read_record(reader).await {
            Ok(record) => record,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(TransferError::Incomplete {
                    expected: self.header.total_size,
                    received: self.empfangen,
                });
            }
            Err(e) => return Err(e.into()),
        };

        if record.kind != RecordKind::TransferChunk {
            return Err(TransferError::UnexpectedRecord(Box::new(record)));
        }
        let neu = self.empfangen + record.payload_len() as u64;
        if neu > self.header.total_size {
            return Err(TransferError::Overrun {
                expected: self.header.total_size,
            });
        }

        self.empfangen = neu;
        self.chunks += 1;
        Ok(Some(record))
    }

    pub fn summary(&self) -> TransferSummary {
        TransferSummary {
            filename: self.header.filename.clone(),
            bytes: self.empfangen,
            chunks: self.chunks,
        }
    }
}

/// Empfaengt einen Transfer nach `zielverzeichnis/<dateiname>`
///
/// Die Ankuendigung muss bereits gelesen sein. Bei Fehlern bleiben die bis
/// dahin geschriebenen Daten auf der Platte.
pub async fn receive_file<R>(reader: &mut R, zielverzeichnis: &Path) -> TransferResult<TransferSummary>
where
    R: AsyncRead + Unpin,
{
    let mut transfer = TransferReader::begin(reader).await?;
    let pfad = zielverzeichnis.join(&transfer.header().filename);
    let mut datei = tokio::fs::File::create(&pfad).await?;

    let ergebnis = async {
        while let Some(chunk) = transfer.next_chunk(reader).await? {
            datei.write_all(chunk.payload()).await?;
        }
        Ok::<_, TransferError>(())
    }
    .await;

    datei.flush().await?;
    ergebnis?;

    tracing::debug!(pfad = %pfad.display(), bytes = transfer.received(), "Datei empfangen");
    Ok(transfer.summary())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
