//! Fehlertypen fuer den Client

use postillon_crypto::CryptoError;
use postillon_protocol::{FrameError, RecordError, TransferError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Kanal-Fehler: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Transferfehler: {0}")]
    Transfer(#[from] TransferError),

    #[error("Streamfehler: {0}")]
    Stream(#[from] FrameError),

    /// Nachricht passt nicht in einen Record
    #[error("Record-Fehler: {0}")]
    Record(#[from] RecordError),

    #[error("Server hat das JOIN nicht bestaetigt: {0}")]
    KeineBestaetigung(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    /// Es laeuft bereits eine Wiedergabe
    #[error("Wiedergabe laeuft bereits")]
    WiedergabeAktiv,
}

pub type ClientResult<T> = Result<T, ClientError>;
