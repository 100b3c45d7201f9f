//! Fehlertypen fuer den Signaling-Service

use postillon_protocol::{FrameError, TransferError};
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
///
/// Jeder Fehler beendet nur die Sitzung, in der er auftritt.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, TLS, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Dateitransfer des Absenders fehlgeschlagen
    #[error("Transferfehler: {0}")]
    Transfer(#[from] TransferError),

    /// Stream des Absenders fehlgeschlagen
    #[error("Streamfehler: {0}")]
    Stream(#[from] FrameError),
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
