//! Fehlertypen fuer den gesicherten Kanal

use thiserror::Error;

/// Fehler beim Aufbau des gesicherten Kanals
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Zertifikat-Generierung fehlgeschlagen: {0}")]
    ZertifikatGenerierung(String),

    #[error("TLS-Fehler: {0}")]
    Tls(String),

    #[error("Ungueltiger Servername: {0}")]
    UngueltigerServername(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

/// Result-Alias fuer Kanal-Operationen
pub type CryptoResult<T> = Result<T, CryptoError>;
