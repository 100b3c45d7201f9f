//! Fehlertypen fuer den Zugangsdaten-Speicher

use thiserror::Error;

/// Antworttext fuer erfolgreiche Registrierung
pub const ERFOLG_TEXT: &str = "Success";

/// Alle moeglichen Fehler beim Registrieren und Anmelden
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Benutzerverwaltung ---
    #[error("Benutzername bereits vergeben: {0}")]
    BenutzernameVergeben(String),

    #[error("Benutzer nicht gefunden: {0}")]
    BenutzerNichtGefunden(String),

    // --- Authentifizierung ---
    #[error("Falsches Passwort")]
    FalschesPasswort,

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    // --- Passwort ---
    #[error("Passwort-Hashing fehlgeschlagen: {0}")]
    PasswortHashing(String),

    // --- Speicher ---
    #[error("Zugangsdaten-Datei nicht lesbar/schreibbar: {0}")]
    Speicher(#[from] std::io::Error),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Fester Antworttext fuer RESPONSE-Records
    pub fn protocol_text(&self) -> &'static str {
        match self {
            AuthError::BenutzernameVergeben(_) => "Username already exists",
            AuthError::BenutzerNichtGefunden(_) => "Username not found",
            AuthError::FalschesPasswort => "Wrong password",
            AuthError::UngueltigeEingabe(_) => "Invalid input",
            AuthError::PasswortHashing(_) | AuthError::Speicher(_) | AuthError::Intern(_) => {
                "Internal error"
            }
        }
    }
}

/// Result-Alias fuer den Zugangsdaten-Speicher
pub type AuthResult<T> = Result<T, AuthError>;
