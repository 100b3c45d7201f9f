//! postillon-auth – Registrierung und Anmeldung
//!
//! Dieses Crate implementiert:
//! - Passwort-Hashing mit Argon2id
//! - CredentialStore (Benutzername -> Hash, als Textdatei gespiegelt)

pub mod error;
pub mod password;
pub mod store;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult, ERFOLG_TEXT};
pub use password::{passwort_hashen, passwort_verifizieren, PasswordParams};
pub use store::CredentialStore;
