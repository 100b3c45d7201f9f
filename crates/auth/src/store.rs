//! Zugangsdaten-Speicher
//!
//! Haelt `benutzername -> Argon2id-Hash` im Speicher und spiegelt den
//! Bestand in eine Textdatei (eine Zeile `benutzername hash` pro Benutzer).
//! Jede Aenderung schreibt die Datei vollstaendig neu.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::error::{AuthError, AuthResult};
use crate::password::{passwort_hashen, passwort_verifizieren, PasswordParams};

/// Thread-sicherer Speicher fuer Benutzername und Passwort-Hash
#[derive(Debug)]
pub struct CredentialStore {
    pfad: PathBuf,
    params: PasswordParams,
    eintraege: Mutex<BTreeMap<String, String>>,
}

impl CredentialStore {
    /// Laedt den Speicher aus `pfad`; eine fehlende Datei ergibt einen
    /// leeren Speicher
    pub async fn open(pfad: impl Into<PathBuf>, params: PasswordParams) -> AuthResult<Self> {
        let pfad = pfad.into();
        let eintraege = match tokio::fs::read_to_string(&pfad).await {
            Ok(inhalt) => eintraege_parsen(&inhalt, &pfad),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(pfad = %pfad.display(), "Keine Zugangsdaten-Datei, starte leer");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            pfad = %pfad.display(),
            benutzer = eintraege.len(),
            "Zugangsdaten geladen"
        );

        Ok(Self {
            pfad,
            params,
            eintraege: Mutex::new(eintraege),
        })
    }

    pub fn pfad(&self) -> &Path {
        &self.pfad
    }

    pub async fn anzahl(&self) -> usize {
        self.eintraege.lock().await.len()
    }

    pub async fn existiert(&self, username: &str) -> bool {
        self.eintraege.lock().await.contains_key(username)
    }

    /// Registriert einen neuen Benutzer
    ///
    /// Der Hash wird ausserhalb der Sperre berechnet; die Eindeutigkeit wird
    /// beim Einfuegen erneut geprueft.
    pub async fn register(&self, username: &str, passwort: &str) -> AuthResult<()> {
        eingabe_pruefen(username, passwort)?;

        if self.existiert(username).await {
            return Err(AuthError::BenutzernameVergeben(username.to_string()));
        }

        let params = self.params;
        let passwort = passwort.to_string();
        let hash = tokio::task::spawn_blocking(move || passwort_hashen(&passwort, &params))
            .await
            .map_err(|e| AuthError::intern(format!("Hash-Task abgebrochen: {e}")))??;

        let mut eintraege = self.eintraege.lock().await;
        if eintraege.contains_key(username) {
            return Err(AuthError::BenutzernameVergeben(username.to_string()));
        }
        eintraege.insert(username.to_string(), hash);

        if let Err(e) = datei_schreiben(&self.pfad, &eintraege).await {
            // Speicher und Datei muessen uebereinstimmen
            eintraege.remove(username);
            return Err(e.into());
        }

        tracing::info!(username = %username, "Neuer Benutzer registriert");
        Ok(())
    }

    /// Prueft Benutzername und Passwort
    pub async fn verify(&self, username: &str, passwort: &str) -> AuthResult<()> {
        eingabe_pruefen(username, passwort)?;

        let hash = self
            .eintraege
            .lock()
            .await
            .get(username)
            .cloned()
            .ok_or_else(|| AuthError::BenutzerNichtGefunden(username.to_string()))?;

        let passwort = passwort.to_string();
        let korrekt = tokio::task::spawn_blocking(move || passwort_verifizieren(&passwort, &hash))
            .await
            .map_err(|e| AuthError::intern(format!("Verifikations-Task abgebrochen: {e}")))??;

        if korrekt {
            Ok(())
        } else {
            tracing::warn!(username = %username, "Fehlgeschlagener Login-Versuch");
            Err(AuthError::FalschesPasswort)
        }
    }
}

fn eingabe_pruefen(username: &str, passwort: &str) -> AuthResult<()> {
    if username.is_empty() || passwort.is_empty() {
        return Err(AuthError::UngueltigeEingabe(
            "Benutzername und Passwort duerfen nicht leer sein".into(),
        ));
    }
    if username.chars().any(char::is_whitespace) || passwort.chars().any(char::is_whitespace) {
        return Err(AuthError::UngueltigeEingabe(
            "Benutzername und Passwort duerfen keine Leerzeichen enthalten".into(),
        ));
    }
    Ok(())
}

fn eintraege_parsen(inhalt: &str, pfad: &Path) -> BTreeMap<String, String> {
    let mut eintraege = BTreeMap::new();
    for (nr, zeile) in inhalt.lines().enumerate() {
        let zeile = zeile.trim();
        if zeile.is_empty() {
            continue;
        }
        match zeile.split_once(' ') {
            Some((username, hash)) if !username.is_empty() && !hash.trim().is_empty() => {
                eintraege.insert(username.to_string(), hash.trim().to_string());
            }
            _ => {
                tracing::warn!(pfad = %pfad.display(), zeile = nr + 1, "Ungueltige Zeile uebersprungen");
            }
        }
    }
    eintraege
}

/// Schreibt alle Eintraege in eine temporaere Datei und benennt sie um
async fn datei_schreiben(pfad: &Path, eintraege: &BTreeMap<String, String>) -> io::Result<()> {
    if let Some(verzeichnis) = pfad.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(verzeichnis).await?;
    }

    let mut inhalt = String::new();
    for (username, hash) in eintraege {
        inhalt.push_str(username);
        inhalt.push(' ');
        inhalt.push_str(hash);
        inhalt.push('\n');
    }

    let temp = pfad.with_extension("tmp");
    tokio::fs::write(&temp, inhalt).await?;
    tokio::fs::rename(&temp, pfad).await
}
