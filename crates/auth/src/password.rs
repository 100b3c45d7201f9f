//! Passwort-Hashing mit Argon2id
//!
//! Stellt Passwort-Hashfunktionen mit Argon2id bereit.
//! Argon2id ist der empfohlene Algorithmus gemaess OWASP-Richtlinien.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Argon2id-Parameter
///
/// Standardwerte gemaess OWASP-Empfehlungen (Stand 2024):
/// - Speicher: 64 MiB
/// - Iterationen: 3
/// - Parallelismus: 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordParams {
    /// m_cost in KiB
    pub speicher_kib: u32,
    /// t_cost
    pub iterationen: u32,
    /// p_cost
    pub parallelitaet: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            speicher_kib: 64 * 1024,
            iterationen: 3,
            parallelitaet: 1,
        }
    }
}

impl PasswordParams {
    /// Minimale Kosten fuer Tests
    pub fn for_tests() -> Self {
        Self {
            speicher_kib: 8,
            iterationen: 1,
            parallelitaet: 1,
        }
    }

    fn argon2_instanz(&self) -> AuthResult<Argon2<'static>> {
        let params = Params::new(
            self.speicher_kib,
            self.iterationen,
            self.parallelitaet,
            None, // output_len: Standard (32 Bytes)
        )
        .map_err(|e| AuthError::PasswortHashing(format!("Argon2-Parameter ungueltig: {e}")))?;

        Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hasht ein Passwort mit Argon2id und einem zufaelligen Salt
///
/// Gibt den PHC-String zurueck (inkl. Algorithmus, Parameter und Salt).
pub fn passwort_hashen(passwort: &str, params: &PasswordParams) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.argon2_instanz()?;

    argon2
        .hash_password(passwort.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswortHashing(e.to_string()))
}

/// Verifiziert ein Passwort gegen einen gespeicherten PHC-Hash
///
/// Die Parameter stammen aus dem Hash selbst.
pub fn passwort_verifizieren(passwort: &str, hash: &str) -> AuthResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::PasswortHashing(format!("Ungueltiges Hash-Format: {e}")))?;

    match Argon2::default().verify_password(passwort.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswortHashing(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwort_hashen_und_verifizieren() {
        let passwort = "sicheres_passwort_123!";
        let hash = passwort_hashen(passwort, &PasswordParams::for_tests())
            .expect("Hashing fehlgeschlagen");

        assert!(
            hash.starts_with("$argon2id$"),
            "Hash muss mit $argon2id$ beginnen"
        );

        let korrekt = passwort_verifizieren(passwort, &hash).expect("Verifikation fehlgeschlagen");
        assert!(korrekt, "Passwort muss korrekt verifiziert werden");
        let falsch = passwort_verifizieren("anderes", &hash).expect("Verifikation fehlgeschlagen");
        assert!(!falsch, "Falsches Passwort muss abgelehnt werden");
    }

    #[test]
    fn gleiche_passwoerter_unterschiedliche_hashes() {
        let params = PasswordParams::for_tests();
        let hash1 = passwort_hashen("gleich", &params).unwrap();
        let hash2 = passwort_hashen("gleich", &params).unwrap();
        assert_ne!(hash1, hash2, "Salt muss verschiedene Hashes erzeugen");
    }

    #[test]
    fn standardparameter_im_hash() {
        let hash = passwort_hashen("x", &PasswordParams::default()).unwrap();
        assert!(hash.contains("m=65536,t=3,p=1"), "{hash}");
    }

    #[test]
    fn ungueltige_parameter_sind_fehler() {
        let params = PasswordParams {
            speicher_kib: 0,
            iterationen: 0,
            parallelitaet: 0,
        };
        assert!(matches!(
            passwort_hashen("x", &params),
            Err(AuthError::PasswortHashing(_))
        ));
    }

    #[test]
    fn ungueltiges_hash_format_gibt_fehler() {
        assert!(passwort_verifizieren("passwort", "kein_gueltiger_hash").is_err());
    }

    #[test]
    fn parameter_aus_toml() {
        let params: PasswordParams = toml::from_str("iterationen = 5").unwrap();
        assert_eq!(params.iterationen, 5);
        assert_eq!(params.speicher_kib, 64 * 1024);
    }
}
