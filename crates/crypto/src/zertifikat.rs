//! Selbstsignierte Zertifikate
//!
//! Fuer Development werden selbstsignierte Zertifikate via rcgen generiert.
//! In Produktion werden echte Zertifikate ueber die Konfiguration geladen.

use rcgen::{CertificateParams, DistinguishedName, KeyPair as RcgenKeyPair};

use crate::error::{CryptoError, CryptoResult};

/// PEM-Material eines selbstsignierten Zertifikats
#[derive(Clone)]
pub struct SelfSignedCert {
    pub cert_pem: String,
    pub key_pem: String,
    /// SHA-256 Fingerprint (XX:XX:...)
    pub fingerprint: String,
}

impl std::fmt::Debug for SelfSignedCert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfSignedCert")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// Generiert ein selbstsigniertes Zertifikat
///
/// `common_name` wird auch als DNS-Name (SAN) eingetragen; Clients muessen
/// ihn als Servernamen verwenden.
pub fn generate_self_signed(common_name: &str) -> CryptoResult<SelfSignedCert> {
    let mut params = CertificateParams::new(vec![common_name.to_string()])
        .map_err(|e| CryptoError::ZertifikatGenerierung(e.to_string()))?;

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(rcgen::DnType::CommonName, common_name);
    params.distinguished_name = distinguished_name;

    let key_pair =
        RcgenKeyPair::generate().map_err(|e| CryptoError::ZertifikatGenerierung(e.to_string()))?;

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CryptoError::ZertifikatGenerierung(e.to_string()))?;

    Ok(SelfSignedCert {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        fingerprint: compute_certificate_fingerprint(cert.der()),
    })
}

/// Berechnet den SHA-256 Fingerprint eines DER-kodierten Zertifikats
pub fn compute_certificate_fingerprint(der_bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(der_bytes);
    hash.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}
