//! TLS-Kanal (tokio-rustls)
//!
//! Server: Zertifikat + Schluessel aus PEM (Datei oder String).
//! Client: Vertrauensanker aus einer CA-PEM-Datei oder den WebPKI-Roots.

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use rustls_pemfile::{certs, private_key};
use tokio::net::TcpStream;
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tracing::{debug, info, warn};

use crate::error::{CryptoError, CryptoResult};
use crate::kanal::{ChannelAcceptor, ChannelConnector, Kanal};
use crate::zertifikat::{compute_certificate_fingerprint, SelfSignedCert};

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Serverseitiger TLS-Handshake
pub struct TlsKanalAcceptor {
    acceptor: TlsAcceptor,
    fingerprint: String,
}

impl TlsKanalAcceptor {
    /// Erstellt den Acceptor aus PEM-kodiertem Zertifikat und Schluessel
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> CryptoResult<Self> {
        let cert_chain = parse_certificates(cert_pem)?;
        let fingerprint = cert_chain
            .first()
            .map(|c| compute_certificate_fingerprint(c.as_ref()))
            .ok_or_else(|| CryptoError::Tls("Kein Zertifikat gefunden".to_string()))?;
        let private_key = parse_private_key(key_pem)?;

        let tls_config = ServerConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()
            .map_err(|e| CryptoError::Tls(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(cert_chain, private_key)
            .map_err(|e| CryptoError::Tls(e.to_string()))?;

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(tls_config)),
            fingerprint,
        })
    }

    /// Liest Zertifikat und Schluessel aus PEM-Dateien
    pub async fn from_files(cert_pfad: &Path, key_pfad: &Path) -> CryptoResult<Self> {
        let cert_pem = tokio::fs::read_to_string(cert_pfad).await?;
        let key_pem = tokio::fs::read_to_string(key_pfad).await?;
        let acceptor = Self::from_pem(&cert_pem, &key_pem)?;
        info!(
            cert = %cert_pfad.display(),
            fingerprint = %acceptor.fingerprint,
            "TLS-Zertifikat geladen"
        );
        Ok(acceptor)
    }

    pub fn from_self_signed(cert: &SelfSignedCert) -> CryptoResult<Self> {
        Self::from_pem(&cert.cert_pem, &cert.key_pem)
    }

    /// SHA-256 Fingerprint des Server-Zertifikats
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl std::fmt::Debug for TlsKanalAcceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsKanalAcceptor")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

#[async_trait]
impl ChannelAcceptor for TlsKanalAcceptor {
    async fn accept(&self, stream: TcpStream) -> io::Result<Kanal> {
        let peer = stream.peer_addr().ok();
        let tls = self.acceptor.accept(stream).await.map_err(|e| {
            debug!(?peer, fehler = %e, "TLS-Handshake fehlgeschlagen");
            e
        })?;
        Ok(Box::new(tls))
    }

    fn bezeichnung(&self) -> &'static str {
        "tls"
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Clientseitiger TLS-Handshake mit Zertifikatspruefung
pub struct TlsKanalConnector {
    connector: TlsConnector,
}

impl TlsKanalConnector {
    /// Vertraut genau den Zertifikaten aus `ca_pem`
    pub fn mit_ca_pem(ca_pem: &str) -> CryptoResult<Self> {
        let mut roots = RootCertStore::empty();
        for cert in parse_certificates(ca_pem)? {
            roots
                .add(cert)
                .map_err(|e| CryptoError::Tls(format!("CA-Zertifikat ungueltig: {e}")))?;
        }
        if roots.is_empty() {
            return Err(CryptoError::Tls("Keine CA-Zertifikate gefunden".to_string()));
        }
        Self::mit_roots(roots)
    }

    pub async fn mit_ca_datei(pfad: &Path) -> CryptoResult<Self> {
        let pem = tokio::fs::read_to_string(pfad).await?;
        let connector = Self::mit_ca_pem(&pem)?;
        info!(ca = %pfad.display(), "CA-Zertifikate geladen");
        Ok(connector)
    }

    /// Vertraut den WebPKI-Roots
    pub fn mit_webpki_roots() -> CryptoResult<Self> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::mit_roots(roots)
    }

    fn mit_roots(roots: RootCertStore) -> CryptoResult<Self> {
        let tls_config = ClientConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()
            .map_err(|e| CryptoError::Tls(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(tls_config)),
        })
    }
}

impl std::fmt::Debug for TlsKanalConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsKanalConnector").finish_non_exhaustive()
    }
}

#[async_trait]
impl ChannelConnector for TlsKanalConnector {
    async fn connect(&self, stream: TcpStream, server_name: &str) -> io::Result<Kanal> {
        let name = ServerName::try_from(server_name.to_string()).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                CryptoError::UngueltigerServername(format!("{server_name}: {e}")),
            )
        })?;
        let tls = self.connector.connect(name, stream).await.map_err(|e| {
            warn!(server = server_name, fehler = %e, "TLS-Handshake zum Server fehlgeschlagen");
            e
        })?;
        Ok(Box::new(tls))
    }

    fn bezeichnung(&self) -> &'static str {
        "tls"
    }
}

// ---------------------------------------------------------------------------
// PEM-Parsing
// ---------------------------------------------------------------------------

fn parse_certificates(pem: &str) -> CryptoResult<Vec<CertificateDer<'static>>> {
    let mut cursor = std::io::Cursor::new(pem.as_bytes());
    certs(&mut cursor)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CryptoError::Tls(format!("Zertifikat-Parsing fehlgeschlagen: {}", e)))
}

fn parse_private_key(pem: &str) -> CryptoResult<PrivateKeyDer<'static>> {
    let mut cursor = std::io::Cursor::new(pem.as_bytes());
    private_key(&mut cursor)
        .map_err(|e| CryptoError::Tls(format!("Schluessel-Parsing fehlgeschlagen: {}", e)))?
        .ok_or_else(|| CryptoError::Tls("Kein privater Schluessel gefunden".to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
