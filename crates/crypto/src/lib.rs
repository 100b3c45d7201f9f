//! # postillon-crypto
//!
//! Gesicherter Kanal fuer Postillon.
//!
//! ## Module
//! - `kanal` - `Kanal`-Typ und Handshake-Traits, Klartext-Variante
//! - `tls` - TLS ueber TCP (tokio-rustls)
//! - `zertifikat` - Selbstsignierte Zertifikate (rcgen)
//! - `error` - Fehlertypen

pub mod error;
pub mod kanal;
pub mod tls;
pub mod zertifikat;

// Bequeme Re-Exports
pub use error::{CryptoError, CryptoResult};
pub use kanal::{ChannelAcceptor, ChannelConnector, Kanal, KanalStream, KlartextAcceptor, KlartextConnector};
pub use tls::{TlsKanalAcceptor, TlsKanalConnector};
pub use zertifikat::{compute_certificate_fingerprint, generate_self_signed, SelfSignedCert};
