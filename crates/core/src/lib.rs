//! postillon-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die Bausteine bereit, die von Server, Client und
//! Protokoll gleichermassen genutzt werden.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::ClientId;
