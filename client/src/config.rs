//! Client-Konfiguration
//!
//! Wird aus der Datei in `POSTILLON_CLIENT_CONFIG` geladen (Standard:
//! `postillon_client.toml`). Fehlt die Datei, gelten die Standardwerte.

use std::path::{Path, PathBuf};

use postillon_observability::LogFormat;
use serde::{Deserialize, Serialize};

/// Standardpfad der Konfigurationsdatei
pub const STANDARD_CONFIG_PFAD: &str = "postillon_client.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Kanal zum Server
    pub tls: ServerTls,
    /// Kanal fuer Direktverbindungen zwischen Clients
    pub direkt: DirektEinstellungen,
    pub dateien: DateiEinstellungen,
    pub logging: LoggingEinstellungen,
}

/// TLS zum Server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerTls {
    pub aktiviert: bool,
    /// CA-Datei (PEM), z.B. das vom Server exportierte Zertifikat.
    /// Ohne Angabe gelten die webpki-Wurzelzertifikate.
    pub ca_datei: Option<PathBuf>,
    /// Name fuer die Zertifikatspruefung; Standard ist die Server-IP
    pub server_name: Option<String>,
}

impl Default for ServerTls {
    fn default() -> Self {
        Self {
            aktiviert: true,
            ca_datei: None,
            server_name: None,
        }
    }
}

/// Direktmodus; standardmaessig unverschluesselt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirektEinstellungen {
    pub tls: bool,
    /// Eigenes Zertifikat fuer eingehende Direktverbindungen
    pub zertifikat: Option<PathBuf>,
    pub schluessel: Option<PathBuf>,
    /// Ziel fuer ein selbstsigniertes Zertifikat, falls keins angegeben ist
    pub zertifikat_export: Option<PathBuf>,
    /// CA fuer ausgehende Direktverbindungen
    pub ca_datei: Option<PathBuf>,
    pub server_name: String,
}

impl Default for DirektEinstellungen {
    fn default() -> Self {
        Self {
            tls: false,
            zertifikat: None,
            schluessel: None,
            zertifikat_export: None,
            ca_datei: None,
            server_name: "localhost".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DateiEinstellungen {
    /// Empfangene Dateien und Stream-Aufzeichnungen
    pub download_verzeichnis: PathBuf,
    /// Groesse der Frames beim Streamen einer Datei
    pub frame_groesse: usize,
}

impl Default for DateiEinstellungen {
    fn default() -> Self {
        Self {
            download_verzeichnis: PathBuf::from("downloads"),
            frame_groesse: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: LogFormat::Text,
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration; eine fehlende Datei ergibt Standardwerte
    pub fn laden(pfad: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt).map_err(|e| {
                anyhow::anyhow!("Konfigurationsfehler in '{}': {e}", pfad.display())
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{}' nicht lesbar: {e}",
                pfad.display()
            )),
        }
    }
}
