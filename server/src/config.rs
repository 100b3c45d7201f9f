//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Werte von der Kommandozeile haben Vorrang.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use postillon_auth::PasswordParams;
use postillon_observability::LogFormat;
use postillon_signaling::{SignalingConfig, Zeitlimits};
use serde::{Deserialize, Serialize};

/// Standardpfad der Konfigurationsdatei
pub const STANDARD_CONFIG_PFAD: &str = "postillon.toml";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Adresse, Backlog, Worker
    pub server: ServerEinstellungen,
    /// Gesicherter Kanal
    pub tls: TlsEinstellungen,
    /// Benutzerdatei und Passwort-Hashing
    pub auth: AuthEinstellungen,
    pub timeouts: TimeoutEinstellungen,
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    pub bind_adresse: String,
    pub port: u16,
    /// Listen-Backlog fuer noch nicht angenommene Verbindungen
    pub max_pending: u32,
    /// Anzahl gleichzeitig bedienter Sitzungen
    pub worker_count: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 4711,
            max_pending: 10,
            worker_count: 10,
        }
    }
}

/// TLS-Einstellungen
///
/// Ohne Zertifikat und Schluessel erzeugt der Server beim Start ein
/// selbstsigniertes Zertifikat fuer `common_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsEinstellungen {
    /// `false` nur fuer Entwicklung: Klartext auf der Leitung
    pub aktiviert: bool,
    /// Zertifikatskette (PEM)
    pub zertifikat: Option<PathBuf>,
    /// Privater Schluessel (PEM)
    pub schluessel: Option<PathBuf>,
    /// Hierhin wird ein selbstsigniertes Zertifikat geschrieben, damit
    /// Clients es als CA-Datei verwenden koennen
    pub zertifikat_export: Option<PathBuf>,
    pub common_name: String,
}

impl Default for TlsEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            zertifikat: None,
            schluessel: None,
            zertifikat_export: None,
            common_name: "localhost".into(),
        }
    }
}

/// Benutzerverwaltung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEinstellungen {
    /// Datei mit einer Zeile `benutzer hash` pro Konto
    pub datei: PathBuf,
    pub argon2: PasswordParams,
}

impl Default for AuthEinstellungen {
    fn default() -> Self {
        Self {
            datei: PathBuf::from("postillon_users.txt"),
            argon2: PasswordParams::default(),
        }
    }
}

/// Zeitlimits in Sekunden; `0` schaltet Leerlauf- und Schreiblimit ab
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutEinstellungen {
    pub handshake_sek: u64,
    pub join_sek: u64,
    pub leerlauf_sek: u64,
    pub schreib_sek: u64,
}

impl Default for TimeoutEinstellungen {
    fn default() -> Self {
        Self {
            handshake_sek: 10,
            join_sek: 10,
            leerlauf_sek: 0,
            schreib_sek: 10,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

fn optional_sek(sek: u64) -> Option<Duration> {
    (sek > 0).then(|| Duration::from_secs(sek))
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt).map_err(|e| {
                anyhow::anyhow!("Konfigurationsfehler in '{}': {e}", pfad.display())
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = %pfad.display(),
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{}' nicht lesbar: {e}",
                pfad.display()
            )),
        }
    }

    /// Uebernimmt Werte von der Kommandozeile
    pub fn cli_anwenden(&mut self, port: u16, max_pending: Option<u32>, worker_count: Option<usize>) {
        self.server.port = port;
        if let Some(max_pending) = max_pending {
            self.server.max_pending = max_pending;
        }
        if let Some(worker_count) = worker_count {
            self.server.worker_count = worker_count;
        }
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let text = format!("{}:{}", self.server.bind_adresse, self.server.port);
        text.parse()
            .map_err(|e| anyhow::anyhow!("Ungueltige Bind-Adresse '{text}': {e}"))
    }

    /// Einstellungen fuer den Signaling-Service
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            worker_count: self.server.worker_count,
            max_pending: self.server.max_pending,
            zeitlimits: Zeitlimits {
                handshake: Duration::from_secs(self.timeouts.handshake_sek.max(1)),
                join: Duration::from_secs(self.timeouts.join_sek.max(1)),
                leerlauf: optional_sek(self.timeouts.leerlauf_sek),
                schreiben: optional_sek(self.timeouts.schreib_sek),
            },
        }
    }
}
