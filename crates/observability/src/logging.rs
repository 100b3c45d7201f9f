//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `POSTILLON_LOG`: Filter (z.B. `debug` oder `postillon_signaling=trace`),
//!   hat Vorrang vor dem konfigurierten Level
//! - `POSTILLON_LOG_FORMAT`: Format (text/json), hat Vorrang vor der Konfiguration

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Filter
pub const LOG_ENV: &str = "POSTILLON_LOG";

/// Umgebungsvariable fuer das Log-Format
pub const LOG_FORMAT_ENV: &str = "POSTILLON_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parst `text` oder `json`
    pub fn parse(wert: &str) -> Option<Self> {
        match wert {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Ziel der Log-Ausgabe
///
/// Der interaktive Client schreibt auf stderr, damit stdout frei bleibt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAusgabe {
    Stdout,
    Stderr,
}

/// Initialisiert das Logging-System.
///
/// `POSTILLON_LOG` und `POSTILLON_LOG_FORMAT` ueberschreiben die Parameter.
/// Ein bereits gesetzter globaler Subscriber bleibt bestehen.
pub fn logging_initialisieren(level: &str, format: LogFormat, ausgabe: LogAusgabe) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = std::env::var(LOG_FORMAT_ENV)
        .ok()
        .and_then(|f| LogFormat::parse(&f))
        .unwrap_or(format);

    let ergebnis = match (format, ausgabe) {
        (LogFormat::Json, LogAusgabe::Stdout) => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        (LogFormat::Json, LogAusgabe::Stderr) => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .try_init(),
        (LogFormat::Text, LogAusgabe::Stdout) => {
            fmt().with_env_filter(filter).with_target(true).try_init()
        }
        (LogFormat::Text, LogAusgabe::Stderr) => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if let Err(e) = ergebnis {
        tracing::debug!(fehler = %e, "Logging bereits initialisiert");
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}
