//! postillon-server – Bibliotheks-Root
//!
//! Baut aus der Konfiguration Kanal, Benutzerverwaltung und
//! Signaling-Server zusammen und stellt den Einstiegspunkt fuer
//! Integrationstests bereit.

pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::{ServerConfig, TlsEinstellungen};
use postillon_auth::CredentialStore;
use postillon_crypto::{generate_self_signed, ChannelAcceptor, KlartextAcceptor, TlsKanalAcceptor};
use postillon_signaling::{SignalingServer, SignalingState};
use tokio_util::sync::CancellationToken;

/// Haelt den Server-Zustand bis zum Start zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Laedt Kanal-Material und Benutzerdatei und bindet den Socket
    ///
    /// Reihenfolge:
    /// 1. TLS-Acceptor (Dateien oder selbstsigniert)
    /// 2. Benutzerdatei laden
    /// 3. Socket binden, Worker-Pool starten
    pub async fn binden(&self) -> Result<SignalingServer> {
        let acceptor = acceptor_erstellen(&self.config.tls).await?;

        let credentials = CredentialStore::open(&self.config.auth.datei, self.config.auth.argon2)
            .await
            .with_context(|| {
                format!(
                    "Benutzerdatei '{}' nicht ladbar",
                    self.config.auth.datei.display()
                )
            })?;
        tracing::info!(
            datei = %self.config.auth.datei.display(),
            benutzer = credentials.anzahl().await,
            "Benutzerdatei geladen"
        );

        let state = Arc::new(SignalingState::neu(
            self.config.signaling_config(),
            Arc::new(credentials),
            acceptor,
        ));
        let adresse = self.config.bind_adresse()?;
        SignalingServer::binden(state, adresse)
            .with_context(|| format!("Bind auf {adresse} fehlgeschlagen"))
    }

    /// Bindet und laeuft bis `shutdown` ausgeloest wird
    pub async fn starten(self, shutdown: CancellationToken) -> Result<()> {
        let server = self.binden().await?;
        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        server.starten(shutdown).await?;
        Ok(())
    }
}

/// Waehlt den Kanal anhand der TLS-Einstellungen
pub async fn acceptor_erstellen(tls: &TlsEinstellungen) -> Result<Arc<dyn ChannelAcceptor>> {
    if !tls.aktiviert {
        tracing::warn!("TLS deaktiviert – Verbindungen sind unverschluesselt");
        return Ok(Arc::new(KlartextAcceptor));
    }

    let acceptor = match (&tls.zertifikat, &tls.schluessel) {
        (Some(zertifikat), Some(schluessel)) => {
            TlsKanalAcceptor::from_files(zertifikat, schluessel)
                .await
                .context("TLS-Material nicht ladbar")?
        }
        (None, None) => {
            let cert = generate_self_signed(&tls.common_name)?;
            if let Some(export) = &tls.zertifikat_export {
                tokio::fs::write(export, &cert.cert_pem)
                    .await
                    .with_context(|| {
                        format!("Zertifikat nicht nach '{}' schreibbar", export.display())
                    })?;
                tracing::info!(pfad = %export.display(), "Selbstsigniertes Zertifikat exportiert");
            }
            TlsKanalAcceptor::from_self_signed(&cert)?
        }
        _ => anyhow::bail!("[tls] zertifikat und schluessel muessen gemeinsam gesetzt sein"),
    };

    tracing::info!(fingerprint = %acceptor.fingerprint(), "TLS aktiv");
    Ok(Arc::new(acceptor))
}
