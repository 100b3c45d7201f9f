//! Client-Sitzung: Serververbindung, Direkt-Listener, Befehlsausfuehrung
//!
//! `Client::starten` bindet zuerst den Direkt-Listener, meldet dessen
//! tatsaechlichen Port im JOIN und startet dann zwei Empfangs-Tasks.
//! Alles, was die Tasks empfangen, kommt als `Ereignis` beim Aufrufer an.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use postillon_core::ClientId;
use postillon_crypto::{
    generate_self_signed, ChannelAcceptor, ChannelConnector, KlartextAcceptor,
    KlartextConnector, TlsKanalAcceptor, TlsKanalConnector,
};
use postillon_protocol::stream::{play, stream_from_source};
use postillon_protocol::transfer::send_file;
use postillon_protocol::{write_record, Record, RecordKind, StreamingQueue, Zugangsdaten};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::commands::{Befehl, HILFE};
use crate::config::{ClientConfig, DirektEinstellungen, ServerTls};
use crate::connection::{server_lauschen, Schreiber, ServerVerbindung};
use crate::direct::{DirektListener, DirektVerbinder, UNBEKANNTE_ID};
use crate::empfang::EmpfangsKontext;
use crate::error::{ClientError, ClientResult};
use crate::ereignis::Ereignis;
use crate::media::{FileFrameSink, FileFrameSource};

/// Ergebnis eines Befehls fuer die Kommandozeile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Steuerung {
    /// Weiterlesen, optional mit Ausgabe
    Weiter(Option<String>),
    Beenden,
}

impl Steuerung {
    fn text(text: impl Into<String>) -> Self {
        Self::Weiter(Some(text.into()))
    }
}

pub struct Client {
    id: ClientId,
    schreiber: Schreiber,
    verbinder: DirektVerbinder,
    ctx: EmpfangsKontext,
    frame_groesse: usize,
    direkt_adresse: SocketAddr,
    token: CancellationToken,
    aufgaben: Vec<JoinHandle<()>>,
    wiedergabe_aktiv: Arc<AtomicBool>,
    wiedergabe: Option<JoinHandle<()>>,
    wiedergabe_nr: u32,
}

impl Client {
    /// Verbindet mit dem Server und startet die Empfangs-Tasks
    pub async fn starten(
        config: ClientConfig,
        server: SocketAddr,
        listen_port: u16,
    ) -> ClientResult<(Self, UnboundedReceiver<Ereignis>)> {
        tokio::fs::create_dir_all(&config.dateien.download_verzeichnis).await?;

        let listener = DirektListener::binden(listen_port, direkt_acceptor(&config.direkt).await?).await?;
        let direkt_adresse = listener.lokale_adresse()?;

        let connector = server_connector(&config.tls).await?;
        let server_name = config
            .tls
            .server_name
            .clone()
            .unwrap_or_else(|| server.ip().to_string());
        let verbindung =
            ServerVerbindung::verbinden(server, &server_name, connector.as_ref(), direkt_adresse.port())
                .await?;

        let (ereignisse, empfaenger) = mpsc::unbounded_channel();
        let ctx = EmpfangsKontext {
            ereignisse,
            queue: StreamingQueue::new(),
            download: config.dateien.download_verzeichnis.clone(),
            username: Arc::new(Mutex::new(None)),
        };

        let token = CancellationToken::new();
        let aufgaben = vec![
            tokio::spawn(server_lauschen(verbindung.leser, ctx.clone(), token.child_token())),
            tokio::spawn(listener.lauschen(ctx.clone(), token.child_token())),
        ];

        let verbinder = DirektVerbinder::neu(
            direkt_connector(&config.direkt).await?,
            config.direkt.server_name.clone(),
        );

        let client = Self {
            id: verbindung.id,
            schreiber: verbindung.schreiber,
            verbinder,
            ctx,
            frame_groesse: config.dateien.frame_groesse,
            direkt_adresse,
            token,
            aufgaben,
            wiedergabe_aktiv: Arc::new(AtomicBool::new(false)),
            wiedergabe: None,
            wiedergabe_nr: 0,
        };
        Ok((client, empfaenger))
    }

    /// Vom Server vergebene ID
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Adresse, unter der Direktverbindungen angenommen werden
    pub fn direkt_adresse(&self) -> SocketAddr {
        self.direkt_adresse
    }

    pub fn username(&self) -> Option<String> {
        self.ctx.username.lock().clone()
    }

    /// Fuehrt einen Befehl aus
    ///
    /// Fehler betreffen nur diesen Befehl; der Client bleibt benutzbar.
    pub async fn ausfuehren(&mut self, befehl: Befehl) -> ClientResult<Steuerung> {
        match befehl {
            Befehl::Quit => return Ok(Steuerung::Beenden),
            Befehl::Help => return Ok(Steuerung::text(HILFE)),
            Befehl::Whoami => {
                let name = self.username().unwrap_or_else(|| "(nicht angemeldet)".into());
                return Ok(Steuerung::text(format!(
                    "Client ID: {}, Benutzer: {name}",
                    self.id.inner()
                )));
            }
            Befehl::Register(daten) => self.zugang_senden(RecordKind::Register, &daten).await?,
            Befehl::Login(daten) => self.zugang_senden(RecordKind::Login, &daten).await?,
            Befehl::Logout => {
                self.an_server(&Record::leer(RecordKind::Logout, self.id, ClientId::SERVER))
                    .await?;
                *self.ctx.username.lock() = None;
                return Ok(Steuerung::text("Abgemeldet"));
            }
            Befehl::Chat { to, text } => {
                self.an_server(&Record::text(RecordKind::Chat, self.id, to, &text)?)
                    .await?;
            }
            Befehl::RequestPeer { to } => {
                self.an_server(&Record::leer(RecordKind::RequestPeer, self.id, to))
                    .await?;
            }
            Befehl::DirectSend { ziel, text } => {
                let record = Record::text(RecordKind::DirectMsg, self.id, UNBEKANNTE_ID, &text)?;
                let mut kanal = self.verbinder.verbinden(ziel).await?;
                write_record(&mut kanal, &record).await?;
                kanal.shutdown().await?;
                return Ok(Steuerung::text(format!("Direct message sent to {ziel}")));
            }
            Befehl::DirectSendFile { ziel, pfad } => {
                let mut kanal = self.verbinder.verbinden(ziel).await?;
                let summary =
                    send_file(&mut kanal, RecordKind::DirectSendFile, self.id, UNBEKANNTE_ID, &pfad)
                        .await?;
                kanal.shutdown().await?;
                return Ok(Steuerung::text(format!(
                    "Datei {} an {ziel} gesendet ({} Bytes)",
                    summary.filename, summary.bytes
                )));
            }
            Befehl::RelaySendFile { to, pfad } => {
                let summary = {
                    let mut schreiber = self.schreiber.lock().await;
                    send_file(&mut *schreiber, RecordKind::RelaySendFile, self.id, to, &pfad).await?
                };
                return Ok(Steuerung::text(format!(
                    "Datei {} an {} gesendet ({} Bytes)",
                    summary.filename,
                    to.inner(),
                    summary.bytes
                )));
            }
            Befehl::DirectStreaming { ziel, pfad } => {
                return self.direkt_streamen(RecordKind::DirectStream, ziel, &pfad).await;
            }
            Befehl::DirectAudioStreaming { ziel, pfad } => {
                return self.direkt_streamen(RecordKind::DirectAudioStream, ziel, &pfad).await;
            }
            Befehl::RelayStreaming { to, pfad } => {
                let mut quelle = FileFrameSource::oeffnen(&pfad, self.frame_groesse).await?;
                let ankuendigung = Record::leer(RecordKind::RelayStream, self.id, to);
                let statistik = {
                    let mut schreiber = self.schreiber.lock().await;
                    write_record(&mut *schreiber, &ankuendigung).await?;
                    stream_from_source(&mut *schreiber, &mut quelle).await?
                };
                return Ok(Steuerung::text(format!(
                    "Stream an {} gesendet: {} Frames",
                    to.inner(),
                    statistik.frames
                )));
            }
            Befehl::ReceiveStreaming => return self.wiedergabe_starten(),
        }
        Ok(Steuerung::Weiter(None))
    }

    async fn zugang_senden(&self, kind: RecordKind, daten: &Zugangsdaten) -> ClientResult<()> {
        let record = Record::text(kind, self.id, ClientId::SERVER, &daten.to_payload())?;
        self.an_server(&record).await
    }

    async fn an_server(&self, record: &Record) -> ClientResult<()> {
        let mut schreiber = self.schreiber.lock().await;
        write_record(&mut *schreiber, record).await?;
        Ok(())
    }

    async fn direkt_streamen(
        &self,
        kind: RecordKind,
        ziel: SocketAddr,
        pfad: &Path,
    ) -> ClientResult<Steuerung> {
        let mut quelle = FileFrameSource::oeffnen(pfad, self.frame_groesse).await?;
        let mut kanal = self.verbinder.verbinden(ziel).await?;
        let frames = stream_senden(&mut kanal, kind, self.id, &mut quelle).await?;
        kanal.shutdown().await?;
        Ok(Steuerung::text(format!("{kind} an {ziel} gesendet: {frames} Frames")))
    }

    /// Spielt die Queue auf einem blockierenden Thread in eine Datei ab
    fn wiedergabe_starten(&mut self) -> ClientResult<Steuerung> {
        if self.wiedergabe_aktiv.swap(true, Ordering::AcqRel) {
            return Err(ClientError::WiedergabeAktiv);
        }
        self.wiedergabe_nr += 1;
        let pfad: PathBuf = self
            .ctx
            .download
            .join(format!("stream_{}.bin", self.wiedergabe_nr));

        let mut senke = match FileFrameSink::erstellen(&pfad) {
            Ok(senke) => senke,
            Err(e) => {
                self.wiedergabe_aktiv.store(false, Ordering::Release);
                return Err(e.into());
            }
        };

        let queue = self.ctx.queue.clone();
        let ctx = self.ctx.clone();
        let aktiv = Arc::clone(&self.wiedergabe_aktiv);
        let ausgabe = format!("Wiedergabe nach {}", pfad.display());

        let handle = tokio::task::spawn_blocking(move || {
            let ereignis = match play(&queue, &mut senke) {
                Ok(frames) => Ereignis::WiedergabeBeendet {
                    pfad: senke.pfad().to_path_buf(),
                    frames,
                },
                Err(e) => Ereignis::WiedergabeFehlgeschlagen(e.to_string()),
            };
            aktiv.store(false, Ordering::Release);
            ctx.melden(ereignis);
        });
        // Die vorige Wiedergabe ist beendet, sonst waere das Flag gesetzt
        self.wiedergabe = Some(handle);
        Ok(Steuerung::text(ausgabe))
    }

    /// Beendet alle Tasks und schliesst die Serververbindung
    pub async fn beenden(mut self) {
        self.token.cancel();
        if self.wiedergabe_aktiv.load(Ordering::Acquire) {
            self.ctx.queue.push_eof();
        }
        if let Err(e) = self.schreiber.lock().await.shutdown().await {
            tracing::debug!(fehler = %e, "Serververbindung nicht sauber geschlossen");
        }
        for aufgabe in self.aufgaben.drain(..) {
            let _ = aufgabe.await;
        }
        if let Some(wiedergabe) = self.wiedergabe.take() {
            let _ = wiedergabe.await;
        }
        tracing::debug!(client_id = self.id.inner(), "Client beendet");
    }
}

async fn stream_senden<W>(
    kanal: &mut W,
    kind: RecordKind,
    from: ClientId,
    quelle: &mut FileFrameSource,
) -> ClientResult<u64>
where
    W: AsyncWrite + Unpin,
{
    write_record(&mut *kanal, &Record::leer(kind, from, UNBEKANNTE_ID)).await?;
    let statistik = stream_from_source(kanal, quelle).await?;
    Ok(statistik.frames)
}

// ---------------------------------------------------------------------------
// Kanal-Auswahl
// ---------------------------------------------------------------------------

async fn server_connector(tls: &ServerTls) -> ClientResult<Arc<dyn ChannelConnector>> {
    if !tls.aktiviert {
        tracing::warn!("TLS zum Server deaktiviert");
        return Ok(Arc::new(KlartextConnector));
    }
    let connector = match &tls.ca_datei {
        Some(pfad) => TlsKanalConnector::mit_ca_datei(pfad).await?,
        None => TlsKanalConnector::mit_webpki_roots()?,
    };
    Ok(Arc::new(connector))
}

async fn direkt_connector(direkt: &DirektEinstellungen) -> ClientResult<Arc<dyn ChannelConnector>> {
    if !direkt.tls {
        return Ok(Arc::new(KlartextConnector));
    }
    let connector = match &direkt.ca_datei {
        Some(pfad) => TlsKanalConnector::mit_ca_datei(pfad).await?,
        None => TlsKanalConnector::mit_webpki_roots()?,
    };
    Ok(Arc::new(connector))
}

async fn direkt_acceptor(direkt: &DirektEinstellungen) -> ClientResult<Arc<dyn ChannelAcceptor>> {
    if !direkt.tls {
        return Ok(Arc::new(KlartextAcceptor));
    }
    let acceptor = match (&direkt.zertifikat, &direkt.schluessel) {
        (Some(zertifikat), Some(schluessel)) => {
            TlsKanalAcceptor::from_files(zertifikat, schluessel).await?
        }
        (None, None) => {
            let cert = generate_self_signed(&direkt.server_name)?;
            if let Some(export) = &direkt.zertifikat_export {
                tokio::fs::write(export, &cert.cert_pem).await?;
            }
            TlsKanalAcceptor::from_self_signed(&cert)?
        }
        _ => {
            return Err(ClientError::Konfiguration(
                "[direkt] zertifikat und schluessel muessen gemeinsam gesetzt sein".into(),
            ))
        }
    };
    tracing::info!(fingerprint = %acceptor.fingerprint(), "Direktverbindungen mit TLS");
    Ok(Arc::new(acceptor))
}
