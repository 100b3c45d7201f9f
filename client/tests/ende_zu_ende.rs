//! Clients gegen einen echten Server auf Loopback (Klartext)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use postillon_auth::{CredentialStore, PasswordParams};
use postillon_client::config::ClientConfig;
use postillon_client::{Befehl, Client, ClientError, Ereignis, Steuerung};
use postillon_core::ClientId;
use postillon_crypto::KlartextAcceptor;
use postillon_protocol::{RecordKind, Zugangsdaten};
use postillon_signaling::{SignalingConfig, SignalingServer, SignalingState};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

const WARTEZEIT: Duration = Duration::from_secs(5);

struct Umgebung {
    adresse: SocketAddr,
    shutdown: CancellationToken,
    dir: tempfile::TempDir,
}

impl Umgebung {
    async fn starten() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let credentials =
            CredentialStore::open(dir.path().join("users.txt"), PasswordParams::for_tests())
                .await
                .unwrap();
        let state = Arc::new(SignalingState::neu(
            SignalingConfig::default(),
            Arc::new(credentials),
            Arc::new(KlartextAcceptor),
        ));
        let server = SignalingServer::binden(state, "127.0.0.1:0".parse().unwrap()).unwrap();
        let adresse = server.lokale_adresse().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(server.starten(shutdown.clone()));
        Self {
            adresse,
            shutdown,
            dir,
        }
    }

    /// Client mit eigenem Download-Verzeichnis `name`
    async fn client(&self, name: &str) -> (Client, UnboundedReceiver<Ereignis>) {
        let mut config = ClientConfig::default();
        config.tls.aktiviert = false;
        config.dateien.download_verzeichnis = self.dir.path().join(name);
        config.dateien.frame_groesse = 1000;
        Client::starten(config, self.adresse, 0).await.unwrap()
    }

    fn pfad(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }
}

impl Drop for Umgebung {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Wartet auf das erste Ereignis, fuer das `passt` etwas liefert
async fn erwarten<T>(
    rx: &mut UnboundedReceiver<Ereignis>,
    mut passt: impl FnMut(&Ereignis) -> Option<T>,
) -> T {
    tokio::time::timeout(WARTEZEIT, async {
        loop {
            let ereignis = rx.recv().await.expect("Ereigniskanal geschlossen");
            if let Some(wert) = passt(&ereignis) {
                return wert;
            }
        }
    })
    .await
    .expect("Ereignis nicht eingetroffen")
}

fn zugang(name: &str) -> Zugangsdaten {
    Zugangsdaten::parse(&format!("{name} geheim")).unwrap()
}

fn loopback(client: &Client) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], client.direkt_adresse().port()))
}

fn testdaten(pfad: &Path, laenge: usize) -> Vec<u8> {
    let daten: Vec<u8> = (0..laenge).map(|i| (i % 253) as u8).collect();
    std::fs::write(pfad, &daten).unwrap();
    daten
}

#[tokio::test]
async fn registrieren_anmelden_whoami() {
    let umgebung = Umgebung::starten().await;
    let (mut anna, mut rx) = umgebung.client("anna").await;
    assert!(anna.id() >= ClientId::ERSTE);

    anna.ausfuehren(Befehl::Register(zugang("anna"))).await.unwrap();
    let antwort = erwarten(&mut rx, |e| match e {
        Ereignis::Antwort(text) => Some(text.clone()),
        _ => None,
    })
    .await;
    assert_eq!(antwort, "Success");

    anna.ausfuehren(Befehl::Login(zugang("anna"))).await.unwrap();
    erwarten(&mut rx, |e| matches!(e, Ereignis::Angemeldet(n) if n == "anna").then_some(())).await;
    assert_eq!(anna.username().as_deref(), Some("anna"));

    match anna.ausfuehren(Befehl::Whoami).await.unwrap() {
        Steuerung::Weiter(Some(text)) => {
            assert!(text.contains("anna"));
            assert!(text.contains(&anna.id().inner().to_string()));
        }
        andere => panic!("unerwartet: {andere:?}"),
    }

    anna.ausfuehren(Befehl::RequestPeer { to: ClientId(0) }).await.unwrap();
    let liste = erwarten(&mut rx, |e| match e {
        Ereignis::PeerInfo(liste) => Some(liste.clone()),
        _ => None,
    })
    .await;
    assert!(liste.starts_with(&format!("anna {}", anna.id().inner())));

    anna.ausfuehren(Befehl::Logout).await.unwrap();
    assert_eq!(anna.username(), None);
    assert_eq!(anna.ausfuehren(Befehl::Quit).await.unwrap(), Steuerung::Beenden);
    anna.beenden().await;
}

#[tokio::test]
async fn chat_ueber_den_server() {
    let umgebung = Umgebung::starten().await;
    let (mut anna, _rx_a) = umgebung.client("anna").await;
    let (bert, mut rx_b) = umgebung.client("bert").await;

    anna.ausfuehren(Befehl::Chat {
        to: bert.id(),
        text: "hallo  bert".into(),
    })
    .await
    .unwrap();

    let (from, text) = erwarten(&mut rx_b, |e| match e {
        Ereignis::Chat { from, text } => Some((*from, text.clone())),
        _ => None,
    })
    .await;
    assert_eq!(from, anna.id());
    assert_eq!(text, "hallo  bert");

    anna.beenden().await;
    bert.beenden().await;
}

#[tokio::test]
async fn datei_ueber_den_server() {
    let umgebung = Umgebung::starten().await;
    let (mut anna, _rx_a) = umgebung.client("anna").await;
    let (bert, mut rx_b) = umgebung.client("bert").await;
    let quelle = umgebung.pfad("bericht.bin");
    let daten = testdaten(&quelle, 5000);

    anna.ausfuehren(Befehl::RelaySendFile {
        to: bert.id(),
        pfad: quelle,
    })
    .await
    .unwrap();

    let (pfad, bytes) = erwarten(&mut rx_b, |e| match e {
        Ereignis::DateiEmpfangen { pfad, bytes } => Some((pfad.clone(), *bytes)),
        _ => None,
    })
    .await;
    assert_eq!(bytes, 5000);
    assert_eq!(pfad, umgebung.pfad("bert").join("bericht.bin"));
    assert_eq!(std::fs::read(pfad).unwrap(), daten);

    anna.beenden().await;
    bert.beenden().await;
}

#[tokio::test]
async fn direktnachricht_und_datei() {
    let umgebung = Umgebung::starten().await;
    let (mut anna, _rx_a) = umgebung.client("anna").await;
    let (bert, mut rx_b) = umgebung.client("bert").await;

    anna.ausfuehren(Befehl::DirectSend {
        ziel: loopback(&bert),
        text: "ohne umweg".into(),
    })
    .await
    .unwrap();
    let text = erwarten(&mut rx_b, |e| match e {
        Ereignis::DirektNachricht { text, .. } => Some(text.clone()),
        _ => None,
    })
    .await;
    assert_eq!(text, "ohne umweg");

    let quelle = umgebung.pfad("foto.raw");
    let daten = testdaten(&quelle, 2048);
    anna.ausfuehren(Befehl::DirectSendFile {
        ziel: loopback(&bert),
        pfad: quelle,
    })
    .await
    .unwrap();
    let pfad = erwarten(&mut rx_b, |e| match e {
        Ereignis::DateiEmpfangen { pfad, .. } => Some(pfad.clone()),
        _ => None,
    })
    .await;
    assert_eq!(std::fs::read(pfad).unwrap(), daten);

    anna.beenden().await;
    bert.beenden().await;
}

#[tokio::test]
async fn direktnachricht_an_geschlossenen_port_scheitert() {
    let umgebung = Umgebung::starten().await;
    let (mut anna, _rx) = umgebung.client("anna").await;

    let frei = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let ziel = frei.local_addr().unwrap();
    drop(frei);

    let ergebnis = anna
        .ausfuehren(Befehl::DirectSend {
            ziel,
            text: "niemand da".into(),
        })
        .await;
    assert!(matches!(ergebnis, Err(ClientError::Io(_))));

    // Der Client bleibt benutzbar
    assert!(anna.ausfuehren(Befehl::Help).await.is_ok());
    anna.beenden().await;
}

#[tokio::test]
async fn direkter_stream_wird_wiedergegeben() {
    let umgebung = Umgebung::starten().await;
    let (mut anna, _rx_a) = umgebung.client("anna").await;
    let (mut bert, mut rx_b) = umgebung.client("bert").await;
    let quelle = umgebung.pfad("video.raw");
    let daten = testdaten(&quelle, 3500);

    anna.ausfuehren(Befehl::DirectStreaming {
        ziel: loopback(&bert),
        pfad: quelle,
    })
    .await
    .unwrap();

    let (kind, frames) = erwarten(&mut rx_b, |e| match e {
        Ereignis::StreamEmpfangen { kind, frames } => Some((*kind, *frames)),
        _ => None,
    })
    .await;
    assert_eq!(kind, RecordKind::DirectStream);
    assert_eq!(frames, 4);

    bert.ausfuehren(Befehl::ReceiveStreaming).await.unwrap();
    let (pfad, abgespielt) = erwarten(&mut rx_b, |e| match e {
        Ereignis::WiedergabeBeendet { pfad, frames } => Some((pfad.clone(), *frames)),
        _ => None,
    })
    .await;
    assert_eq!(abgespielt, 4);
    assert_eq!(pfad, umgebung.pfad("bert").join("stream_1.bin"));
    assert_eq!(std::fs::read(pfad).unwrap(), daten);

    anna.beenden().await;
    bert.beenden().await;
}

#[tokio::test]
async fn stream_ueber_den_server() {
    let umgebung = Umgebung::starten().await;
    let (mut anna, _rx_a) = umgebung.client("anna").await;
    let (bert, mut rx_b) = umgebung.client("bert").await;
    let quelle = umgebung.pfad("kamera.raw");
    testdaten(&quelle, 2500);

    match anna
        .ausfuehren(Befehl::RelayStreaming {
            to: bert.id(),
            pfad: quelle,
        })
        .await
        .unwrap()
    {
        Steuerung::Weiter(Some(text)) => assert!(text.contains("3 Frames")),
        andere => panic!("unerwartet: {andere:?}"),
    }

    let (kind, frames) = erwarten(&mut rx_b, |e| match e {
        Ereignis::StreamEmpfangen { kind, frames } => Some((*kind, *frames)),
        _ => None,
    })
    .await;
    assert_eq!(kind, RecordKind::RelayStream);
    assert_eq!(frames, 3);

    anna.beenden().await;
    bert.beenden().await;
}
