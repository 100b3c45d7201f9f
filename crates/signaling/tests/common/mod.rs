//! Gemeinsame Hilfen fuer die Integrationstests: echter Server auf
//! Loopback, Klartext-Kanal, Clients als rohe TCP-Verbindungen

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use postillon_auth::{CredentialStore, PasswordParams};
use postillon_core::ClientId;
use postillon_crypto::KlartextAcceptor;
use postillon_protocol::{read_record, write_record, Record, RecordKind, Zugangsdaten};
use postillon_signaling::{
    SignalingConfig, SignalingResult, SignalingServer, SignalingState, Zeitlimits,
};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const WARTEZEIT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub adresse: SocketAddr,
    pub state: Arc<SignalingState>,
    shutdown: CancellationToken,
    task: JoinHandle<SignalingResult<()>>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub async fn starten(worker_count: usize) -> Self {
        Self::mit_zeitlimits(worker_count, Zeitlimits::default()).await
    }

    pub async fn mit_zeitlimits(worker_count: usize, zeitlimits: Zeitlimits) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let credentials =
            CredentialStore::open(dir.path().join("users.txt"), PasswordParams::for_tests())
                .await
                .unwrap();
        let config = SignalingConfig {
            worker_count,
            max_pending: 128,
            zeitlimits,
        };
        let state = Arc::new(SignalingState::neu(
            config,
            Arc::new(credentials),
            Arc::new(KlartextAcceptor),
        ));

        let server =
            SignalingServer::binden(Arc::clone(&state), "127.0.0.1:0".parse().unwrap()).unwrap();
        let adresse = server.lokale_adresse().unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.starten(shutdown.clone()));

        Self {
            adresse,
            state,
            shutdown,
            task,
            _dir: dir,
        }
    }

    pub async fn client(&self, listen_port: u16) -> TestClient {
        TestClient::verbinden(self.adresse, listen_port).await
    }

    /// Wartet, bis die Sitzung `id` offline ist
    pub async fn warten_bis_offline(&self, id: ClientId) {
        tokio::time::timeout(WARTEZEIT, async {
            while self.state.registry.lookup(id).map(|s| s.online).unwrap_or(false) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Sitzung wurde nicht offline gesetzt");
    }

    pub async fn stoppen(self) {
        self.shutdown.cancel();
        tokio::time::timeout(WARTEZEIT, self.task)
            .await
            .expect("Server hat nicht rechtzeitig gestoppt")
            .unwrap()
            .unwrap();
    }
}

pub struct TestClient {
    pub id: ClientId,
    pub stream: TcpStream,
}

impl TestClient {
    /// Verbindet, sendet JOIN und liest die zugewiesene ID
    pub async fn verbinden(adresse: SocketAddr, listen_port: u16) -> Self {
        let mut stream = TcpStream::connect(adresse).await.unwrap();
        let join = Record::text(
            RecordKind::Join,
            ClientId(0),
            ClientId(0),
            &listen_port.to_string(),
        )
        .unwrap();
        write_record(&mut stream, &join).await.unwrap();

        let ack = tokio::time::timeout(WARTEZEIT, read_record(&mut stream))
            .await
            .expect("keine JOIN-Bestaetigung")
            .unwrap();
        assert_eq!(ack.kind, RecordKind::Join);
        assert_eq!(ack.from_id, ClientId::SERVER);
        Self { id: ack.to_id, stream }
    }

    pub async fn senden(&mut self, record: &Record) {
        write_record(&mut self.stream, record).await.unwrap();
    }

    pub async fn senden_text(&mut self, kind: RecordKind, to: ClientId, text: &str) {
        let record = Record::text(kind, self.id, to, text).unwrap();
        self.senden(&record).await;
    }

    pub async fn empfangen(&mut self) -> Record {
        tokio::time::timeout(WARTEZEIT, read_record(&mut self.stream))
            .await
            .expect("kein Record empfangen")
            .unwrap()
    }

    /// `true` wenn innerhalb von `dauer` nichts ankommt
    pub async fn still_fuer(&mut self, dauer: Duration) -> bool {
        tokio::time::timeout(dauer, read_record(&mut self.stream))
            .await
            .is_err()
    }

    pub async fn register(&mut self, username: &str, password: &str) -> String {
        let daten = Zugangsdaten {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.senden_text(RecordKind::Register, ClientId::SERVER, &daten.to_payload())
            .await;
        let antwort = self.empfangen().await;
        assert_eq!(antwort.kind, RecordKind::Response);
        antwort.payload_text().into_owned()
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Record {
        self.senden_text(
            RecordKind::Login,
            ClientId::SERVER,
            &format!("{username} {password}"),
        )
        .await;
        self.empfangen().await
    }

    /// Registriert und meldet an; bricht bei Fehlern ab
    pub async fn anmelden(&mut self, username: &str) {
        assert_eq!(self.register(username, "geheim").await, "Success");
        let antwort = self.login(username, "geheim").await;
        assert_eq!(antwort.kind, RecordKind::Login);
    }
}
