//! Relay-Router – leitet Records und Subprotokolle an andere Clients weiter
//!
//! Chat-Records werden einzeln zugestellt. Dateitransfers und Streams
//! sperren den Zielkanal fuer die gesamte Dauer, damit sich keine anderen
//! Records dazwischenschieben.
//!
//! Ist das Ziel nicht erreichbar, wird das Subprotokoll des Absenders
//! trotzdem vollstaendig gelesen und verworfen. Sonst wuerde der naechste
//! Lesevorgang mitten in Transferdaten landen.

use std::sync::Arc;
use std::time::Duration;

use postillon_core::ClientId;
use postillon_crypto::Kanal;
use postillon_protocol::stream::{begrenzt, relay_stream};
use postillon_protocol::{
    read_record, write_record, Record, StreamStatistik, TransferError, TransferReader,
};
use tokio::io::{AsyncRead, WriteHalf};
use tokio::sync::MutexGuard;

use crate::error::SignalingResult;
use crate::registry::{ChannelHandle, ClientRegistry};

/// Ergebnis einer Einzelzustellung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zustellung {
    Zugestellt,
    /// Unbekannte ID oder offline
    EmpfaengerOffline,
    /// Zielkanal war innerhalb der Frist nicht frei (laufendes Relay)
    ZielBeschaeftigt,
    /// Schreiben auf den Zielkanal fehlgeschlagen
    Fehlgeschlagen,
}

/// Ergebnis einer Transfer-Weiterleitung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRelay {
    pub dateiname: String,
    pub bytes: u64,
    /// `false` wenn das Ziel fehlte oder unterwegs ausgefallen ist
    pub zugestellt: bool,
}

#[derive(Debug)]
pub struct RelayRouter {
    registry: Arc<ClientRegistry>,
    schreib_frist: Option<Duration>,
}

impl RelayRouter {
    pub fn neu(registry: Arc<ClientRegistry>, schreib_frist: Option<Duration>) -> Self {
        Self {
            registry,
            schreib_frist,
        }
    }

    fn ziel(&self, id: ClientId) -> Option<ChannelHandle> {
        match self.registry.lookup(id) {
            Ok(sitzung) if sitzung.online => Some(sitzung.kanal),
            _ => None,
        }
    }

    /// Sperrt den Zielkanal, hoechstens `schreib_frist` lang wartend
    async fn exklusiv<'a>(
        &self,
        kanal: &'a ChannelHandle,
        to_id: ClientId,
    ) -> Option<MutexGuard<'a, WriteHalf<Kanal>>> {
        let sperre = kanal.sperren(self.schreib_frist).await;
        if sperre.is_none() {
            tracing::warn!(
                client_id = to_id.inner(),
                "Ziel ist mit einem anderen Relay beschaeftigt, Zustellung verworfen"
            );
        }
        sperre
    }

    /// Sperre fuer ein Subprotokoll; `None` wenn das Ziel fehlt oder belegt ist
    async fn subprotokoll_ziel<'a>(
        &self,
        ziel: &'a Option<ChannelHandle>,
        ankuendigung: &Record,
    ) -> Option<MutexGuard<'a, WriteHalf<Kanal>>> {
        match ziel {
            Some(kanal) => self.exklusiv(kanal, ankuendigung.to_id).await,
            None => {
                tracing::info!(
                    client_id = ankuendigung.to_id.inner(),
                    kind = %ankuendigung.kind,
                    "Ziel nicht online, Daten werden verworfen"
                );
                None
            }
        }
    }

    /// Stellt einen Record unveraendert an `record.to_id` zu
    pub async fn zustellen(&self, record: &Record) -> Zustellung {
        let Some(ziel) = self.ziel(record.to_id) else {
            return Zustellung::EmpfaengerOffline;
        };
        let Some(mut schreiber) = self.exklusiv(&ziel, record.to_id).await else {
            return Zustellung::ZielBeschaeftigt;
        };
        match begrenzt(self.schreib_frist, write_record(&mut *schreiber, record)).await {
            Ok(()) => Zustellung::Zugestellt,
            Err(e) => {
                tracing::warn!(
                    client_id = record.to_id.inner(),
                    kind = %record.kind,
                    fehler = %e,
                    "Zustellung fehlgeschlagen"
                );
                Zustellung::Fehlgeschlagen
            }
        }
    }

    /// Leitet Ankuendigung, Header und Datenbloecke eines Dateitransfers weiter
    ///
    /// Fehler im Ergebnis betreffen nur den Lesekanal des Absenders.
    pub async fn datei_weiterleiten<R>(
        &self,
        ankuendigung: &Record,
        quelle: &mut R,
    ) -> SignalingResult<TransferRelay>
    where
        R: AsyncRead + Unpin,
    {
        let ziel = self.ziel(ankuendigung.to_id);
        let mut sperre = self.subprotokoll_ziel(&ziel, ankuendigung).await;
        let mut schreiber = ZielSchreiber {
            ziel: sperre.as_deref_mut(),
            frist: self.schreib_frist,
            to_id: ankuendigung.to_id,
        };

        schreiber.weiterleiten(ankuendigung).await;

        let header = read_record(quelle).await?;
        let mut transfer = match TransferReader::from_header_record(&header) {
            Ok(transfer) => transfer,
            Err(e) => {
                // Ohne gueltigen Header ist die Laenge unbekannt
                tracing::warn!(fehler = %e, "Transfer ohne gueltigen Header verworfen");
                return Ok(TransferRelay {
                    dateiname: String::new(),
                    bytes: 0,
                    zugestellt: false,
                });
            }
        };
        schreiber.weiterleiten(&header).await;

        loop {
            match transfer.next_chunk(quelle).await {
                Ok(Some(chunk)) => schreiber.weiterleiten(&chunk).await,
                Ok(None) => break,
                Err(e @ (TransferError::Overrun { .. } | TransferError::UnexpectedRecord(_))) => {
                    tracing::warn!(fehler = %e, "Transfer abgebrochen");
                    schreiber.ziel = None;
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(TransferRelay {
            dateiname: transfer.header().filename.clone(),
            bytes: transfer.received(),
            zugestellt: schreiber.ziel.is_some(),
        })
    }

    /// Leitet Ankuendigung und Stream-Frames bis einschliesslich EOF weiter
    pub async fn stream_weiterleiten<R>(
        &self,
        ankuendigung: &Record,
        quelle: &mut R,
    ) -> SignalingResult<StreamStatistik>
    where
        R: AsyncRead + Unpin,
    {
        let ziel = self.ziel(ankuendigung.to_id);
        let mut sperre = self.subprotokoll_ziel(&ziel, ankuendigung).await;
        let mut schreiber = ZielSchreiber {
            ziel: sperre.as_deref_mut(),
            frist: self.schreib_frist,
            to_id: ankuendigung.to_id,
        };

        schreiber.weiterleiten(ankuendigung).await;

        let statistik = match schreiber.ziel {
            Some(ziel) => relay_stream(quelle, ziel, self.schreib_frist).await?,
            None => {
                let mut statistik = relay_stream(quelle, &mut tokio::io::sink(), None).await?;
                statistik.ziel_abgebrochen = true;
                statistik
            }
        };
        Ok(statistik)
    }
}

/// Schreibseite des Ziels waehrend eines Subprotokolls
///
/// Nach dem ersten Fehler wird nichts mehr geschrieben.
struct ZielSchreiber<'a> {
    ziel: Option<&'a mut WriteHalf<Kanal>>,
    frist: Option<Duration>,
    to_id: ClientId,
}

impl ZielSchreiber<'_> {
    async fn weiterleiten(&mut self, record: &Record) {
        let Some(ziel) = self.ziel.as_deref_mut() else {
            return;
        };
        if let Err(e) = begrenzt(self.frist, write_record(ziel, record)).await {
            tracing::warn!(
                client_id = self.to_id.inner(),
                fehler = %e,
                "Ziel ausgefallen, Rest wird verworfen"
            );
            self.ziel = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use postillon_protocol::stream::{receive_frame, send_eof, send_frame};
    use postillon_protocol::{RecordKind, TransferHeader, MAX_FRAME_SIZE};
    use std::io::Cursor;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::io::{AsyncReadExt, DuplexStream};

    const LOCAL: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    /// Registriert einen Client, dessen Gegenseite im Test gelesen wird
    fn client(registry: &ClientRegistry) -> (ClientId, DuplexStream) {
        let (server_seite, client_seite) = tokio::io::duplex(1 << 20);
        let kanal: Kanal = Box::new(server_seite);
        let (_leser, schreiber) = tokio::io::split(kanal);
        let id = registry.register_session(LOCAL, 9000, ChannelHandle::neu(schreiber));
        (id, client_seite)
    }

    fn router() -> (Arc<ClientRegistry>, RelayRouter) {
        let registry = Arc::new(ClientRegistry::neu());
        let router = RelayRouter::neu(Arc::clone(&registry), Some(Duration::from_secs(2)));
        (registry, router)
    }

    #[tokio::test]
    async fn chat_an_online_empfaenger() {
        let (registry, router) = router();
        let (id, mut gegenseite) = client(&registry);

        let chat = Record::text(RecordKind::Chat, ClientId(7), id, "hallo").unwrap();
        assert_eq!(router.zustellen(&chat).await, Zustellung::Zugestellt);
        assert_eq!(read_record(&mut gegenseite).await.unwrap(), chat);
    }

    #[tokio::test]
    async fn belegtes_ziel_wird_nicht_als_offline_gemeldet() {
        let registry = Arc::new(ClientRegistry::neu());
        let router = RelayRouter::neu(Arc::clone(&registry), Some(Duration::from_millis(50)));
        let (id, _gegenseite) = client(&registry);

        let kanal = registry.lookup(id).unwrap().kanal;
        let _relay = kanal.sperren(None).await.unwrap();

        let chat = Record::text(RecordKind::Chat, ClientId(7), id, "spaeter").unwrap();
        assert_eq!(router.zustellen(&chat).await, Zustellung::ZielBeschaeftigt);
    }

    #[tokio::test]
    async fn eigene_antwort_wartet_hinter_relay() {
        let (registry, _router) = router();
        let (id, mut gegenseite) = client(&registry);
        let kanal = registry.lookup(id).unwrap().kanal;

        let relay = kanal.sperren(None).await.unwrap();
        let antwort = Record::text(RecordKind::Response, ClientId::SERVER, id, "Success").unwrap();
        let senden = {
            let kanal = kanal.clone();
            let antwort = antwort.clone();
            tokio::spawn(async move {
                kanal
                    .senden(&antwort, Some(Duration::from_millis(50)))
                    .await
            })
        };

        // Laenger gesperrt als die Schreibfrist
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(relay);

        senden.await.unwrap().unwrap();
        assert_eq!(read_record(&mut gegenseite).await.unwrap(), antwort);
    }

    #[tokio::test]
    async fn chat_an_unbekannt_oder_offline() {
        let (registry, router) = router();
        let (id, _gegenseite) = client(&registry);
        registry.clear_authenticated(id).unwrap();

        let an_offline = Record::text(RecordKind::Chat, ClientId(7), id, "x").unwrap();
        assert_eq!(router.zustellen(&an_offline).await, Zustellung::EmpfaengerOffline);
        let an_unbekannt = Record::text(RecordKind::Chat, ClientId(7), ClientId(42), "x").unwrap();
        assert_eq!(router.zustellen(&an_unbekannt).await, Zustellung::EmpfaengerOffline);
    }

    async fn transfer_draht(from: ClientId, to: ClientId, inhalt: &[u8]) -> Vec<u8> {
        let mut draht = Vec::new();
        let header = TransferHeader::new("bild.png", inhalt.len() as u64).unwrap();
        write_record(&mut draht, &header.to_record(from, to).unwrap())
            .await
            .unwrap();
        for block in inhalt.chunks(1024) {
            let chunk = Record::new(RecordKind::TransferChunk, from, to, block.to_vec()).unwrap();
            write_record(&mut draht, &chunk).await.unwrap();
        }
        draht
    }

    #[tokio::test]
    async fn datei_wird_vollstaendig_weitergeleitet() {
        let (registry, router) = router();
        let (ziel, mut gegenseite) = client(&registry);
        let inhalt = vec![3u8; 2500];

        let ankuendigung = Record::leer(RecordKind::RelaySendFile, ClientId(9), ziel);
        let mut quelle = Cursor::new(transfer_draht(ClientId(9), ziel, &inhalt).await);
        let ergebnis = router
            .datei_weiterleiten(&ankuendigung, &mut quelle)
            .await
            .unwrap();
        assert!(ergebnis.zugestellt);
        assert_eq!(ergebnis.bytes, 2500);
        assert_eq!(ergebnis.dateiname, "bild.png");

        assert_eq!(read_record(&mut gegenseite).await.unwrap(), ankuendigung);
        let mut transfer = TransferReader::begin(&mut gegenseite).await.unwrap();
        let mut empfangen = Vec::new();
        while let Some(chunk) = transfer.next_chunk(&mut gegenseite).await.unwrap() {
            empfangen.extend_from_slice(chunk.payload());
        }
        assert_eq!(empfangen, inhalt);
    }

    #[tokio::test]
    async fn datei_an_offline_ziel_wird_verworfen() {
        let (_registry, router) = router();
        let mut draht = transfer_draht(ClientId(1), ClientId(5), &[1u8; 3000]).await;
        let nachfolger = Record::text(RecordKind::Chat, ClientId(1), ClientId(5), "danach").unwrap();
        write_record(&mut draht, &nachfolger).await.unwrap();

        let ankuendigung = Record::leer(RecordKind::RelaySendFile, ClientId(1), ClientId(5));
        let mut quelle = Cursor::new(draht);
        let ergebnis = router
            .datei_weiterleiten(&ankuendigung, &mut quelle)
            .await
            .unwrap();
        assert!(!ergebnis.zugestellt);
        assert_eq!(ergebnis.bytes, 3000);

        // Der Lesekanal steht wieder auf einer Record-Grenze
        assert_eq!(read_record(&mut quelle).await.unwrap(), nachfolger);
    }

    #[tokio::test]
    async fn abgebrochene_quelle_ist_fehler() {
        let (registry, router) = router();
        let (ziel, _gegenseite) = client(&registry);
        let mut draht = transfer_draht(ClientId(1), ziel, &[1u8; 3000]).await;
        draht.truncate(draht.len() - 100);

        let ankuendigung = Record::leer(RecordKind::RelaySendFile, ClientId(1), ziel);
        let ergebnis = router
            .datei_weiterleiten(&ankuendigung, &mut Cursor::new(draht))
            .await;
        assert!(ergebnis.is_err());
    }

    #[tokio::test]
    async fn stream_reihenfolge_bleibt_erhalten() {
        let (registry, router) = router();
        let (ziel, mut gegenseite) = client(&registry);

        let mut draht = Vec::new();
        for i in 0..20u8 {
            send_frame(&mut draht, &[i; 100]).await.unwrap();
        }
        send_eof(&mut draht).await.unwrap();

        let ankuendigung = Record::leer(RecordKind::RelayStream, ClientId(1), ziel);
        let statistik = router
            .stream_weiterleiten(&ankuendigung, &mut Cursor::new(draht))
            .await
            .unwrap();
        assert_eq!(statistik.frames, 20);
        assert!(!statistik.ziel_abgebrochen);

        assert_eq!(read_record(&mut gegenseite).await.unwrap().kind, RecordKind::RelayStream);
        for i in 0..20u8 {
            let frame = receive_frame(&mut gegenseite, MAX_FRAME_SIZE).await.unwrap();
            assert_eq!(frame.as_ref(), &[i; 100]);
        }
        assert!(receive_frame(&mut gegenseite, MAX_FRAME_SIZE)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn stream_ohne_ziel_wird_geleert() {
        let (_registry, router) = router();
        let mut draht = Vec::new();
        send_frame(&mut draht, b"frame").await.unwrap();
        send_eof(&mut draht).await.unwrap();
        draht.extend_from_slice(b"rest");

        let ankuendigung = Record::leer(RecordKind::RelayAudioStream, ClientId(1), ClientId(8));
        let mut quelle = Cursor::new(draht);
        let statistik = router
            .stream_weiterleiten(&ankuendigung, &mut quelle)
            .await
            .unwrap();
        assert!(statistik.ziel_abgebrochen);
        assert_eq!(statistik.frames, 1);

        let mut rest = Vec::new();
        quelle.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"rest");
    }
}
