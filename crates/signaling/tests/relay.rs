//! Chat-, Datei- und Stream-Weiterleitung zwischen zwei Clients

mod common;

use std::time::Duration;

use common::{TestServer, WARTEZEIT};
use postillon_core::ClientId;
use postillon_protocol::stream::{enqueue_frames, receive_frame, send_eof, send_frame};
use postillon_protocol::transfer::{receive_file, send_file};
use postillon_protocol::{
    Record, RecordKind, StreamingQueue, TransferError, TransferHeader, TransferReader,
    MAX_FRAME_SIZE,
};
use postillon_signaling::Zeitlimits;

#[tokio::test]
async fn chat_wird_bytegenau_zugestellt() {
    let server = TestServer::starten(4).await;
    let mut a = server.client(9001).await;
    let mut b = server.client(9002).await;

    let payload: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
    let chat = Record::new(RecordKind::Chat, a.id, b.id, payload).unwrap();
    a.senden(&chat).await;

    assert_eq!(b.empfangen().await, chat);
    // Der Absender bekommt keine Rueckmeldung
    assert!(a.still_fuer(Duration::from_millis(100)).await);

    server.stoppen().await;
}

#[tokio::test]
async fn chat_an_verschwundenen_empfaenger() {
    let server = TestServer::starten(4).await;
    let mut a = server.client(9001).await;
    let b = server.client(9002).await;
    let b_id = b.id;

    drop(b);
    server.warten_bis_offline(b_id).await;

    a.senden_text(RecordKind::Chat, b_id, "niemand da").await;
    a.senden_text(RecordKind::Chat, ClientId(999), "unbekannt").await;
    assert!(a.still_fuer(Duration::from_millis(100)).await);

    // Die Sitzung des Absenders laeuft weiter
    assert_eq!(a.register("anna", "pw").await, "Success");

    server.stoppen().await;
}

#[tokio::test]
async fn datei_kommt_vollstaendig_an() {
    let server = TestServer::starten(4).await;
    let mut a = server.client(9001).await;
    let mut b = server.client(9002).await;

    let quelle = tempfile::tempdir().unwrap();
    let ziel = tempfile::tempdir().unwrap();
    let inhalt: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 256) as u8).collect();
    let pfad = quelle.path().join("bericht final.bin");
    std::fs::write(&pfad, &inhalt).unwrap();

    let (a_id, b_id) = (a.id, b.id);
    let summary = send_file(&mut a.stream, RecordKind::RelaySendFile, a_id, b_id, &pfad)
        .await
        .unwrap();
    assert_eq!(summary.bytes, 5000);

    let ankuendigung = b.empfangen().await;
    assert_eq!(ankuendigung.kind, RecordKind::RelaySendFile);
    assert_eq!(ankuendigung.from_id, a_id);

    let empfangen = tokio::time::timeout(WARTEZEIT, receive_file(&mut b.stream, ziel.path()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(empfangen.filename, "bericht final.bin");
    assert_eq!(empfangen.bytes, 5000);
    assert_eq!(
        std::fs::read(ziel.path().join("bericht final.bin")).unwrap(),
        inhalt
    );

    server.stoppen().await;
}

#[tokio::test]
async fn abgebrochener_transfer_bleibt_unvollstaendig() {
    let server = TestServer::starten(4).await;
    let mut a = server.client(9001).await;
    let mut b = server.client(9002).await;
    let (a_id, b_id) = (a.id, b.id);

    a.senden(&Record::leer(RecordKind::RelaySendFile, a_id, b_id))
        .await;
    let header = TransferHeader::new("gross.bin", 5000).unwrap();
    a.senden(&header.to_record(a_id, b_id).unwrap()).await;
    for _ in 0..2 {
        let chunk = Record::new(RecordKind::TransferChunk, a_id, b_id, vec![1u8; 1024]).unwrap();
        a.senden(&chunk).await;
    }
    drop(a);
    server.warten_bis_offline(a_id).await;

    assert_eq!(b.empfangen().await.kind, RecordKind::RelaySendFile);
    let mut transfer = TransferReader::begin(&mut b.stream).await.unwrap();
    assert_eq!(transfer.header().total_size, 5000);
    for _ in 0..2 {
        assert!(transfer.next_chunk(&mut b.stream).await.unwrap().is_some());
    }
    assert!(!transfer.is_complete());

    // Der naechste Record ist die Peer-Liste, nicht der fehlende Rest
    b.senden_text(RecordKind::RequestPeer, ClientId::SERVER, "")
        .await;
    match transfer.next_chunk(&mut b.stream).await {
        Err(TransferError::UnexpectedRecord(record)) => assert_eq!(record.kind, RecordKind::PeerInfo),
        andere => panic!("unerwartet: {andere:?}"),
    }
    assert_eq!(transfer.received(), 2048);

    server.stoppen().await;
}

#[tokio::test]
async fn datei_an_offline_ziel_wird_verworfen() {
    let server = TestServer::starten(4).await;
    let mut a = server.client(9001).await;
    let mut b = server.client(9002).await;

    let dir = tempfile::tempdir().unwrap();
    let pfad = dir.path().join("weg.txt");
    std::fs::write(&pfad, vec![b'x'; 3000]).unwrap();

    let a_id = a.id;
    send_file(&mut a.stream, RecordKind::RelaySendFile, a_id, ClientId(500), &pfad)
        .await
        .unwrap();
    // Folgt direkt auf den Transfer und muss trotzdem als Record ankommen
    a.senden_text(RecordKind::Chat, b.id, "danach").await;

    let chat = b.empfangen().await;
    assert_eq!(chat.kind, RecordKind::Chat);
    assert_eq!(chat.payload_text(), "danach");

    server.stoppen().await;
}

#[tokio::test]
async fn stream_behaelt_reihenfolge_und_inhalt() {
    let server = TestServer::starten(4).await;
    let mut a = server.client(9001).await;
    let mut b = server.client(9002).await;
    let (a_id, b_id) = (a.id, b.id);

    let frames: Vec<Vec<u8>> = (0..50u32)
        .map(|i| vec![(i % 256) as u8; 100 + (i as usize * 37) % 3000])
        .collect();

    a.senden(&Record::leer(RecordKind::RelayStream, a_id, b_id))
        .await;
    for frame in &frames {
        send_frame(&mut a.stream, frame).await.unwrap();
    }
    send_eof(&mut a.stream).await.unwrap();
    a.senden_text(RecordKind::Chat, b_id, "ende").await;

    let ankuendigung = b.empfangen().await;
    assert_eq!(ankuendigung.kind, RecordKind::RelayStream);

    let queue = StreamingQueue::new();
    let anzahl = tokio::time::timeout(WARTEZEIT, enqueue_frames(&queue, &mut b.stream))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(anzahl, 50);
    for erwartet in &frames {
        assert_eq!(queue.pop().unwrap().as_ref(), erwartet.as_slice());
    }
    assert!(queue.pop().is_none());

    assert_eq!(b.empfangen().await.payload_text(), "ende");

    server.stoppen().await;
}

#[tokio::test]
async fn audio_stream_ohne_ziel_wird_geleert() {
    let server = TestServer::starten(2).await;
    let mut a = server.client(9001).await;
    let a_id = a.id;

    a.senden(&Record::leer(RecordKind::RelayAudioStream, a_id, ClientId(42)))
        .await;
    send_frame(&mut a.stream, b"pcm").await.unwrap();
    send_eof(&mut a.stream).await.unwrap();

    assert_eq!(a.register("anna", "pw").await, "Success");

    server.stoppen().await;
}

#[tokio::test]
async fn eigene_anfrage_waehrend_relay_beendet_sitzung_nicht() {
    let zeitlimits = Zeitlimits {
        schreiben: Some(Duration::from_millis(300)),
        ..Zeitlimits::default()
    };
    let server = TestServer::mit_zeitlimits(4, zeitlimits).await;
    let mut a = server.client(9001).await;
    let mut b = server.client(9002).await;
    let (a_id, b_id) = (a.id, b.id);

    a.senden(&Record::leer(RecordKind::RelayStream, a_id, b_id))
        .await;
    send_frame(&mut a.stream, b"f1").await.unwrap();
    assert_eq!(b.empfangen().await.kind, RecordKind::RelayStream);
    assert_eq!(
        receive_frame(&mut b.stream, MAX_FRAME_SIZE).await.unwrap().as_ref(),
        b"f1"
    );

    // Antwort muss hinter dem laufenden Stream warten, laenger als die Frist
    b.senden_text(RecordKind::RequestPeer, ClientId::SERVER, "")
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(server.state.registry.lookup(b_id).unwrap().online);

    send_eof(&mut a.stream).await.unwrap();
    assert!(receive_frame(&mut b.stream, MAX_FRAME_SIZE)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(b.empfangen().await.kind, RecordKind::PeerInfo);

    a.senden_text(RecordKind::Chat, b_id, "weiter").await;
    assert_eq!(b.empfangen().await.payload_text(), "weiter");

    server.stoppen().await;
}

#[tokio::test]
async fn abgerissener_stream_endet_beim_ziel_mit_eof() {
    let server = TestServer::starten(4).await;
    let mut a = server.client(9001).await;
    let mut b = server.client(9002).await;
    let mut c = server.client(9003).await;
    let (a_id, b_id) = (a.id, b.id);

    a.senden(&Record::leer(RecordKind::RelayStream, a_id, b_id))
        .await;
    send_frame(&mut a.stream, b"f1").await.unwrap();
    assert_eq!(b.empfangen().await.kind, RecordKind::RelayStream);
    assert_eq!(
        receive_frame(&mut b.stream, MAX_FRAME_SIZE).await.unwrap().as_ref(),
        b"f1"
    );

    drop(a);
    server.warten_bis_offline(a_id).await;
    c.senden_text(RecordKind::Chat, b_id, "intakt").await;

    let eof = tokio::time::timeout(WARTEZEIT, receive_frame(&mut b.stream, MAX_FRAME_SIZE))
        .await
        .unwrap()
        .unwrap();
    assert!(eof.is_empty());

    let chat = b.empfangen().await;
    assert_eq!(chat.kind, RecordKind::Chat);
    assert_eq!(chat.from_id, c.id);
    assert_eq!(chat.payload_text(), "intakt");
    assert!(server.state.registry.lookup(b_id).unwrap().online);

    server.stoppen().await;
}

#[tokio::test]
async fn abgerissene_datei_gibt_folgenden_chat_an_ziel_weiter() {
    let server = TestServer::starten(4).await;
    let mut a = server.client(9001).await;
    let mut b = server.client(9002).await;
    let mut c = server.client(9003).await;
    let (a_id, b_id) = (a.id, b.id);

    a.senden(&Record::leer(RecordKind::RelaySendFile, a_id, b_id))
        .await;
    let header = TransferHeader::new("halb.bin", 5000).unwrap();
    a.senden(&header.to_record(a_id, b_id).unwrap()).await;
    let chunk = Record::new(RecordKind::TransferChunk, a_id, b_id, vec![9u8; 1024]).unwrap();
    a.senden(&chunk).await;
    drop(a);
    server.warten_bis_offline(a_id).await;
    c.senden_text(RecordKind::Chat, b_id, "intakt").await;

    assert_eq!(b.empfangen().await.kind, RecordKind::RelaySendFile);
    let ziel = tempfile::tempdir().unwrap();
    let ergebnis = tokio::time::timeout(WARTEZEIT, receive_file(&mut b.stream, ziel.path()))
        .await
        .unwrap();
    match ergebnis {
        Err(TransferError::UnexpectedRecord(record)) => {
            assert_eq!(record.kind, RecordKind::Chat);
            assert_eq!(record.from_id, c.id);
            assert_eq!(record.payload_text(), "intakt");
        }
        andere => panic!("unerwartet: {andere:?}"),
    }

    // Die Sitzung des Ziels ist weiter benutzbar
    assert_eq!(b.register("bert", "pw").await, "Success");

    server.stoppen().await;
}
