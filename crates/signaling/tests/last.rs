//! Viele gleichzeitige Clients

mod common;

use std::collections::HashSet;

use common::{TestClient, TestServer};
use postillon_core::ClientId;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hundert_gleichzeitige_registrierungen() {
    let server = TestServer::starten(16).await;
    let adresse = server.adresse;

    let aufgaben: Vec<_> = (0..100u16)
        .map(|i| {
            tokio::spawn(async move {
                let mut client = TestClient::verbinden(adresse, 10000 + i).await;
                let antwort = client.register(&format!("nutzer{i}"), "pw").await;
                (client.id, antwort)
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for aufgabe in aufgaben {
        let (id, antwort): (ClientId, String) = aufgabe.await.unwrap();
        assert_eq!(antwort, "Success");
        assert!(ids.insert(id), "ID doppelt vergeben: {id}");
    }

    assert_eq!(ids.len(), 100);
    assert_eq!(server.state.registry.len(), 100);
    assert_eq!(server.state.credentials.anzahl().await, 100);

    server.stoppen().await;
}
