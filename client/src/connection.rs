//! Verbindung zum Server
//!
//! Aufbau: TCP, Kanal-Handshake, JOIN mit dem eigenen Listen-Port, dann
//! die JOIN-Bestaetigung mit der vergebenen ID. Danach liest ein eigener
//! Task alle Records vom Server; geschrieben wird ueber eine geteilte,
//! gesperrte Schreibseite.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use postillon_core::ClientId;
use postillon_crypto::{ChannelConnector, Kanal};
use postillon_protocol::{read_record, write_record, Record, RecordKind};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::empfang::{record_verarbeiten, EmpfangsKontext, Herkunft};
use crate::error::{ClientError, ClientResult};
use crate::ereignis::Ereignis;

/// Wartezeit auf die JOIN-Bestaetigung
const BESTAETIGUNG_FRIST: Duration = Duration::from_secs(10);

/// Geteilte Schreibseite zum Server
pub type Schreiber = Arc<tokio::sync::Mutex<WriteHalf<Kanal>>>;

pub struct ServerVerbindung {
    pub id: ClientId,
    pub schreiber: Schreiber,
    pub leser: ReadHalf<Kanal>,
}

impl ServerVerbindung {
    pub async fn verbinden(
        adresse: SocketAddr,
        server_name: &str,
        connector: &dyn ChannelConnector,
        listen_port: u16,
    ) -> ClientResult<Self> {
        let stream = TcpStream::connect(adresse).await?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(fehler = %e, "TCP_NODELAY nicht gesetzt");
        }
        let mut kanal = connector.connect(stream, server_name).await?;
        tracing::info!(server = %adresse, kanal = connector.bezeichnung(), "Mit Server verbunden");

        let join = Record::text(
            RecordKind::Join,
            ClientId(0),
            ClientId(0),
            &listen_port.to_string(),
        )?;
        write_record(&mut kanal, &join).await?;

        let bestaetigung = tokio::time::timeout(BESTAETIGUNG_FRIST, read_record(&mut kanal))
            .await
            .map_err(|_| ClientError::KeineBestaetigung("Zeitlimit ueberschritten".into()))??;
        if bestaetigung.kind != RecordKind::Join {
            return Err(ClientError::KeineBestaetigung(format!(
                "unerwarteter Record {}",
                bestaetigung.kind
            )));
        }

        let id = bestaetigung.to_id;
        tracing::info!(client_id = id.inner(), "JOIN bestaetigt");

        let (leser, schreiber) = tokio::io::split(kanal);
        Ok(Self {
            id,
            schreiber: Arc::new(tokio::sync::Mutex::new(schreiber)),
            leser,
        })
    }
}

/// Liest Records vom Server, bis die Verbindung endet oder `token` ausloest
pub async fn server_lauschen(
    mut leser: ReadHalf<Kanal>,
    ctx: EmpfangsKontext,
    token: CancellationToken,
) {
    loop {
        let gelesen = tokio::select! {
            _ = token.cancelled() => return,
            r = read_record(&mut leser) => r,
        };
        match gelesen {
            Ok(record) => {
                if let Err(e) = record_verarbeiten(record, &mut leser, Herkunft::Server, &ctx).await {
                    tracing::warn!(fehler = %e, "Serververbindung nicht mehr lesbar");
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(fehler = %e, "Serververbindung beendet");
                break;
            }
        }
    }
    ctx.melden(Ereignis::ServerGetrennt);
}
