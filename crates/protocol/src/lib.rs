//! postillon-protocol – Netzwerkprotokoll
//!
//! Records fester Groesse fuer Steuer- und Chatnachrichten, dazu die
//! Subprotokolle fuer Dateitransfer und Medienstreams, die eine laufende
//! Verbindung voruebergehend uebernehmen.

pub mod media;
pub mod queue;
pub mod record;
pub mod request;
pub mod stream;
pub mod transfer;

pub use media::{FrameSink, FrameSource};
pub use queue::StreamingQueue;
pub use record::{
    read_record, write_record, Record, RecordCodec, RecordError, RecordKind, PAYLOAD_CAPACITY,
    RECORD_SIZE,
};
pub use request::{ClientRequest, Zugangsdaten};
pub use stream::{FrameError, StreamStatistik, MAX_FRAME_SIZE};
pub use transfer::{TransferError, TransferHeader, TransferReader, TransferSummary};
