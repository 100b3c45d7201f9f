//! Datei-basierte Medienquelle und -senke
//!
//! `FileFrameSource` zerlegt eine Datei in Frames fester Groesse,
//! `FileFrameSink` haengt empfangene Frames an eine Datei an. Der Inhalt
//! wird nicht interpretiert.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use postillon_protocol::{FrameSink, FrameSource, MAX_FRAME_SIZE};
use tokio::io::AsyncReadExt;

pub struct FileFrameSource {
    datei: tokio::fs::File,
    frame_groesse: usize,
}

impl FileFrameSource {
    pub async fn oeffnen(pfad: &Path, frame_groesse: usize) -> io::Result<Self> {
        Ok(Self {
            datei: tokio::fs::File::open(pfad).await?,
            frame_groesse: frame_groesse.clamp(1, MAX_FRAME_SIZE),
        })
    }
}

#[async_trait]
impl FrameSource for FileFrameSource {
    async fn next_frame(&mut self) -> io::Result<Option<Bytes>> {
        let mut puffer = BytesMut::zeroed(self.frame_groesse);
        let mut gelesen = 0;
        while gelesen < puffer.len() {
            let n = self.datei.read(&mut puffer[gelesen..]).await?;
            if n == 0 {
                break;
            }
            gelesen += n;
        }
        if gelesen == 0 {
            return Ok(None);
        }
        puffer.truncate(gelesen);
        Ok(Some(puffer.freeze()))
    }
}

/// Schreibt Frames hintereinander in eine Datei
pub struct FileFrameSink {
    pfad: PathBuf,
    datei: BufWriter<File>,
}

impl FileFrameSink {
    pub fn erstellen(pfad: impl Into<PathBuf>) -> io::Result<Self> {
        let pfad = pfad.into();
        let datei = BufWriter::new(File::create(&pfad)?);
        Ok(Self { pfad, datei })
    }

    pub fn pfad(&self) -> &Path {
        &self.pfad
    }
}

impl FrameSink for FileFrameSink {
    fn render(&mut self, frame: &[u8]) -> io::Result<()> {
        self.datei.write_all(frame)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.datei.flush()
    }
}
