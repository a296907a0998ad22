//! Scratch files of encoded records with scoped cleanup.
//!
//! A [`Chunk`] owns a file in the scratch directory and removes it when dropped, so
//! scratch space is reclaimed on success, on error and on cancellation alike.

use anyhow::{Context, Result};
use log::debug;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::mgrec::{MgrecReader, MgrecWriter, MpeggRecord, create_mgrec_writer, open_mgrec_reader};

/// A scratch file holding `records` encoded records.
#[derive(Debug)]
pub struct Chunk {
    path: PathBuf,
    records: u64,
}

impl Chunk {
    /// Write `records` to a new chunk at `path`.
    pub fn write<'a, I>(path: impl Into<PathBuf>, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a MpeggRecord>,
    {
        let mut writer = ChunkWriter::create(path)?;
        for record in records {
            writer.write(record)?;
        }
        writer.finish()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the chunk.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Open the chunk for sequential reading.
    pub fn open(&self) -> Result<MgrecReader<BufReader<File>>> {
        open_mgrec_reader(&self.path)
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed scratch file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!("Could not remove scratch file {}: {e}", self.path.display()),
        }
    }
}

/// Incremental writer producing a [`Chunk`].
///
/// Dropping the writer without calling [`finish`](Self::finish) removes the partial file.
pub struct ChunkWriter {
    // Declared before `chunk` so the file is closed before the guard removes it.
    writer: MgrecWriter<BufWriter<File>>,
    chunk: Chunk,
}

impl ChunkWriter {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let writer = create_mgrec_writer(&path)
            .with_context(|| format!("Failed to create scratch file {}", path.display()))?;
        Ok(Self { writer, chunk: Chunk { path, records: 0 } })
    }

    pub fn write(&mut self, record: &MpeggRecord) -> Result<()> {
        self.writer
            .write(record)
            .with_context(|| format!("Failed to write scratch file {}", self.chunk.path.display()))?;
        self.chunk.records += 1;
        Ok(())
    }

    #[must_use]
    pub fn records(&self) -> u64 {
        self.chunk.records
    }

    /// Flush the file and hand over the finished chunk.
    pub fn finish(self) -> Result<Chunk> {
        let Self { writer, chunk } = self;
        writer
            .finish()
            .with_context(|| format!("Failed to flush scratch file {}", chunk.path.display()))?;
        Ok(chunk)
    }
}

/// Sequential reader over a chunk; the file is removed once the reader is dropped.
pub struct ChunkReader {
    reader: MgrecReader<BufReader<File>>,
    chunk: Chunk,
}

impl ChunkReader {
    pub fn new(chunk: Chunk) -> Result<Self> {
        let reader = chunk
            .open()
            .with_context(|| format!("Failed to open scratch file {}", chunk.path.display()))?;
        Ok(Self { reader, chunk })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.chunk.path()
    }

    pub fn next_record(&mut self) -> Result<Option<MpeggRecord>> {
        self.reader
            .read_record()
            .with_context(|| format!("Failed to read scratch file {}", self.chunk.path.display()))
    }
}
