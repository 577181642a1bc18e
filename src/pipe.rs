//! Virtual pipes.
//!
//! These types let an embedder stand in for a guest's stdio with in-memory
//! buffers instead of OS files. They have no host handle, so a readiness
//! subscription on one reports `Notsup`, except that a `ReadPipe` installed
//! as stdin always counts as readable.

use crate::file::WasiFile;
use std::any::Any;
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, PoisonError, RwLock};

/// A virtual pipe read end.
#[derive(Debug)]
pub struct ReadPipe<R: Read> {
    reader: Arc<RwLock<R>>,
}

impl<R: Read> Clone for ReadPipe<R> {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
        }
    }
}

impl<R: Read + Any + Send + Sync> ReadPipe<R> {
    /// Create a new pipe from a `Read` type.
    pub fn new(r: R) -> Self {
        Self::from_shared(Arc::new(RwLock::new(r)))
    }

    /// Create a new pipe from a shareable `Read` type.
    pub fn from_shared(reader: Arc<RwLock<R>>) -> Self {
        Self { reader }
    }

    /// Try to convert this `ReadPipe<R>` back to the underlying `R` type.
    ///
    /// This will fail with `Err(self)` if multiple references to the underlying `R` exist.
    pub fn try_into_inner(self) -> Result<R, Self> {
        match Arc::try_unwrap(self.reader) {
            Ok(rc) => Ok(rc.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(reader) => Err(Self { reader }),
        }
    }

    /// Read from the underlying reader, as the guest would.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .read(buf)
    }
}

impl From<Vec<u8>> for ReadPipe<Cursor<Vec<u8>>> {
    fn from(r: Vec<u8>) -> Self {
        Self::new(Cursor::new(r))
    }
}

impl From<&str> for ReadPipe<Cursor<String>> {
    fn from(r: &str) -> Self {
        Self::new(Cursor::new(r.to_string()))
    }
}

impl<R: Read + Any + Send + Sync> WasiFile for ReadPipe<R> {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A virtual pipe write end.
#[derive(Debug)]
pub struct WritePipe<W: Write> {
    writer: Arc<RwLock<W>>,
}

impl<W: Write> Clone for WritePipe<W> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer.clone(),
        }
    }
}

impl<W: Write + Any + Send + Sync> WritePipe<W> {
    /// Create a new pipe from a `Write` type.
    pub fn new(w: W) -> Self {
        Self::from_shared(Arc::new(RwLock::new(w)))
    }

    /// Create a new pipe from a shareable `Write` type.
    pub fn from_shared(writer: Arc<RwLock<W>>) -> Self {
        Self { writer }
    }

    /// Try to convert this `WritePipe<W>` back to the underlying `W` type.
    ///
    /// This will fail with `Err(self)` if multiple references to the underlying `W` exist.
    pub fn try_into_inner(self) -> Result<W, Self> {
        match Arc::try_unwrap(self.writer) {
            Ok(rc) => Ok(rc.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(writer) => Err(Self { writer }),
        }
    }

    /// Write to the underlying writer, as the guest would.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.writer
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .write(buf)
    }
}

impl WritePipe<Cursor<Vec<u8>>> {
    /// Create a new writable virtual pipe backed by a `Vec<u8>` buffer.
    pub fn new_in_memory() -> Self {
        Self::new(Cursor::new(vec![]))
    }
}

impl<W: Write + Any + Send + Sync> WasiFile for WritePipe<W> {
    fn as_any(&self) -> &dyn Any {
        self
    }
}
