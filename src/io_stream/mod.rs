//! Resource-safe I/O layer.
//!
//! Thin wrappers around the two kinds of handle the decoder touches:
//!
//! - [`ContainerStream`]: the IRD container, opened the way `gzopen` opens
//!   a file: gzip-wrapped files are read through a multi-member gzip decoder,
//!   anything else is read transparently as a plain buffered file.
//! - [`BlobFile`]: a destination file for one extracted blob.
//!
//! Every operation returns a [`StreamError`] instead of a bare `io::Error`.
//! The variant records which failure domain the handle belongs to: plain
//! files report `File`, the gzip-wrapped container reports `Compression`.
//! Reads and writes are all-or-nothing; a short transfer is an error.  No
//! operation retries.
//!
//! Handles are released by `Drop`.  A constructor never hands out a handle
//! on failure, so there is nothing half-initialised to clean up.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use thiserror::Error;

/// First two bytes of every gzip member (RFC 1952 §2.3.1).
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("file error while {op}: {source}")]
    File {
        op:     &'static str,
        #[source]
        source: io::Error,
    },
    #[error("compression stream error while {op}: {source}")]
    Compression {
        op:     &'static str,
        #[source]
        source: io::Error,
    },
}

impl StreamError {
    fn file(op: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| StreamError::File { op, source }
    }

    pub fn is_compression(&self) -> bool {
        matches!(self, StreamError::Compression { .. })
    }

}

// ── Container stream ─────────────────────────────────────────────────────────

enum Inner {
    Plain(BufReader<File>),
    Gzip(MultiGzDecoder<File>),
}

/// Sequential, forward-only reader over an IRD container.
pub struct ContainerStream {
    inner:    Inner,
    /// Logical (decompressed) offset of the next byte to be read.
    position: u64,
}

impl ContainerStream {
    /// Open `path`, sniffing the outer gzip magic.
    pub fn open(path: &Path) -> Result<Self, StreamError> {
        let mut file = File::open(path).map_err(StreamError::file("opening container"))?;

        let mut magic = Vec::with_capacity(GZIP_MAGIC.len());
        (&mut file)
            .take(GZIP_MAGIC.len() as u64)
            .read_to_end(&mut magic)
            .map_err(StreamError::file("sniffing container"))?;
        file.seek(SeekFrom::Start(0)).map_err(StreamError::file("rewinding container"))?;

        let inner = if magic == GZIP_MAGIC {
            Inner::Gzip(MultiGzDecoder::new(file))
        } else {
            Inner::Plain(BufReader::new(file))
        };
        log::trace!(
            "opened container {} ({})",
            path.display(),
            if matches!(inner, Inner::Gzip(_)) { "gzip" } else { "plain" }
        );
        Ok(Self { inner, position: 0 })
    }

    /// Whether the container is gzip-wrapped at the outer level.
    pub fn is_compressed(&self) -> bool {
        matches!(self.inner, Inner::Gzip(_))
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    fn fail(&self, op: &'static str, source: io::Error) -> StreamError {
        match self.inner {
            Inner::Plain(_) => StreamError::File { op, source },
            Inner::Gzip(_)  => StreamError::Compression { op, source },
        }
    }

    /// Fill `buf` completely or fail.
    pub fn read_exact(&mut self, buf: &mut [u8], op: &'static str) -> Result<(), StreamError> {
        Read::read_exact(&mut *self, buf).map_err(|e| self.fail(op, e))
    }

    /// Run a `Read`-based decoder against the stream, mapping its I/O errors
    /// into this handle's failure domain.
    pub fn read_with<T>(
        &mut self,
        op:     &'static str,
        decode: impl FnOnce(&mut Self) -> io::Result<T>,
    ) -> Result<T, StreamError> {
        decode(&mut *self).map_err(|e| self.fail(op, e))
    }

    /// Discard exactly `n` bytes.  Gzip streams cannot seek, so both flavours
    /// skip by reading forward; running out of input is an error.
    pub fn skip(&mut self, n: u64, op: &'static str) -> Result<(), StreamError> {
        let res = io::copy(&mut Read::by_ref(&mut *self).take(n), &mut io::sink());
        let copied = res.map_err(|e| self.fail(op, e))?;
        if copied != n {
            return Err(self.fail(op, io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("skipped {copied} of {n} bytes"),
            )));
        }
        Ok(())
    }
}

impl Read for ContainerStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.inner {
            Inner::Plain(r) => r.read(buf)?,
            Inner::Gzip(r)  => r.read(buf)?,
        };
        self.position += n as u64;
        Ok(n)
    }
}

// ── Blob output file ─────────────────────────────────────────────────────────

/// Destination file for one extracted blob.
pub struct BlobFile {
    file:    File,
    written: u64,
}

impl BlobFile {
    /// Create (or truncate) `path`.
    pub fn create(path: &Path) -> Result<Self, StreamError> {
        let file = File::create(path).map_err(StreamError::file("creating blob file"))?;
        Ok(Self { file, written: 0 })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<(), StreamError> {
        self.file.write_all(buf).map_err(StreamError::file("writing blob file"))?;
        self.written += buf.len() as u64;
        Ok(())
    }

    /// Flush and sync, surfacing errors that a plain drop would swallow.
    /// Returns the number of bytes written.
    pub fn finish(mut self) -> Result<u64, StreamError> {
        self.file.flush().map_err(StreamError::file("flushing blob file"))?;
        self.file.sync_all().map_err(StreamError::file("closing blob file"))?;
        Ok(self.written)
    }
}
