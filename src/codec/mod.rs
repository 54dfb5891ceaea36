//! Streaming inflate extractor.
//!
//! An IRD container embeds its header and footer blobs as compressed
//! sub-streams, each prefixed by its *compressed* length.  [`InflateExtractor`]
//! consumes exactly that many bytes from the container and writes the
//! decompressed payload to a file.  Memory use is two fixed-size buffers plus
//! the inflate state, whatever the payload size.
//!
//! # Framing
//! The first two compressed bytes select the framing (see [`BlobFraming`]):
//! gzip members have their header skipped and their trailer verified here;
//! zlib streams have their Adler-32 checked by the engine; anything else is
//! inflated as raw deflate.
//!
//! # Budget
//! The compressed length is a hard budget.  The extractor never reads past it,
//! and the engine must report end-of-stream exactly when it is used up.  Ending
//! early or late is an error.

use std::path::Path;

use crc32fast::Hasher;
use flate2::{Decompress, DecompressError, FlushDecompress, Status};
use serde::Serialize;
use thiserror::Error;

use crate::endian::{decode_u16, decode_u32};
use crate::io_stream::{BlobFile, ContainerStream, StreamError, GZIP_MAGIC};

/// Default size of each of the two rotating buffers.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
/// Buffers are never smaller than this; the framing sniff needs two bytes and
/// the gzip trailer eight.
pub const MIN_BUFFER_SIZE: usize = 16;

const GZIP_TRAILER_LEN: usize = 8;
const GZIP_METHOD_DEFLATE: u8 = 8;
const FHCRC:     u8 = 0x02;
const FEXTRA:    u8 = 0x04;
const FNAME:     u8 = 0x08;
const FCOMMENT:  u8 = 0x10;
const FRESERVED: u8 = 0xe0;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("inflate failed: {0}")]
    Inflate(#[from] DecompressError),
    #[error("invalid gzip member header: {0}")]
    InvalidGzipHeader(&'static str),
    #[error("compressed data ran out after {consumed} bytes without an end-of-stream marker")]
    MissingEndOfStream { consumed: u64 },
    #[error("end-of-stream reached with {unconsumed} compressed bytes left over")]
    UnexpectedEnd { unconsumed: u64 },
    #[error("inflate engine made no progress at compressed offset {offset}")]
    Stalled { offset: u64 },
    #[error("gzip trailer CRC-32 mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("gzip trailer size mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: u32, actual: u32 },
}

// ── Framing ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobFraming {
    /// RFC 1951 raw deflate.
    Deflate,
    /// RFC 1950 zlib wrapper.
    Zlib,
    /// RFC 1952 gzip member.
    Gzip,
}

impl BlobFraming {
    /// Classify a stream by its first two bytes.
    pub fn sniff(prefix: &[u8]) -> Self {
        match *prefix {
            [a, b, ..] if [a, b] == GZIP_MAGIC => BlobFraming::Gzip,
            [cmf, flg, ..]
                if cmf & 0x0f == 8
                    && cmf >> 4 <= 7
                    && ((u16::from(cmf) << 8) | u16::from(flg)) % 31 == 0 =>
            {
                BlobFraming::Zlib
            }
            _ => BlobFraming::Deflate,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BlobFraming::Deflate => "deflate",
            BlobFraming::Zlib    => "zlib",
            BlobFraming::Gzip    => "gzip",
        }
    }
}

/// Outcome of one successful extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    pub framing:          BlobFraming,
    pub compressed_len:   u64,
    pub decompressed_len: u64,
}

// ── Budgeted source ──────────────────────────────────────────────────────────

/// The container stream, limited to one blob's compressed length.
struct Budget<'a> {
    source:    &'a mut ContainerStream,
    remaining: u64,
    consumed:  u64,
}

impl Budget<'_> {
    /// Read `min(buf.len(), remaining)` bytes.  Never over-reads.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, ExtractError> {
        let n = usize::try_from(self.remaining).map_or(buf.len(), |r| r.min(buf.len()));
        self.source.read_exact(&mut buf[..n], "reading compressed blob")?;
        self.remaining -= n as u64;
        self.consumed  += n as u64;
        Ok(n)
    }

    fn header_bytes(&mut self, buf: &mut [u8]) -> Result<(), ExtractError> {
        if (buf.len() as u64) > self.remaining {
            return Err(ExtractError::InvalidGzipHeader("header runs past the compressed length"));
        }
        self.fill(buf).map(|_| ())
    }

    fn header_u8(&mut self) -> Result<u8, ExtractError> {
        let mut b = [0u8; 1];
        self.header_bytes(&mut b)?;
        Ok(b[0])
    }

    fn skip_header_bytes(&mut self, mut n: u64, scratch: &mut [u8]) -> Result<(), ExtractError> {
        while n > 0 {
            let chunk = usize::try_from(n).map_or(scratch.len(), |n| n.min(scratch.len()));
            self.header_bytes(&mut scratch[..chunk])?;
            n -= chunk as u64;
        }
        Ok(())
    }

    fn skip_zero_terminated(&mut self) -> Result<(), ExtractError> {
        while self.header_u8()? != 0 {}
        Ok(())
    }

    /// Skip a gzip member header whose two magic bytes are already consumed.
    fn skip_gzip_header(&mut self, scratch: &mut [u8]) -> Result<(), ExtractError> {
        // CM, FLG, MTIME[4], XFL, OS
        let mut fixed = [0u8; 8];
        self.header_bytes(&mut fixed)?;
        if fixed[0] != GZIP_METHOD_DEFLATE {
            return Err(ExtractError::InvalidGzipHeader("compression method is not deflate"));
        }
        let flags = fixed[1];
        if flags & FRESERVED != 0 {
            return Err(ExtractError::InvalidGzipHeader("reserved flag bits are set"));
        }
        if flags & FEXTRA != 0 {
            let mut xlen = [0u8; 2];
            self.header_bytes(&mut xlen)?;
            self.skip_header_bytes(u64::from(decode_u16(&xlen)), scratch)?;
        }
        if flags & FNAME != 0 {
            self.skip_zero_terminated()?;
        }
        if flags & FCOMMENT != 0 {
            self.skip_zero_terminated()?;
        }
        if flags & FHCRC != 0 {
            let mut hcrc = [0u8; 2];
            self.header_bytes(&mut hcrc)?;
        }
        Ok(())
    }
}

// ── Extractor ────────────────────────────────────────────────────────────────

/// Decompresses one length-prefixed blob to a file with bounded memory.
#[derive(Debug, Clone, Copy)]
pub struct InflateExtractor {
    buffer_size: usize,
}

impl Default for InflateExtractor {
    fn default() -> Self {
        Self { buffer_size: DEFAULT_BUFFER_SIZE }
    }
}

impl InflateExtractor {
    /// `buffer_size` is raised to [`MIN_BUFFER_SIZE`] if smaller.
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size: buffer_size.max(MIN_BUFFER_SIZE) }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Consume exactly `compressed_len` bytes from `source`, inflate them and
    /// write the result to `dest`.
    ///
    /// `dest` is created (or truncated) before anything is read.  On failure
    /// it may hold partial output; it is closed either way.
    pub fn extract(
        &self,
        source:         &mut ContainerStream,
        compressed_len: u64,
        dest:           &Path,
    ) -> Result<ExtractStats, ExtractError> {
        let mut out = BlobFile::create(dest)?;

        if compressed_len == 0 {
            out.finish()?;
            log::debug!("empty blob -> {}", dest.display());
            return Ok(ExtractStats {
                framing:          BlobFraming::Deflate,
                compressed_len:   0,
                decompressed_len: 0,
            });
        }

        let mut in_buf  = vec![0u8; self.buffer_size].into_boxed_slice();
        let mut out_buf = vec![0u8; self.buffer_size].into_boxed_slice();
        let mut budget  = Budget { source, remaining: compressed_len, consumed: 0 };

        let mut in_len = budget.fill(&mut in_buf[..2])?;
        let framing = BlobFraming::sniff(&in_buf[..in_len]);
        if framing == BlobFraming::Gzip {
            in_len = 0;
            budget.skip_gzip_header(&mut out_buf)?;
        }
        log::debug!(
            "inflating {compressed_len} byte {} blob -> {}",
            framing.name(),
            dest.display()
        );

        let mut engine  = Decompress::new(framing == BlobFraming::Zlib);
        let mut crc     = Hasher::new();
        let mut in_pos  = 0usize;
        let mut out_len = 0usize;

        loop {
            if in_pos == in_len && budget.remaining > 0 {
                in_len = budget.fill(&mut in_buf)?;
                in_pos = 0;
            }

            let (before_in, before_out) = (engine.total_in(), engine.total_out());
            let status = engine.decompress(
                &in_buf[in_pos..in_len],
                &mut out_buf[out_len..],
                FlushDecompress::None,
            )?;
            let consumed = (engine.total_in() - before_in) as usize;
            let produced = (engine.total_out() - before_out) as usize;
            in_pos  += consumed;
            out_len += produced;

            let finished = status == Status::StreamEnd;
            if out_len == out_buf.len() || (finished && out_len > 0) {
                crc.update(&out_buf[..out_len]);
                out.write_all(&out_buf[..out_len])?;
                log::trace!("flushed {out_len} bytes ({} total)", out.written());
                out_len = 0;
            }
            if finished {
                break;
            }

            if consumed == 0 && produced == 0 {
                if in_pos == in_len && budget.remaining == 0 {
                    return Err(ExtractError::MissingEndOfStream { consumed: budget.consumed });
                }
                if in_pos < in_len {
                    return Err(ExtractError::Stalled {
                        offset: budget.consumed - (in_len - in_pos) as u64,
                    });
                }
            }
        }

        let buffered  = in_len - in_pos;
        let leftover  = buffered as u64 + budget.remaining;
        let trailer_len = if framing == BlobFraming::Gzip { GZIP_TRAILER_LEN as u64 } else { 0 };
        if leftover < trailer_len {
            return Err(ExtractError::MissingEndOfStream { consumed: budget.consumed });
        }
        if leftover > trailer_len {
            return Err(ExtractError::UnexpectedEnd { unconsumed: leftover - trailer_len });
        }

        if framing == BlobFraming::Gzip {
            let mut trailer = [0u8; GZIP_TRAILER_LEN];
            trailer[..buffered].copy_from_slice(&in_buf[in_pos..in_len]);
            budget.fill(&mut trailer[buffered..])?;

            let expected = decode_u32(&trailer[..4]);
            let actual   = crc.finalize();
            if expected != actual {
                return Err(ExtractError::ChecksumMismatch { expected, actual });
            }
            let expected = decode_u32(&trailer[4..]);
            let actual   = engine.total_out() as u32;
            if expected != actual {
                return Err(ExtractError::LengthMismatch { expected, actual });
            }
        }

        let decompressed_len = out.finish()?;
        log::debug!("inflated {compressed_len} -> {decompressed_len} bytes");
        Ok(ExtractStats { framing, compressed_len, decompressed_len })
    }
}
