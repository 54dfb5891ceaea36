//! IRD container decoding.
//!
//! ```no_run
//! let record = ird::decode("game.ird", "/tmp/ird-scratch")?;
//! println!("{} ({} files)", record.title, record.file_count());
//! println!("header blob at {}", record.header_blob_path().display());
//! # Ok::<(), ird::DecodeError>(())
//! ```
//!
//! Sections are read strictly in on-disk order and each step runs only if the
//! previous one succeeded.  The record is assembled at the very end, so a
//! caller sees either a complete record or an error.  Every handle and buffer
//! acquired along the way is scoped to the call and dropped on every exit
//! path, last acquired first.
//!
//! The two blobs are written to the scratch directory as a side effect.  After
//! a failed decode those files may exist with partial contents.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::string::FromUtf8Error;

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

use crate::block::{
    BottomBlock, FileHash, FormatError, MiddleBlock, RegionHash, TopBlock, BOTTOM_PADDING_LEN,
};
use crate::codec::{ExtractError, InflateExtractor, DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE};
use crate::io_stream::{ContainerStream, StreamError};
use crate::record::{ExtractedBlob, IrdRecord};

pub const HEADER_FILE_NAME: &str = "header.bin";
pub const FOOTER_FILE_NAME: &str = "footer.bin";
/// Composed blob paths must be strictly shorter than this many bytes.
pub const DEFAULT_MAX_PATH_LEN: usize = 4096;

const READ_OP: &str = "reading container";

// ── DecodeOptions ─────────────────────────────────────────────────────────────

/// Configuration for [`decode_with`].
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Size of each of the extractor's two buffers.
    pub buffer_size:      usize,
    pub header_file_name: String,
    pub footer_file_name: String,
    pub max_path_len:     usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            buffer_size:      DEFAULT_BUFFER_SIZE,
            header_file_name: HEADER_FILE_NAME.to_string(),
            footer_file_name: FOOTER_FILE_NAME.to_string(),
            max_path_len:     DEFAULT_MAX_PATH_LEN,
        }
    }
}

impl DecodeOptions {
    fn validate(&self) -> Result<(), DecodeError> {
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(DecodeError::InvalidArguments("buffer size is below the minimum"));
        }
        for name in [&self.header_file_name, &self.footer_file_name] {
            if Path::new(name).file_name() != Some(OsStr::new(name)) {
                return Err(DecodeError::InvalidArguments("blob file names must be plain file names"));
            }
        }
        if self.header_file_name == self.footer_file_name {
            return Err(DecodeError::InvalidArguments("header and footer blobs need distinct file names"));
        }
        Ok(())
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Coarse failure class of a [`DecodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArguments,
    File,
    Compression,
    Format,
    PathTooLong,
    Allocation,
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(&'static str),
    #[error("{field} at offset {offset}: {source}")]
    Stream {
        field:  &'static str,
        offset: u64,
        #[source]
        source: StreamError,
    },
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("title is not valid UTF-8: {0}")]
    InvalidTitle(#[source] FromUtf8Error),
    #[error("blob path {path:?} is {len} bytes, limit is {max}")]
    PathTooLong { path: PathBuf, len: usize, max: usize },
    #[error("cannot allocate {count} {what}")]
    Allocation { what: &'static str, count: u64 },
    #[error("extracting {blob} blob: {source}")]
    Extract {
        blob:   &'static str,
        #[source]
        source: ExtractError,
    },
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::InvalidArguments(_) => ErrorKind::InvalidArguments,
            DecodeError::Stream { source, .. } => stream_kind(source),
            DecodeError::Format(_) | DecodeError::InvalidTitle(_) => ErrorKind::Format,
            DecodeError::PathTooLong { .. } => ErrorKind::PathTooLong,
            DecodeError::Allocation { .. } => ErrorKind::Allocation,
            DecodeError::Extract { source: ExtractError::Stream(s), .. } => stream_kind(s),
            DecodeError::Extract { .. } => ErrorKind::Compression,
        }
    }
}

fn stream_kind(e: &StreamError) -> ErrorKind {
    if e.is_compression() { ErrorKind::Compression } else { ErrorKind::File }
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Decode `container`, extracting its blobs into `scratch_dir` with default
/// options.
pub fn decode(
    container:   impl AsRef<Path>,
    scratch_dir: impl AsRef<Path>,
) -> Result<IrdRecord, DecodeError> {
    decode_with(container, scratch_dir, &DecodeOptions::default())
}

/// Decode `container` with explicit options.
///
/// `scratch_dir` must already exist; it is not created.
pub fn decode_with(
    container:   impl AsRef<Path>,
    scratch_dir: impl AsRef<Path>,
    options:     &DecodeOptions,
) -> Result<IrdRecord, DecodeError> {
    let container   = container.as_ref();
    let scratch_dir = scratch_dir.as_ref();

    if container.as_os_str().is_empty() {
        return Err(DecodeError::InvalidArguments("container path is empty"));
    }
    if scratch_dir.as_os_str().is_empty() {
        return Err(DecodeError::InvalidArguments("scratch directory is empty"));
    }
    options.validate()?;

    let mut stream = ContainerStream::open(container)
        .map_err(|source| DecodeError::Stream { field: "container", offset: 0, source })?;

    match read_record(&mut stream, scratch_dir, options) {
        Ok(record) => {
            log::info!(
                "decoded {}: {:?} [{}], {} regions, {} files",
                container.display(),
                record.title,
                record.title_id_lossy(),
                record.region_count(),
                record.file_count()
            );
            Ok(record)
        }
        Err(e) => {
            log::warn!(
                "decoding {} failed at offset {}: {e}; {} may hold partial blob output",
                container.display(),
                stream.position(),
                scratch_dir.display()
            );
            Err(e)
        }
    }
}

// ── Section readers ──────────────────────────────────────────────────────────

fn read_record(
    stream:      &mut ContainerStream,
    scratch_dir: &Path,
    options:     &DecodeOptions,
) -> Result<IrdRecord, DecodeError> {
    if stream.is_compressed() {
        log::debug!("container is gzip-wrapped");
    }
    let top = read_field(stream, "top block", |r| TopBlock::read(r))?;
    top.validate()?;

    let title_len = read_field(stream, "title length", |r| r.read_u8())?;
    let title = read_title(stream, title_len)?;
    log::debug!("title {title:?} ({title_len} bytes)");

    let middle = read_field(stream, "middle block", |r| MiddleBlock::read(r))?;

    let extractor = InflateExtractor::new(options.buffer_size);
    let header_blob = extract_blob(
        stream, &extractor, scratch_dir, &options.header_file_name,
        "header", "header blob length", options.max_path_len,
    )?;
    let footer_blob = extract_blob(
        stream, &extractor, scratch_dir, &options.footer_file_name,
        "footer", "footer blob length", options.max_path_len,
    )?;

    let region_count = read_field(stream, "region count", |r| r.read_u8())?;
    let region_hashes = read_records(
        stream, u64::from(region_count), "region hashes", |r| RegionHash::read(r),
    )?;

    let file_count = read_field(stream, "file count", |r| r.read_u32::<LittleEndian>())?;
    let file_hashes = read_records(
        stream, u64::from(file_count), "file hashes", |r| FileHash::read(r),
    )?;
    log::debug!("{region_count} region hashes, {file_count} file hashes");

    let offset = stream.position();
    stream
        .skip(BOTTOM_PADDING_LEN, READ_OP)
        .map_err(|source| DecodeError::Stream { field: "bottom padding", offset, source })?;
    let bottom = read_field(stream, "bottom block", |r| BottomBlock::read(r))?;

    Ok(IrdRecord {
        title,
        title_id: top.title_id,
        sys_ver:  middle.sys_ver,
        disc_ver: middle.disc_ver,
        app_ver:  middle.app_ver,
        pic:      bottom.pic,
        data1:    bottom.data1,
        data2:    bottom.data2,
        uid:      bottom.uid,
        crc:      bottom.crc,
        region_hashes,
        file_hashes,
        header_blob,
        footer_blob,
    })
}

fn read_field<T>(
    stream: &mut ContainerStream,
    field:  &'static str,
    read:   impl FnOnce(&mut ContainerStream) -> io::Result<T>,
) -> Result<T, DecodeError> {
    let offset = stream.position();
    stream
        .read_with(READ_OP, read)
        .map_err(|source| DecodeError::Stream { field, offset, source })
}

fn read_title(stream: &mut ContainerStream, len: u8) -> Result<String, DecodeError> {
    let mut buf = vec![0u8; usize::from(len)];
    let offset = stream.position();
    stream
        .read_exact(&mut buf, READ_OP)
        .map_err(|source| DecodeError::Stream { field: "title", offset, source })?;
    String::from_utf8(buf).map_err(DecodeError::InvalidTitle)
}

/// Read `count` fixed-size records, preserving on-disk order.
fn read_records<T>(
    stream: &mut ContainerStream,
    count:  u64,
    what:   &'static str,
    read:   impl Fn(&mut ContainerStream) -> io::Result<T>,
) -> Result<Vec<T>, DecodeError> {
    let alloc_err = || DecodeError::Allocation { what, count };
    let len = usize::try_from(count).map_err(|_| alloc_err())?;
    let mut out = Vec::new();
    out.try_reserve_exact(len).map_err(|_| alloc_err())?;
    for _ in 0..len {
        out.push(read_field(stream, what, &read)?);
    }
    Ok(out)
}

fn blob_path(scratch_dir: &Path, name: &str, max_path_len: usize) -> Result<PathBuf, DecodeError> {
    let path = scratch_dir.join(name);
    let len = path.as_os_str().len();
    if len >= max_path_len {
        return Err(DecodeError::PathTooLong { path, len, max: max_path_len });
    }
    Ok(path)
}

fn extract_blob(
    stream:       &mut ContainerStream,
    extractor:    &InflateExtractor,
    scratch_dir:  &Path,
    file_name:    &str,
    blob:         &'static str,
    length_field: &'static str,
    max_path_len: usize,
) -> Result<ExtractedBlob, DecodeError> {
    let compressed_len = read_field(stream, length_field, |r| r.read_u32::<LittleEndian>())?;
    let path = blob_path(scratch_dir, file_name, max_path_len)?;
    let stats = extractor
        .extract(stream, u64::from(compressed_len), &path)
        .map_err(|source| DecodeError::Extract { blob, source })?;
    log::debug!(
        "{blob} blob: {} -> {} bytes ({}) at {}",
        stats.compressed_len,
        stats.decompressed_len,
        stats.framing.name(),
        path.display()
    );
    Ok(ExtractedBlob::new(path, stats))
}
