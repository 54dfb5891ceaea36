use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

pub use crate::block::{FileHash, RegionHash, PIC_SIZE};
use crate::codec::{BlobFraming, ExtractStats};

/// Serialize raw bytes as a lowercase hex string.
pub(crate) fn serialize_hex<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    serializer.serialize_str(&hex::encode(bytes))
}

/// A decompressed blob written to the scratch directory during decoding.
///
/// The record only remembers where the file is.  The file itself outlives the
/// record and is never deleted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedBlob {
    pub path:             PathBuf,
    pub framing:          BlobFraming,
    pub compressed_len:   u64,
    pub decompressed_len: u64,
}

impl ExtractedBlob {
    pub(crate) fn new(path: PathBuf, stats: ExtractStats) -> Self {
        Self {
            path,
            framing:          stats.framing,
            compressed_len:   stats.compressed_len,
            decompressed_len: stats.decompressed_len,
        }
    }
}

/// A fully decoded IRD container.
///
/// Only [`crate::decode`] produces one, and only once every section has been
/// read and validated.  Version fields are opaque bytes, copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IrdRecord {
    pub title:    String,
    #[serde(serialize_with = "serialize_hex")]
    pub title_id: [u8; 9],
    #[serde(serialize_with = "serialize_hex")]
    pub sys_ver:  [u8; 4],
    #[serde(serialize_with = "serialize_hex")]
    pub disc_ver: [u8; 5],
    #[serde(serialize_with = "serialize_hex")]
    pub app_ver:  [u8; 5],

    #[serde(serialize_with = "serialize_hex")]
    pub pic:   [u8; PIC_SIZE],
    #[serde(serialize_with = "serialize_hex")]
    pub data1: [u8; 16],
    #[serde(serialize_with = "serialize_hex")]
    pub data2: [u8; 16],
    pub uid:   u32,
    pub crc:   u32,

    pub region_hashes: Vec<RegionHash>,
    pub file_hashes:   Vec<FileHash>,

    pub header_blob: ExtractedBlob,
    pub footer_blob: ExtractedBlob,
}

impl IrdRecord {
    pub fn region_count(&self) -> usize {
        self.region_hashes.len()
    }

    pub fn file_count(&self) -> usize {
        self.file_hashes.len()
    }

    /// The title id as text, for display.  IDs are normally ASCII such as
    /// `BLES01234`.
    pub fn title_id_lossy(&self) -> String {
        String::from_utf8_lossy(&self.title_id).into_owned()
    }

    pub fn header_blob_path(&self) -> &Path {
        &self.header_blob.path
    }

    pub fn footer_blob_path(&self) -> &Path {
        &self.footer_blob.path
    }
}
