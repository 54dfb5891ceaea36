//! Fixed-size on-disk blocks of an IRD container.
//!
//! Each block is read field by field, in on-disk order, from any `Read`.
//! Nothing here depends on in-memory struct layout.  All integers are
//! little-endian.
//!
//! | Block    | Fields                                                        | Size |
//! |----------|---------------------------------------------------------------|------|
//! | top      | magic[4] `3IRD`, version u8, title_id[9]                      | 14   |
//! | middle   | sys_ver[4], disc_ver[5], app_ver[5]                           | 14   |
//! | region   | digest[16]                                                    | 16   |
//! | file     | sector[8], digest[16]                                         | 24   |
//! | bottom   | (padding[4] skipped), pic[115], data1[16], data2[16], uid u32, crc u32 | 155 |

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use thiserror::Error;

use crate::record::serialize_hex;

pub const MAGIC: &[u8; 4] = b"3IRD";
pub const VERSION: u8 = 9;

pub const TOP_BLOCK_SIZE:     usize = 4 + 1 + 9;
pub const MIDDLE_BLOCK_SIZE:  usize = 4 + 5 + 5;
pub const REGION_HASH_SIZE:   usize = 16;
pub const FILE_HASH_SIZE:     usize = 8 + 16;
/// Bytes between the file hashes and the bottom block; never interpreted.
pub const BOTTOM_PADDING_LEN: u64   = 4;
pub const BOTTOM_BLOCK_SIZE:  usize = PIC_SIZE + 16 + 16 + 4 + 4;
pub const PIC_SIZE:           usize = 0x73;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("invalid magic {0:02x?}, expected \"3IRD\"")]
    InvalidMagic([u8; 4]),
    #[error("unsupported IRD version {0}, only version 9 is supported")]
    UnsupportedVersion(u8),
}

fn read_bytes<const N: usize, R: Read>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

// ── Top ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopBlock {
    pub magic:    [u8; 4],
    pub version:  u8,
    pub title_id: [u8; 9],
}

impl TopBlock {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            magic:    read_bytes(&mut reader)?,
            version:  reader.read_u8()?,
            title_id: read_bytes(&mut reader)?,
        })
    }

    /// Magic first, then version.  Both are hard failures.
    pub fn validate(&self) -> Result<(), FormatError> {
        if &self.magic != MAGIC {
            return Err(FormatError::InvalidMagic(self.magic));
        }
        if self.version != VERSION {
            return Err(FormatError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

// ── Middle ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddleBlock {
    pub sys_ver:  [u8; 4],
    pub disc_ver: [u8; 5],
    pub app_ver:  [u8; 5],
}

impl MiddleBlock {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            sys_ver:  read_bytes(&mut reader)?,
            disc_ver: read_bytes(&mut reader)?,
            app_ver:  read_bytes(&mut reader)?,
        })
    }
}

// ── Hash records ─────────────────────────────────────────────────────────────

/// Digest of one disc region, in region index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegionHash(#[serde(serialize_with = "serialize_hex")] pub [u8; 16]);

impl RegionHash {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(RegionHash(read_bytes::<REGION_HASH_SIZE, _>(&mut reader)?))
    }
}

/// Digest of one indexed file.  `sector` is an opaque key and is kept as raw
/// bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileHash {
    #[serde(serialize_with = "serialize_hex")]
    pub sector: [u8; 8],
    #[serde(serialize_with = "serialize_hex")]
    pub hash:   [u8; 16],
}

impl FileHash {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            sector: read_bytes(&mut reader)?,
            hash:   read_bytes(&mut reader)?,
        })
    }

    pub fn sector_bytes(&self) -> &[u8; 8] {
        &self.sector
    }
}

// ── Bottom ───────────────────────────────────────────────────────────────────

/// Trailing fixed block, decoded after its padding has been skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BottomBlock {
    pub pic:   [u8; PIC_SIZE],
    pub data1: [u8; 16],
    pub data2: [u8; 16],
    pub uid:   u32,
    pub crc:   u32,
}

impl BottomBlock {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            pic:   read_bytes(&mut reader)?,
            data1: read_bytes(&mut reader)?,
            data2: read_bytes(&mut reader)?,
            uid:   reader.read_u32::<LittleEndian>()?,
            crc:   reader.read_u32::<LittleEndian>()?,
        })
    }
}
