//! Test-only IRD container builder.

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::Write;
use std::path::Path;

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Deterministic, poorly compressible payload.
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut x = seed.wrapping_mul(2_654_435_761).max(1);
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            x as u8
        })
        .collect()
}

#[derive(Clone)]
pub struct ContainerSpec {
    pub magic:          [u8; 4],
    pub version:        u8,
    pub title_id:       [u8; 9],
    pub title:          Vec<u8>,
    pub sys_ver:        [u8; 4],
    pub disc_ver:       [u8; 5],
    pub app_ver:        [u8; 5],
    /// Already-compressed blob bytes, written verbatim after their length.
    pub header_blob:    Vec<u8>,
    pub footer_blob:    Vec<u8>,
    pub region_hashes:  Vec<[u8; 16]>,
    pub file_hashes:    Vec<([u8; 8], [u8; 16])>,
    pub padding:        [u8; 4],
    pub pic:            [u8; 0x73],
    pub data1:          [u8; 16],
    pub data2:          [u8; 16],
    pub uid:            u32,
    pub crc:            u32,
}

impl ContainerSpec {
    /// Title, hashes and blobs all empty.
    pub fn minimal() -> Self {
        Self {
            magic:         *b"3IRD",
            version:       9,
            title_id:      *b"BLES00000",
            title:         Vec::new(),
            sys_ver:       *b"4.21",
            disc_ver:      *b"01.00",
            app_ver:       *b"01.00",
            header_blob:   Vec::new(),
            footer_blob:   Vec::new(),
            region_hashes: Vec::new(),
            file_hashes:   Vec::new(),
            padding:       [0; 4],
            pic:           [0; 0x73],
            data1:         [0; 16],
            data2:         [0; 16],
            uid:           0,
            crc:           0,
        }
    }

    pub fn populated() -> Self {
        let mut pic = [0u8; 0x73];
        for (i, b) in pic.iter_mut().enumerate() {
            *b = i as u8;
        }
        Self {
            title_id:      *b"BLUS30443",
            title:         "Demon's Souls".as_bytes().to_vec(),
            sys_ver:       *b"3.55",
            disc_ver:      *b"01.02",
            app_ver:       *b"01.03",
            header_blob:   gzip(&noise(10_000, 1)),
            footer_blob:   zlib(&vec![0x5a; 50_000]),
            region_hashes: (0..5u8).map(|i| [i; 16]).collect(),
            file_hashes:   (0..3u8).map(|i| ([i, 0, 0, 0, 0, 0, 0, 0x80], [0xf0 | i; 16])).collect(),
            padding:       [0xde, 0xad, 0xbe, 0xef],
            pic,
            data1:         [0x11; 16],
            data2:         [0x22; 16],
            uid:           0x1234_5678,
            crc:           0x9abc_def0,
            ..Self::minimal()
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.magic);
        out.write_u8(self.version).unwrap();
        out.extend_from_slice(&self.title_id);
        out.write_u8(self.title.len() as u8).unwrap();
        out.extend_from_slice(&self.title);
        out.extend_from_slice(&self.sys_ver);
        out.extend_from_slice(&self.disc_ver);
        out.extend_from_slice(&self.app_ver);
        out.write_u32::<LittleEndian>(self.header_blob.len() as u32).unwrap();
        out.extend_from_slice(&self.header_blob);
        out.write_u32::<LittleEndian>(self.footer_blob.len() as u32).unwrap();
        out.extend_from_slice(&self.footer_blob);
        out.write_u8(self.region_hashes.len() as u8).unwrap();
        for h in &self.region_hashes {
            out.extend_from_slice(h);
        }
        out.write_u32::<LittleEndian>(self.file_hashes.len() as u32).unwrap();
        for (sector, h) in &self.file_hashes {
            out.extend_from_slice(sector);
            out.extend_from_slice(h);
        }
        out.extend_from_slice(&self.padding);
        out.extend_from_slice(&self.pic);
        out.extend_from_slice(&self.data1);
        out.extend_from_slice(&self.data2);
        out.write_u32::<LittleEndian>(self.uid).unwrap();
        out.write_u32::<LittleEndian>(self.crc).unwrap();
        out
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.to_bytes()).unwrap();
    }

    pub fn write_gzipped_to(&self, path: &Path) {
        std::fs::write(path, gzip(&self.to_bytes())).unwrap();
    }
}

/// Write `compressed` to a temp file and open it as a plain container stream
/// positioned at the first compressed byte.  A lead byte keeps a gzip blob
/// from being mistaken for a gzip-wrapped container.
pub fn stream_over(dir: &Path, compressed: &[u8]) -> ird::io_stream::ContainerStream {
    let path = dir.join("blob.src");
    let mut bytes = vec![0u8];
    bytes.extend_from_slice(compressed);
    std::fs::write(&path, bytes).unwrap();
    let mut stream = ird::io_stream::ContainerStream::open(&path).unwrap();
    stream.skip(1, "lead byte").unwrap();
    stream
}

pub fn blob_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".bin"))
        .collect();
    names.sort();
    names
}
