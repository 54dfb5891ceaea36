//! Little-endian field decoding.
//!
//! Every multi-byte integer in an IRD container is stored least-significant
//! byte first.  Wider values are composed from their two narrower halves, low
//! half first, which is exactly the on-disk order.
//!
//! # Panics
//! Each function reads only the leading bytes it needs and panics if `bytes`
//! is shorter than the decoded width.  Callers always pass fixed-size fields.

use byteorder::{ByteOrder, LittleEndian};

#[inline]
pub fn decode_u16(bytes: &[u8]) -> u16 {
    LittleEndian::read_u16(&bytes[..2])
}

#[inline]
pub fn decode_u32(bytes: &[u8]) -> u32 {
    u32::from(decode_u16(bytes)) | (u32::from(decode_u16(&bytes[2..])) << 16)
}

#[inline]
pub fn decode_u64(bytes: &[u8]) -> u64 {
    u64::from(decode_u32(bytes)) | (u64::from(decode_u32(&bytes[4..])) << 32)
}
