pub mod endian;
pub mod io_stream;
pub mod codec;
pub mod block;
pub mod record;
pub mod decoder;

pub use codec::{BlobFraming, ExtractError, ExtractStats, InflateExtractor};
pub use decoder::{decode, decode_with, DecodeError, DecodeOptions, ErrorKind};
pub use record::{ExtractedBlob, FileHash, IrdRecord, RegionHash};
