//! Byte-level codecs shared by the archive reader and the capture parser:
//! content-hash hex parsing, CRC-32 verification, and the 7-bit varint
//! stream used for compressed shader-word payloads.

mod crc;
mod hash;
mod varint;

pub use crc::crc32;
pub use hash::{Hash64, NULL_HASH};
pub use varint::{decode_shader_words, VarintError};
