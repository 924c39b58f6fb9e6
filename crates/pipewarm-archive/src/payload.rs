use std::io::Read;

use flate2::read::DeflateDecoder;
use pipewarm_codec::crc32;
use pipewarm_model::{Entry, PayloadFlag};

use crate::ArchiveError;

/// Fetches and verifies one entry's payload out of a whole-file mmap.
///
/// `out` is cleared and filled with exactly `payload_decompressed_size`
/// bytes (for a raw entry, decompressed size equals stored size). The
/// bytes are valid until the caller next reuses `out`.
pub fn fetch_payload(mmap: &[u8], entry: &Entry, out: &mut Vec<u8>) -> Result<(), ArchiveError> {
    let start = entry.payload_file_offset as usize;
    let end = start
        .checked_add(entry.payload_stored_size as usize)
        .ok_or(ArchiveError::Truncated)?;
    let stored = mmap.get(start..end).ok_or(ArchiveError::Truncated)?;

    out.clear();
    match entry.payload_flag {
        PayloadFlag::Raw => out.extend_from_slice(stored),
        PayloadFlag::Deflate => {
            let mut decoder = DeflateDecoder::new(stored);
            out.reserve(entry.payload_decompressed_size as usize);
            decoder
                .read_to_end(out)
                .map_err(|_| ArchiveError::DecompressError)?;
        }
    }

    if out.len() as u64 != entry.payload_decompressed_size {
        return Err(ArchiveError::DecompressError);
    }
    if crc32(out) != entry.payload_crc {
        return Err(ArchiveError::CrcMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipewarm_codec::Hash64;

    fn entry_for(flag: PayloadFlag, stored: &[u8], decompressed: &[u8]) -> Entry {
        Entry::new(
            pipewarm_model::EntryTag::Sampler,
            Hash64::parse_hex("00000000000000aa").unwrap(),
            flag,
            crc32(decompressed),
            stored.len() as u64,
            decompressed.len() as u64,
            0,
        )
    }

    #[test]
    fn raw_payload_round_trips() {
        let data = b"hello pipewarm".to_vec();
        let entry = entry_for(PayloadFlag::Raw, &data, &data);
        let mut out = Vec::new();
        fetch_payload(&data, &entry, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn crc_mismatch_rejected() {
        let data = b"hello pipewarm".to_vec();
        let mut entry = entry_for(PayloadFlag::Raw, &data, &data);
        entry.payload_crc ^= 1;
        let mut out = Vec::new();
        assert!(matches!(
            fetch_payload(&data, &entry, &mut out),
            Err(ArchiveError::CrcMismatch)
        ));
    }

    #[test]
    fn deflate_payload_decompresses() {
        use flate2::write::DeflateEncoder;
        use flate2::Compression;
        use std::io::Write;

        let original = b"pipeline cache pre-warmer payload bytes".to_vec();
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let entry = entry_for(PayloadFlag::Deflate, &compressed, &original);
        let mut out = Vec::new();
        fetch_payload(&compressed, &entry, &mut out).unwrap();
        assert_eq!(out, original);
    }
}
