use pipewarm_model::EntryTag;

use crate::ArchiveError;

/// 16-byte magic, matched verbatim at the start of every archive.
pub const MAGIC: [u8; 16] = *b"PIPEWARMCACHE\0\0\0";

/// The only format version this crate understands.
pub const FORMAT_VERSION: u8 = 1;

/// Magic (16) + version (1) + 3 reserved bytes.
pub const HEADER_LEN: usize = 20;

/// Tag (1) + hash (8) + flag (1) + CRC (4) + stored size (8) +
/// decompressed size (8) + file offset (8).
pub const ENTRY_RECORD_LEN: usize = 1 + 8 + 1 + 4 + 8 + 8 + 8;

/// Decoded copy of one fixed-size entry record from the archive's per-tag
/// tables. Carries the tag rather than relying on positional context so
/// callers can validate it against the table section they are currently
/// reading.
#[derive(Debug, Clone, Copy)]
pub struct RawEntryRecord {
    pub tag: EntryTag,
    pub hash: u64,
    pub flag: u8,
    pub crc: u32,
    pub stored_size: u64,
    pub decompressed_size: u64,
    pub file_offset: u64,
}

/// Validates the fixed header and returns the offset just past it.
pub fn parse_header(bytes: &[u8]) -> Result<usize, ArchiveError> {
    if bytes.len() < HEADER_LEN {
        return Err(ArchiveError::Truncated);
    }
    if bytes[..16] != MAGIC {
        return Err(ArchiveError::BadMagic);
    }
    // Reserved bytes (offset 17..20) are not validated; the version check
    // folds into `BadMagic` per the three-way open() failure taxonomy.
    if bytes[16] != FORMAT_VERSION {
        return Err(ArchiveError::BadMagic);
    }
    Ok(HEADER_LEN)
}

/// Reads one tag's `count` field and its `count` fixed records, starting
/// at `offset`. Returns the decoded records and the offset just past them.
pub fn parse_tag_section(
    bytes: &[u8],
    offset: usize,
    tag: EntryTag,
) -> Result<(Vec<RawEntryRecord>, usize), ArchiveError> {
    let count_end = offset.checked_add(4).ok_or(ArchiveError::TagOverflow)?;
    let count_bytes = bytes.get(offset..count_end).ok_or(ArchiveError::Truncated)?;
    let count = u32::from_be_bytes(count_bytes.try_into().unwrap()) as usize;

    let region_len = count
        .checked_mul(ENTRY_RECORD_LEN)
        .ok_or(ArchiveError::TagOverflow)?;
    let region_end = count_end
        .checked_add(region_len)
        .ok_or(ArchiveError::TagOverflow)?;
    let region = bytes
        .get(count_end..region_end)
        .ok_or(ArchiveError::Truncated)?;

    let mut records = Vec::with_capacity(count);
    for chunk in region.chunks_exact(ENTRY_RECORD_LEN) {
        records.push(parse_entry_record(chunk, tag)?);
    }
    Ok((records, region_end))
}

fn parse_entry_record(record: &[u8], tag: EntryTag) -> Result<RawEntryRecord, ArchiveError> {
    debug_assert_eq!(record.len(), ENTRY_RECORD_LEN);
    let stored_tag = record[0];
    if EntryTag::from_archive_byte(stored_tag) != Some(tag) {
        return Err(ArchiveError::TagOverflow);
    }
    let hash = u64::from_be_bytes(record[1..9].try_into().unwrap());
    let flag = record[9];
    let crc = u32::from_be_bytes(record[10..14].try_into().unwrap());
    let stored_size = u64::from_be_bytes(record[14..22].try_into().unwrap());
    let decompressed_size = u64::from_be_bytes(record[22..30].try_into().unwrap());
    let file_offset = u64::from_be_bytes(record[30..38].try_into().unwrap());
    Ok(RawEntryRecord {
        tag,
        hash,
        flag,
        crc,
        stored_size,
        decompressed_size,
        file_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(tag: EntryTag) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ENTRY_RECORD_LEN);
        buf.push(tag as u8);
        buf.extend_from_slice(&0xaabbccddeeff0011u64.to_be_bytes());
        buf.push(0);
        buf.extend_from_slice(&0x12345678u32.to_be_bytes());
        buf.extend_from_slice(&100u64.to_be_bytes());
        buf.extend_from_slice(&100u64.to_be_bytes());
        buf.extend_from_slice(&20u64.to_be_bytes());
        buf
    }

    #[test]
    fn header_round_trips() {
        let mut bytes = MAGIC.to_vec();
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(&[0, 0, 0]);
        assert_eq!(parse_header(&bytes).unwrap(), HEADER_LEN);
    }

    #[test]
    fn bad_magic_rejected() {
        let bytes = vec![0u8; HEADER_LEN];
        assert!(matches!(parse_header(&bytes), Err(ArchiveError::BadMagic)));
    }

    #[test]
    fn truncated_header_rejected() {
        let bytes = vec![0u8; HEADER_LEN - 1];
        assert!(matches!(parse_header(&bytes), Err(ArchiveError::Truncated)));
    }

    #[test]
    fn tag_section_round_trips() {
        let mut bytes = 2u32.to_be_bytes().to_vec();
        bytes.extend(sample_record(EntryTag::Sampler));
        bytes.extend(sample_record(EntryTag::Sampler));
        let (records, end) = parse_tag_section(&bytes, 0, EntryTag::Sampler).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(end, bytes.len());
        assert_eq!(records[0].hash, 0xaabbccddeeff0011);
    }

    #[test]
    fn mismatched_tag_byte_rejected() {
        let mut bytes = 1u32.to_be_bytes().to_vec();
        bytes.extend(sample_record(EntryTag::Sampler));
        assert!(matches!(
            parse_tag_section(&bytes, 0, EntryTag::PipelineLayout),
            Err(ArchiveError::TagOverflow)
        ));
    }
}
