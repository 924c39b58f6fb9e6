//! Memory-mapped reader for the pipewarm archive format (spec.md §6): a
//! fixed header, a per-tag table of fixed-size entry records, and a
//! payload heap addressed by the records' file offsets.

mod header;
mod payload;

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use pipewarm_model::{Entry, EntryTable, EntryTag, Hash64, PayloadFlag};
use thiserror::Error;

pub use header::{FORMAT_VERSION, HEADER_LEN, MAGIC};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive header magic or version mismatch")]
    BadMagic,
    #[error("archive is truncated")]
    Truncated,
    #[error("tag section record count or tag byte is inconsistent")]
    TagOverflow,
    #[error("payload CRC-32 mismatch")]
    CrcMismatch,
    #[error("payload decompression failed or produced the wrong size")]
    DecompressError,
    #[error("I/O error opening archive: {0}")]
    Io(#[from] std::io::Error),
}

/// A memory-mapped, opened archive: the immutable backing bytes plus the
/// entry table built from its header at open time.
pub struct Archive {
    mmap: Mmap,
    table: EntryTable,
}

impl Archive {
    /// Maps `path` read-only and parses its header and entry table.
    pub fn open(path: &Path) -> Result<Archive, ArchiveError> {
        let file = File::open(path)?;
        // SAFETY: the archive file is assumed not to be concurrently
        // truncated or overwritten for the lifetime of this mapping, which
        // is the standard mmap-of-an-input-file caveat; pipewarm treats the
        // archive as a read-only, externally-stable artifact (spec.md §1).
        let mmap = unsafe { Mmap::map(&file)? };
        let table = build_table(&mmap)?;
        Ok(Archive { mmap, table })
    }

    pub fn table(&self) -> &EntryTable {
        &self.table
    }

    /// Fetches and verifies `entry`'s payload bytes into `out`.
    pub fn payload(&self, entry: &Entry, out: &mut Vec<u8>) -> Result<(), ArchiveError> {
        payload::fetch_payload(&self.mmap, entry, out)
    }
}

fn build_table(bytes: &[u8]) -> Result<EntryTable, ArchiveError> {
    let mut offset = header::parse_header(bytes)?;
    let mut table = EntryTable::new();
    for tag in EntryTag::ALL {
        let (records, next_offset) = header::parse_tag_section(bytes, offset, tag)?;
        offset = next_offset;
        for record in records {
            let flag = match record.flag {
                0 => PayloadFlag::Raw,
                1 => PayloadFlag::Deflate,
                _ => return Err(ArchiveError::TagOverflow),
            };
            table.put(Entry::new(
                tag,
                Hash64(record.hash),
                flag,
                record.crc,
                record.stored_size,
                record.decompressed_size,
                record.file_offset,
            ));
        }
    }
    Ok(table)
}
