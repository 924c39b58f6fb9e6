//! A builder for well-formed pipewarm archive files, so integration tests
//! across crates can exercise the real [`pipewarm_archive::Archive`] reader
//! (and, downstream, the replay engine) without hand-assembling the header
//! and entry-record byte layout themselves.
//!
//! Re-exports [`pipewarm_driver::MockDriver`] and
//! [`pipewarm_driver::MockEvent`] too, so a test only needs one `use` line
//! to pull in both halves of a fixture: a real archive to parse and a
//! counting driver to replay against.

use std::io::Write;
use std::path::Path;

use flate2::write::DeflateEncoder;
use flate2::Compression;
use pipewarm_archive::Archive;
use pipewarm_codec::{crc32, Hash64};
use pipewarm_model::EntryTag;

pub use pipewarm_driver::{MockDriver, MockEvent};

const MAGIC: [u8; 16] = *b"PIPEWARMCACHE\0\0\0";
const FORMAT_VERSION: u8 = 1;

struct PendingEntry {
    tag: EntryTag,
    hash: Hash64,
    stored: Vec<u8>,
    decompressed_size: u64,
    crc: u32,
    flag: u8,
}

/// Accumulates `(tag, hash, payload)` triples and renders them into one
/// archive's worth of header, per-tag record tables, and payload heap.
#[derive(Default)]
pub struct ArchiveBuilder {
    entries: Vec<PendingEntry>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Adds an entry whose payload is stored uncompressed.
    pub fn add_raw(&mut self, tag: EntryTag, hash: Hash64, payload: &[u8]) -> &mut Self {
        self.entries.push(PendingEntry {
            tag,
            hash,
            stored: payload.to_vec(),
            decompressed_size: payload.len() as u64,
            crc: crc32(payload),
            flag: 0,
        });
        self
    }

    /// Adds an entry whose payload is DEFLATE-compressed before storage,
    /// exercising the archive reader's decompression path.
    pub fn add_deflate(&mut self, tag: EntryTag, hash: Hash64, payload: &[u8]) -> &mut Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).expect("compressing an in-memory buffer cannot fail");
        let stored = encoder.finish().expect("finishing an in-memory deflate stream cannot fail");
        self.entries.push(PendingEntry {
            tag,
            hash,
            stored,
            decompressed_size: payload.len() as u64,
            crc: crc32(payload),
            flag: 1,
        });
        self
    }

    /// Renders the accumulated entries into the on-disk archive byte
    /// layout: header, then one count-prefixed record section per
    /// [`EntryTag::ALL`] entry, then the payload heap in the same order.
    pub fn encode(&self) -> Vec<u8> {
        let mut ordered: Vec<&PendingEntry> = Vec::with_capacity(self.entries.len());
        for tag in EntryTag::ALL {
            ordered.extend(self.entries.iter().filter(|e| e.tag == tag));
        }

        let mut header = MAGIC.to_vec();
        header.push(FORMAT_VERSION);
        header.extend_from_slice(&[0, 0, 0]);

        let section_len: usize = EntryTag::ALL.len() * 4 + ordered.len() * 38;
        let heap_base = (header.len() + section_len) as u64;

        let mut sections = Vec::with_capacity(section_len);
        let mut heap = Vec::new();
        let mut heap_offset = heap_base;
        for tag in EntryTag::ALL {
            let matching: Vec<&&PendingEntry> = ordered.iter().filter(|e| e.tag == tag).collect();
            sections.extend_from_slice(&(matching.len() as u32).to_be_bytes());
            for entry in matching {
                sections.push(entry.tag as u8);
                sections.extend_from_slice(&entry.hash.0.to_be_bytes());
                sections.push(entry.flag);
                sections.extend_from_slice(&entry.crc.to_be_bytes());
                sections.extend_from_slice(&(entry.stored.len() as u64).to_be_bytes());
                sections.extend_from_slice(&entry.decompressed_size.to_be_bytes());
                sections.extend_from_slice(&heap_offset.to_be_bytes());
                heap_offset += entry.stored.len() as u64;
                heap.extend_from_slice(&entry.stored);
            }
        }

        let mut bytes = header;
        bytes.extend_from_slice(&sections);
        bytes.extend_from_slice(&heap);
        bytes
    }

    /// Writes the encoded archive to `path`.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.encode())
    }

    /// Writes the encoded archive to a fresh temp file and opens it,
    /// returning the [`tempfile::TempDir`] that must stay alive for as long
    /// as the returned [`Archive`] is used.
    pub fn open(&self) -> (tempfile::TempDir, Archive) {
        let dir = tempfile::tempdir().expect("creating a temp dir for a test fixture cannot fail");
        let path = dir.path().join("archive.bin");
        self.write_to(&path).expect("writing a fixture archive to a temp file cannot fail");
        let archive = Archive::open(&path).expect("a fixture archive built by this crate must be well-formed");
        (dir, archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_raw_entry() {
        let mut builder = ArchiveBuilder::new();
        let hash = Hash64::parse_hex("00000000000000aa").unwrap();
        builder.add_raw(EntryTag::Sampler, hash, b"hello");
        let (_dir, archive) = builder.open();

        let entry = archive.table().get(EntryTag::Sampler, hash).unwrap();
        let mut out = Vec::new();
        archive.payload(entry, &mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn round_trips_a_deflated_entry_alongside_a_raw_one() {
        let mut builder = ArchiveBuilder::new();
        let raw_hash = Hash64::parse_hex("00000000000000aa").unwrap();
        let deflate_hash = Hash64::parse_hex("00000000000000bb").unwrap();
        builder.add_raw(EntryTag::Sampler, raw_hash, b"raw bytes");
        builder.add_deflate(EntryTag::ShaderModule, deflate_hash, b"shader module bytes, repeated repeated repeated");
        let (_dir, archive) = builder.open();

        let mut out = Vec::new();
        let raw_entry = archive.table().get(EntryTag::Sampler, raw_hash).unwrap();
        archive.payload(raw_entry, &mut out).unwrap();
        assert_eq!(out, b"raw bytes");

        let deflate_entry = archive.table().get(EntryTag::ShaderModule, deflate_hash).unwrap();
        archive.payload(deflate_entry, &mut out).unwrap();
        assert_eq!(out, b"shader module bytes, repeated repeated repeated");
    }

    #[test]
    fn multiple_entries_under_the_same_tag_each_resolve_independently() {
        let mut builder = ArchiveBuilder::new();
        let a = Hash64::parse_hex("00000000000000aa").unwrap();
        let b = Hash64::parse_hex("00000000000000bb").unwrap();
        builder.add_raw(EntryTag::Sampler, a, b"first");
        builder.add_raw(EntryTag::Sampler, b, b"second, a bit longer");
        let (_dir, archive) = builder.open();

        assert_eq!(archive.table().len(EntryTag::Sampler), 2);
        let mut out = Vec::new();
        archive.payload(archive.table().get(EntryTag::Sampler, a).unwrap(), &mut out).unwrap();
        assert_eq!(out, b"first");
        archive.payload(archive.table().get(EntryTag::Sampler, b).unwrap(), &mut out).unwrap();
        assert_eq!(out, b"second, a bit longer");
    }
}
