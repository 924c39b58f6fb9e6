//! Progress reporting: the engine calls `record(tag, hash, outcome)` once
//! per entry as it crosses the parse/create phases. The default sink is a
//! no-op; [`SharedMemoryProgressSink`] is the stand-in for the external
//! shared-memory interface named in spec.md §6 (a memory-mapped scratch
//! file, since real POSIX shared memory needs extra FFI this crate doesn't
//! otherwise pull in).

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use memmap2::MmapMut;
use pipewarm_codec::Hash64;
use pipewarm_model::{EntryTag, Outcome};

pub trait ProgressSink: Send + Sync {
    fn record(&self, tag: EntryTag, hash: Hash64, outcome: Outcome);
}

/// Default sink: discards every record.
#[derive(Debug, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn record(&self, _tag: EntryTag, _hash: Hash64, _outcome: Outcome) {}
}

const RECORD_LEN: usize = 24;
const HEADER_LEN: usize = 8;

/// One fixed-size slot: `seq(8) | tag(1) | outcome(1) | pad(6) | hash(8)`.
/// `seq` lets an external poller notice a slot it has already consumed was
/// overwritten by a later record (the ring wrapped).
struct RawRecord {
    seq: u64,
    tag: u8,
    outcome: u8,
    hash: u64,
}

impl RawRecord {
    fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0..8].copy_from_slice(&self.seq.to_le_bytes());
        out[8] = self.tag;
        out[9] = self.outcome;
        out[16..24].copy_from_slice(&self.hash.to_le_bytes());
        out
    }
}

/// A fixed-capacity ring of progress records backed by a memory-mapped
/// file. `record` is lock-protected; the engine calls it once per entry
/// per phase, not on a tight hot path, so a `Mutex` is adequate.
pub struct SharedMemoryProgressSink {
    mmap: Mutex<MmapMut>,
    capacity: usize,
    next_seq: AtomicU64,
}

impl SharedMemoryProgressSink {
    /// Creates (or truncates) the file at `path` and sizes it for
    /// `capacity` ring slots.
    pub fn create(path: &Path, capacity: usize) -> io::Result<Self> {
        let file_len = HEADER_LEN as u64 + (capacity * RECORD_LEN) as u64;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(file_len)?;
        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        mmap[0..8].copy_from_slice(&(capacity as u64).to_le_bytes());
        Ok(Self {
            mmap: Mutex::new(mmap),
            capacity,
            next_seq: AtomicU64::new(0),
        })
    }
}

impl ProgressSink for SharedMemoryProgressSink {
    fn record(&self, tag: EntryTag, hash: Hash64, outcome: Outcome) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let index = (seq as usize) % self.capacity;
        let offset = HEADER_LEN + index * RECORD_LEN;
        let bytes = RawRecord {
            seq,
            tag: tag as u8,
            outcome: match outcome {
                Outcome::Parsed => 0,
                Outcome::Created => 1,
                Outcome::Failed => 2,
            },
            hash: hash.0,
        }
        .to_bytes();
        let mut mmap = self.mmap.lock().unwrap();
        mmap[offset..offset + RECORD_LEN].copy_from_slice(&bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_accepts_every_call() {
        let sink = NoopProgressSink;
        sink.record(EntryTag::Sampler, Hash64::parse_hex("00000000000000aa").unwrap(), Outcome::Parsed);
    }

    #[test]
    fn shared_memory_sink_writes_seq_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.bin");
        let sink = SharedMemoryProgressSink::create(&path, 4).unwrap();
        let hash = Hash64::parse_hex("00000000000000bb").unwrap();
        sink.record(EntryTag::Sampler, hash, Outcome::Created);

        let mmap = sink.mmap.lock().unwrap();
        let seq = u64::from_le_bytes(mmap[8..16].try_into().unwrap());
        let written_hash = u64::from_le_bytes(mmap[24..32].try_into().unwrap());
        assert_eq!(seq, 0);
        assert_eq!(written_hash, hash.0);
        assert_eq!(mmap[8 + 9], 1);
    }

    #[test]
    fn ring_wraps_after_capacity_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.bin");
        let sink = SharedMemoryProgressSink::create(&path, 2).unwrap();
        let hash = Hash64::parse_hex("00000000000000aa").unwrap();
        sink.record(EntryTag::Sampler, hash, Outcome::Parsed);
        sink.record(EntryTag::Sampler, hash, Outcome::Parsed);
        sink.record(EntryTag::Sampler, hash, Outcome::Created);

        let mmap = sink.mmap.lock().unwrap();
        let seq = u64::from_le_bytes(mmap[8..16].try_into().unwrap());
        assert_eq!(seq, 2, "third record wraps back into slot 0");
    }
}
