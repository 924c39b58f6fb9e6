//! The entry record itself.
//!
//! `descriptor`, `handle`, and `dependencies` are published under a
//! release-store on `status` and must only be dereferenced after an
//! acquire-load observes the state that guarantees they were written
//! (`Parsed` for `descriptor`/`dependencies`, `Created` for `handle`).
//! This module is the one place in the crate that touches raw pointers to
//! make that publication protocol possible without a lock on the hot path.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64, Ordering};

use pipewarm_codec::Hash64;

use crate::status::EntryStatus;
use crate::tag::EntryTag;

/// Whether a payload is stored raw or DEFLATE-compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFlag {
    Raw,
    Deflate,
}

/// One edge in an entry's resolved dependency list: which entry must be
/// created first, and where (if anywhere) its handle must be written
/// before this entry's own create call.
///
/// `target` is `None` for the benign case noted in spec.md §9: the source
/// sometimes records a parse-dependency without a fixup target. The create
/// phase only ever patches `Some` targets.
pub struct DependencyEdge {
    pub dep_tag: EntryTag,
    pub dep_hash: Hash64,
    pub target: Option<*mut u64>,
}

// SAFETY: the raw pointer in `target` is owned by a `RootArena` kept alive
// for the lifetime of the replay and is only ever written from the worker
// that owns the dependent's stack frame, under the status-publication
// discipline documented on the struct. It is never read concurrently with
// that write.
unsafe impl Send for DependencyEdge {}
unsafe impl Sync for DependencyEdge {}

pub struct Entry {
    pub tag: EntryTag,
    pub hash: Hash64,

    pub payload_flag: PayloadFlag,
    pub payload_crc: u32,
    pub payload_stored_size: u64,
    pub payload_decompressed_size: u64,
    pub payload_file_offset: u64,

    pub status: EntryStatus,

    /// Number of not-yet-finished roots still needing this entry's handle.
    /// Incremented (atomically) each time the parse phase walks a fixup
    /// into this entry; decremented in the create phase as dependents
    /// finish or are invalidated.
    pub dependent_count: AtomicU32,

    /// Type-erased pointer into this entry's owning `RootArena` allocation,
    /// valid once `status` is observed `>= Parsed` (and not `Invalid`).
    /// The engine knows `tag` and casts back to the correct descriptor
    /// shape from `pipewarm-arena`.
    descriptor: AtomicPtr<()>,

    /// The driver handle, as a raw `u64` (every `ash::vk` handle newtype is
    /// a transparent `u64`). Zero means "not yet created".
    handle: AtomicU64,

    dependencies: UnsafeCell<Vec<DependencyEdge>>,
}

// SAFETY: `dependencies` is written exactly once, by the single thread that
// wins the `NotParsed -> Parsing` CAS for this entry, before the release
// store that publishes `Parsed`; all other readers acquire-load `status`
// first and only dereference after observing `Parsed` or later.
unsafe impl Sync for Entry {}

impl Entry {
    pub fn new(
        tag: EntryTag,
        hash: Hash64,
        payload_flag: PayloadFlag,
        payload_crc: u32,
        payload_stored_size: u64,
        payload_decompressed_size: u64,
        payload_file_offset: u64,
    ) -> Self {
        Self {
            tag,
            hash,
            payload_flag,
            payload_crc,
            payload_stored_size,
            payload_decompressed_size,
            payload_file_offset,
            status: EntryStatus::new(crate::status::Status::NotParsed),
            dependent_count: AtomicU32::new(0),
            descriptor: AtomicPtr::new(std::ptr::null_mut()),
            handle: AtomicU64::new(0),
            dependencies: UnsafeCell::new(Vec::new()),
        }
    }

    /// Publishes the resolved descriptor and dependency list, then the
    /// `Parsed` status, in that order. Must be called exactly once, by the
    /// thread that owns this entry's `Parsing` state.
    pub fn publish_parsed(&self, descriptor: *mut (), dependencies: Vec<DependencyEdge>) {
        // SAFETY: sole writer, see struct-level invariant.
        unsafe {
            *self.dependencies.get() = dependencies;
        }
        self.descriptor.store(descriptor, Ordering::Release);
        self.status.publish_parsed();
    }

    /// Reads the dependency list. Caller must have already acquire-loaded
    /// `status` and observed `Parsed` or later (and not `Invalid`).
    pub fn dependencies(&self) -> &[DependencyEdge] {
        // SAFETY: see struct-level invariant; caller's acquire-load on
        // `status` happens-before this read.
        unsafe { &*self.dependencies.get() }
    }

    /// Type-erased descriptor pointer, valid under the same discipline as
    /// `dependencies`.
    pub fn descriptor_ptr(&self) -> *mut () {
        self.descriptor.load(Ordering::Acquire)
    }

    pub fn publish_created(&self, handle: u64) {
        debug_assert_ne!(handle, 0, "a Created entry must have a non-null handle");
        self.handle.store(handle, Ordering::Release);
        self.status.publish_created();
    }

    pub fn handle(&self) -> Option<u64> {
        let raw = self.handle.load(Ordering::Acquire);
        (raw != 0).then_some(raw)
    }

    pub fn bump_dependent_count(&self) -> u32 {
        self.dependent_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the fan-in counter and returns the new value. A return of
    /// zero means the caller may be the one to fire the destroy, subject to
    /// this entry itself already being `Created` and non-root.
    pub fn drop_dependent(&self) -> u32 {
        self.dependent_count.fetch_sub(1, Ordering::AcqRel) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> Entry {
        Entry::new(
            EntryTag::Sampler,
            Hash64::parse_hex("00000000000000aa").unwrap(),
            PayloadFlag::Raw,
            0,
            0,
            0,
            0,
        )
    }

    #[test]
    fn publish_then_read_descriptor_and_dependencies() {
        let entry = sample_entry();
        let mut tag_value = 7u64;
        let fake_descriptor: *mut () = (&mut tag_value as *mut u64).cast();
        entry.publish_parsed(fake_descriptor, Vec::new());
        assert_eq!(entry.descriptor_ptr(), fake_descriptor);
        assert!(entry.dependencies().is_empty());
    }

    #[test]
    fn handle_round_trip() {
        let entry = sample_entry();
        assert_eq!(entry.handle(), None);
        entry.publish_created(0x1234);
        assert_eq!(entry.handle(), Some(0x1234));
    }

    #[test]
    fn dependent_count_tracks_fan_in() {
        let entry = sample_entry();
        assert_eq!(entry.bump_dependent_count(), 1);
        assert_eq!(entry.bump_dependent_count(), 2);
        assert_eq!(entry.drop_dependent(), 1);
        assert_eq!(entry.drop_dependent(), 0);
    }
}
