use std::sync::atomic::{AtomicU32, Ordering};

use pipewarm_model::EntryTag;

/// Final tallies for one [`crate::Engine::run`], the numbers a summary log
/// line reports once both phases finish.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineReport {
    pub roots_created: u32,
    pub roots_invalid: u32,
    pub entries_created: u32,
    pub entries_invalid: u32,
}

#[derive(Default)]
pub(crate) struct Counters {
    roots_created: AtomicU32,
    roots_invalid: AtomicU32,
    entries_created: AtomicU32,
    entries_invalid: AtomicU32,
}

impl Counters {
    pub(crate) fn record_created(&self, tag: EntryTag) {
        self.entries_created.fetch_add(1, Ordering::Relaxed);
        if tag.is_root() {
            self.roots_created.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_invalid(&self, tag: EntryTag) {
        self.entries_invalid.fetch_add(1, Ordering::Relaxed);
        if tag.is_root() {
            self.roots_invalid.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> EngineReport {
        EngineReport {
            roots_created: self.roots_created.load(Ordering::Relaxed),
            roots_invalid: self.roots_invalid.load(Ordering::Relaxed),
            entries_created: self.entries_created.load(Ordering::Relaxed),
            entries_invalid: self.entries_invalid.load(Ordering::Relaxed),
        }
    }
}
