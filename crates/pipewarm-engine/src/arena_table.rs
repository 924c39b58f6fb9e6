use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use pipewarm_arena::RootArena;
use pipewarm_codec::Hash64;
use pipewarm_model::{EntryTable, EntryTag};

/// One lazily-built arena per archive entry, keyed the same way
/// [`EntryTable`] is keyed.
///
/// Every entry gets its own arena rather than one arena shared across a
/// whole root's subgraph: simpler to reason about under concurrent access
/// (a shared leaf may be parsed once but referenced by several roots'
/// DFS walks) and only trades away early reclamation, which spec.md
/// describes as permitted, not required. The table itself lives for the
/// whole engine run, so every arena it hands out stays valid that long.
pub struct ArenaTable {
    by_tag: [BTreeMap<Hash64, OnceLock<Arc<RootArena>>>; 9],
}

impl ArenaTable {
    /// Pre-populates one slot per `(tag, hash)` already present in
    /// `table`. Building the key set up front means no lock is needed
    /// later: every worker thread races only the `OnceLock` inside an
    /// existing slot, never the surrounding map.
    pub fn build(table: &EntryTable) -> Self {
        let mut by_tag: [BTreeMap<Hash64, OnceLock<Arc<RootArena>>>; 9] = Default::default();
        for tag in EntryTag::ALL {
            for entry in table.values(tag) {
                by_tag[tag as usize].insert(entry.hash, OnceLock::new());
            }
        }
        Self { by_tag }
    }

    /// Returns the arena for `(tag, hash)`, creating it on first access.
    /// Concurrent first accesses race harmlessly on the `OnceLock`; every
    /// caller ends up with the same `Arc`.
    pub fn get_or_create(&self, tag: EntryTag, hash: Hash64) -> Arc<RootArena> {
        self.by_tag[tag as usize]
            .get(&hash)
            .expect("ArenaTable was built from the same EntryTable the engine is walking")
            .get_or_init(|| Arc::new(RootArena::new()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipewarm_model::{Entry, PayloadFlag};

    #[test]
    fn repeated_lookups_share_one_arena() {
        let mut table = EntryTable::new();
        let hash = Hash64::parse_hex("00000000000000aa").unwrap();
        table.put(Entry::new(EntryTag::Sampler, hash, PayloadFlag::Raw, 0, 0, 0, 0));
        let arenas = ArenaTable::build(&table);

        let first = arenas.get_or_create(EntryTag::Sampler, hash);
        let second = arenas.get_or_create(EntryTag::Sampler, hash);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    #[should_panic(expected = "ArenaTable was built from the same EntryTable")]
    fn unknown_key_panics() {
        let table = EntryTable::new();
        let arenas = ArenaTable::build(&table);
        arenas.get_or_create(EntryTag::Sampler, Hash64::parse_hex("00000000000000aa").unwrap());
    }
}
