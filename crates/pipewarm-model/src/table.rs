use std::collections::BTreeMap;

use pipewarm_codec::Hash64;

use crate::entry::Entry;
use crate::tag::EntryTag;

/// Per-tag ordered maps keyed by content hash. Built once at archive open;
/// thereafter keys are immutable and only an entry's own atomic fields
/// mutate, so shared `&EntryTable` references are handed to every worker
/// thread without further synchronization.
pub struct EntryTable {
    by_tag: [BTreeMap<Hash64, Entry>; 9],
}

impl EntryTable {
    pub fn new() -> Self {
        Self {
            by_tag: Default::default(),
        }
    }

    fn slot(&self, tag: EntryTag) -> &BTreeMap<Hash64, Entry> {
        &self.by_tag[tag as usize]
    }

    fn slot_mut(&mut self, tag: EntryTag) -> &mut BTreeMap<Hash64, Entry> {
        &mut self.by_tag[tag as usize]
    }

    /// Inserts an entry at archive-open time. Panics on a duplicate
    /// `(tag, hash)` key — archives are expected to be content-addressed
    /// and therefore key-unique; a duplicate indicates a malformed archive
    /// that should have been rejected earlier.
    pub fn put(&mut self, entry: Entry) {
        let tag = entry.tag;
        let hash = entry.hash;
        let previous = self.slot_mut(tag).insert(hash, entry);
        assert!(
            previous.is_none(),
            "duplicate entry {tag:?}/{hash} in archive"
        );
    }

    pub fn get(&self, tag: EntryTag, hash: Hash64) -> Option<&Entry> {
        self.slot(tag).get(&hash)
    }

    pub fn values(&self, tag: EntryTag) -> impl Iterator<Item = &Entry> {
        self.slot(tag).values()
    }

    pub fn len(&self, tag: EntryTag) -> usize {
        self.slot(tag).len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.iter().all(BTreeMap::is_empty)
    }

    /// Every entry for a root tag (`compute_pipeline`, `graphics_pipeline`,
    /// `raytracing_pipeline`), in hash order.
    pub fn roots(&self) -> impl Iterator<Item = &Entry> {
        EntryTag::ALL
            .into_iter()
            .filter(|tag| tag.is_root())
            .flat_map(move |tag| self.values(tag))
    }
}

impl Default for EntryTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::PayloadFlag;

    fn entry(tag: EntryTag, hash: &str) -> Entry {
        Entry::new(tag, Hash64::parse_hex(hash).unwrap(), PayloadFlag::Raw, 0, 0, 0, 0)
    }

    #[test]
    fn put_then_get() {
        let mut table = EntryTable::new();
        table.put(entry(EntryTag::Sampler, "00000000000000aa"));
        assert!(table.get(EntryTag::Sampler, Hash64::parse_hex("00000000000000aa").unwrap()).is_some());
        assert!(table.get(EntryTag::Sampler, Hash64::parse_hex("00000000000000ab").unwrap()).is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate entry")]
    fn duplicate_key_panics() {
        let mut table = EntryTable::new();
        table.put(entry(EntryTag::Sampler, "00000000000000aa"));
        table.put(entry(EntryTag::Sampler, "00000000000000aa"));
    }

    #[test]
    fn roots_only_returns_pipeline_tags() {
        let mut table = EntryTable::new();
        table.put(entry(EntryTag::Sampler, "00000000000000aa"));
        table.put(entry(EntryTag::ComputePipeline, "00000000000000bb"));
        table.put(entry(EntryTag::GraphicsPipeline, "00000000000000cc"));
        let roots: Vec<_> = table.roots().map(|e| e.tag).collect();
        assert_eq!(roots, vec![EntryTag::ComputePipeline, EntryTag::GraphicsPipeline]);
    }
}
