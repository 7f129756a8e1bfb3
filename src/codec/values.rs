//! Value record table with content deduplication

use crate::model::{Hash, Leaf, Record};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Value records in index order, deduplicated by canonical group hash
///
/// The root-level leaves, when present, occupy index 0 and are kept out of
/// the dedup index: no pointer may ever target them, or the decoder would
/// stop treating them as root entries.
pub(crate) struct ValueTable {
    groups: Vec<IndexMap<String, Leaf>>,
    by_hash: HashMap<Hash, usize>,
}

impl ValueTable {
    pub(crate) fn new(root_primitives: IndexMap<String, Leaf>) -> Self {
        let mut groups = Vec::new();
        if !root_primitives.is_empty() {
            groups.push(root_primitives);
        }
        ValueTable {
            groups,
            by_hash: HashMap::new(),
        }
    }

    /// Index of the record holding `entries`, appending it if unseen
    pub(crate) fn intern(&mut self, entries: IndexMap<String, Leaf>) -> usize {
        let hash = Hash::of_group(&entries);
        if let Some(&index) = self.by_hash.get(&hash) {
            return index;
        }
        let index = self.groups.len();
        self.groups.push(entries);
        self.by_hash.insert(hash, index);
        index
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn into_records(self) -> impl Iterator<Item = Record> {
        self.groups.into_iter().map(Record::value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(pairs: &[(&str, i32)]) -> IndexMap<String, Leaf> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Leaf::from(*v)))
            .collect()
    }

    #[test]
    fn test_intern_dedups_by_content() {
        let mut table = ValueTable::new(IndexMap::new());
        let a = table.intern(group(&[("x", 1), ("y", 2)]));
        let b = table.intern(group(&[("y", 2), ("x", 1)]));
        let c = table.intern(group(&[("x", 1)]));
        assert_eq!(a, 0);
        assert_eq!(a, b);
        assert_eq!(c, 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_root_primitives_never_shared() {
        let mut table = ValueTable::new(group(&[("x", 1)]));
        let index = table.intern(group(&[("x", 1)]));
        assert_eq!(index, 1);
        assert_eq!(table.len(), 2);
    }
}
