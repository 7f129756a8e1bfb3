//! Versioned, owned tree snapshot

use super::Container;
use serde::{Deserialize, Serialize};

/// The whole tree at one version
///
/// Every mutation produces a new version; the codec only ever sees a full
/// snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub tree: Container,
}

impl Snapshot {
    pub fn new(tree: Container) -> Self {
        Snapshot { version: 0, tree }
    }

    /// Apply a mutation to a copy, producing the next version
    pub fn next<T>(&self, mutate: impl FnOnce(&mut Container) -> T) -> (Snapshot, T) {
        let mut tree = self.tree.clone();
        let out = mutate(&mut tree);
        (
            Snapshot {
                version: self.version + 1,
                tree,
            },
            out,
        )
    }
}
