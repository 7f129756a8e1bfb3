//! High-level Vault API
//!
//! Owns the live tree and keeps a record store in sync with it. Every
//! mutation produces a new snapshot version, which is fully re-encoded and
//! written to the store before it becomes visible.

use crate::codec::{decode_stored, encode, Layout};
use crate::model::{Container, Leaf, Node, Record, Snapshot, TreePath};
use crate::store::RecordStore;
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Built-in tree seeded into an empty store
pub fn default_tree() -> Container {
    Container::new()
        .with("theme", Leaf::from("light"))
        .with("wallpaper", Leaf::from("default.png"))
        .with("Desktop", Container::new())
        .with(
            "Documents",
            Container::new().with("readme.txt", Leaf::from("Welcome to your files.")),
        )
        .with("Pictures", Container::new())
        .with("Music", Container::new())
}

/// A persisted tree
///
/// Persists are serialized: at most one encode + store write is in flight,
/// so readers of the store never see two writers interleave.
pub struct Vault<S: RecordStore> {
    store: S,
    layout: Layout,
    snapshot: RwLock<Snapshot>,
    persist_lock: Mutex<()>,
}

impl<S: RecordStore> Vault<S> {
    /// Load the tree from `store`, seeding it with `default` when empty
    pub fn open(store: S, layout: Layout, default: Container) -> Result<Self> {
        let records = store.all_records()?;
        let tree = if records.is_empty() {
            info!(layout = %layout, "store is empty, seeding default tree");
            store.replace_all(encode(&default, layout))?;
            default
        } else {
            let count = records.len();
            let tree = decode_stored(records)?;
            debug!(records = count, "loaded tree from store");
            tree
        };
        Ok(Self::with_tree(store, layout, tree))
    }

    /// Like [`open`](Self::open), but replaces undecodable contents with
    /// `default` instead of failing. Store errors still propagate.
    pub fn open_or_reset(store: S, layout: Layout, default: Container) -> Result<Self> {
        let records = store.all_records()?;
        if records.is_empty() {
            return Self::open(store, layout, default);
        }
        match decode_stored(records) {
            Ok(tree) => Ok(Self::with_tree(store, layout, tree)),
            Err(
                e @ (Error::MalformedRecord { .. }
                | Error::DanglingPointer { .. }
                | Error::CyclicPointer(_)),
            ) => {
                warn!(error = %e, "stored records are unusable, resetting to default tree");
                store.replace_all(encode(&default, layout))?;
                Ok(Self::with_tree(store, layout, default))
            }
            Err(e) => Err(e),
        }
    }

    fn with_tree(store: S, layout: Layout, tree: Container) -> Self {
        Vault {
            store,
            layout,
            snapshot: RwLock::new(Snapshot::new(tree)),
            persist_lock: Mutex::new(()),
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().clone()
    }

    /// Copy of the current tree
    pub fn tree(&self) -> Container {
        self.snapshot.read().tree.clone()
    }

    pub fn version(&self) -> u64 {
        self.snapshot.read().version
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Records the current tree encodes to
    pub fn records(&self) -> Vec<Record> {
        encode(&self.snapshot.read().tree, self.layout)
    }

    // === Reads ===

    /// Node at `path`; the root path yields the whole tree
    pub fn get(&self, path: &str) -> Result<Node> {
        let path = TreePath::parse(path)?;
        let snapshot = self.snapshot.read();
        if path.is_root() {
            return Ok(Node::Container(snapshot.tree.clone()));
        }
        snapshot
            .tree
            .get_path(&path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    /// Entries of the directory at `path` as (name, is_directory)
    pub fn list(&self, path: &str) -> Result<Vec<(String, bool)>> {
        let path = TreePath::parse(path)?;
        let snapshot = self.snapshot.read();
        let dir = snapshot.tree.dir(&path)?;
        Ok(dir
            .iter()
            .map(|(name, node)| (name.clone(), node.is_container()))
            .collect())
    }

    // === Mutations ===

    /// Create or overwrite a file; refuses to replace a directory
    pub fn write_file(&self, path: &str, value: Leaf) -> Result<()> {
        let path = TreePath::parse(path)?;
        self.mutate(|tree| {
            if let Some(Node::Container(_)) = tree.get_path(&path) {
                return Err(Error::AlreadyExists(path.to_string()));
            }
            tree.insert_path(&path, Node::Leaf(value))?;
            Ok(())
        })
    }

    /// Create an empty directory; the parent must exist
    pub fn mkdir(&self, path: &str) -> Result<()> {
        let path = TreePath::parse(path)?;
        self.mutate(|tree| {
            if tree.get_path(&path).is_some() {
                return Err(Error::AlreadyExists(path.to_string()));
            }
            tree.insert_path(&path, Node::Container(Container::new()))?;
            Ok(())
        })
    }

    /// Remove a file or a whole directory
    pub fn remove(&self, path: &str) -> Result<Node> {
        let path = TreePath::parse(path)?;
        self.mutate(|tree| tree.remove_path(&path))
    }

    /// Replace the entire tree
    pub fn replace_tree(&self, tree: Container) -> Result<()> {
        self.mutate(|current| {
            *current = tree;
            Ok(())
        })
    }

    /// Re-encode and write the current snapshot
    pub fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock();
        let records = self.records();
        self.store.replace_all(records)
    }

    /// Apply `f` to a copy of the tree, persist the result, then publish it.
    ///
    /// If `f` or the store write fails, the current snapshot is unchanged.
    fn mutate<T>(&self, f: impl FnOnce(&mut Container) -> Result<T>) -> Result<T> {
        let _guard = self.persist_lock.lock();
        let (next, out) = self.snapshot.read().next(f);
        let out = out?;

        self.store.replace_all(encode(&next.tree, self.layout))?;
        debug!(version = next.version, "persisted snapshot");
        *self.snapshot.write() = next;
        Ok(out)
    }
}
