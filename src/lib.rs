//! # flatfs
//!
//! Snapshot persistence for a simulated filesystem tree.
//!
//! flatfs flattens a nested, mutable key-value tree into an ordered array of
//! records that a plain key-value store can hold with nothing more than
//! whole-record put/get/clear. Identical groups of leaf values are stored once,
//! and the array decodes back into the original tree.
//!
//! ## Core Concepts
//!
//! - **Containers**: directories, insertion-ordered maps of name to node
//! - **Leaves**: file contents and scalar settings
//! - **Value records**: deduplicated groups of leaves
//! - **Pointer records**: name to index links that rebuild the nesting
//!
//! ## Example
//!
//! ```ignore
//! use flatfs::{codec, Layout, Vault, MemoryStore};
//!
//! let vault = Vault::open(MemoryStore::new(), Layout::ChildList, flatfs::default_tree())?;
//! vault.write_file("/Documents/todo.txt", "buy milk".into())?;
//! let records = codec::encode(&vault.tree(), Layout::ChildList);
//! assert_eq!(codec::decode(&records)?, vault.tree());
//! ```

pub mod codec;
pub mod model;
pub mod seal;
pub mod store;

mod config;
mod error;
mod vault;

pub use codec::{decode, decode_stored, decode_untagged, encode, Layout};
pub use config::{Config, CONFIG_ENV};
pub use error::{Error, Result};
pub use model::{Container, Hash, Leaf, Node, Record, Snapshot, StoredRecord, TreePath};
pub use seal::{AesGcmSealer, Sealer};
pub use store::{FileStore, MemoryStore, RecordStore};
pub use vault::{default_tree, Vault};

/// Store file format version
pub const VERSION: u32 = 1;

/// Magic bytes for store file identification
pub const MAGIC: &[u8; 8] = b"FLATFS01";
