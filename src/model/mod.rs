//! Core data model types for flatfs

mod hash;
mod node;
mod path;
mod record;
mod snapshot;

pub use hash::Hash;
pub use node::{Container, Leaf, Node};
pub use path::TreePath;
pub use record::{Record, StoredRecord, ID_KEY};
pub use snapshot::Snapshot;
