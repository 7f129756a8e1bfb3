//! BLAKE3 digest used as the canonical identity of a leaf group

use super::Leaf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A 32-byte BLAKE3 hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Create a hash from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Hash multiple pieces of data
    pub fn digest_many(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        Hash(*hasher.finalize().as_bytes())
    }

    /// Canonical digest of a leaf group.
    ///
    /// Keys are sorted before serialization, so two groups with the same
    /// entries in a different insertion order hash identically.
    pub fn of_group(entries: &IndexMap<String, Leaf>) -> Self {
        let sorted: BTreeMap<&str, &Leaf> = entries.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let mut hasher = blake3::Hasher::new();
        for (name, leaf) in sorted {
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            leaf.hash_into(&mut hasher);
        }
        Hash(*hasher.finalize().as_bytes())
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get a short prefix for display (first 7 chars, like git)
    pub fn short(&self) -> String {
        self.to_hex()[..7].to_string()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
