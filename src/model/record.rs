//! Flat record types produced by the encoder

use super::Leaf;
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key that carries the positional identifier in the untagged wire shape
pub const ID_KEY: &str = "id";

/// One entry of the flat record sequence
///
/// Records carry an explicit `kind` discriminant, so a value record holding a
/// single numeric leaf can never be mistaken for a pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    /// A deduplicated leaf group, or the root-level leaves
    Value { entries: IndexMap<String, Leaf> },

    /// Links a container name to the records that rebuild it
    Pointer {
        /// Container name
        name: String,
        /// Index of a record holding the container's content; `None` for
        /// "no content of its own" (an empty container in the first-child
        /// layout)
        target: Option<usize>,
        /// Indices of the pointer records of every sub-container, in order.
        /// Absent in the first-child layout.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Option<Vec<usize>>,
    },
}

impl Record {
    /// Create a value record
    pub fn value(entries: IndexMap<String, Leaf>) -> Self {
        Record::Value { entries }
    }

    /// Create a first-child layout pointer
    pub fn pointer(name: impl Into<String>, target: Option<usize>) -> Self {
        Record::Pointer {
            name: name.into(),
            target,
            children: None,
        }
    }

    /// Create a child-list layout pointer
    pub fn branch(name: impl Into<String>, target: Option<usize>, children: Vec<usize>) -> Self {
        Record::Pointer {
            name: name.into(),
            target,
            children: Some(children),
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Record::Pointer { .. })
    }

    /// Parse the untagged wire shape.
    ///
    /// An `id` key is stripped first. A record with exactly one entry whose
    /// value is a number or null is a pointer; a record of scalars is a value
    /// record. A value record with a single numeric or null leaf therefore
    /// reads back as a pointer; the tagged form does not have this problem.
    pub fn from_untagged(index: usize, mut map: Map<String, Value>) -> Result<Self> {
        map.remove(ID_KEY);

        if map.is_empty() {
            return Err(Error::malformed(index, "record has no entries"));
        }

        if map.len() == 1 {
            let pointer = match map.iter().next() {
                Some((name, Value::Null)) => Some(Record::pointer(name.clone(), None)),
                Some((name, Value::Number(n))) => {
                    let target = n.as_u64().ok_or_else(|| {
                        Error::malformed(
                            index,
                            format!("pointer target {} is not a non-negative integer", n),
                        )
                    })?;
                    Some(Record::pointer(name.clone(), Some(target as usize)))
                }
                _ => None,
            };
            if let Some(pointer) = pointer {
                return Ok(pointer);
            }
        }

        let mut entries = IndexMap::with_capacity(map.len());
        for (name, value) in map {
            let leaf = Leaf::from_json(value).ok_or_else(|| {
                Error::malformed(index, format!("entry '{}' is not a scalar", name))
            })?;
            entries.insert(name, leaf);
        }
        Ok(Record::value(entries))
    }

    /// Render the untagged wire shape, or `None` if this pointer carries a
    /// child list, which that shape cannot express
    pub fn to_untagged(&self) -> Option<Map<String, Value>> {
        match self {
            Record::Value { entries } => Some(
                entries
                    .iter()
                    .map(|(name, leaf)| (name.clone(), leaf.to_json()))
                    .collect(),
            ),
            Record::Pointer {
                name,
                target,
                children,
            } => {
                if children.as_ref().is_some_and(|c| !c.is_empty()) {
                    return None;
                }
                let mut map = Map::new();
                map.insert(name.clone(), target.map_or(Value::Null, Value::from));
                Some(map)
            }
        }
    }
}

/// A record as persisted, with its positional identifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: u64,
    pub record: Record,
}

impl StoredRecord {
    pub fn new(id: u64, record: Record) -> Self {
        StoredRecord { id, record }
    }

    /// Strip store metadata
    pub fn into_record(self) -> Record {
        self.record
    }
}
