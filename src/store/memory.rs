//! In-memory record store

use super::RecordStore;
use crate::model::{Record, StoredRecord};
use crate::{Error, Result};
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct Inner {
    records: Vec<StoredRecord>,
    next_id: u64,
}

impl Inner {
    fn push(&mut self, record: Record, id: Option<u64>) -> Result<u64> {
        let id = match id {
            Some(id) if self.records.iter().any(|r| r.id == id) => {
                return Err(Error::AlreadyExists(format!("record id {}", id)));
            }
            Some(id) => id,
            None => self.next_id,
        };
        let following = id.checked_add(1).ok_or_else(|| {
            Error::StoreUnavailable(format!("record id {} leaves no id to follow it", id))
        })?;
        self.next_id = self.next_id.max(following);
        self.records.push(StoredRecord::new(id, record));
        Ok(id)
    }
}

/// A `RecordStore` held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.records.clear();
        inner.next_id = 0;
        Ok(())
    }

    fn add_record(&self, record: Record, id: Option<u64>) -> Result<u64> {
        self.inner.write().push(record, id)
    }

    fn all_records(&self) -> Result<Vec<StoredRecord>> {
        Ok(self.inner.read().records.clone())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.inner.read().records.len())
    }

    /// Atomic: readers see either the old set or the new one
    fn replace_all(&self, records: Vec<Record>) -> Result<()> {
        let mut fresh = Inner::default();
        for (position, record) in records.into_iter().enumerate() {
            fresh.push(record, Some(position as u64))?;
        }
        *self.inner.write() = fresh;
        Ok(())
    }

    fn destroy(self) -> Result<()> {
        Ok(())
    }
}
