//! Record stores
//!
//! A record store is a plain key-value store that can only put, list and
//! clear whole records. The codec's pointers are positional, so every store
//! must list records in insertion order.

mod file_store;
mod frame;
mod memory;

pub use file_store::FileStore;
pub use memory::MemoryStore;

use crate::model::{Record, StoredRecord};
use crate::Result;

/// Whole-record persistence capability
pub trait RecordStore: Send + Sync {
    /// Remove every record
    fn clear(&self) -> Result<()>;

    /// Append a record, returning its identifier.
    ///
    /// With `id: None` the store assigns the next unused identifier; an
    /// explicit identifier that is already taken is rejected.
    fn add_record(&self, record: Record, id: Option<u64>) -> Result<u64>;

    /// Every record, in insertion order
    fn all_records(&self) -> Result<Vec<StoredRecord>>;

    /// Number of stored records
    fn len(&self) -> Result<usize> {
        Ok(self.all_records()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Clear, then add every record with its position as identifier.
    ///
    /// The default is not atomic; a reader can observe a partly written set.
    fn replace_all(&self, records: Vec<Record>) -> Result<()> {
        self.clear()?;
        for (position, record) in records.into_iter().enumerate() {
            self.add_record(record, Some(position as u64))?;
        }
        Ok(())
    }

    /// Flush anything buffered
    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Delete the underlying storage
    fn destroy(self) -> Result<()>
    where
        Self: Sized;
}
