//! Frame - the on-disk unit of a stored record

use crate::model::{Hash, Record, StoredRecord};
use crate::{Error, Result};
use std::io::{Read, Write};

/// id (8) + payload size (4) + checksum (32)
pub(crate) const FRAME_HEADER_SIZE: usize = 44;

/// zstd level used for record payloads
const COMPRESSION_LEVEL: i32 = 3;

/// A stored record in its compressed, checksummed form
#[derive(Clone, Debug)]
pub(crate) struct Frame {
    pub id: u64,
    /// zstd-compressed JSON of the record
    pub payload: Vec<u8>,
}

impl Frame {
    /// Compress a record for storage
    pub fn encode(id: u64, record: &Record) -> Result<Self> {
        let json = serde_json::to_vec(record)?;
        let payload = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)?;
        Ok(Frame { id, payload })
    }

    /// Decompress back to a record
    pub fn decode(&self) -> Result<StoredRecord> {
        let json = zstd::decode_all(self.payload.as_slice())?;
        let record = serde_json::from_slice(&json)?;
        Ok(StoredRecord::new(self.id, record))
    }

    pub fn checksum(&self) -> Hash {
        Hash::digest_many(&[&self.id.to_le_bytes(), &self.payload])
    }

    /// Total bytes on disk
    pub fn len(&self) -> u64 {
        (FRAME_HEADER_SIZE + self.payload.len()) as u64
    }

    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        let size = u32::try_from(self.payload.len())
            .map_err(|_| Error::Corruption(format!("record {} too large", self.id)))?;
        w.write_all(&self.id.to_le_bytes())?;
        w.write_all(&size.to_le_bytes())?;
        w.write_all(self.checksum().as_bytes())?;
        w.write_all(&self.payload)?;
        Ok(())
    }

    /// Read one frame, verifying its checksum.
    ///
    /// `remaining` is the number of bytes left in the source; a frame that
    /// claims more is rejected before its payload is allocated.
    pub fn read_from(r: &mut impl Read, remaining: u64) -> Result<Self> {
        if remaining < FRAME_HEADER_SIZE as u64 {
            return Err(Error::Corruption(format!(
                "{} trailing bytes cannot hold a record",
                remaining
            )));
        }
        let mut header = [0u8; FRAME_HEADER_SIZE];
        r.read_exact(&mut header)?;

        let mut id = [0u8; 8];
        id.copy_from_slice(&header[0..8]);
        let mut size = [0u8; 4];
        size.copy_from_slice(&header[8..12]);
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&header[12..44]);

        let size = u64::from(u32::from_le_bytes(size));
        if size > remaining - FRAME_HEADER_SIZE as u64 {
            return Err(Error::Corruption(format!(
                "record {} claims {} payload bytes, only {} remain",
                u64::from_le_bytes(id),
                size,
                remaining - FRAME_HEADER_SIZE as u64
            )));
        }
        let mut payload = vec![0u8; size as usize];
        r.read_exact(&mut payload)?;

        let frame = Frame {
            id: u64::from_le_bytes(id),
            payload,
        };
        if frame.checksum() != Hash::from_bytes(checksum) {
            return Err(Error::Corruption(format!(
                "checksum mismatch in record {}",
                frame.id
            )));
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Leaf;
    use indexmap::IndexMap;
    use std::io::Cursor;

    fn sample() -> Record {
        let mut entries = IndexMap::new();
        entries.insert("readme.txt".to_string(), Leaf::from("hello"));
        Record::value(entries)
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::encode(7, &sample()).unwrap();
        let mut buf = Vec::new();
        frame.write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, frame.len());

        let len = buf.len() as u64;
        let read = Frame::read_from(&mut Cursor::new(buf), len).unwrap();
        let stored = read.decode().unwrap();
        assert_eq!(stored, StoredRecord::new(7, sample()));
    }

    #[test]
    fn test_frame_detects_corruption() {
        let frame = Frame::encode(1, &Record::pointer("Dir", None)).unwrap();
        let mut buf = Vec::new();
        frame.write_to(&mut buf).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xff;

        let len = buf.len() as u64;
        let err = Frame::read_from(&mut Cursor::new(buf), len).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }

    #[test]
    fn test_oversized_frame_rejected_before_read() {
        let frame = Frame::encode(2, &sample()).unwrap();
        let mut buf = Vec::new();
        frame.write_to(&mut buf).unwrap();
        buf[8..12].copy_from_slice(&u32::MAX.to_le_bytes());

        let len = buf.len() as u64;
        let err = Frame::read_from(&mut Cursor::new(buf), len).unwrap_err();
        assert!(matches!(err, Error::Corruption(ref msg) if msg.contains("4294967295")));
    }

    #[test]
    fn test_short_source_rejected() {
        let err = Frame::read_from(&mut Cursor::new(vec![0u8; 10]), 10).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }
}
