//! Single-file record store
//!
//! File format:
//! ```text
//! [HEADER: 64 bytes]
//!   - magic: 8 bytes ("FLATFS01")
//!   - version: 4 bytes (u32 LE)
//!   - flags: 4 bytes
//!   - record_count: 8 bytes (u64 LE)
//!   - next_id: 8 bytes (u64 LE)
//!   - reserved: 32 bytes
//!
//! [FRAMES: variable, insertion order]
//!   - id: 8 bytes (u64 LE)
//!   - size: 4 bytes (u32 LE)
//!   - checksum: 32 bytes (BLAKE3 of id + payload)
//!   - payload: zstd-compressed JSON record
//! ```

use super::frame::{Frame, FRAME_HEADER_SIZE};
use super::RecordStore;
use crate::model::{Record, StoredRecord};
use crate::{Error, Result, MAGIC, VERSION};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const HEADER_SIZE: u64 = 64;

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

fn write_header(file: &mut File, record_count: u64, next_id: u64) -> Result<()> {
    let mut header = [0u8; HEADER_SIZE as usize];
    header[0..8].copy_from_slice(MAGIC);
    header[8..12].copy_from_slice(&VERSION.to_le_bytes());
    // flags: 0
    header[16..24].copy_from_slice(&record_count.to_le_bytes());
    header[24..32].copy_from_slice(&next_id.to_le_bytes());
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&header)?;
    Ok(())
}

/// Returns (record_count, next_id)
fn read_header(file: &mut File) -> Result<(u64, u64)> {
    let mut header = [0u8; HEADER_SIZE as usize];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut header)
        .map_err(|_| Error::InvalidFile("Truncated header".into()))?;

    if &header[0..8] != MAGIC {
        return Err(Error::InvalidFile("Invalid magic bytes".into()));
    }

    let version = le_u32(&header[8..12]);
    if version != VERSION {
        return Err(Error::VersionMismatch {
            expected: VERSION,
            found: version,
        });
    }

    Ok((le_u64(&header[16..24]), le_u64(&header[24..32])))
}

/// Read `count` frames starting right after the header
fn read_frames(file: &mut File, count: u64) -> Result<Vec<Frame>> {
    let mut remaining = file.metadata()?.len().saturating_sub(HEADER_SIZE);
    if count > remaining / FRAME_HEADER_SIZE as u64 {
        return Err(Error::Corruption(format!(
            "header claims {} records, but only {} bytes follow it",
            count, remaining
        )));
    }

    file.seek(SeekFrom::Start(HEADER_SIZE))?;
    let mut reader = BufReader::new(file);
    let mut frames = Vec::with_capacity(count as usize);
    for position in 0..count {
        let frame = Frame::read_from(&mut reader, remaining).map_err(|e| match e {
            Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => Error::Corruption(
                format!("store truncated at record {} of {}", position, count),
            ),
            other => other,
        })?;
        remaining -= frame.len();
        frames.push(frame);
    }
    Ok(frames)
}

struct Inner {
    file: File,
    record_count: u64,
    next_id: u64,
    ids: HashSet<u64>,
    /// End of the last frame
    write_offset: u64,
}

/// A `RecordStore` backed by a single file
pub struct FileStore {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl FileStore {
    /// Open the store at `path`, creating it on first use
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            Self::load(path)
        } else {
            Self::create(path)
        }
    }

    fn unavailable(path: &Path, e: std::io::Error) -> Error {
        Error::StoreUnavailable(format!("{}: {}", path.display(), e))
    }

    fn create(path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Self::unavailable(&path, e))?;

        write_header(&mut file, 0, 0)?;
        file.sync_all()?;
        info!(path = %path.display(), "created record store");

        Ok(FileStore {
            path,
            inner: RwLock::new(Inner {
                file,
                record_count: 0,
                next_id: 0,
                ids: HashSet::new(),
                write_offset: HEADER_SIZE,
            }),
        })
    }

    fn load(path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Self::unavailable(&path, e))?;

        let (record_count, next_id) = read_header(&mut file)?;
        let frames = read_frames(&mut file, record_count)?;
        let write_offset = HEADER_SIZE + frames.iter().map(Frame::len).sum::<u64>();
        let ids = frames.iter().map(|f| f.id).collect();
        debug!(path = %path.display(), records = record_count, "opened record store");

        Ok(FileStore {
            path,
            inner: RwLock::new(Inner {
                file,
                record_count,
                next_id,
                ids,
                write_offset,
            }),
        })
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RecordStore for FileStore {
    fn clear(&self) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.file.set_len(HEADER_SIZE)?;
        write_header(&mut inner.file, 0, 0)?;
        inner.record_count = 0;
        inner.next_id = 0;
        inner.ids.clear();
        inner.write_offset = HEADER_SIZE;
        Ok(())
    }

    fn add_record(&self, record: Record, id: Option<u64>) -> Result<u64> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let id = match id {
            Some(id) if inner.ids.contains(&id) => {
                return Err(Error::AlreadyExists(format!("record id {}", id)));
            }
            Some(id) => id,
            None => inner.next_id,
        };
        let following = id.checked_add(1).ok_or_else(|| {
            Error::StoreUnavailable(format!("record id {} leaves no id to follow it", id))
        })?;

        let frame = Frame::encode(id, &record)?;
        inner.file.seek(SeekFrom::Start(inner.write_offset))?;
        {
            let mut writer = BufWriter::new(&mut inner.file);
            frame.write_to(&mut writer)?;
            writer.flush()?;
        }

        inner.write_offset += frame.len();
        inner.record_count += 1;
        inner.next_id = inner.next_id.max(following);
        inner.ids.insert(id);
        write_header(&mut inner.file, inner.record_count, inner.next_id)?;
        Ok(id)
    }

    fn all_records(&self) -> Result<Vec<StoredRecord>> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        read_frames(&mut inner.file, inner.record_count)?
            .iter()
            .map(Frame::decode)
            .collect()
    }

    fn len(&self) -> Result<usize> {
        Ok(self.inner.read().record_count as usize)
    }

    /// Atomic: the new set is written to a sibling file and renamed into place
    fn replace_all(&self, records: Vec<Record>) -> Result<()> {
        let mut guard = self.inner.write();
        let temp = self.temp_path();
        let count = records.len() as u64;

        let mut write_offset = HEADER_SIZE;
        let mut ids = HashSet::with_capacity(records.len());
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp)
                .map_err(|e| Self::unavailable(&temp, e))?;
            write_header(&mut file, count, count)?;
            let mut writer = BufWriter::new(&mut file);
            for (position, record) in records.iter().enumerate() {
                let frame = Frame::encode(position as u64, record)?;
                frame.write_to(&mut writer)?;
                write_offset += frame.len();
                ids.insert(position as u64);
            }
            writer.flush()?;
            drop(writer);
            file.sync_all()?;
        }
        std::fs::rename(&temp, &self.path)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| Self::unavailable(&self.path, e))?;
        *guard = Inner {
            file,
            record_count: count,
            next_id: count,
            ids,
            write_offset,
        };
        debug!(path = %self.path.display(), records = count, "replaced record set");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.inner.read().file.sync_all()?;
        Ok(())
    }

    fn destroy(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        std::fs::remove_file(&path)?;
        info!(path = %path.display(), "destroyed record store");
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.inner.read().file.sync_all();
    }
}
