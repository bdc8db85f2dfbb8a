//! Disk spill I/O: an opaque sequential concatenation of block records,
//! addressed by a file offset recorded on the in-memory block.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use crate::error::Result;

/// Paged spill I/O. Implemented here by a real file and, for tests, an
/// in-memory buffer; both are safe to share across threads via an internal
/// mutex since the caller (`BackdropShared`) serializes offset allocation
/// and the read/write itself under one mutex anyway.
pub trait SpillFile: Send + Sync {
    /// Reserve `len` bytes at the end of the file and return their offset.
    fn allocate(&self, len: u64) -> Result<u64>;
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()>;
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>>;
}

/// A real on-disk spill file.
pub struct FileSpill {
    file: Mutex<File>,
    next_offset: Mutex<u64>,
}

impl FileSpill {
    pub fn create(path: &std::path::Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self { file: Mutex::new(file), next_offset: Mutex::new(0) })
    }
}

impl SpillFile for FileSpill {
    fn allocate(&self, len: u64) -> Result<u64> {
        let mut next = self.next_offset.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let offset = *next;
        *next += len;
        Ok(offset)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut f = self.file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)?;
        Ok(())
    }

    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut f = self.file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        f.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// An in-memory spill, used by tests and by the demo binary when a real
/// disk backing isn't needed.
#[derive(Default)]
pub struct MemSpill {
    data: Mutex<Vec<u8>>,
}

impl SpillFile for MemSpill {
    fn allocate(&self, len: u64) -> Result<u64> {
        let mut buf = self.data.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let offset = buf.len() as u64;
        buf.resize(buf.len() + len as usize, 0);
        Ok(offset)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut buf = self.data.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let start = offset as usize;
        buf[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let buf = self.data.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let start = offset as usize;
        Ok(buf[start..start + len].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mem_spill_round_trips_bytes() {
        let spill = MemSpill::default();
        let payload = b"block record payload".to_vec();
        let offset = spill.allocate(payload.len() as u64).unwrap();
        spill.write_at(offset, &payload).unwrap();
        let back = spill.read_at(offset, payload.len()).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn successive_allocations_do_not_overlap() {
        let spill = MemSpill::default();
        let a = spill.allocate(16).unwrap();
        let b = spill.allocate(32).unwrap();
        assert_eq!(b, a + 16);
    }
}
