//! Byte-container abstraction.
//!
//! The volume sees a fixed-size, randomly addressable byte array and does
//! not care how it is persisted. `MemContainer` backs unit tests and
//! throwaway volumes, `FileContainer` backs a regular host file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{FsError, FsResult};

pub trait Container {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> FsResult<()>;

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> FsResult<()>;

    /// Flush pending writes to the backing medium. No-op by default.
    fn sync(&mut self) -> FsResult<()> {
        Ok(())
    }
}

fn check_span(offset: u64, len: usize, total: u64) -> FsResult<()> {
    let end = offset
        .checked_add(len as u64)
        .ok_or(FsError::Corrupted("container offset overflow"))?;
    if end > total {
        return Err(FsError::Corrupted("container access out of bounds"));
    }
    Ok(())
}

// ─── In-memory container ───────────────────────────────────────────────────────

pub struct MemContainer {
    data: Vec<u8>,
}

impl MemContainer {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Container for MemContainer {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> FsResult<()> {
        check_span(offset, buf.len(), self.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> FsResult<()> {
        check_span(offset, buf.len(), self.len())?;
        let start = offset as usize;
        self.data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

// ─── Host-file container ───────────────────────────────────────────────────────

pub struct FileContainer {
    file: File,
    len: u64,
}

impl FileContainer {
    /// Create a fresh, zero-filled container file of exactly `size` bytes.
    /// Fails with `AlreadyExists` if the path is already taken.
    pub fn create(path: impl AsRef<Path>, size: u64) -> FsResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len(size)?;
        Ok(Self { file, len: size })
    }

    /// Open an existing container file read-write.
    pub fn open(path: impl AsRef<Path>) -> FsResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl Container for FileContainer {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> FsResult<()> {
        check_span(offset, buf.len(), self.len)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> FsResult<()> {
        check_span(offset, buf.len(), self.len)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn sync(&mut self) -> FsResult<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
