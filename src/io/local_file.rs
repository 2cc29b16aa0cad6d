use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use super::{RangeReader, RangeWriter};
use crate::error::IoError;

/// Local-filesystem implementation of RangeReader and RangeWriter.
///
/// A single `tokio::fs::File` handle is shared behind a mutex; every
/// positioned access seeks first, so concurrent callers never interleave a
/// seek with another caller's read or write. The size is captured on open
/// and kept current as writes extend the file.
pub struct LocalFile {
    file: Mutex<File>,
    path: PathBuf,
    size: AtomicU64,
    identifier: String,
}

impl LocalFile {
    /// Open a file for reading.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let file = File::open(path)
            .await
            .map_err(|e| IoError::from_std(path.display(), e))?;
        Self::from_file(file, path).await
    }

    /// Open an existing file for reading and writing.
    ///
    /// The file is never truncated or created.
    pub async fn open_writable(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .await
            .map_err(|e| IoError::from_std(path.display(), e))?;
        Self::from_file(file, path).await
    }

    async fn from_file(file: File, path: &Path) -> Result<Self, IoError> {
        let metadata = file
            .metadata()
            .await
            .map_err(|e| IoError::from_std(path.display(), e))?;

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            size: AtomicU64::new(metadata.len()),
            identifier: format!("file://{}", path.display()),
        })
    }

    /// Truncate or extend the file to `len` bytes.
    pub async fn set_len(&self, len: u64) -> Result<(), IoError> {
        let file = self.file.lock().await;
        file.set_len(len).await.map_err(|e| self.io_err(e))?;
        self.size.store(len, Ordering::SeqCst);
        Ok(())
    }

    /// Path this file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, err: std::io::Error) -> IoError {
        IoError::from_std(self.path.display(), err)
    }
}

#[async_trait]
impl RangeReader for LocalFile {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let size = self.size();
        if offset.checked_add(len as u64).map_or(true, |end| end > size) {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size,
            });
        }

        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0u8; len];
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| self.io_err(e))?;
        file.read_exact(&mut buf)
            .await
            .map_err(|e| self.io_err(e))?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

#[async_trait]
impl RangeWriter for LocalFile {
    async fn write_all_at(&self, offset: u64, data: &[u8]) -> Result<(), IoError> {
        let size = self.size();
        if offset > size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: data.len() as u64,
                size,
            });
        }

        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| self.io_err(e))?;
        file.write_all(data).await.map_err(|e| self.io_err(e))?;

        self.size
            .fetch_max(offset + data.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    async fn sync(&self) -> Result<(), IoError> {
        let mut file = self.file.lock().await;
        file.flush().await.map_err(|e| self.io_err(e))?;
        file.sync_data().await.map_err(|e| self.io_err(e))
    }
}

/// In-memory RangeReader, used for already-buffered headers and in tests.
#[derive(Debug, Clone)]
pub struct MemoryReader {
    data: Bytes,
    identifier: String,
}

impl MemoryReader {
    pub fn new(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }
}

#[async_trait]
impl RangeReader for MemoryReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let size = self.data.len() as u64;
        if offset.checked_add(len as u64).map_or(true, |end| end > size) {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size,
            });
        }
        Ok(self.data.slice(offset as usize..offset as usize + len))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
