//! Byte sources backing an item: a memory mapped file or an in-memory copy.
//!
//! `load()` and `unload()` are idempotent. The bytes are handed out as a
//! cloneable [`Bytes`] handle so a decode in progress keeps its mapping alive
//! even if the source is unloaded underneath it.

use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

#[derive(Clone)]
pub enum Bytes {
    Mapped(Arc<Mmap>),
    Owned(Arc<[u8]>),
}

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Bytes::Mapped(map) => map,
            Bytes::Owned(data) => data,
        }
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bytes").field("len", &self.len()).finish()
    }
}

pub trait ByteSource: Send + Sync + fmt::Debug {
    fn load(&self) -> Result<()>;

    fn unload(&self);

    /// The loaded bytes, or `None` between `unload()` and the next `load()`.
    fn data(&self) -> Option<Bytes>;

    /// Path of the backing file, if any.
    fn filename(&self) -> Option<&Path> {
        None
    }

    fn size(&self) -> usize {
        self.data().map_or(0, |data| data.len())
    }
}

#[derive(Debug)]
pub struct FileBuffer {
    path: PathBuf,
    mapping: Mutex<Option<Bytes>>,
}

impl FileBuffer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mapping: Mutex::new(None),
        }
    }

    fn map(&self) -> Result<Bytes> {
        let file = File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let len = file.metadata().map_err(|e| Error::io(&self.path, e))?.len();

        // Zero length mappings are rejected by the kernel
        if len == 0 {
            return Ok(Bytes::Owned(Arc::from(Vec::new())));
        }

        // SAFETY: the mapping is read-only; a file truncated underneath us is
        // the same hazard every mmap based viewer accepts.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(&self.path, e))?;
        Ok(Bytes::Mapped(Arc::new(map)))
    }
}

impl ByteSource for FileBuffer {
    fn load(&self) -> Result<()> {
        let mut mapping = self.mapping.lock().unwrap();
        if mapping.is_none() {
            *mapping = Some(self.map()?);
        }
        Ok(())
    }

    fn unload(&self) {
        self.mapping.lock().unwrap().take();
    }

    fn data(&self) -> Option<Bytes> {
        self.mapping.lock().unwrap().clone()
    }

    fn filename(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Bytes that already live in memory, such as an embedded thumbnail.
#[derive(Debug)]
pub struct MemoryBuffer {
    data: Arc<[u8]>,
    loaded: Mutex<bool>,
}

impl MemoryBuffer {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            loaded: Mutex::new(false),
        }
    }
}

impl ByteSource for MemoryBuffer {
    fn load(&self) -> Result<()> {
        *self.loaded.lock().unwrap() = true;
        Ok(())
    }

    fn unload(&self) {
        *self.loaded.lock().unwrap() = false;
    }

    fn data(&self) -> Option<Bytes> {
        if *self.loaded.lock().unwrap() {
            Some(Bytes::Owned(Arc::clone(&self.data)))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_buffer_maps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"hello").unwrap();

        let buffer = FileBuffer::new(&path);
        assert!(buffer.data().is_none());
        buffer.load().unwrap();
        buffer.load().unwrap();
        assert_eq!(&*buffer.data().unwrap(), b"hello");
        assert_eq!(buffer.size(), 5);
        assert_eq!(buffer.filename(), Some(path.as_path()));

        buffer.unload();
        buffer.unload();
        assert!(buffer.data().is_none());
        assert_eq!(buffer.size(), 0);
    }

    #[test]
    fn empty_file_loads_as_empty_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        let buffer = FileBuffer::new(&path);
        buffer.load().unwrap();
        assert!(buffer.data().unwrap().is_empty());
    }

    #[test]
    fn missing_file_reports_path() {
        let buffer = FileBuffer::new("/nonexistent/fiv-test");
        let err = buffer.load().unwrap_err();
        assert!(err.to_string().starts_with("/nonexistent/fiv-test: "));
    }

    #[test]
    fn bytes_outlive_unload() {
        let buffer = MemoryBuffer::new(vec![1u8, 2, 3]);
        buffer.load().unwrap();
        let held = buffer.data().unwrap();
        buffer.unload();
        assert!(buffer.data().is_none());
        assert_eq!(&*held, &[1, 2, 3]);
        assert!(buffer.filename().is_none());
    }
}
