//! Immutable byte view of an opened file
//!
//! The buffer owns its storage together with its length, so dropping the owning
//! `LineIndex` releases the mapping. Small files are read into memory; larger
//! ones are memory-mapped and paged in by the OS on demand.

use crate::error::{FewerError, Result};
use crate::file_handler::validation::validate_file_path;
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Internal byte source strategy for ByteBuffer
#[derive(Debug)]
enum ByteSource {
    /// Content loaded entirely into memory (small files, empty files, tests)
    InMemory(Vec<u8>),
    /// Content accessed via memory mapping
    MemoryMapped(Mmap),
}

impl ByteSource {
    /// Get the underlying bytes as a slice regardless of storage strategy
    fn as_bytes(&self) -> &[u8] {
        match self {
            ByteSource::InMemory(vec) => vec.as_slice(),
            ByteSource::MemoryMapped(mmap) => &mmap[..],
        }
    }
}

/// Read-only, randomly addressable view of a file's raw bytes
///
/// Shared freely across threads: nothing ever writes through it.
#[derive(Debug)]
pub struct ByteBuffer {
    source: ByteSource,
    path: PathBuf,
}

impl ByteBuffer {
    /// Open `path`, choosing the storage strategy by size
    ///
    /// # Arguments
    /// * `path` - File to open
    /// * `in_memory_threshold` - Files smaller than this are read into memory
    ///
    /// # Errors
    /// * `FileAccess` / `NotAFile` when the path cannot be used
    pub fn open(path: impl AsRef<Path>, in_memory_threshold: u64) -> Result<Self> {
        let path = path.as_ref();
        let file_size = validate_file_path(path)?;

        let mut file = File::open(path).map_err(|e| FewerError::file_access(path, e))?;

        let source = if file_size == 0 {
            ByteSource::InMemory(Vec::new())
        } else if file_size < in_memory_threshold {
            let mut content = Vec::with_capacity(file_size as usize);
            file.read_to_end(&mut content)
                .map_err(|e| FewerError::file_access(path, e))?;
            log::debug!("read {} ({} bytes) into memory", path.display(), content.len());
            ByteSource::InMemory(content)
        } else {
            // SAFETY: mapped read-only; the file must not be truncated while mapped.
            let mmap = unsafe { Mmap::map(&file).map_err(|e| FewerError::file_access(path, e))? };

            #[cfg(unix)]
            {
                if let Err(e) = mmap.advise(memmap2::Advice::Sequential) {
                    log::warn!("failed to set mmap advice: {}", e);
                }
            }

            log::debug!("mapped {} ({} bytes)", path.display(), mmap.len());
            ByteSource::MemoryMapped(mmap)
        };

        Ok(Self {
            source,
            path: path.to_path_buf(),
        })
    }

    /// Wrap bytes that are already in memory
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: ByteSource::InMemory(bytes.into()),
            path: PathBuf::new(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    pub fn len(&self) -> u64 {
        self.as_bytes().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Path the buffer was opened from; empty for in-process buffers
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.source, ByteSource::MemoryMapped(_))
    }

    /// Bytes in `[start, end)`, clamped to the buffer
    pub fn slice(&self, start: u64, end: u64) -> &[u8] {
        let bytes = self.as_bytes();
        let end = (end as usize).min(bytes.len());
        let start = (start as usize).min(end);
        &bytes[start..end]
    }
}
