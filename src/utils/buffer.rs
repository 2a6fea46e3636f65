use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, IoContext, Result};

/// Read-only view over the content of an index file
pub trait Buffer: Send + Sync {
    fn data(&self) -> &[u8];

    /// Returns the bytes in `start..end`, checking the bounds
    fn slice(&self, start: u64, end: u64) -> Result<&[u8]> {
        let data = self.data();
        if start > end || end > data.len() as u64 {
            return Err(Error::Corrupted(format!(
                "range {}..{} is outside of the file ({} bytes)",
                start,
                end,
                data.len()
            )));
        }
        Ok(&data[start as usize..end as usize])
    }

    fn len(&self) -> usize {
        self.data().len()
    }
}

/// Stores the data in memory
pub struct MemoryBuffer {
    data: Vec<u8>,
}

impl MemoryBuffer {
    pub fn new(path: &Path) -> Result<Self> {
        let mut file = File::options()
            .read(true)
            .open(path)
            .context(|| format!("opening {}", path.display()))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .context(|| format!("reading {}", path.display()))?;

        Ok(Self { data })
    }
}

impl From<Vec<u8>> for MemoryBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl Buffer for MemoryBuffer {
    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Uses a memory map
pub struct MmapBuffer {
    mmap: Mmap,
}

impl MmapBuffer {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::options()
            .read(true)
            .open(path)
            .context(|| format!("opening {}", path.display()))?;
        // The index files are never modified once built
        let mmap = unsafe { MmapOptions::new().map(&file) }
            .context(|| format!("memory mapping {}", path.display()))?;
        Ok(Self { mmap })
    }
}

impl Buffer for MmapBuffer {
    fn data(&self) -> &[u8] {
        &self.mmap
    }
}

/// Opens a file either in memory or as a memory map
///
/// Empty files cannot be mapped and are always read in memory.
pub fn open_buffer(path: &Path, in_memory: bool) -> Result<Box<dyn Buffer>> {
    let size = std::fs::metadata(path)
        .context(|| format!("reading metadata of {}", path.display()))?
        .len();
    if in_memory || size == 0 {
        Ok(Box::new(MemoryBuffer::new(path)?))
    } else {
        Ok(Box::new(MmapBuffer::new(path)?))
    }
}
