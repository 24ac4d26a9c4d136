//! # Linear Memory
//!
//! A single contiguous byte region shared between the host and the parser
//! module, addressed by raw `u32` offsets. It grows in whole pages and never
//! shrinks; growth past `max_pages` traps.
//!
//! Every accessor is bounds-checked against the current size, so a module
//! that computes a bad pointer traps instead of touching host memory.

use std::ops::Range;

use crate::error::Trap;

/// Size of one memory page in bytes (64 KiB).
pub const PAGE_SIZE: u32 = 64 * 1024;

/// Largest page count whose byte size still fits in a `u32` offset.
pub const PAGE_LIMIT: u32 = u32::MAX / PAGE_SIZE;

#[derive(Debug)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    max_pages: u32,
}

impl LinearMemory {
    /// Allocates `initial_pages` zeroed pages with a growth ceiling of `max_pages`.
    pub fn new(initial_pages: u32, max_pages: u32) -> Result<Self, Trap> {
        let max_pages = max_pages.min(PAGE_LIMIT);
        if initial_pages > max_pages {
            return Err(Trap::MemoryLimit {
                requested_pages: initial_pages,
                max_pages,
            });
        }
        Ok(Self {
            bytes: vec![0; (initial_pages * PAGE_SIZE) as usize],
            max_pages,
        })
    }

    pub fn pages(&self) -> u32 {
        (self.bytes.len() / PAGE_SIZE as usize) as u32
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Current size in bytes.
    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Grows by `delta` pages, returning the previous page count.
    pub fn grow(&mut self, delta: u32) -> Result<u32, Trap> {
        let previous = self.pages();
        let requested = previous.saturating_add(delta);
        if requested > self.max_pages {
            return Err(Trap::MemoryLimit {
                requested_pages: requested,
                max_pages: self.max_pages,
            });
        }
        self.bytes.resize((requested * PAGE_SIZE) as usize, 0);
        if delta > 0 {
            log::debug!("linear memory grown from {previous} to {requested} pages");
        }
        Ok(previous)
    }

    /// Grows (if needed) so that offsets `0..len` are addressable.
    pub fn ensure(&mut self, len: u64) -> Result<(), Trap> {
        let size = u64::from(self.size());
        if len <= size {
            return Ok(());
        }
        let page = u64::from(PAGE_SIZE);
        let needed_pages = len.div_ceil(page);
        if needed_pages > u64::from(self.max_pages) {
            return Err(Trap::MemoryLimit {
                requested_pages: u32::try_from(needed_pages).unwrap_or(u32::MAX),
                max_pages: self.max_pages,
            });
        }
        self.grow(needed_pages as u32 - self.pages()).map(|_| ())
    }

    fn range(&self, ptr: u32, len: u32) -> Result<Range<usize>, Trap> {
        let start = ptr as usize;
        match start.checked_add(len as usize) {
            Some(end) if end <= self.bytes.len() => Ok(start..end),
            _ => Err(Trap::OutOfBounds {
                ptr,
                len,
                memory_size: self.size(),
            }),
        }
    }

    pub fn read(&self, ptr: u32, len: u32) -> Result<&[u8], Trap> {
        let range = self.range(ptr, len)?;
        Ok(&self.bytes[range])
    }

    pub fn write(&mut self, ptr: u32, data: &[u8]) -> Result<(), Trap> {
        let len = u32::try_from(data.len()).map_err(|_| Trap::OutOfBounds {
            ptr,
            len: u32::MAX,
            memory_size: self.size(),
        })?;
        let range = self.range(ptr, len)?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Little-endian 4-byte read.
    pub fn read_u32(&self, ptr: u32) -> Result<u32, Trap> {
        let raw = self.read(ptr, 4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Little-endian 4-byte write.
    pub fn write_u32(&mut self, ptr: u32, value: u32) -> Result<(), Trap> {
        self.write(ptr, &value.to_le_bytes())
    }

    pub fn read_str(&self, ptr: u32, len: u32) -> Result<&str, Trap> {
        std::str::from_utf8(self.read(ptr, len)?).map_err(|_| Trap::InvalidUtf8 { ptr, len })
    }
}
