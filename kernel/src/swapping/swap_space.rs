//! Per-process swap storage.
//!
//! A swap file is a flat array of page-sized slots: slot `i` lives at byte
//! offset `i * PAGE_FRAME_SIZE` and there is no header. Which slots hold live
//! data is only known to the in-memory slot map, so a swap file cannot be
//! interpreted without the process that wrote it.

use super::PagingError;
use alloc::{boxed::Box, vec, vec::Vec};
use core::fmt;
use pager_shared::mem::PAGE_FRAME_SIZE;

/// Byte-addressable backing file, supplied by the file system.
pub trait SwapFile {
    /// Fill `buf` with the bytes at `offset`.
    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), SwapError>;
    /// Persist `buf` at `offset`, growing the file if needed.
    fn write_at(&mut self, offset: usize, buf: &[u8]) -> Result<(), SwapError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapError {
    /// Every slot is in use.
    OutOfSlots,
    /// The slot index is past the end of the swap space.
    SlotOutOfBounds,
    /// The slot does not hold a page.
    SlotNotInUse,
    /// The swap file failed the transfer.
    Io,
}

impl fmt::Display for SwapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfSlots => write!(f, "swap space full"),
            Self::SlotOutOfBounds => write!(f, "swap slot out of bounds"),
            Self::SlotNotInUse => write!(f, "swap slot not in use"),
            Self::Io => write!(f, "swap file I/O error"),
        }
    }
}

impl core::error::Error for SwapError {}

impl From<SwapError> for PagingError {
    fn from(err: SwapError) -> Self {
        match err {
            SwapError::OutOfSlots => PagingError::SwapStoreExhausted,
            SwapError::Io => PagingError::SwapIo,
            SwapError::SlotOutOfBounds | SwapError::SlotNotInUse => PagingError::InconsistentRecord,
        }
    }
}

/// Swap file kept in kernel memory.
#[derive(Default)]
pub struct MemorySwapFile {
    data: Vec<u8>,
}

impl MemorySwapFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl SwapFile for MemorySwapFile {
    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), SwapError> {
        let src = self
            .data
            .get(offset..offset + buf.len())
            .ok_or(SwapError::Io)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_at(&mut self, offset: usize, buf: &[u8]) -> Result<(), SwapError> {
        let end = offset + buf.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(buf);
        Ok(())
    }
}

pub struct SwapSpace {
    file: Box<dyn SwapFile + Send>,
    in_use: Box<[bool]>,
    slots_in_use: usize,
}

impl SwapSpace {
    pub fn new(file: Box<dyn SwapFile + Send>, slots: usize) -> Self {
        Self {
            file,
            in_use: vec![false; slots].into_boxed_slice(),
            slots_in_use: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.in_use.len()
    }

    pub fn slots_in_use(&self) -> usize {
        self.slots_in_use
    }

    pub fn is_in_use(&self, slot: usize) -> bool {
        self.in_use.get(slot).copied().unwrap_or(false)
    }

    /// Claim the lowest free slot.
    pub fn allocate_slot(&mut self) -> Result<usize, SwapError> {
        let slot = self
            .in_use
            .iter()
            .position(|used| !used)
            .ok_or(SwapError::OutOfSlots)?;
        self.in_use[slot] = true;
        self.slots_in_use += 1;
        Ok(slot)
    }

    /// Mark `slot` free. Its bytes stay in the file until overwritten.
    pub fn free_slot(&mut self, slot: usize) -> Result<(), SwapError> {
        self.check_in_use(slot)?;
        self.in_use[slot] = false;
        self.slots_in_use -= 1;
        Ok(())
    }

    /// Write one page into an allocated slot.
    pub fn write(&mut self, slot: usize, page: &[u8; PAGE_FRAME_SIZE]) -> Result<(), SwapError> {
        self.check_in_use(slot)?;
        self.file.write_at(slot * PAGE_FRAME_SIZE, page)
    }

    /// Read the page stored in `slot` into `page`.
    pub fn read(&mut self, slot: usize, page: &mut [u8; PAGE_FRAME_SIZE]) -> Result<(), SwapError> {
        self.check_in_use(slot)?;
        self.file.read_at(slot * PAGE_FRAME_SIZE, page)
    }

    fn check_in_use(&self, slot: usize) -> Result<(), SwapError> {
        match self.in_use.get(slot) {
            None => Err(SwapError::SlotOutOfBounds),
            Some(false) => Err(SwapError::SlotNotInUse),
            Some(true) => Ok(()),
        }
    }
}
