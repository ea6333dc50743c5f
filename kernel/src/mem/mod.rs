mod frame_allocator;

pub use frame_allocator::{CoreMapAllocator, CoreMapEntry, PageFrame};

use crate::sync::mutex::Mutex;
use alloc::boxed::Box;
use arbitrary_int::u20;
use core::fmt;
use once_cell::race::OnceBox;
use pager_shared::mem::PAGE_FRAME_SIZE;

/// A physical page frame, named by its frame number (physical address / page size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Frame(usize);

impl Frame {
    /// The highest frame number a 32-bit page table entry can hold.
    pub const MAX_NUMBER: usize = (1 << 20) - 1;

    pub const fn from_number(number: usize) -> Self {
        Self(number)
    }

    pub const fn number(self) -> usize {
        self.0
    }

    pub const fn phys_addr(self) -> usize {
        self.0 * PAGE_FRAME_SIZE
    }

    /// The frame number in the form stored by a page table entry.
    #[allow(clippy::cast_possible_truncation)]
    pub fn pte_address(self) -> u20 {
        assert!(self.0 <= Self::MAX_NUMBER, "frame {:#x} not addressable", self.0);
        u20::new(self.0 as u32)
    }
}

/// The frame allocator has no free frame left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "out of physical frames")
    }
}

impl core::error::Error for AllocError {}

/// Physical frame allocation as seen by the pager.
///
/// Allocators are shared by every core, so the kernel keeps them behind a
/// [`Mutex`] and only calls these methods while holding it.
pub trait FrameAllocator {
    /// Allocate a single frame. Its contents are unspecified.
    fn alloc_frame(&mut self) -> Result<Frame, AllocError>;

    /// Return `frame` to the allocator.
    ///
    /// Panics if `frame` is not currently allocated.
    fn free_frame(&mut self, frame: Frame);

    /// The memory backing an allocated frame.
    fn frame_mut(&mut self, frame: Frame) -> &mut [u8; PAGE_FRAME_SIZE];

    /// Number of frames that can still be allocated.
    fn free_frames(&self) -> usize;
}

static FRAME_ALLOCATOR: OnceBox<Mutex<CoreMapAllocator>> = OnceBox::new();

/// Install the system-wide frame allocator. Only the first call has an
/// effect; returns whether this call installed it.
pub fn init_frame_allocator(allocator: CoreMapAllocator) -> bool {
    let frames = allocator.frame_count();
    let installed = FRAME_ALLOCATOR
        .set(Box::new(Mutex::new(allocator)))
        .is_ok();
    if installed {
        log::info!("frame allocator managing {frames} frames");
    }
    installed
}

/// The allocator installed by [`init_frame_allocator`], if any.
pub fn frame_allocator() -> Option<&'static Mutex<CoreMapAllocator>> {
    FRAME_ALLOCATOR.get()
}
