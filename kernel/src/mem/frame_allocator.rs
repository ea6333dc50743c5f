use super::{AllocError, Frame, FrameAllocator};
use alloc::{boxed::Box, vec};
use bitbybit::bitfield;
use core::ops::Range;
use pager_shared::mem::PAGE_FRAME_SIZE;

#[bitfield(u8, default = 0)]
pub struct CoreMapEntry {
    #[bit(0, rw)]
    allocated: bool,
    #[bit(1, rw)]
    pinned: bool,
}

/// One page of physical memory.
#[derive(Clone)]
#[repr(C, align(4096))]
pub struct PageFrame(pub [u8; PAGE_FRAME_SIZE]);

impl PageFrame {
    pub const ZEROED: Self = Self([0; PAGE_FRAME_SIZE]);
}

/// Single-frame allocator over a contiguous pool, tracked by a core map with
/// one entry per frame. Placement is next-fit: the search for a free frame
/// resumes after the last frame handed out.
pub struct CoreMapAllocator {
    first_frame: usize,
    pool: Box<[PageFrame]>,
    core_map: Box<[CoreMapEntry]>,
    frames_allocated: usize,
    position: usize,
}

impl CoreMapAllocator {
    /// Build an allocator for `frame_count` frames. `first_frame` is the
    /// physical frame number of the first frame in the pool.
    pub fn new(first_frame: usize, frame_count: usize) -> Self {
        assert!(
            first_frame + frame_count <= Frame::MAX_NUMBER + 1,
            "frame pool exceeds the 32-bit physical address space"
        );

        Self {
            first_frame,
            pool: vec![PageFrame::ZEROED; frame_count].into_boxed_slice(),
            core_map: vec![CoreMapEntry::DEFAULT; frame_count].into_boxed_slice(),
            frames_allocated: 0,
            position: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.core_map.len()
    }

    pub fn frames_allocated(&self) -> usize {
        self.frames_allocated
    }

    /// Take `frames` (pool indices) out of circulation for good, e.g. for
    /// memory the kernel itself occupies.
    pub fn pin(&mut self, frames: Range<usize>) {
        for i in frames {
            assert!(!self.core_map[i].allocated(), "pinning allocated frame {i}");
            self.core_map[i] = self.core_map[i].with_allocated(true).with_pinned(true);
            self.frames_allocated += 1;
        }
    }

    fn index_of(&self, frame: Frame) -> usize {
        let index = frame
            .number()
            .checked_sub(self.first_frame)
            .filter(|&i| i < self.core_map.len());
        match index {
            Some(index) => index,
            None => panic!("frame {:#x} does not belong to this allocator", frame.number()),
        }
    }

    fn next_free(&self) -> Option<usize> {
        let total = self.core_map.len();
        (0..total)
            .map(|step| (self.position + step) % total)
            .find(|&i| !self.core_map[i].allocated())
    }
}

impl FrameAllocator for CoreMapAllocator {
    fn alloc_frame(&mut self) -> Result<Frame, AllocError> {
        if self.frames_allocated == self.core_map.len() {
            return Err(AllocError);
        }

        let index = self.next_free().ok_or(AllocError)?;
        self.core_map[index] = self.core_map[index].with_allocated(true);
        self.frames_allocated += 1;
        self.position = (index + 1) % self.core_map.len();

        Ok(Frame::from_number(self.first_frame + index))
    }

    fn free_frame(&mut self, frame: Frame) {
        let index = self.index_of(frame);
        let entry = self.core_map[index];
        assert!(entry.allocated(), "double free of frame {:#x}", frame.number());
        assert!(!entry.pinned(), "freeing pinned frame {:#x}", frame.number());

        self.core_map[index] = entry.with_allocated(false);
        self.frames_allocated -= 1;
    }

    fn frame_mut(&mut self, frame: Frame) -> &mut [u8; PAGE_FRAME_SIZE] {
        let index = self.index_of(frame);
        assert!(
            self.core_map[index].allocated(),
            "access to free frame {:#x}",
            frame.number()
        );
        &mut self.pool[index].0
    }

    fn free_frames(&self) -> usize {
        self.core_map.len() - self.frames_allocated
    }
}
