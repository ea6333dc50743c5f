//! Per-process x86 page tables.

use crate::mem::Frame;
use alloc::{boxed::Box, vec::Vec};
use arbitrary_int::u20;
use pager_shared::{
    mem::{is_page_aligned, OFFSET, PAGE_FRAME_SIZE},
    paging::{
        PageDirectory, PageDirectoryEntry, PageTable, PageTableEntry, VirtualAddress,
        PAGE_DIRECTORY_LEN,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub writable: bool,
    pub user: bool,
}

impl Permissions {
    pub const USER_RW: Self = Self {
        writable: true,
        user: true,
    };
}

/// The page-table operations the pager needs. Addresses are page aligned.
pub trait PageTableAccess {
    /// The entry for `vaddr`, if it is present.
    fn translate(&self, vaddr: usize) -> Option<PageTableEntry>;

    /// Install a present entry for `vaddr` pointing at `frame`.
    fn map(&mut self, vaddr: usize, frame: Frame, perms: Permissions);

    /// Remove the entry for `vaddr`, returning the frame it pointed at.
    fn unmap(&mut self, vaddr: usize) -> Option<Frame>;

    /// Report whether the accessed bit of `vaddr`'s entry is set, clearing it.
    /// Unmapped addresses report `false`.
    fn read_and_clear_accessed(&mut self, vaddr: usize) -> bool;

    fn frame_of(&self, vaddr: usize) -> Option<Frame> {
        self.translate(vaddr)
            .map(|entry| Frame::from_number(entry.page_frame_address().value() as usize))
    }
}

/// Two-level page tables for one address space. Only the user half (below
/// [`OFFSET`]) is managed here.
pub struct PageManager {
    directory: Box<PageDirectory>,
    tables: Vec<Option<Box<PageTable>>>,
    mapped: usize,
}

impl Default for PageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PageManager {
    pub fn new() -> Self {
        let mut tables = Vec::with_capacity(PAGE_DIRECTORY_LEN);
        tables.resize_with(PAGE_DIRECTORY_LEN, || None);
        Self {
            directory: Box::default(),
            tables,
            mapped: 0,
        }
    }

    /// Number of present user mappings.
    pub fn mapped_pages(&self) -> usize {
        self.mapped
    }

    pub fn is_mapped(&self, vaddr: usize) -> bool {
        self.translate(vaddr).is_some()
    }

    /// Set the accessed bit the way the MMU does when `vaddr` is touched.
    /// Returns `false` if `vaddr` is not mapped.
    pub fn mark_accessed(&mut self, vaddr: usize) -> bool {
        match self.entry_mut(vaddr) {
            Some(entry) if entry.present() => {
                *entry = entry.with_accessed(true);
                true
            }
            _ => false,
        }
    }

    fn entry(&self, vaddr: usize) -> Option<&PageTableEntry> {
        let addr = VirtualAddress::from_usize(vaddr);
        let table = self.tables[addr.directory_index()].as_ref()?;
        Some(&table[addr.table_index()])
    }

    fn entry_mut(&mut self, vaddr: usize) -> Option<&mut PageTableEntry> {
        let addr = VirtualAddress::from_usize(vaddr);
        let table = self.tables[addr.directory_index()].as_mut()?;
        Some(&mut table[addr.table_index()])
    }
}

impl PageTableAccess for PageManager {
    fn translate(&self, vaddr: usize) -> Option<PageTableEntry> {
        self.entry(vaddr).copied().filter(|entry| entry.present())
    }

    fn map(&mut self, vaddr: usize, frame: Frame, perms: Permissions) {
        assert!(is_page_aligned(vaddr), "unaligned mapping at {vaddr:#X}");
        assert!(vaddr < OFFSET, "user mapping in kernel space at {vaddr:#X}");

        let addr = VirtualAddress::from_usize(vaddr);
        let pd_index = addr.directory_index();
        let table = self.tables[pd_index].get_or_insert_with(Box::default);

        let pde = &mut self.directory[pd_index];
        *pde = pde
            .with_present(true)
            .with_read_write(pde.read_write() || perms.writable)
            .with_user_supervisor(pde.user_supervisor() || perms.user)
            .with_page_table_address(table_address(table));

        let entry = &mut table[addr.table_index()];
        if !entry.present() {
            self.mapped += 1;
        }
        *entry = PageTableEntry::DEFAULT
            .with_present(true)
            .with_read_write(perms.writable)
            .with_user_supervisor(perms.user)
            .with_page_frame_address(frame.pte_address());
        invalidate(vaddr);
    }

    fn unmap(&mut self, vaddr: usize) -> Option<Frame> {
        let frame = self.frame_of(vaddr)?;
        let addr = VirtualAddress::from_usize(vaddr);
        let pd_index = addr.directory_index();

        let table = self.tables[pd_index].as_mut()?;
        table[addr.table_index()] = PageTableEntry::DEFAULT;
        if table.is_empty() {
            self.tables[pd_index] = None;
            self.directory[pd_index] = PageDirectoryEntry::DEFAULT;
        }
        self.mapped -= 1;
        invalidate(vaddr);

        Some(frame)
    }

    fn read_and_clear_accessed(&mut self, vaddr: usize) -> bool {
        let Some(entry) = self.entry_mut(vaddr).filter(|entry| entry.present()) else {
            return false;
        };
        let accessed = entry.accessed();
        if accessed {
            *entry = entry.with_accessed(false);
            invalidate(vaddr);
        }
        accessed
    }
}

// Page tables live in the kernel heap, which is direct-mapped at OFFSET. The
// mask only matters for hosted builds, where the address is never walked.
#[allow(clippy::cast_possible_truncation)]
fn table_address(table: &PageTable) -> u20 {
    let phys = (core::ptr::from_ref(table) as usize).wrapping_sub(OFFSET);
    u20::new(((phys / PAGE_FRAME_SIZE) & Frame::MAX_NUMBER) as u32)
}

#[cfg(target_os = "none")]
fn invalidate(vaddr: usize) {
    // SAFETY: invlpg only drops a TLB entry.
    unsafe {
        core::arch::asm!("invlpg [{}]", in(reg) vaddr, options(nostack, preserves_flags));
    }
}

#[cfg(not(target_os = "none"))]
fn invalidate(_vaddr: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = PAGE_FRAME_SIZE;

    #[test]
    fn map_translate_unmap() {
        let mut pages = PageManager::new();
        assert!(pages.translate(0x1000).is_none());

        pages.map(0x1000, Frame::from_number(0x42), Permissions::USER_RW);
        let entry = pages.translate(0x1000).unwrap();
        assert!(entry.present() && entry.read_write() && entry.user_supervisor());
        assert_eq!(pages.frame_of(0x1000), Some(Frame::from_number(0x42)));
        assert_eq!(pages.mapped_pages(), 1);

        assert_eq!(pages.unmap(0x1000), Some(Frame::from_number(0x42)));
        assert!(!pages.is_mapped(0x1000));
        assert_eq!(pages.unmap(0x1000), None);
        assert_eq!(pages.mapped_pages(), 0);
    }

    #[test]
    fn remap_does_not_double_count() {
        let mut pages = PageManager::new();
        pages.map(0x5000, Frame::from_number(1), Permissions::USER_RW);
        pages.map(0x5000, Frame::from_number(2), Permissions::USER_RW);
        assert_eq!(pages.mapped_pages(), 1);
        assert_eq!(pages.frame_of(0x5000), Some(Frame::from_number(2)));
    }

    #[test]
    fn accessed_bit_is_read_and_cleared() {
        let mut pages = PageManager::new();
        pages.map(3 * PAGE, Frame::from_number(7), Permissions::USER_RW);
        assert!(!pages.read_and_clear_accessed(3 * PAGE));

        assert!(pages.mark_accessed(3 * PAGE));
        assert!(pages.read_and_clear_accessed(3 * PAGE));
        assert!(!pages.read_and_clear_accessed(3 * PAGE));

        // Remapping starts from a clean entry.
        pages.mark_accessed(3 * PAGE);
        pages.map(3 * PAGE, Frame::from_number(8), Permissions::USER_RW);
        assert!(!pages.read_and_clear_accessed(3 * PAGE));
    }

    #[test]
    fn unmapped_addresses_are_never_accessed() {
        let mut pages = PageManager::new();
        assert!(!pages.mark_accessed(0x9000));
        assert!(!pages.read_and_clear_accessed(0x9000));
    }

    #[test]
    fn mappings_in_different_directories() {
        let mut pages = PageManager::new();
        // 4 MiB apart, so each lands in its own page table.
        pages.map(0x0040_0000, Frame::from_number(1), Permissions::USER_RW);
        pages.map(0x0080_0000, Frame::from_number(2), Permissions::USER_RW);
        assert_eq!(pages.frame_of(0x0040_0000), Some(Frame::from_number(1)));
        assert_eq!(pages.frame_of(0x0080_0000), Some(Frame::from_number(2)));
        pages.unmap(0x0040_0000);
        assert_eq!(pages.frame_of(0x0080_0000), Some(Frame::from_number(2)));
    }

    #[test]
    #[should_panic(expected = "kernel space")]
    fn kernel_addresses_are_rejected() {
        let mut pages = PageManager::new();
        pages.map(OFFSET, Frame::from_number(1), Permissions::USER_RW);
    }
}
