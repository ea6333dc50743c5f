//! Demand paging: per-process swap, page bookkeeping and eviction.

pub mod config;
mod fault;
pub mod frame_table;
pub mod page_replacement;
mod paging_error;
mod scanner;
pub mod swap_space;
#[cfg(test)]
mod tests_prop;

pub use config::{ConfigError, PagingConfig, PolicyKind, MAX_TOTAL_PAGES, RESIDENT_CAP};
pub use fault::{handle_page_fault, Eviction, FaultOutcome};
pub use frame_table::{FrameTable, PageRecord, RecordId, Residency};
pub use page_replacement::{
    seed_random, Lcg, PageReplacementPolicy, PolicyError, RandomPolicy, ReplacementPolicy,
};
pub use paging_error::{PagingError, Result};
pub use scanner::scan_accessed;
pub use swap_space::{MemorySwapFile, SwapError, SwapFile, SwapSpace};

use crate::{
    mem::FrameAllocator,
    paging::{PageManager, PageTableAccess},
};
use alloc::boxed::Box;
use core::fmt;
use log::{error, info};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PagingStats {
    pub faults: usize,
    pub zero_fills: usize,
    pub page_ins: usize,
    pub evictions: usize,
    /// Pages the scanner moved to the most recently used position.
    pub promotions: usize,
}

impl fmt::Display for PagingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "faults {} zero-fill {} page-in {} evict {} promote {}",
            self.faults, self.zero_fills, self.page_ins, self.evictions, self.promotions
        )
    }
}

/// Everything the pager knows about one address space.
pub struct ProcessPaging<P: PageTableAccess = PageManager> {
    table: FrameTable,
    policy: ReplacementPolicy,
    swap: SwapSpace,
    page_table: P,
    config: PagingConfig,
    stats: PagingStats,
}

impl ProcessPaging {
    pub fn new(
        config: PagingConfig,
        swap_file: Box<dyn SwapFile + Send>,
    ) -> core::result::Result<Self, ConfigError> {
        Self::with_page_table(config, swap_file, PageManager::new())
    }
}

impl<P: PageTableAccess> ProcessPaging<P> {
    pub fn with_page_table(
        config: PagingConfig,
        swap_file: Box<dyn SwapFile + Send>,
        page_table: P,
    ) -> core::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            table: FrameTable::new(config.max_total_pages),
            policy: ReplacementPolicy::new(config.policy, config.resident_cap),
            swap: SwapSpace::new(swap_file, config.swap_slots),
            page_table,
            config,
            stats: PagingStats::default(),
        })
    }

    pub fn config(&self) -> &PagingConfig {
        &self.config
    }

    pub fn table(&self) -> &FrameTable {
        &self.table
    }

    pub fn policy(&self) -> &ReplacementPolicy {
        &self.policy
    }

    pub fn swap(&self) -> &SwapSpace {
        &self.swap
    }

    pub fn page_table(&self) -> &P {
        &self.page_table
    }

    pub fn page_table_mut(&mut self) -> &mut P {
        &mut self.page_table
    }

    pub fn stats(&self) -> PagingStats {
        self.stats
    }

    /// Cross-check the frame table, the replacement policy, the page table
    /// and the swap space against each other.
    pub fn is_consistent(&self) -> bool {
        let mut tracked = self.policy.tracked();
        tracked.sort_unstable();
        let resident = self.table.resident().map(|(id, _)| id);

        self.table.check_invariants()
            && self.table.resident_count() <= self.config.resident_cap
            && tracked.iter().copied().eq(resident)
            && self.page_table_agrees()
            && self.swap.slots_in_use() == self.table.swapped_count()
            && self
                .table
                .allocated()
                .filter_map(|(_, record)| record.backing_slot())
                .all(|slot| self.swap.is_in_use(slot))
    }

    fn page_table_agrees(&self) -> bool {
        self.table.allocated().all(|(_, record)| {
            let mapped = self.page_table.translate(record.virtual_address()).is_some();
            mapped == (record.residency() == Residency::Resident)
        })
    }

    /// Give back every frame and swap slot. The address space is empty
    /// afterwards and can be reused.
    pub fn release<A: FrameAllocator>(&mut self, frames: &mut A) {
        let mut freed_frames = 0;
        for (_, record) in self.table.allocated() {
            let vaddr = record.virtual_address();
            if let Some(frame) = self.page_table.unmap(vaddr) {
                frames.free_frame(frame);
                freed_frames += 1;
            }
            if let Some(slot) = record.backing_slot() {
                if let Err(err) = self.swap.free_slot(slot) {
                    error!("page {:#X} held swap slot {}: {}", vaddr, slot, err);
                }
            }
        }
        info!(
            "released {} frames and {} swap slots ({})",
            freed_frames,
            self.table.swapped_count(),
            self.stats
        );

        self.table.clear();
        self.policy.reset(self.config.resident_cap);
    }
}

#[cfg(test)]
impl<P: PageTableAccess> ProcessPaging<P> {
    /// Evict at random, drawing from `generator` instead of the kernel-wide
    /// generator. Only for an address space with nothing resident.
    pub(crate) fn draw_from(
        &mut self,
        generator: &'static crate::interrupts::mutex_irq::MutexIrq<Lcg>,
    ) {
        assert!(self.policy.is_empty());
        self.policy = ReplacementPolicy::Random(RandomPolicy::with_generator(
            self.config.resident_cap,
            generator,
        ));
    }
}

impl<P: PageTableAccess> fmt::Display for ProcessPaging<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resident {}/{} swapped {} slots {}/{}",
            self.policy.kind(),
            self.table.resident_count(),
            self.config.resident_cap,
            self.table.swapped_count(),
            self.swap.slots_in_use(),
            self.swap.capacity(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mem::CoreMapAllocator, swapping::page_replacement::tests::private_generator,
        sync::mutex::Mutex, threading::process::Process,
    };
    use alloc::string::ToString;
    use pager_shared::mem::PAGE_FRAME_SIZE;

    #[test]
    fn invalid_config_is_rejected() {
        let config = PagingConfig::DEFAULT.with_limits(0, 4);
        assert!(matches!(
            ProcessPaging::new(config, Box::new(MemorySwapFile::new())),
            Err(ConfigError::ZeroResidentCap)
        ));
    }

    #[test]
    fn fresh_state_is_empty_and_consistent() {
        let config = PagingConfig::DEFAULT.with_policy(PolicyKind::Fifo);
        let paging = ProcessPaging::new(config, Box::new(MemorySwapFile::new())).unwrap();
        assert!(paging.is_consistent());
        assert_eq!(paging.stats(), PagingStats::default());
        assert_eq!(paging.table().capacity(), MAX_TOTAL_PAGES);
        assert_eq!(paging.swap().capacity(), MAX_TOTAL_PAGES);
        assert_eq!(paging.policy().kind(), PolicyKind::Fifo);
        assert_eq!(paging.to_string(), "FIFO resident 0/15 swapped 0 slots 0/30");
    }

    #[test]
    fn releasing_empty_state_is_a_no_op() {
        let mut frames = CoreMapAllocator::new(0, 2);
        let mut paging =
            ProcessPaging::new(PagingConfig::DEFAULT, Box::new(MemorySwapFile::new())).unwrap();
        paging.release(&mut frames);
        assert_eq!(frames.free_frames(), 2);
        assert!(paging.is_consistent());
    }

    #[test]
    fn release_survives_a_lost_swap_slot() {
        let frames = Mutex::new(CoreMapAllocator::new(0, 2));
        let config = PagingConfig::DEFAULT
            .with_policy(PolicyKind::Fifo)
            .with_limits(1, 3);
        let mut process = Process::new(
            3,
            "leaky",
            3 * PAGE_FRAME_SIZE,
            config,
            Box::new(MemorySwapFile::new()),
        )
        .unwrap();
        for page in 0..3 {
            handle_page_fault(&frames, &mut process, page * PAGE_FRAME_SIZE).unwrap();
        }
        assert_eq!(frames.lock().free_frames(), 1);

        // Free one backing slot behind the pager's back.
        let paging = process.paging_mut();
        let slot = paging
            .table
            .lookup(0)
            .and_then(|id| paging.table.record(id).backing_slot())
            .unwrap();
        paging.swap.free_slot(slot).unwrap();
        assert!(!paging.is_consistent());

        paging.release(&mut *frames.lock());
        assert_eq!(frames.lock().free_frames(), 2);
        assert_eq!(paging.swap().slots_in_use(), 0);
        assert!(paging.is_consistent());
    }

    #[test]
    fn release_keeps_the_random_generator() {
        let generator = private_generator(1);
        let frames = Mutex::new(CoreMapAllocator::new(0, 2));
        let config = PagingConfig::DEFAULT
            .with_policy(PolicyKind::Random)
            .with_limits(2, 4);
        let mut process = Process::new(
            4,
            "dice",
            4 * PAGE_FRAME_SIZE,
            config,
            Box::new(MemorySwapFile::new()),
        )
        .unwrap();
        process.paging_mut().draw_from(generator);
        for page in 0..3 {
            handle_page_fault(&frames, &mut process, page * PAGE_FRAME_SIZE).unwrap();
        }
        let mut expected = Lcg::new(1);
        expected.next_u32();
        assert_eq!(*generator.lock(), expected);

        process.paging_mut().release(&mut *frames.lock());
        let ReplacementPolicy::Random(policy) = process.paging().policy() else {
            panic!("policy changed kind on release");
        };
        assert!(core::ptr::eq(policy.generator(), generator));
        assert!(policy.is_empty());
        assert_eq!(*generator.lock(), expected);
    }

    #[test]
    fn stats_summary() {
        let stats = PagingStats {
            faults: 4,
            zero_fills: 3,
            page_ins: 1,
            evictions: 2,
            promotions: 0,
        };
        assert_eq!(
            stats.to_string(),
            "faults 4 zero-fill 3 page-in 1 evict 2 promote 0"
        );
    }
}
