use super::{PageReplacementPolicy, ProcessPaging};
use crate::paging::PageTableAccess;
use log::{error, trace};

/// Feed the accessed bits of `paging`'s resident pages into the replacement
/// policy, clearing them. Returns how many pages were promoted.
///
/// Only LRU cares about recency; under the other policies this does nothing
/// and leaves the accessed bits alone. Meant to run once per timer tick with
/// interrupts held off.
///
/// # Panics
///
/// Panics if a resident page is unknown to the replacement policy.
pub fn scan_accessed<P: PageTableAccess>(paging: &mut ProcessPaging<P>) -> usize {
    if !paging.policy.uses_recency() {
        return 0;
    }

    let mut promoted = 0;
    for (id, record) in paging.table.resident() {
        let vaddr = record.virtual_address();
        if !paging.page_table.read_and_clear_accessed(vaddr) {
            continue;
        }
        if let Err(err) = paging.policy.on_touch(id) {
            error!("scanner: resident page {:#X}: {}", vaddr, err);
            panic!("replacement policy lost track of resident page {vaddr:#X}");
        }
        trace!("scanner: promoted {:#X}", vaddr);
        promoted += 1;
    }
    paging.stats.promotions += promoted;
    promoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mem::CoreMapAllocator,
        swapping::{MemorySwapFile, PagingConfig, PolicyKind},
    };
    use alloc::boxed::Box;
    use pager_shared::mem::PAGE_FRAME_SIZE;

    const PAGE: usize = PAGE_FRAME_SIZE;

    fn paging_with(policy: PolicyKind, pages: usize) -> (CoreMapAllocator, ProcessPaging) {
        let config = PagingConfig::DEFAULT
            .with_policy(policy)
            .with_limits(pages, 2 * pages);
        let mut frames = CoreMapAllocator::new(0, pages);
        let mut paging = ProcessPaging::new(config, Box::new(MemorySwapFile::new())).unwrap();
        for i in 0..pages {
            paging.resolve(&mut frames, usize::MAX, i * PAGE).unwrap();
        }
        (frames, paging)
    }

    #[test]
    fn promotes_accessed_pages_and_clears_the_bit() {
        let (_frames, mut paging) = paging_with(PolicyKind::Lru, 3);
        paging.page_table_mut().mark_accessed(0);
        paging.page_table_mut().mark_accessed(PAGE);

        assert_eq!(scan_accessed(&mut paging), 2);
        // Visited in table order: the last accessed page visited ends up most
        // recent, and the untouched page is now the victim.
        let lru = paging.policy().tracked();
        assert_eq!(lru.len(), 3);
        assert_eq!(
            paging.table().record(lru[2]).virtual_address(),
            2 * PAGE
        );
        assert_eq!(paging.table().record(lru[0]).virtual_address(), PAGE);

        assert_eq!(scan_accessed(&mut paging), 0);
        assert_eq!(paging.stats().promotions, 2);
    }

    #[test]
    fn other_policies_are_left_alone() {
        for policy in [PolicyKind::Fifo, PolicyKind::Random] {
            let (_frames, mut paging) = paging_with(policy, 2);
            paging.page_table_mut().mark_accessed(0);
            let before = paging.policy().tracked();

            assert_eq!(scan_accessed(&mut paging), 0);
            assert_eq!(paging.policy().tracked(), before);
            // The bit is still set for whoever reads it next.
            assert!(paging.page_table_mut().read_and_clear_accessed(0));
        }
    }

    #[test]
    fn swapped_pages_are_not_visited() {
        let (mut frames, mut paging) = paging_with(PolicyKind::Lru, 2);
        // Evicts the page at 0.
        paging.resolve(&mut frames, usize::MAX, 2 * PAGE).unwrap();
        assert!(paging.page_table().translate(0).is_none());
        assert_eq!(scan_accessed(&mut paging), 0);
        assert!(paging.is_consistent());
    }
}
