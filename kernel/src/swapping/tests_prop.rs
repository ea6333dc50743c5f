#![cfg(test)]
//! Property tests for the pager: random fault and tick sequences under every
//! replacement policy must keep the bookkeeping consistent and never lose a
//! page's contents.

use super::{
    handle_page_fault, FaultOutcome, MemorySwapFile, PagingConfig, PagingError, PolicyKind,
    SwapSpace,
};
use crate::{
    interrupts::timer::on_timer_tick,
    mem::{CoreMapAllocator, FrameAllocator},
    paging::PageTableAccess,
    swapping::page_replacement::tests::private_generator,
    sync::mutex::Mutex,
    threading::process::Process,
};
use alloc::{boxed::Box, collections::BTreeMap, vec::Vec};
use pager_shared::mem::PAGE_FRAME_SIZE;
use proptest::prelude::*;

const PAGE: usize = PAGE_FRAME_SIZE;

#[derive(Debug, Clone, Copy)]
enum Op {
    Fault(usize),
    Touch(usize),
    Tick,
}

fn arb_policy() -> impl Strategy<Value = PolicyKind> {
    prop_oneof![
        Just(PolicyKind::Fifo),
        Just(PolicyKind::Random),
        Just(PolicyKind::Lru),
    ]
}

fn arb_op(pages: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..pages).prop_map(Op::Fault),
        2 => (0..pages).prop_map(Op::Touch),
        1 => Just(Op::Tick),
    ]
}

fn process_with(config: PagingConfig, pages: usize) -> Process {
    Process::new(1, "prop", pages * PAGE, config, Box::new(MemorySwapFile::new())).unwrap()
}

fn first_byte(frames: &Mutex<CoreMapAllocator>, process: &Process, vaddr: usize) -> Option<u8> {
    let frame = process.paging().page_table().frame_of(vaddr)?;
    Some(frames.lock().frame_mut(frame)[0])
}

proptest! {
    #[test]
    fn bookkeeping_survives_any_fault_sequence(
        policy in arb_policy(),
        resident_cap in 1usize..5,
        extra in 0usize..6,
        seed in any::<u32>(),
        ops in prop::collection::vec(arb_op(12), 1..80),
    ) {
        let max_total = resident_cap + extra;
        let config = PagingConfig::DEFAULT
            .with_policy(policy)
            .with_limits(resident_cap, max_total);
        let frames = Mutex::new(CoreMapAllocator::new(0, resident_cap));
        let mut process = process_with(config, 12);
        if policy == PolicyKind::Random {
            process.paging_mut().draw_from(private_generator(seed));
        }
        // Each page is stamped with a distinct byte on first touch.
        let mut stamps: BTreeMap<usize, u8> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Fault(page) => {
                    let vaddr = page * PAGE;
                    let owned = process.paging().table().total_count();
                    match handle_page_fault(&frames, &mut process, vaddr) {
                        Ok(outcome) => {
                            let zero_filled = matches!(outcome, FaultOutcome::ZeroFilled { .. });
                            let byte = first_byte(&frames, &process, vaddr).unwrap();
                            match stamps.get(&vaddr) {
                                Some(&stamp) => {
                                    prop_assert!(!zero_filled);
                                    prop_assert_eq!(byte, stamp);
                                }
                                None => {
                                    prop_assert!(zero_filled);
                                    prop_assert_eq!(byte, 0);
                                    let stamp = page as u8 + 1;
                                    let frame = process.paging().page_table().frame_of(vaddr).unwrap();
                                    frames.lock().frame_mut(frame)[0] = stamp;
                                    stamps.insert(vaddr, stamp);
                                }
                            }
                        }
                        Err(err) => {
                            prop_assert_eq!(err, PagingError::CapacityExceeded);
                            prop_assert_eq!(owned, max_total);
                            prop_assert!(process.is_killed());
                            prop_assert_eq!(process.paging().table().total_count(), owned);
                            break;
                        }
                    }
                }
                Op::Touch(page) => {
                    process.paging_mut().page_table_mut().mark_accessed(page * PAGE);
                }
                Op::Tick => {
                    on_timer_tick(Some(&mut process));
                }
            }

            let paging = process.paging();
            prop_assert!(paging.table().resident_count() <= resident_cap);
            prop_assert!(paging.table().total_count() <= max_total);
            prop_assert!(paging.is_consistent());
        }

        process.exit(&frames);
        prop_assert_eq!(frames.lock().free_frames(), resident_cap);
    }

    #[test]
    fn fifo_evicts_in_first_touch_order(resident_cap in 1usize..6, faults in 1usize..12) {
        let config = PagingConfig::DEFAULT
            .with_policy(PolicyKind::Fifo)
            .with_limits(resident_cap, resident_cap + faults);
        let frames = Mutex::new(CoreMapAllocator::new(0, resident_cap));
        let mut process = process_with(config, resident_cap + faults);

        let evicted: Vec<usize> = (0..resident_cap + faults)
            .filter_map(|page| {
                handle_page_fault(&frames, &mut process, page * PAGE)
                    .unwrap()
                    .evicted()
                    .map(|e| e.virtual_address / PAGE)
            })
            .collect();
        prop_assert_eq!(evicted, (0..faults).collect::<Vec<_>>());
    }

    #[test]
    fn lru_evicts_oldest_untouched_page(
        resident_cap in 2usize..8,
        touched in prop::collection::vec(any::<bool>(), 8),
    ) {
        let config = PagingConfig::DEFAULT
            .with_policy(PolicyKind::Lru)
            .with_limits(resident_cap, resident_cap + 1);
        let frames = Mutex::new(CoreMapAllocator::new(0, resident_cap));
        let mut process = process_with(config, resident_cap + 1);
        for page in 0..resident_cap {
            handle_page_fault(&frames, &mut process, page * PAGE).unwrap();
        }
        let touched = &touched[..resident_cap];
        for page in (0..resident_cap).filter(|&page| touched[page]) {
            process.paging_mut().page_table_mut().mark_accessed(page * PAGE);
        }
        on_timer_tick(Some(&mut process));

        // Promotions happen in table order, so if everything was touched the
        // first page is least recent again.
        let expected = (0..resident_cap).find(|&page| !touched[page]).unwrap_or(0);
        let outcome = handle_page_fault(&frames, &mut process, resident_cap * PAGE).unwrap();
        prop_assert_eq!(outcome.evicted().map(|e| e.virtual_address), Some(expected * PAGE));
    }

    #[test]
    fn random_victims_depend_only_on_seed(seed in any::<u32>(), pages in 5usize..16) {
        let run = || {
            let config = PagingConfig::DEFAULT
                .with_policy(PolicyKind::Random)
                .with_limits(4, 16);
            let frames = Mutex::new(CoreMapAllocator::new(0, 4));
            let mut process = process_with(config, 16);
            process.paging_mut().draw_from(private_generator(seed));
            (0..pages)
                .chain(0..pages)
                .filter_map(|page| {
                    handle_page_fault(&frames, &mut process, page * PAGE)
                        .unwrap()
                        .evicted()
                })
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(run(), run());
    }

    #[test]
    fn swap_slot_returns_what_was_written(
        bytes in prop::collection::vec(any::<u8>(), PAGE),
        slots in 1usize..6,
    ) {
        let mut swap = SwapSpace::new(Box::new(MemorySwapFile::new()), slots);
        let mut page = [0; PAGE];
        page.copy_from_slice(&bytes);
        for _ in 0..slots {
            let slot = swap.allocate_slot().unwrap();
            swap.write(slot, &[slot as u8; PAGE]).unwrap();
        }
        let last = slots - 1;
        swap.write(last, &page).unwrap();

        let mut back = [0xFF; PAGE];
        swap.read(last, &mut back).unwrap();
        prop_assert_eq!(&back[..], &bytes[..]);
        if last > 0 {
            swap.read(0, &mut back).unwrap();
            prop_assert!(back.iter().all(|&b| b == 0));
        }
    }
}

#[test]
fn frames_are_not_leaked_by_killed_processes() {
    let frames = Mutex::new(CoreMapAllocator::new(0, 3));
    let config = PagingConfig::DEFAULT.with_limits(2, 3);
    let mut process = process_with(config, 8);
    for page in 0..4 {
        let _ = handle_page_fault(&frames, &mut process, page * PAGE);
    }
    assert!(process.is_killed());
    process.exit(&frames);
    assert_eq!(frames.lock().free_frames(), 3);
}
