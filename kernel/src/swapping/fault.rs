//! Page fault resolution.

use super::{
    frame_table::{RecordId, Residency},
    PageReplacementPolicy, PagingError, ProcessPaging, Result,
};
use crate::{
    interrupts::{mutex_irq::hold_interrupts, IntrLevel},
    mem::{Frame, FrameAllocator},
    paging::{PageTableAccess, Permissions},
    sync::mutex::Mutex,
    threading::process::Process,
};
use log::{debug, error, warn};
use pager_shared::mem::{is_user_address, page_round_down};

/// A page written out to make room for the faulting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    pub virtual_address: usize,
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// First touch of the page; it was mapped to a zeroed frame.
    ZeroFilled { evicted: Option<Eviction> },
    /// The page was read back from `slot`, which is free again.
    PagedIn {
        slot: usize,
        evicted: Option<Eviction>,
    },
    /// The page was already resident and mapped, e.g. another fault on the
    /// same page raced this one.
    AlreadyResident,
}

impl FaultOutcome {
    pub fn evicted(&self) -> Option<Eviction> {
        match *self {
            Self::ZeroFilled { evicted } | Self::PagedIn { evicted, .. } => evicted,
            Self::AlreadyResident => None,
        }
    }
}

enum FaultKind {
    NewMapping,
    FileBacked(RecordId, usize),
}

/// Resolve a page fault of `process` at `addr`.
///
/// Runs with interrupts held off, so the scanner never sees a half-finished
/// transition. Errors that are fatal to the process terminate it before they
/// are returned. [`PagingError::AllocatorExhausted`] terminates it only if its
/// configuration says so.
///
/// # Panics
///
/// Panics if the paging records of `process` contradict each other.
pub fn handle_page_fault<A: FrameAllocator>(
    frames: &Mutex<A>,
    process: &mut Process,
    addr: usize,
) -> Result<FaultOutcome> {
    let _intr = hold_interrupts(IntrLevel::IntrOff);
    let size = process.size();
    let paging = process.paging_mut();
    let kill_on_oom = paging.config().kill_on_oom;

    let result = {
        let mut frames = frames.lock();
        paging.resolve(&mut *frames, size, addr)
    };

    match result {
        Ok(outcome) => {
            debug!("pid {} fault at {:#X}: {:?}", process.pid(), addr, outcome);
            Ok(outcome)
        }
        Err(PagingError::InconsistentRecord) => {
            error!(
                "pid {} fault at {:#X}: paging records corrupted ({})",
                process.pid(),
                addr,
                process.paging()
            );
            panic!("inconsistent paging record for pid {}", process.pid());
        }
        Err(err) => {
            if err.is_fatal_to_process() || (err == PagingError::AllocatorExhausted && kill_on_oom)
            {
                warn!(
                    "pid {} ({}) killed on fault at {:#X}: {}",
                    process.pid(),
                    process.name(),
                    addr,
                    err
                );
                process.terminate();
            } else {
                debug!("pid {} fault at {:#X} deferred: {}", process.pid(), addr, err);
            }
            Err(err)
        }
    }
}

impl<P: PageTableAccess> ProcessPaging<P> {
    /// The body of [`handle_page_fault`]. Nothing observable changes unless
    /// this returns `Ok`, except that an eviction may already have completed
    /// when the page-in afterwards fails.
    pub(crate) fn resolve<A: FrameAllocator>(
        &mut self,
        frames: &mut A,
        size: usize,
        addr: usize,
    ) -> Result<FaultOutcome> {
        self.stats.faults += 1;
        let page = page_round_down(addr);
        let existing = self.table.lookup(page);

        if existing.is_none() && self.table.total_count() >= self.config.max_total_pages {
            return Err(PagingError::CapacityExceeded);
        }
        if addr >= size || !is_user_address(addr) {
            return Err(PagingError::IllegalAddress);
        }

        let kind = match existing {
            None => FaultKind::NewMapping,
            Some(id) => {
                let record = self.table.record(id);
                match (record.residency(), record.backing_slot()) {
                    (Residency::Swapped, Some(slot)) => FaultKind::FileBacked(id, slot),
                    (Residency::Resident, _) if self.page_table.translate(page).is_some() => {
                        return Ok(FaultOutcome::AlreadyResident);
                    }
                    _ => return Err(PagingError::InconsistentRecord),
                }
            }
        };

        let (frame, evicted) = if self.table.resident_count() >= self.config.resident_cap {
            let (frame, eviction) = self.evict(frames)?;
            (frame, Some(eviction))
        } else {
            (frames.alloc_frame()?, None)
        };

        let outcome = match kind {
            FaultKind::NewMapping => self.zero_fill(frames, frame, page, evicted),
            FaultKind::FileBacked(id, slot) => self.page_in(frames, frame, id, slot, evicted),
        };
        if outcome.is_err() {
            frames.free_frame(frame);
        }
        outcome
    }

    /// Write the policy's victim out to a fresh swap slot and take its frame.
    fn evict<A: FrameAllocator>(&mut self, frames: &mut A) -> Result<(Frame, Eviction)> {
        let victim = self.policy.select_victim()?;
        let vaddr = self.table.record(victim).virtual_address();
        let frame = self
            .page_table
            .frame_of(vaddr)
            .ok_or(PagingError::InconsistentRecord)?;

        let slot = self.swap.allocate_slot()?;
        if let Err(err) = self.swap.write(slot, frames.frame_mut(frame)) {
            self.swap.free_slot(slot)?;
            return Err(err.into());
        }

        self.table.mark_swapped(victim, slot)?;
        self.page_table.unmap(vaddr);
        self.policy.on_remove(victim)?;
        self.stats.evictions += 1;
        debug!("evicted {:#X} to slot {} under {}", vaddr, slot, self.policy.kind());

        Ok((
            frame,
            Eviction {
                virtual_address: vaddr,
                slot,
            },
        ))
    }

    fn zero_fill<A: FrameAllocator>(
        &mut self,
        frames: &mut A,
        frame: Frame,
        page: usize,
        evicted: Option<Eviction>,
    ) -> Result<FaultOutcome> {
        let id = self.table.allocate(page)?;
        frames.frame_mut(frame).fill(0);
        self.install(id, page, frame)?;
        self.stats.zero_fills += 1;
        Ok(FaultOutcome::ZeroFilled { evicted })
    }

    fn page_in<A: FrameAllocator>(
        &mut self,
        frames: &mut A,
        frame: Frame,
        id: RecordId,
        slot: usize,
        evicted: Option<Eviction>,
    ) -> Result<FaultOutcome> {
        self.swap.read(slot, frames.frame_mut(frame))?;
        let freed = self.table.mark_resident(id)?;
        debug_assert_eq!(freed, slot);
        self.swap.free_slot(slot)?;

        let page = self.table.record(id).virtual_address();
        self.install(id, page, frame)?;
        self.stats.page_ins += 1;
        Ok(FaultOutcome::PagedIn { slot, evicted })
    }

    fn install(&mut self, id: RecordId, page: usize, frame: Frame) -> Result<()> {
        self.page_table.map(page, frame, Permissions::USER_RW);
        self.policy.on_insert(id)?;
        Ok(())
    }
}
