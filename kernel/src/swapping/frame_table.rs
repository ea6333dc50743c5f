//! The per-process record of every page the process owns and where it lives.

use super::{PagingError, Result};
use alloc::{boxed::Box, vec};
use pager_shared::mem::page_round_down;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// Free record, reusable by the next new page.
    Unallocated,
    /// In a physical frame.
    Resident,
    /// In the swap file.
    Swapped,
}

/// Stable handle of a record in its [`FrameTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(usize);

impl RecordId {
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRecord {
    virtual_address: usize,
    backing_slot: Option<usize>,
    residency: Residency,
}

impl PageRecord {
    const UNALLOCATED: Self = Self {
        virtual_address: 0,
        backing_slot: None,
        residency: Residency::Unallocated,
    };

    pub fn virtual_address(&self) -> usize {
        self.virtual_address
    }

    /// The swap slot holding this page; `None` unless swapped out.
    pub fn backing_slot(&self) -> Option<usize> {
        self.backing_slot
    }

    pub fn residency(&self) -> Residency {
        self.residency
    }

    pub fn is_allocated(&self) -> bool {
        self.residency != Residency::Unallocated
    }
}

pub struct FrameTable {
    records: Box<[PageRecord]>,
    resident: usize,
    swapped: usize,
}

impl FrameTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: vec![PageRecord::UNALLOCATED; capacity].into_boxed_slice(),
            resident: 0,
            swapped: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn resident_count(&self) -> usize {
        self.resident
    }

    pub fn swapped_count(&self) -> usize {
        self.swapped
    }

    pub fn total_count(&self) -> usize {
        self.resident + self.swapped
    }

    pub fn is_full(&self) -> bool {
        self.total_count() >= self.capacity()
    }

    pub fn record(&self, id: RecordId) -> &PageRecord {
        &self.records[id.0]
    }

    /// The record owning the page containing `vaddr`.
    pub fn lookup(&self, vaddr: usize) -> Option<RecordId> {
        let page = page_round_down(vaddr);
        self.records
            .iter()
            .position(|r| r.is_allocated() && r.virtual_address == page)
            .map(RecordId)
    }

    /// Claim a free record for the page at `vaddr` and mark it resident.
    pub fn allocate(&mut self, vaddr: usize) -> Result<RecordId> {
        let page = page_round_down(vaddr);
        if self.lookup(page).is_some() {
            return Err(PagingError::InconsistentRecord);
        }
        let Some(index) = self.records.iter().position(|r| !r.is_allocated()) else {
            return Err(PagingError::CapacityExceeded);
        };

        self.records[index] = PageRecord {
            virtual_address: page,
            backing_slot: None,
            residency: Residency::Resident,
        };
        self.resident += 1;
        self.debug_check();
        Ok(RecordId(index))
    }

    /// Resident to swapped, now stored in `slot`.
    pub fn mark_swapped(&mut self, id: RecordId, slot: usize) -> Result<()> {
        let record = &mut self.records[id.0];
        if record.residency != Residency::Resident {
            return Err(PagingError::InconsistentRecord);
        }
        record.residency = Residency::Swapped;
        record.backing_slot = Some(slot);
        self.resident -= 1;
        self.swapped += 1;
        self.debug_check();
        Ok(())
    }

    /// Swapped to resident. Returns the slot the page was read from, which
    /// the record no longer owns.
    pub fn mark_resident(&mut self, id: RecordId) -> Result<usize> {
        let record = &mut self.records[id.0];
        let (Residency::Swapped, Some(slot)) = (record.residency, record.backing_slot) else {
            return Err(PagingError::InconsistentRecord);
        };
        record.residency = Residency::Resident;
        record.backing_slot = None;
        self.swapped -= 1;
        self.resident += 1;
        self.debug_check();
        Ok(slot)
    }

    /// Records that are currently resident, in table order.
    pub fn resident(&self) -> impl Iterator<Item = (RecordId, &PageRecord)> + '_ {
        self.allocated()
            .filter(|(_, record)| record.residency == Residency::Resident)
    }

    /// Records that are resident or swapped, in table order.
    pub fn allocated(&self) -> impl Iterator<Item = (RecordId, &PageRecord)> + '_ {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.is_allocated())
            .map(|(i, record)| (RecordId(i), record))
    }

    /// Forget every page, returning the table to its freshly created state.
    pub fn clear(&mut self) {
        self.records.fill(PageRecord::UNALLOCATED);
        self.resident = 0;
        self.swapped = 0;
    }

    /// Verify the counters and address uniqueness against the records.
    pub fn check_invariants(&self) -> bool {
        let resident = self.resident().count();
        let swapped = self
            .allocated()
            .filter(|(_, r)| r.residency == Residency::Swapped)
            .count();
        let unique = self.allocated().all(|(id, record)| {
            self.allocated()
                .all(|(other, o)| other == id || o.virtual_address != record.virtual_address)
        });
        let slots_valid = self.allocated().all(|(_, r)| {
            (r.residency == Residency::Swapped) == r.backing_slot.is_some()
        });
        resident == self.resident && swapped == self.swapped && unique && slots_valid
    }

    fn debug_check(&self) {
        debug_assert!(self.check_invariants(), "frame table invariants violated");
    }
}
