use super::{PageReplacementPolicy, PolicyError};
use crate::swapping::frame_table::RecordId;
use alloc::{collections::VecDeque, vec::Vec};

/// Evicts the page that has been resident the longest. Touches are ignored.
pub struct FifoPolicy {
    queue: VecDeque<RecordId>,
    capacity: usize,
}

impl FifoPolicy {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }
}

impl PageReplacementPolicy for FifoPolicy {
    fn on_insert(&mut self, record: RecordId) -> Result<(), PolicyError> {
        if self.queue.contains(&record) {
            return Err(PolicyError::AlreadyTracked);
        }
        if self.queue.len() >= self.capacity {
            return Err(PolicyError::Full);
        }
        self.queue.push_back(record);
        Ok(())
    }

    fn select_victim(&mut self) -> Result<RecordId, PolicyError> {
        self.queue.front().copied().ok_or(PolicyError::Empty)
    }

    fn on_remove(&mut self, record: RecordId) -> Result<(), PolicyError> {
        let index = self
            .queue
            .iter()
            .position(|&r| r == record)
            .ok_or(PolicyError::NotTracked)?;
        self.queue.remove(index);
        Ok(())
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn tracked(&self) -> Vec<RecordId> {
        self.queue.iter().copied().collect()
    }
}
