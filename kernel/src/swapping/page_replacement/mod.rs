//! Victim selection.
//!
//! Every strategy keeps its own view of the resident set, always derived
//! from the frame table: a record is inserted the moment it becomes resident
//! and removed the moment it stops being resident.

mod fifo;
mod lru;
mod random;

pub use fifo::FifoPolicy;
pub use lru::LruPolicy;
pub use random::{seed_random, Lcg, RandomPolicy};

use super::{config::PolicyKind, frame_table::RecordId, PagingError};
use alloc::vec::Vec;
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyError {
    /// Nothing is tracked, so there is no victim.
    Empty,
    /// Already tracking as many records as the resident cap allows.
    Full,
    /// The record is not tracked.
    NotTracked,
    /// The record is tracked already.
    AlreadyTracked,
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "no resident page to evict"),
            Self::Full => write!(f, "replacement policy is full"),
            Self::NotTracked => write!(f, "page not tracked by replacement policy"),
            Self::AlreadyTracked => write!(f, "page already tracked by replacement policy"),
        }
    }
}

impl core::error::Error for PolicyError {}

impl From<PolicyError> for PagingError {
    fn from(_: PolicyError) -> Self {
        PagingError::InconsistentRecord
    }
}

pub trait PageReplacementPolicy {
    /// `record` just became resident.
    fn on_insert(&mut self, record: RecordId) -> Result<(), PolicyError>;

    /// `record` was accessed since the last timer tick.
    fn on_touch(&mut self, _record: RecordId) -> Result<(), PolicyError> {
        Ok(())
    }

    /// Choose the next page to evict. The victim stays tracked until
    /// [`on_remove`](Self::on_remove) is called for it.
    fn select_victim(&mut self) -> Result<RecordId, PolicyError>;

    /// `record` is no longer resident.
    fn on_remove(&mut self, record: RecordId) -> Result<(), PolicyError>;

    /// Number of tracked records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked records, in the strategy's own order.
    fn tracked(&self) -> Vec<RecordId>;
}

/// One of the three strategies, chosen per process at creation.
pub enum ReplacementPolicy {
    Fifo(FifoPolicy),
    Random(RandomPolicy),
    Lru(LruPolicy),
}

impl ReplacementPolicy {
    pub fn new(kind: PolicyKind, resident_cap: usize) -> Self {
        match kind {
            PolicyKind::Fifo => Self::Fifo(FifoPolicy::new(resident_cap)),
            PolicyKind::Random => Self::Random(RandomPolicy::new(resident_cap)),
            PolicyKind::Lru => Self::Lru(LruPolicy::new(resident_cap)),
        }
    }

    /// Forget every tracked record. A random policy keeps its generator.
    pub fn reset(&mut self, resident_cap: usize) {
        let kind = self.kind();
        *self = match self {
            Self::Random(policy) => Self::Random(policy.emptied()),
            _ => Self::new(kind, resident_cap),
        };
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Fifo(_) => PolicyKind::Fifo,
            Self::Random(_) => PolicyKind::Random,
            Self::Lru(_) => PolicyKind::Lru,
        }
    }

    /// Whether access recency feeds into victim selection.
    pub fn uses_recency(&self) -> bool {
        matches!(self, Self::Lru(_))
    }

    fn inner(&self) -> &dyn PageReplacementPolicy {
        match self {
            Self::Fifo(policy) => policy,
            Self::Random(policy) => policy,
            Self::Lru(policy) => policy,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn PageReplacementPolicy {
        match self {
            Self::Fifo(policy) => policy,
            Self::Random(policy) => policy,
            Self::Lru(policy) => policy,
        }
    }
}

impl PageReplacementPolicy for ReplacementPolicy {
    fn on_insert(&mut self, record: RecordId) -> Result<(), PolicyError> {
        self.inner_mut().on_insert(record)
    }

    fn on_touch(&mut self, record: RecordId) -> Result<(), PolicyError> {
        self.inner_mut().on_touch(record)
    }

    fn select_victim(&mut self) -> Result<RecordId, PolicyError> {
        self.inner_mut().select_victim()
    }

    fn on_remove(&mut self, record: RecordId) -> Result<(), PolicyError> {
        self.inner_mut().on_remove(record)
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn tracked(&self) -> Vec<RecordId> {
        self.inner().tracked()
    }
}
