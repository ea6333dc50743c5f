use crate::mem::AllocError;
use core::error::Error;
use core::fmt::{self, Debug, Display, Formatter};

/// Errors raised while resolving a page fault.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PagingError {
    /// The process already owns the maximum number of pages and touched a new one.
    CapacityExceeded,
    /// The address lies outside the process's committed size or in kernel space.
    IllegalAddress,
    /// An eviction needed a swap slot and none was free.
    SwapStoreExhausted,
    /// The swap file failed a read or write.
    SwapIo,
    /// Physical memory is exhausted.
    AllocatorExhausted,
    /// Paging bookkeeping contradicts itself.
    InconsistentRecord,
}

impl PagingError {
    /// Whether the faulting process must be terminated. Allocator exhaustion
    /// is left to the kernel's memory-pressure policy, and an inconsistent
    /// record takes the whole kernel down instead.
    pub fn is_fatal_to_process(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded | Self::IllegalAddress | Self::SwapStoreExhausted | Self::SwapIo
        )
    }
}

impl Debug for PagingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded => write!(f, "CapacityExceeded"),
            Self::IllegalAddress => write!(f, "IllegalAddress"),
            Self::SwapStoreExhausted => write!(f, "SwapStoreExhausted"),
            Self::SwapIo => write!(f, "SwapIo"),
            Self::AllocatorExhausted => write!(f, "AllocatorExhausted"),
            Self::InconsistentRecord => write!(f, "InconsistentRecord"),
        }
    }
}

impl Display for PagingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded => write!(f, "process page limit exceeded"),
            Self::IllegalAddress => write!(f, "access outside the process address space"),
            Self::SwapStoreExhausted => write!(f, "no free swap slot"),
            Self::SwapIo => write!(f, "swap file I/O failed"),
            Self::AllocatorExhausted => write!(f, "out of physical frames"),
            Self::InconsistentRecord => write!(f, "inconsistent paging record"),
        }
    }
}

impl Error for PagingError {}

impl From<AllocError> for PagingError {
    fn from(_: AllocError) -> Self {
        Self::AllocatorExhausted
    }
}

pub type Result<T> = core::result::Result<T, PagingError>;
