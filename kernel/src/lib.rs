//! Demand paging for user processes: page fault resolution, per-process swap
//! and FIFO, random or LRU page replacement.
//!
//! Built `no_std` for the kernel target. Hosted builds link `std` so the
//! pager can be exercised with `cargo test`.

#![cfg_attr(target_os = "none", no_std)]

extern crate alloc;

pub mod interrupts;
pub mod mem;
pub mod paging;
pub mod swapping;
pub mod sync;
pub mod threading;

pub use swapping::{handle_page_fault, PagingError};
