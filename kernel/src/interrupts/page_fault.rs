//! Page fault trap dispatch.

use crate::{
    mem::FrameAllocator,
    swapping::handle_page_fault,
    sync::mutex::Mutex,
    threading::process::Process,
};
use bitbybit::bitfield;
use log::{error, warn};

/// The error code the CPU pushes for a page fault.
/// https://wiki.osdev.org/Exceptions#Page_Fault
#[bitfield(u32, default = 0)]
pub struct PageFaultErrorCode {
    /// Set for protection violations, clear for non-present pages.
    #[bit(0, rw)]
    present: bool,
    #[bit(1, rw)]
    write: bool,
    /// The fault happened in ring 3.
    #[bit(2, rw)]
    user: bool,
    #[bit(3, rw)]
    reserved_write: bool,
    #[bit(4, rw)]
    instruction_fetch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapOutcome {
    /// Re-run the faulting instruction.
    Resumed,
    /// The process was killed and must not run again.
    Terminated,
    /// The fault could not be resolved yet; the process may retry it.
    Retry,
}

/// Dispatch a page fault at `addr` raised while `process` was running.
///
/// User-mode faults on non-present pages go to the pager. Protection
/// violations and faults raised in kernel mode kill the process.
///
/// # Panics
///
/// Panics if there is no process to blame the fault on.
pub fn page_fault_trap<A: FrameAllocator>(
    frames: &Mutex<A>,
    process: Option<&mut Process>,
    addr: usize,
    error_code: PageFaultErrorCode,
) -> TrapOutcome {
    let Some(process) = process else {
        error!(
            "page fault with error code {:#b} at {:#X} with no process",
            error_code.raw_value(),
            addr
        );
        panic!("page fault at {addr:#X} outside of any process");
    };

    if error_code.present() || error_code.reserved_write() {
        warn!(
            "pid {} protection fault at {:#X} (error code {:#b}, {} mode)",
            process.pid(),
            addr,
            error_code.raw_value(),
            if error_code.user() { "user" } else { "kernel" }
        );
        process.terminate();
        return TrapOutcome::Terminated;
    }

    if !error_code.user() {
        warn!(
            "pid {} kernel-mode page fault at {:#X} (error code {:#b})",
            process.pid(),
            addr,
            error_code.raw_value()
        );
        process.terminate();
        return TrapOutcome::Terminated;
    }

    match handle_page_fault(frames, process, addr) {
        Ok(_) => TrapOutcome::Resumed,
        Err(_) if process.is_killed() => TrapOutcome::Terminated,
        Err(_) => TrapOutcome::Retry,
    }
}

/// The faulting address of the last page fault.
#[cfg(target_os = "none")]
pub fn read_cr2() -> usize {
    let vaddr: usize;
    // SAFETY: Reading cr2 has no side effects.
    unsafe {
        core::arch::asm!("mov {}, cr2", out(reg) vaddr, options(nomem, nostack, preserves_flags));
    }
    vaddr
}

/// Entry point for the page fault vector. `error_code` is the raw word the
/// CPU pushed.
#[cfg(target_os = "none")]
pub fn page_fault_handler<A: FrameAllocator>(
    frames: &Mutex<A>,
    process: Option<&mut Process>,
    error_code: u32,
) -> TrapOutcome {
    page_fault_trap(
        frames,
        process,
        read_cr2(),
        PageFaultErrorCode::new_with_raw_value(error_code),
    )
}
