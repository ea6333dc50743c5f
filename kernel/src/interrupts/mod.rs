pub mod mutex_irq;
pub mod page_fault;
pub mod timer;

use core::sync::atomic::{compiler_fence, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrLevel {
    IntrOn,
    IntrOff,
}

#[cfg(target_os = "none")]
mod level {
    use core::arch::asm;

    pub fn enabled() -> bool {
        let flags: u32;
        unsafe {
            asm!(
            "pushfd",
            "mov {}, [esp]",
            "popfd",
            out(reg) flags
            );
        }
        flags & (1 << 9) != 0
    }

    #[inline(always)]
    pub fn enable() {
        unsafe {
            asm!("sti", options(nomem, nostack));
        }
    }

    #[inline(always)]
    pub fn disable() {
        unsafe {
            asm!("cli", options(nomem, nostack));
        }
    }
}

// Hosted builds have no IF flag to flip. Each thread stands in for one core,
// so the interrupt level is tracked per thread.
#[cfg(not(target_os = "none"))]
mod level {
    use std::cell::Cell;

    std::thread_local! {
        static ENABLED: Cell<bool> = const { Cell::new(true) };
    }

    pub fn enabled() -> bool {
        ENABLED.with(Cell::get)
    }

    pub fn enable() {
        ENABLED.with(|flag| flag.set(true));
    }

    pub fn disable() {
        ENABLED.with(|flag| flag.set(false));
    }
}

pub fn intr_get_level() -> IntrLevel {
    if level::enabled() {
        IntrLevel::IntrOn
    } else {
        IntrLevel::IntrOff
    }
}

#[inline(always)]
pub fn intr_enable() {
    compiler_fence(Ordering::SeqCst);
    level::enable();
}

#[inline(always)]
pub fn intr_disable() {
    level::disable();
    compiler_fence(Ordering::SeqCst);
}
