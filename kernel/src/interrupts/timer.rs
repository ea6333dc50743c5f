use super::{
    mutex_irq::{hold_interrupts, MutexIrq},
    IntrLevel,
};
use crate::{swapping::scan_accessed, threading::process::Process};
use core::time::Duration;

// PIT generates 3579545 / 3 Hz input signal which we wait to receive 0xffff (65535) of before sending a timer interrupt.
// This gives us an interval of 0xffff * 3 / 3579545 seconds between each timer interrupt
// https://wiki.osdev.org/Programmable_Interval_Timer
pub const TIMER_INTERRUPT_INTERVAL: Duration =
    Duration::from_micros((10u64).pow(6) * 0xffff * 3 / 3579545);

static SYS_CLOCK: MutexIrq<Duration> = MutexIrq::new(Duration::new(0, 0));

pub fn step_sys_clock() {
    let mut clock = SYS_CLOCK.lock();
    match clock.checked_add(TIMER_INTERRUPT_INTERVAL) {
        Some(update) => {
            *clock = update;
        }
        None => panic!("System clock overflowed!"),
    }
}

/// Time elapsed since boot. Advances in steps of [`TIMER_INTERRUPT_INTERVAL`].
pub fn uptime() -> Duration {
    *SYS_CLOCK.lock()
}

/// Timer interrupt body: advance the clock, then sample the accessed bits of
/// the interrupted process, if any. Returns the number of pages promoted.
pub fn on_timer_tick(process: Option<&mut Process>) -> usize {
    let _intr = hold_interrupts(IntrLevel::IntrOff);
    step_sys_clock();
    process.map_or(0, |process| scan_accessed(process.paging_mut()))
}
