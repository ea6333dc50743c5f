use crate::interrupts::{intr_disable, intr_enable, intr_get_level, IntrLevel};
use crate::sync::mutex::{Mutex, MutexGuard};
use core::{
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut},
};

/// A guard for withholding interrupts.
///
/// The guard belongs to the core that created it, so it is neither `Send` nor
/// `Sync`.
pub struct InterruptsGuard {
    was_enabled: bool,
    _not_send: PhantomData<*const ()>,
}

/// Sets the interrupt level to `level` until the `InterruptsGuard` is dropped.
/// After it is dropped, the interrupts are returned to the previous state.
pub fn hold_interrupts(level: IntrLevel) -> InterruptsGuard {
    let was_enabled = intr_get_level() == IntrLevel::IntrOn;
    match level {
        IntrLevel::IntrOn => intr_enable(),
        IntrLevel::IntrOff => intr_disable(),
    }
    InterruptsGuard {
        was_enabled,
        _not_send: PhantomData,
    }
}

impl Drop for InterruptsGuard {
    fn drop(&mut self) {
        if self.was_enabled {
            intr_enable();
        } else {
            intr_disable();
        }
    }
}

/// A mutex whose critical section also runs with interrupts held off, so an
/// interrupt handler on the same core can never spin on it forever.
pub struct MutexIrq<T: ?Sized> {
    lock: Mutex<T>,
}

pub struct MutexGuardIrq<'a, T: ?Sized + 'a> {
    guard: MutexGuard<'a, T>,
    _guard: InterruptsGuard,
}

// Same unsafe impls as `std::sync::Mutex`
unsafe impl<T: ?Sized + Send> Sync for MutexIrq<T> {}
unsafe impl<T: ?Sized + Send> Send for MutexIrq<T> {}

impl<T> MutexIrq<T> {
    pub const fn new(data: T) -> MutexIrq<T> {
        MutexIrq {
            lock: Mutex::new(data),
        }
    }
}

impl<T: ?Sized> MutexIrq<T> {
    #[inline(always)]
    pub fn lock(&self) -> MutexGuardIrq<T> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            core::hint::spin_loop();
        }
    }

    #[inline(always)]
    pub fn try_lock(&self) -> Option<MutexGuardIrq<T>> {
        if self.lock.is_locked() {
            return None;
        }
        let held_irq = hold_interrupts(IntrLevel::IntrOff);
        self.lock.try_lock().map(|guard| MutexGuardIrq {
            guard,
            _guard: held_irq,
        })
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for MutexIrq<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.lock, f)
    }
}

impl<T: ?Sized> Deref for MutexGuardIrq<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: ?Sized> DerefMut for MutexGuardIrq<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
