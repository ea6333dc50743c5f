use super::{PageReplacementPolicy, PolicyError};
use crate::{
    interrupts::mutex_irq::MutexIrq,
    swapping::{config::DEFAULT_RANDOM_SEED, frame_table::RecordId},
};
use alloc::{boxed::Box, vec, vec::Vec};

/// Linear congruential generator with the Numerical Recipes constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    const MULTIPLIER: u32 = 1_664_525;
    const INCREMENT: u32 = 1_013_904_223;

    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        self.state
    }
}

/// The generator every random policy draws from. One selection advances it
/// once, whichever process is evicting.
static RANDOM_STATE: MutexIrq<Lcg> = MutexIrq::new(Lcg::new(DEFAULT_RANDOM_SEED));

/// Reseed the kernel-wide replacement generator. Called once at boot.
pub fn seed_random(seed: u32) {
    *RANDOM_STATE.lock() = Lcg::new(seed);
}

/// Evicts a pseudo-randomly chosen resident page.
///
/// Resident pages occupy a fixed array of `capacity` slots. The generator
/// picks a slot; if that slot happens to be empty, the next occupied slot
/// (wrapping) is the victim instead.
pub struct RandomPolicy {
    slots: Box<[Option<RecordId>]>,
    len: usize,
    generator: &'static MutexIrq<Lcg>,
}

impl RandomPolicy {
    /// A policy drawing from the kernel-wide generator.
    pub fn new(capacity: usize) -> Self {
        Self::with_generator(capacity, &RANDOM_STATE)
    }

    pub fn with_generator(capacity: usize, generator: &'static MutexIrq<Lcg>) -> Self {
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            len: 0,
            generator,
        }
    }

    /// An empty policy of the same capacity that keeps drawing from the same
    /// generator.
    pub fn emptied(&self) -> Self {
        Self::with_generator(self.slots.len(), self.generator)
    }

    pub fn generator(&self) -> &'static MutexIrq<Lcg> {
        self.generator
    }

    fn slot_of(&self, record: RecordId) -> Option<usize> {
        self.slots.iter().position(|&slot| slot == Some(record))
    }
}

impl PageReplacementPolicy for RandomPolicy {
    fn on_insert(&mut self, record: RecordId) -> Result<(), PolicyError> {
        if self.slot_of(record).is_some() {
            return Err(PolicyError::AlreadyTracked);
        }
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(PolicyError::Full)?;
        *slot = Some(record);
        self.len += 1;
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn select_victim(&mut self) -> Result<RecordId, PolicyError> {
        if self.len == 0 {
            return Err(PolicyError::Empty);
        }
        let capacity = self.slots.len();
        let start = self.generator.lock().next_u32() as usize % capacity;
        (0..capacity)
            .find_map(|step| self.slots[(start + step) % capacity])
            .ok_or(PolicyError::Empty)
    }

    fn on_remove(&mut self, record: RecordId) -> Result<(), PolicyError> {
        let slot = self.slot_of(record).ok_or(PolicyError::NotTracked)?;
        self.slots[slot] = None;
        self.len -= 1;
        Ok(())
    }

    fn len(&self) -> usize {
        self.len
    }

    fn tracked(&self) -> Vec<RecordId> {
        self.slots.iter().flatten().copied().collect()
    }
}
