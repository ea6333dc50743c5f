use core::fmt;

/// Pages a process may keep resident before the pager starts evicting.
pub const RESIDENT_CAP: usize = 15;
/// Pages (resident and swapped) a process may own in total.
pub const MAX_TOTAL_PAGES: usize = 30;
/// Seed the random replacement generator starts from until it is reseeded
/// at boot.
pub const DEFAULT_RANDOM_SEED: u32 = 1;

/// Victim selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Fifo,
    Random,
    Lru,
}

impl PolicyKind {
    #[cfg(feature = "fifo")]
    pub const DEFAULT: Self = Self::Fifo;
    #[cfg(all(feature = "random", not(feature = "fifo")))]
    pub const DEFAULT: Self = Self::Random;
    #[cfg(not(any(feature = "fifo", feature = "random")))]
    pub const DEFAULT: Self = Self::Lru;
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PolicyKind::Fifo => write!(f, "FIFO"),
            PolicyKind::Random => write!(f, "RANDOM"),
            PolicyKind::Lru => write!(f, "LRU"),
        }
    }
}

/// Per-process paging limits and policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
    /// Eviction starts once this many pages are resident.
    pub resident_cap: usize,
    /// Hard ceiling on resident plus swapped pages.
    pub max_total_pages: usize,
    /// Size of the swap file, in pages.
    pub swap_slots: usize,
    pub policy: PolicyKind,
    /// Terminate the faulting process when physical memory runs out instead
    /// of asking the trap path to retry the fault.
    pub kill_on_oom: bool,
}

impl PagingConfig {
    pub const DEFAULT: Self = Self {
        resident_cap: RESIDENT_CAP,
        max_total_pages: MAX_TOTAL_PAGES,
        swap_slots: MAX_TOTAL_PAGES,
        policy: PolicyKind::DEFAULT,
        kill_on_oom: true,
    };

    pub const fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    /// Limits sized for `resident_cap` resident pages out of
    /// `max_total_pages`, with a swap file large enough to never run out.
    pub const fn with_limits(mut self, resident_cap: usize, max_total_pages: usize) -> Self {
        self.resident_cap = resident_cap;
        self.max_total_pages = max_total_pages;
        self.swap_slots = max_total_pages;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resident_cap == 0 {
            return Err(ConfigError::ZeroResidentCap);
        }
        if self.resident_cap > self.max_total_pages {
            return Err(ConfigError::ResidentCapAboveTotal);
        }
        if self.swap_slots < self.min_swap_slots() {
            return Err(ConfigError::SwapTooSmall);
        }
        Ok(())
    }

    /// Every page that cannot stay resident needs a slot, plus one more
    /// because an eviction claims the victim's slot before the faulting page
    /// gives up its own.
    pub const fn min_swap_slots(&self) -> usize {
        if self.resident_cap < self.max_total_pages {
            self.max_total_pages - self.resident_cap + 1
        } else {
            0
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    ZeroResidentCap,
    ResidentCapAboveTotal,
    SwapTooSmall,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ZeroResidentCap => write!(f, "resident cap must be at least one page"),
            Self::ResidentCapAboveTotal => write!(f, "resident cap exceeds the total page limit"),
            Self::SwapTooSmall => write!(f, "swap file cannot hold every non-resident page"),
        }
    }
}

impl core::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(PagingConfig::default().validate(), Ok(()));
        assert_eq!(PagingConfig::DEFAULT.resident_cap, 15);
        assert_eq!(PagingConfig::DEFAULT.max_total_pages, 30);
    }

    #[test]
    fn rejects_bad_limits() {
        let config = PagingConfig::DEFAULT.with_limits(0, 4);
        assert_eq!(config.validate(), Err(ConfigError::ZeroResidentCap));

        let config = PagingConfig::DEFAULT.with_limits(5, 4);
        assert_eq!(config.validate(), Err(ConfigError::ResidentCapAboveTotal));

        let mut config = PagingConfig::DEFAULT.with_limits(2, 10);
        config.swap_slots = 8;
        assert_eq!(config.validate(), Err(ConfigError::SwapTooSmall));
        config.swap_slots = 9;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn equal_limits_are_allowed() {
        let mut config = PagingConfig::DEFAULT.with_limits(4, 4);
        config.swap_slots = 0;
        // Nothing is ever evicted, so no swap is needed.
        assert_eq!(config.validate(), Ok(()));
    }
}
