//! ATA driver tuning
//!
//! Poll budgets and settle delays are not mandated by hardware; they bound
//! how long the driver spins before reporting a timeout. Each poll
//! iteration is one status register read.

/// Tunable timing parameters for one channel
#[derive(Debug, Clone, Copy)]
pub struct AtaConfig {
    /// Status reads allowed for BSY to clear after a software reset
    pub reset_budget: u32,
    /// Status reads allowed per wait during commands
    pub poll_budget: u32,
    /// Alternate status reads after drive select or a command (~400ns)
    pub settle_reads: u32,
    /// Alternate status reads while SRST is held (~5us)
    pub reset_hold_reads: u32,
    /// Called between poll iterations; a scheduler can yield here
    pub relax: fn(),
}

impl AtaConfig {
    pub const DEFAULT: Self = Self {
        reset_budget: 1_000_000,
        poll_budget: 100_000,
        settle_reads: 4,
        reset_hold_reads: 50,
        relax: core::hint::spin_loop,
    };

    pub const fn with_poll_budget(mut self, budget: u32) -> Self {
        self.poll_budget = budget;
        self
    }

    pub const fn with_reset_budget(mut self, budget: u32) -> Self {
        self.reset_budget = budget;
        self
    }

    pub const fn with_relax(mut self, relax: fn()) -> Self {
        self.relax = relax;
        self
    }
}

impl Default for AtaConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
