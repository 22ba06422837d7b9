//! Allocator tuning knobs.

use std::collections::HashSet;
use std::time::Duration;

use acre_resources::Scalar;

/// Smallest cpu slice worth offering on its own.
pub const MIN_ALLOCATABLE_CPUS: Scalar = Scalar::millis(10);

/// Smallest memory amount (in MB) worth offering on its own.
pub const MIN_ALLOCATABLE_MEM: Scalar = Scalar::units(32);

/// Configuration the allocator is started with.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Cadence of batch allocation rounds.
    pub allocation_interval: Duration,

    /// Resource names excluded from the dominant-share choice. Excluded
    /// resources are still tracked in allocations; they just stop being a
    /// fairness dimension (the classic case is `gpus`).
    pub fairness_excluded: HashSet<String>,

    /// An agent slice below both thresholds is not offered at all, which
    /// stops tiny leftovers from dribbling out as useless offers.
    pub min_allocatable_cpus: Scalar,
    pub min_allocatable_mem: Scalar,

    /// Whether quota'ed roles without any registered framework still lay
    /// away headroom. Off by default: an absent role cannot use what is
    /// withheld for it.
    pub headroom_for_empty_roles: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            allocation_interval: Duration::from_secs(1),
            fairness_excluded: HashSet::new(),
            min_allocatable_cpus: MIN_ALLOCATABLE_CPUS,
            min_allocatable_mem: MIN_ALLOCATABLE_MEM,
            headroom_for_empty_roles: false,
        }
    }
}

impl AllocatorConfig {
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.allocation_interval = interval;
        self
    }

    #[must_use]
    pub fn exclude_from_fairness(mut self, name: impl Into<String>) -> Self {
        self.fairness_excluded.insert(name.into());
        self
    }
}
