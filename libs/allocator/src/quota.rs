//! Per-role quota guarantees.
//!
//! A guarantee is a floor, not a limit: the engine first satisfies
//! guarantees (stage A) and then withholds enough of the free pool that a
//! temporarily-declining quota'ed role can still reach its floor later.
//! Only scalar resources participate; a guarantee over ports would be
//! meaningless.

use std::collections::HashMap;

use acre_id::RoleName;
use acre_resources::Quantities;

/// The registered quota guarantees.
#[derive(Default)]
pub struct QuotaBook {
    guarantees: HashMap<RoleName, Quantities>,
}

impl QuotaBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, role: RoleName, guarantee: Quantities) {
        self.guarantees.insert(role, guarantee);
    }

    pub fn remove(&mut self, role: &RoleName) -> Option<Quantities> {
        self.guarantees.remove(role)
    }

    pub fn get(&self, role: &RoleName) -> Option<&Quantities> {
        self.guarantees.get(role)
    }

    pub fn contains(&self, role: &RoleName) -> bool {
        self.guarantees.contains_key(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoleName, &Quantities)> {
        self.guarantees.iter()
    }

    /// `max(0, guarantee - charged)` componentwise.
    pub fn unsatisfied(&self, role: &RoleName, charged: &Quantities) -> Quantities {
        match self.guarantees.get(role) {
            Some(guarantee) => guarantee.saturating_sub(charged),
            None => Quantities::new(),
        }
    }
}
