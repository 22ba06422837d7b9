//! Framework registry.

use std::collections::HashMap;

use acre_id::{FrameworkId, RoleName};

use crate::error::AllocatorError;
use crate::types::Capabilities;

/// Per-framework allocator state. Allocation breakdowns live in the role
/// tree's sorters; this is identity and gating state only.
#[derive(Debug, Clone)]
pub struct Framework {
    pub role: RoleName,
    pub capabilities: Capabilities,
    /// Disconnected frameworks are inactive: they keep their allocations
    /// but receive no offers.
    pub active: bool,
    /// A suppressed framework asked to be left alone until it revives.
    pub suppressed: bool,
}

impl Framework {
    /// Whether the framework should appear in its role's sorter ordering.
    pub fn schedulable(&self) -> bool {
        self.active && !self.suppressed
    }
}

#[derive(Default)]
pub struct FrameworkRegistry {
    frameworks: HashMap<FrameworkId, Framework>,
}

impl FrameworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &FrameworkId) -> bool {
        self.frameworks.contains_key(id)
    }

    pub fn insert(&mut self, id: FrameworkId, framework: Framework) {
        self.frameworks.insert(id, framework);
    }

    pub fn remove(&mut self, id: &FrameworkId) -> Option<Framework> {
        self.frameworks.remove(id)
    }

    pub fn get(&self, id: &FrameworkId) -> Result<&Framework, AllocatorError> {
        self.frameworks
            .get(id)
            .ok_or(AllocatorError::UnknownFramework(*id))
    }

    pub fn get_mut(&mut self, id: &FrameworkId) -> Result<&mut Framework, AllocatorError> {
        self.frameworks
            .get_mut(id)
            .ok_or(AllocatorError::UnknownFramework(*id))
    }

    pub fn len(&self) -> usize {
        self.frameworks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FrameworkId, &Framework)> {
        self.frameworks.iter()
    }
}
