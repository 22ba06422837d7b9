//! Agent registry.
//!
//! Tracks every agent's total and allocated resources. The standing
//! invariant is `allocated ⊆ total`; `available` is always derived, never
//! stored, so the two can't drift.

use std::collections::{HashMap, HashSet};

use acre_id::AgentId;
use acre_resources::ResourceVector;

use crate::error::AllocatorError;
use crate::types::Unavailability;

#[derive(Debug, Clone)]
pub struct Agent {
    pub hostname: String,
    pub total: ResourceVector,
    /// Sum over all frameworks' holdings on this agent.
    pub allocated: ResourceVector,
    pub unavailability: Option<Unavailability>,
}

impl Agent {
    /// Unallocated resources: `total - allocated`.
    pub fn available(&self) -> ResourceVector {
        self.total.clone() - self.allocated.clone()
    }

    /// What a round may offer. Shared volumes are offerable even while
    /// in use, so one copy of every shared volume still in `total` is
    /// added back.
    pub fn offerable(&self) -> ResourceVector {
        let mut offerable = self.available();
        for volume in self.total.shared_volumes().iter() {
            if !offerable.contains_resource(volume) {
                offerable.push(volume.clone());
            }
        }
        offerable
    }

    /// Whether the agent's total carries any gpus. Agents with gpus are
    /// only offered to gpu-capable frameworks.
    pub fn has_gpus(&self) -> bool {
        self.total.scalar_total("gpus").is_positive()
    }
}

#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<AgentId, Agent>,
    /// Insertion order; rounds walk agents in this order.
    order: Vec<AgentId>,
    /// `None` means every agent participates.
    whitelist: Option<HashSet<String>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    pub fn insert(&mut self, id: AgentId, agent: Agent) {
        if self.agents.insert(id, agent).is_none() {
            self.order.push(id);
        }
    }

    pub fn remove(&mut self, id: &AgentId) -> Option<Agent> {
        let removed = self.agents.remove(id);
        if removed.is_some() {
            self.order.retain(|k| k != id);
        }
        removed
    }

    pub fn get(&self, id: &AgentId) -> Result<&Agent, AllocatorError> {
        self.agents.get(id).ok_or(AllocatorError::UnknownAgent(*id))
    }

    pub fn get_mut(&mut self, id: &AgentId) -> Result<&mut Agent, AllocatorError> {
        self.agents
            .get_mut(id)
            .ok_or(AllocatorError::UnknownAgent(*id))
    }

    /// Agent ids in insertion order.
    pub fn ordered_ids(&self) -> Vec<AgentId> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &Agent)> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    // ── Whitelist ───────────────────────────────────────────────────

    pub fn set_whitelist(&mut self, whitelist: Option<HashSet<String>>) {
        self.whitelist = whitelist;
    }

    pub fn is_whitelisted(&self, id: &AgentId) -> bool {
        match (&self.whitelist, self.agents.get(id)) {
            (None, _) => true,
            (Some(whitelist), Some(agent)) => whitelist.contains(&agent.hostname),
            (Some(_), None) => false,
        }
    }

    // ── Allocation bookkeeping ──────────────────────────────────────

    /// Marks resources allocated on an agent. The caller guarantees they
    /// came out of `offerable()`.
    pub fn allocate(&mut self, id: &AgentId, resources: &ResourceVector) {
        if let Some(agent) = self.agents.get_mut(id) {
            agent.allocated += resources.clone();
        }
    }

    /// Returns recovered resources to the free pool. Saturating: a stale
    /// recovery for resources no longer counted is tolerated.
    pub fn recover(&mut self, id: &AgentId, resources: &ResourceVector) {
        if let Some(agent) = self.agents.get_mut(id) {
            agent.allocated -= resources.clone();
        }
    }
}
