//! Value types crossing the allocator boundary.

use std::collections::{BTreeMap, HashSet};

use acre_id::{AgentId, FrameworkId, RoleName};
use acre_resources::ResourceVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opt-in framework capabilities that gate what a framework may be
/// offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// May receive revocable (oversubscribed) resources.
    RevocableResources,
    /// May receive shared persistent volumes.
    SharedResources,
    /// May be offered resources of agents that carry gpus.
    GpuResources,
}

/// A framework's capability set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(HashSet<Capability>);

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn revocable(&self) -> bool {
        self.has(Capability::RevocableResources)
    }

    pub fn shared(&self) -> bool {
        self.has(Capability::SharedResources)
    }

    pub fn gpu(&self) -> bool {
        self.has(Capability::GpuResources)
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Registration-time description of a framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkInfo {
    pub role: RoleName,
    pub capabilities: Capabilities,
}

impl FrameworkInfo {
    pub fn new(role: RoleName) -> Self {
        Self {
            role,
            capabilities: Capabilities::none(),
        }
    }

    #[must_use]
    pub fn with_capabilities(
        mut self,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }
}

/// Registration-time description of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub hostname: String,
}

/// A scheduled maintenance window on an agent. Its presence is what makes
/// the engine ask frameworks to hand the agent's resources back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unavailability {
    pub start: DateTime<Utc>,
    /// `None` means indefinitely.
    pub duration: Option<std::time::Duration>,
}

impl Unavailability {
    pub fn starting(start: DateTime<Utc>) -> Self {
        Self {
            start,
            duration: None,
        }
    }
}

/// One round's grant to a framework: everything it was offered, per agent.
pub type OfferBundle = BTreeMap<AgentId, ResourceVector>;

/// One round's inverse offers to a framework: the agents it is being asked
/// to vacate, with their maintenance windows.
pub type InverseOfferBundle = BTreeMap<AgentId, Unavailability>;

/// Sink for offers. Receives value copies; the allocator already counts
/// the resources as allocated when this fires.
pub type OfferCallback = Box<dyn FnMut(FrameworkId, OfferBundle) + Send>;

/// Sink for inverse offers.
pub type InverseOfferCallback = Box<dyn FnMut(FrameworkId, InverseOfferBundle) + Send>;
