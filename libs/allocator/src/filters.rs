//! Per-framework decline filters.
//!
//! When a framework declines an offer with a refuse timeout, a filter is
//! installed so the same resources are not offered right back. A filter
//! only dies once its wall-clock deadline has passed AND a full allocation
//! round has completed after that deadline. Without the second condition a
//! refuse timeout shorter than the batch interval would expire in the gap
//! between rounds and the framework would see the identical offer again
//! next tick.

use std::collections::HashMap;
use std::time::Duration;

use acre_id::{AgentId, FrameworkId};
use acre_resources::ResourceVector;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct OfferFilter {
    agent: AgentId,
    resources: ResourceVector,
    deadline: Instant,
}

#[derive(Debug)]
struct InverseOfferFilter {
    agent: AgentId,
    deadline: Instant,
}

/// All active offer and inverse-offer filters, by framework.
#[derive(Default)]
pub struct FilterBook {
    offer: HashMap<FrameworkId, Vec<OfferFilter>>,
    inverse: HashMap<FrameworkId, Vec<InverseOfferFilter>>,
}

impl FilterBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a decline filter.
    pub fn install_offer_filter(
        &mut self,
        framework: FrameworkId,
        agent: AgentId,
        resources: ResourceVector,
        refuse: Duration,
    ) {
        debug!(%framework, %agent, refuse_secs = refuse.as_secs_f64(), "installing offer filter");
        self.offer.entry(framework).or_default().push(OfferFilter {
            agent,
            resources,
            deadline: Instant::now() + refuse,
        });
    }

    /// Whether a candidate offer is blocked by an active filter: same
    /// agent, and the candidate is a subset of what was declined.
    pub fn is_filtered(
        &self,
        framework: &FrameworkId,
        agent: &AgentId,
        candidate: &ResourceVector,
    ) -> bool {
        self.offer
            .get(framework)
            .is_some_and(|filters| {
                filters
                    .iter()
                    .any(|f| f.agent == *agent && f.resources.contains(candidate))
            })
    }

    /// Installs a rate-limit filter on inverse offers for one agent.
    pub fn install_inverse_filter(
        &mut self,
        framework: FrameworkId,
        agent: AgentId,
        refuse: Duration,
    ) {
        self.inverse
            .entry(framework)
            .or_default()
            .push(InverseOfferFilter {
                agent,
                deadline: Instant::now() + refuse,
            });
    }

    pub fn is_inverse_filtered(&self, framework: &FrameworkId, agent: &AgentId) -> bool {
        self.inverse
            .get(framework)
            .is_some_and(|filters| filters.iter().any(|f| f.agent == *agent))
    }

    /// Sweeps out filters whose deadline had already passed when the last
    /// round completed. Called at the start of every round with the
    /// previous round's completion time.
    pub fn expire(&mut self, last_round_completed: Instant) {
        for filters in self.offer.values_mut() {
            filters.retain(|f| f.deadline > last_round_completed);
        }
        self.offer.retain(|_, filters| !filters.is_empty());

        for filters in self.inverse.values_mut() {
            filters.retain(|f| f.deadline > last_round_completed);
        }
        self.inverse.retain(|_, filters| !filters.is_empty());
    }

    /// Drops every filter a framework holds (revival, reconnection).
    pub fn clear_framework(&mut self, framework: &FrameworkId) {
        self.offer.remove(framework);
        self.inverse.remove(framework);
    }

    /// Drops all filters referring to a removed agent.
    pub fn clear_agent(&mut self, agent: &AgentId) {
        for filters in self.offer.values_mut() {
            filters.retain(|f| f.agent != *agent);
        }
        for filters in self.inverse.values_mut() {
            filters.retain(|f| f.agent != *agent);
        }
    }

    /// Drops inverse-offer filters for one agent across frameworks; used
    /// when its maintenance schedule changes.
    pub fn clear_inverse_for_agent(&mut self, agent: &AgentId) {
        for filters in self.inverse.values_mut() {
            filters.retain(|f| f.agent != *agent);
        }
    }
}
