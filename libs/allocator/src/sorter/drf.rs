//! Weighted Dominant Resource Fairness sorter.
//!
//! Orders a set of named clients by their weighted dominant share against
//! a shared total. A client's dominant share is the largest fraction it
//! holds of any single resource; dividing by the client's weight makes
//! heavier clients look hungrier. Ties break by insertion order, which
//! keeps rounds deterministic and, over time, round-robin fair.
//!
//! The sorter keeps a per-agent breakdown of every client's allocation so
//! a later mutation can subtract exactly what was granted on one agent.

use std::collections::HashMap;
use std::hash::Hash;

use acre_id::AgentId;
use acre_resources::{Quantities, ResourceVector};

struct Client {
    weight: f64,
    active: bool,
    /// Per-agent allocation breakdown.
    allocations: HashMap<AgentId, ResourceVector>,
    /// Aggregate scalar quantities of all allocations.
    totals: Quantities,
}

/// A weighted DRF ordering over clients of key type `K`.
pub struct DrfSorter<K> {
    clients: HashMap<K, Client>,
    /// Insertion order; the deterministic tie-break.
    order: Vec<K>,
    /// The shared total the shares are computed against.
    total: Quantities,
    /// Resource names that are not fairness dimensions.
    fairness_excluded: Vec<String>,
}

impl<K: Clone + Eq + Hash> DrfSorter<K> {
    pub fn new(fairness_excluded: impl IntoIterator<Item = String>) -> Self {
        Self {
            clients: HashMap::new(),
            order: Vec::new(),
            total: Quantities::new(),
            fairness_excluded: fairness_excluded.into_iter().collect(),
        }
    }

    // ── Client lifecycle ────────────────────────────────────────────

    /// Adds an active client. A client added twice keeps its first state.
    pub fn add(&mut self, client: K, weight: f64) {
        if self.clients.contains_key(&client) {
            return;
        }
        self.clients.insert(
            client.clone(),
            Client {
                weight,
                active: true,
                allocations: HashMap::new(),
                totals: Quantities::new(),
            },
        );
        self.order.push(client);
    }

    pub fn remove(&mut self, client: &K) {
        if self.clients.remove(client).is_some() {
            self.order.retain(|k| k != client);
        }
    }

    pub fn contains(&self, client: &K) -> bool {
        self.clients.contains_key(client)
    }

    pub fn activate(&mut self, client: &K) {
        if let Some(c) = self.clients.get_mut(client) {
            c.active = true;
        }
    }

    pub fn deactivate(&mut self, client: &K) {
        if let Some(c) = self.clients.get_mut(client) {
            c.active = false;
        }
    }

    pub fn set_weight(&mut self, client: &K, weight: f64) {
        if let Some(c) = self.clients.get_mut(client) {
            c.weight = weight;
        }
    }

    // ── Allocation bookkeeping ──────────────────────────────────────

    /// Records resources granted to `client` on `agent`.
    pub fn allocated(&mut self, client: &K, agent: AgentId, resources: &ResourceVector) {
        if let Some(c) = self.clients.get_mut(client) {
            c.totals.add_all(&resources.quantities());
            *c.allocations.entry(agent).or_default() += resources.clone();
        }
    }

    /// Subtracts resources recovered from `client` on `agent`.
    pub fn unallocated(&mut self, client: &K, agent: AgentId, resources: &ResourceVector) {
        if let Some(c) = self.clients.get_mut(client) {
            c.totals.subtract_all(&resources.quantities());
            if let Some(held) = c.allocations.get_mut(&agent) {
                *held -= resources.clone();
                if held.is_empty() {
                    c.allocations.remove(&agent);
                }
            }
        }
    }

    /// Replaces `old` with `new` in the client's allocation on one agent.
    /// Used when in-place operations transform held resources.
    pub fn update(
        &mut self,
        client: &K,
        agent: AgentId,
        old: &ResourceVector,
        new: &ResourceVector,
    ) {
        self.unallocated(client, agent, old);
        self.allocated(client, agent, new);
    }

    /// The client's allocation on one agent.
    pub fn allocation_on(&self, client: &K, agent: &AgentId) -> ResourceVector {
        self.clients
            .get(client)
            .and_then(|c| c.allocations.get(agent))
            .cloned()
            .unwrap_or_default()
    }

    /// The client's full per-agent allocation breakdown.
    pub fn allocations(&self, client: &K) -> HashMap<AgentId, ResourceVector> {
        self.clients
            .get(client)
            .map(|c| c.allocations.clone())
            .unwrap_or_default()
    }

    /// Aggregate scalar quantities allocated to the client.
    pub fn allocation_totals(&self, client: &K) -> Quantities {
        self.clients
            .get(client)
            .map(|c| c.totals.clone())
            .unwrap_or_default()
    }

    // ── Shared total ────────────────────────────────────────────────

    pub fn add_total(&mut self, delta: &Quantities) {
        self.total.add_all(delta);
    }

    pub fn subtract_total(&mut self, delta: &Quantities) {
        self.total.subtract_all(delta);
    }

    pub fn total(&self) -> &Quantities {
        &self.total
    }

    // ── Ordering ────────────────────────────────────────────────────

    /// The client's weighted dominant share.
    pub fn weighted_share_of(&self, client: &K) -> f64 {
        self.clients
            .get(client)
            .map(|c| self.share(c))
            .unwrap_or(0.0)
    }

    fn share(&self, client: &Client) -> f64 {
        let mut dominant: f64 = 0.0;
        for (name, held) in client.totals.iter() {
            if self.fairness_excluded.iter().any(|excluded| excluded == name) {
                continue;
            }
            let total = self.total.get(name);
            if total.is_positive() {
                dominant = dominant.max(held.as_f64() / total.as_f64());
            }
        }
        dominant / client.weight
    }

    /// Active clients in ascending weighted dominant share order; equal
    /// shares keep insertion order.
    pub fn sort(&self) -> Vec<K> {
        let mut shares: Vec<(K, f64)> = self
            .order
            .iter()
            .filter(|k| self.clients[*k].active)
            .map(|k| (k.clone(), self.share(&self.clients[k])))
            .collect();
        // Stable sort preserves the insertion-order tie-break.
        shares.sort_by(|(_, a), (_, b)| a.total_cmp(b));
        shares.into_iter().map(|(k, _)| k).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn has_active(&self) -> bool {
        self.clients.values().any(|c| c.active)
    }
}
