//! Allocator state and the round function.
//!
//! `AllocatorState` owns every registry and applies mutations atomically:
//! a failed mutation returns a typed error with nothing changed. The
//! round function walks agents in insertion order and, for each agent,
//! re-sorts the role tree, so every grant immediately influences the next
//! pick. Rounds never fail; ineligible candidates are skipped.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use acre_id::{AgentId, FrameworkId, RoleName};
use acre_resources::{Operation, Quantities, ResourceVector};
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::agents::{Agent, AgentRegistry};
use crate::config::AllocatorConfig;
use crate::error::AllocatorError;
use crate::filters::FilterBook;
use crate::frameworks::{Framework, FrameworkRegistry};
use crate::quota::QuotaBook;
use crate::roles::RoleTree;
use crate::types::{
    AgentInfo, Capability, FrameworkInfo, InverseOfferBundle, OfferBundle, Unavailability,
};

/// Everything one completed round decided.
#[derive(Debug, Default)]
pub struct RoundOutcome {
    pub offers: BTreeMap<FrameworkId, OfferBundle>,
    pub inverse_offers: BTreeMap<FrameworkId, InverseOfferBundle>,
}

/// The allocator's entire mutable state. Owned by a single task; see the
/// `process` module for the command loop around it.
pub struct AllocatorState {
    config: AllocatorConfig,
    agents: AgentRegistry,
    frameworks: FrameworkRegistry,
    roles: RoleTree,
    filters: FilterBook,
    quotas: QuotaBook,
    rounds_completed: u64,
    last_round_completed: Option<Instant>,
}

impl AllocatorState {
    pub fn new(config: AllocatorConfig) -> Self {
        let fairness_excluded: HashSet<String> = config.fairness_excluded.clone();
        Self {
            config,
            agents: AgentRegistry::new(),
            frameworks: FrameworkRegistry::new(),
            roles: RoleTree::new(fairness_excluded),
            filters: FilterBook::new(),
            quotas: QuotaBook::new(),
            rounds_completed: 0,
            last_round_completed: None,
        }
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    // =========================================================================
    // Framework lifecycle
    // =========================================================================

    pub fn add_framework(
        &mut self,
        id: FrameworkId,
        info: FrameworkInfo,
        used: HashMap<AgentId, ResourceVector>,
        active: bool,
    ) -> Result<(), AllocatorError> {
        if self.frameworks.contains(&id) {
            return Err(AllocatorError::FrameworkExists(id));
        }

        let role = info.role.clone();
        self.roles.add_framework(&role, id);
        self.frameworks.insert(
            id,
            Framework {
                role: role.clone(),
                capabilities: info.capabilities,
                active,
                suppressed: false,
            },
        );

        // Seed holdings reported at registration (coordinator fail-over).
        // Holdings on agents we have not seen yet arrive with the agent.
        let quota_role = self.quotas.contains(&role);
        for (agent_id, resources) in used {
            if !self.agents.contains(&agent_id) {
                continue;
            }
            self.roles
                .allocated(&role, &id, agent_id, &resources, quota_role);
            self.agents.allocate(&agent_id, &resources);
        }

        if !active {
            self.roles.deactivate_framework(&role, &id);
        }

        info!(framework = %id, %role, active, "added framework");
        Ok(())
    }

    pub fn remove_framework(&mut self, id: FrameworkId) -> Result<(), AllocatorError> {
        let framework = self.frameworks.get(&id)?;
        let role = framework.role.clone();
        let quota_role = self.quotas.contains(&role);

        for (agent_id, resources) in self.roles.framework_allocations(&role, &id) {
            self.agents.recover(&agent_id, &resources);
            self.roles
                .recovered(&role, &id, agent_id, &resources, quota_role);
        }

        self.roles.remove_framework(&role, &id);
        self.filters.clear_framework(&id);
        self.frameworks.remove(&id);

        info!(framework = %id, %role, "removed framework");
        Ok(())
    }

    pub fn activate_framework(&mut self, id: FrameworkId) -> Result<(), AllocatorError> {
        let framework = self.frameworks.get_mut(&id)?;
        framework.active = true;
        if framework.schedulable() {
            let role = framework.role.clone();
            self.roles.activate_framework(&role, &id);
        }
        debug!(framework = %id, "activated framework");
        Ok(())
    }

    /// A disconnected framework keeps its allocations but drops out of
    /// the ordering. Its filters and suppression are reset so a
    /// reconnect starts fresh.
    pub fn deactivate_framework(&mut self, id: FrameworkId) -> Result<(), AllocatorError> {
        let framework = self.frameworks.get_mut(&id)?;
        framework.active = false;
        framework.suppressed = false;
        let role = framework.role.clone();
        self.roles.deactivate_framework(&role, &id);
        self.filters.clear_framework(&id);
        debug!(framework = %id, "deactivated framework");
        Ok(())
    }

    pub fn update_framework(
        &mut self,
        id: FrameworkId,
        info: FrameworkInfo,
    ) -> Result<(), AllocatorError> {
        let framework = self.frameworks.get_mut(&id)?;
        if framework.role != info.role {
            return Err(AllocatorError::RoleChange {
                framework: id,
                from: framework.role.clone(),
                to: info.role,
            });
        }
        framework.capabilities = info.capabilities;
        Ok(())
    }

    // =========================================================================
    // Agent lifecycle
    // =========================================================================

    pub fn add_agent(
        &mut self,
        id: AgentId,
        info: AgentInfo,
        unavailability: Option<Unavailability>,
        total: ResourceVector,
        used: HashMap<FrameworkId, ResourceVector>,
    ) -> Result<(), AllocatorError> {
        if self.agents.contains(&id) {
            return Err(AllocatorError::AgentExists(id));
        }
        for resource in total.iter() {
            resource.validate()?;
        }

        self.roles.agent_added(&total);

        let mut allocated = ResourceVector::new();
        for (framework_id, resources) in used {
            let Ok(framework) = self.frameworks.get(&framework_id) else {
                // The framework may re-register later and report this
                // holding itself.
                continue;
            };
            let role = framework.role.clone();
            let quota_role = self.quotas.contains(&role);
            self.roles
                .allocated(&role, &framework_id, id, &resources, quota_role);
            allocated += resources;
        }

        self.agents.insert(
            id,
            Agent {
                hostname: info.hostname,
                total: total.clone(),
                allocated,
                unavailability,
            },
        );

        info!(agent = %id, total = %total, "added agent");
        Ok(())
    }

    pub fn remove_agent(&mut self, id: AgentId) -> Result<(), AllocatorError> {
        let agent = self.agents.get(&id)?;
        let total = agent.total.clone();

        // The agent's resources are gone, so nothing can stay charged to
        // the frameworks that held them.
        let holders: Vec<(FrameworkId, RoleName)> = self
            .frameworks
            .iter()
            .map(|(framework_id, framework)| (*framework_id, framework.role.clone()))
            .collect();
        for (framework_id, role) in holders {
            let held = self.roles.framework_allocation_on(&role, &framework_id, &id);
            if !held.is_empty() {
                let quota_role = self.quotas.contains(&role);
                self.roles
                    .recovered(&role, &framework_id, id, &held, quota_role);
            }
        }

        self.roles.agent_removed(&total);
        self.filters.clear_agent(&id);
        self.agents.remove(&id);

        info!(agent = %id, "removed agent");
        Ok(())
    }

    /// Swaps the agent's oversubscription: the revocable part of `total`
    /// is replaced wholesale by `oversubscribed`.
    pub fn update_agent(
        &mut self,
        id: AgentId,
        oversubscribed: ResourceVector,
    ) -> Result<(), AllocatorError> {
        let agent = self.agents.get_mut(&id)?;
        let old_total = agent.total.clone();
        let new_total = old_total.non_revocable() + oversubscribed.revocable();
        agent.total = new_total.clone();
        self.roles.agent_updated(&old_total, &new_total);

        debug!(agent = %id, total = %new_total, "updated agent oversubscription");
        Ok(())
    }

    pub fn update_whitelist(&mut self, whitelist: Option<HashSet<String>>) {
        match &whitelist {
            Some(hostnames) => info!(count = hostnames.len(), "updated agent whitelist"),
            None => info!("cleared agent whitelist"),
        }
        self.agents.set_whitelist(whitelist);
    }

    pub fn update_unavailability(
        &mut self,
        id: AgentId,
        unavailability: Option<Unavailability>,
    ) -> Result<(), AllocatorError> {
        let agent = self.agents.get_mut(&id)?;
        agent.unavailability = unavailability;
        // A changed window restarts the inverse-offer conversation.
        self.filters.clear_inverse_for_agent(&id);
        debug!(agent = %id, "updated unavailability");
        Ok(())
    }

    // =========================================================================
    // Resource mutations
    // =========================================================================

    /// Applies in-place operations to `consumed`, a subset of what the
    /// framework holds on the agent. Left to right, atomic, and
    /// value-preserving.
    pub fn update_allocation(
        &mut self,
        framework_id: FrameworkId,
        agent_id: AgentId,
        consumed: ResourceVector,
        operations: Vec<Operation>,
    ) -> Result<(), AllocatorError> {
        let framework = self.frameworks.get(&framework_id)?;
        let role = framework.role.clone();
        let capabilities = framework.capabilities.clone();
        self.agents.get(&agent_id)?;

        // Creating a shared volume is gated on the shared capability.
        for operation in &operations {
            if let Operation::Create { volumes } = operation {
                if volumes.iter().any(|v| v.shared) && !capabilities.shared() {
                    return Err(AllocatorError::CapabilityMismatch {
                        framework: framework_id,
                        capability: Capability::SharedResources,
                    });
                }
            }
        }

        let held = self
            .roles
            .framework_allocation_on(&role, &framework_id, &agent_id);
        let remainder = held.try_sub(&consumed)?;

        let updated_consumed = consumed.apply_all(&operations)?;
        if consumed.quantities() != updated_consumed.quantities() {
            return Err(AllocatorError::NotValuePreserving {
                before: consumed.quantities().to_string(),
                after: updated_consumed.quantities().to_string(),
            });
        }

        // Compute every new value before committing anything, so a
        // failure (e.g. a persistence id already taken by another
        // framework on this agent) leaves state untouched.
        let agent = self.agents.get(&agent_id)?;
        let new_total = agent.total.apply_all(&operations)?;
        let new_allocated = agent.allocated.try_sub(&consumed)? + updated_consumed.clone();
        let new_held = remainder + updated_consumed;

        let quota_role = self.quotas.contains(&role);
        self.roles
            .updated(&role, &framework_id, agent_id, &held, &new_held, quota_role);
        let agent = self.agents.get_mut(&agent_id)?;
        agent.total = new_total;
        agent.allocated = new_allocated;

        debug!(framework = %framework_id, agent = %agent_id, ops = operations.len(),
               "applied operations to allocation");
        Ok(())
    }

    /// Applies operator-initiated operations to an agent's free slice.
    pub fn update_available(
        &mut self,
        agent_id: AgentId,
        operations: Vec<Operation>,
    ) -> Result<(), AllocatorError> {
        let agent = self.agents.get(&agent_id)?;
        let available = agent.available();
        let updated_available = available.apply_all(&operations)?;
        if available.quantities() != updated_available.quantities() {
            return Err(AllocatorError::NotValuePreserving {
                before: available.quantities().to_string(),
                after: updated_available.quantities().to_string(),
            });
        }

        let new_total = agent.total.try_sub(&available)? + updated_available;
        let agent = self.agents.get_mut(&agent_id)?;
        agent.total = new_total;

        debug!(agent = %agent_id, ops = operations.len(), "applied operations to available");
        Ok(())
    }

    /// Returns declined or freed resources to the pool, optionally
    /// installing a decline filter.
    pub fn recover_resources(
        &mut self,
        framework_id: FrameworkId,
        agent_id: AgentId,
        resources: ResourceVector,
        refuse: Option<Duration>,
    ) {
        if resources.is_empty() {
            return;
        }

        // Either side may already be gone; recover what still exists.
        if let Ok(framework) = self.frameworks.get(&framework_id) {
            let role = framework.role.clone();
            let held = self
                .roles
                .framework_allocation_on(&role, &framework_id, &agent_id);
            if !held.is_empty() {
                let quota_role = self.quotas.contains(&role);
                self.roles
                    .recovered(&role, &framework_id, agent_id, &resources, quota_role);
            }
        }
        self.agents.recover(&agent_id, &resources);

        match refuse {
            Some(timeout) if !timeout.is_zero() => {
                self.filters
                    .install_offer_filter(framework_id, agent_id, resources, timeout);
            }
            _ => {}
        }
    }

    pub fn suppress_offers(&mut self, id: FrameworkId) -> Result<(), AllocatorError> {
        let framework = self.frameworks.get_mut(&id)?;
        framework.suppressed = true;
        let role = framework.role.clone();
        self.roles.deactivate_framework(&role, &id);
        debug!(framework = %id, "suppressed offers");
        Ok(())
    }

    /// Drops all filters and the suppressed bit. Idempotent: reviving an
    /// unsuppressed framework is a no-op apart from the filter sweep.
    pub fn revive_offers(&mut self, id: FrameworkId) -> Result<(), AllocatorError> {
        let framework = self.frameworks.get_mut(&id)?;
        framework.suppressed = false;
        let schedulable = framework.schedulable();
        let role = framework.role.clone();
        self.filters.clear_framework(&id);
        if schedulable {
            self.roles.activate_framework(&role, &id);
        }
        debug!(framework = %id, "revived offers");
        Ok(())
    }

    /// A framework's reply to an inverse offer; a refuse timeout installs
    /// a rate-limit on further inverse offers for the agent.
    pub fn update_inverse_offer(
        &mut self,
        framework_id: FrameworkId,
        agent_id: AgentId,
        refuse: Option<Duration>,
    ) -> Result<(), AllocatorError> {
        self.frameworks.get(&framework_id)?;
        self.agents.get(&agent_id)?;
        if let Some(timeout) = refuse {
            if !timeout.is_zero() {
                self.filters
                    .install_inverse_filter(framework_id, agent_id, timeout);
            }
        }
        Ok(())
    }

    /// Advisory; the engine allocates on its own schedule.
    pub fn request_resources(&mut self, id: FrameworkId, resources: ResourceVector) {
        debug!(framework = %id, %resources, "ignoring resource request (advisory)");
    }

    // =========================================================================
    // Quota & weights
    // =========================================================================

    /// Registers a guarantee. A guarantee the cluster cannot currently
    /// meet is accepted and simply stays unsatisfied.
    pub fn set_quota(&mut self, role: RoleName, guarantee: ResourceVector) {
        let quantities = guarantee.quantities();
        info!(%role, guarantee = %quantities, "set quota");
        self.quotas.set(role.clone(), quantities);
        self.roles.quota_added(&role);
    }

    pub fn remove_quota(&mut self, role: RoleName) {
        info!(%role, "removed quota");
        self.quotas.remove(&role);
        self.roles.quota_removed(&role);
    }

    /// Updates role weights. Returns whether any affected role has
    /// frameworks, i.e. whether the change can alter the next round.
    pub fn update_weights(&mut self, weights: Vec<(RoleName, f64)>) -> bool {
        let mut affects_allocations = false;
        for (role, weight) in weights {
            affects_allocations |= self.roles.has_frameworks(&role);
            info!(%role, weight, "updated weight");
            self.roles.set_weight(role, weight);
        }
        affects_allocations
    }

    // =========================================================================
    // The round
    // =========================================================================

    /// Runs one allocation round: quota first, then fair sharing of the
    /// free pool, then inverse offers for agents going unavailable.
    pub fn run_round(&mut self) -> RoundOutcome {
        // Filters die only after their deadline has passed AND a round
        // has completed since; sweeping against the previous round's
        // completion time is exactly that rule.
        if let Some(completed) = self.last_round_completed {
            self.filters.expire(completed);
        }

        let eligible: Vec<AgentId> = self
            .agents
            .ordered_ids()
            .into_iter()
            .filter(|id| self.agents.is_whitelisted(id))
            .collect();

        let mut outcome = RoundOutcome::default();
        self.quota_stage(&eligible, &mut outcome);
        self.fair_share_stage(&eligible, &mut outcome);
        self.inverse_offer_stage(&mut outcome);

        self.rounds_completed += 1;
        self.last_round_completed = Some(Instant::now());

        if !outcome.offers.is_empty() || !outcome.inverse_offers.is_empty() {
            debug!(
                round = self.rounds_completed,
                offers = outcome.offers.len(),
                inverse_offers = outcome.inverse_offers.len(),
                "allocation round complete"
            );
        }
        outcome
    }

    /// Everything a role's quota is charged for: its frameworks'
    /// non-revocable allocations plus resources reserved to the role that
    /// nobody holds yet.
    fn charged(&self, role: &RoleName) -> Quantities {
        let mut charged = self.roles.quota_allocation_totals(role);
        for (_, agent) in self.agents.iter() {
            charged.add_all(&agent.available().reserved(role).non_revocable().quantities());
        }
        charged
    }

    /// Whether a slice is worth offering at all.
    fn allocatable(&self, resources: &ResourceVector) -> bool {
        resources.scalar_total("cpus") >= self.config.min_allocatable_cpus
            || resources.scalar_total("mem") >= self.config.min_allocatable_mem
    }

    fn grant(
        &mut self,
        role: &RoleName,
        framework_id: FrameworkId,
        agent_id: AgentId,
        resources: ResourceVector,
        outcome: &mut RoundOutcome,
    ) {
        trace!(framework = %framework_id, agent = %agent_id, %resources, "granting");
        self.agents.allocate(&agent_id, &resources);
        let quota_role = self.quotas.contains(role);
        self.roles
            .allocated(role, &framework_id, agent_id, &resources, quota_role);

        let bundle = outcome.offers.entry(framework_id).or_default();
        let entry = bundle.entry(agent_id).or_default();
        *entry += resources;
    }

    /// Stage A: walk quota'ed roles in ascending share and hand their
    /// frameworks whole agent slices until every guarantee is met.
    /// Coarse-grained: the last grant may overshoot the guarantee.
    fn quota_stage(&mut self, eligible: &[AgentId], outcome: &mut RoundOutcome) {
        for agent_id in eligible {
            for role in self.roles.sorted_quota_roles() {
                if !self.roles.has_active_frameworks(&role) {
                    continue;
                }
                let Some(guarantee) = self.quotas.get(&role).cloned() else {
                    continue;
                };
                if self.charged(&role).contains(&guarantee) {
                    continue;
                }

                for framework_id in self.roles.sorted_frameworks(&role) {
                    let Ok(framework) = self.frameworks.get(&framework_id) else {
                        continue;
                    };
                    let capabilities = framework.capabilities.clone();
                    let Ok(agent) = self.agents.get(agent_id) else {
                        continue;
                    };
                    if agent.has_gpus() && !capabilities.gpu() {
                        continue;
                    }

                    let offerable = agent.offerable();
                    // Quota is satisfied from non-revocable resources:
                    // a guarantee backed by revocable resources would be
                    // no guarantee at all.
                    let mut candidate =
                        (offerable.unreserved() + offerable.reserved(&role)).non_revocable();
                    if !capabilities.shared() {
                        candidate = candidate.non_shared();
                    }

                    if !self.allocatable(&candidate) {
                        continue;
                    }
                    if self.filters.is_filtered(&framework_id, agent_id, &candidate) {
                        continue;
                    }

                    self.grant(&role, framework_id, *agent_id, candidate, outcome);
                }
            }
        }
    }

    /// Stage B: fair-share the remaining pool, withholding enough
    /// unreserved headroom that unsatisfied guarantees stay satisfiable.
    fn fair_share_stage(&mut self, eligible: &[AgentId], outcome: &mut RoundOutcome) {
        // Headroom still owed to quota'ed roles after stage A.
        let mut required_headroom = Quantities::new();
        for (role, _) in self.quotas.iter() {
            if !self.config.headroom_for_empty_roles && !self.roles.has_frameworks(role) {
                continue;
            }
            required_headroom.add_all(&self.quotas.unsatisfied(role, &self.charged(role)));
        }

        // The pool headroom can come from: unreserved, unallocated
        // resources anywhere in the cluster. Reserved resources cannot
        // back another role's guarantee.
        let mut pool = Quantities::new();
        for (_, agent) in self.agents.iter() {
            pool.add_all(&agent.available().unreserved().quantities());
        }
        pool.subtract_all(&required_headroom);

        for agent_id in eligible {
            for role in self.roles.sorted_roles() {
                for framework_id in self.roles.sorted_frameworks(&role) {
                    let Ok(framework) = self.frameworks.get(&framework_id) else {
                        continue;
                    };
                    let capabilities = framework.capabilities.clone();
                    let Ok(agent) = self.agents.get(agent_id) else {
                        continue;
                    };
                    if agent.has_gpus() && !capabilities.gpu() {
                        continue;
                    }

                    let offerable = agent.offerable();
                    let mut candidate = offerable.unreserved() + offerable.reserved(&role);
                    if !capabilities.revocable() {
                        candidate = candidate.non_revocable();
                    }
                    if !capabilities.shared() {
                        candidate = candidate.non_shared();
                    }

                    if !self.allocatable(&candidate) {
                        continue;
                    }
                    if self.filters.is_filtered(&framework_id, agent_id, &candidate) {
                        continue;
                    }

                    // Only the unreserved part draws down the headroom
                    // pool; the reserved part could never serve another
                    // role anyway.
                    let unreserved_quantities = candidate.unreserved().quantities();
                    if !pool.contains(&unreserved_quantities) {
                        trace!(framework = %framework_id, agent = %agent_id,
                               "skipping grant to protect quota headroom");
                        continue;
                    }
                    pool.subtract_all(&unreserved_quantities);

                    self.grant(&role, framework_id, *agent_id, candidate, outcome);
                }
            }
        }
    }

    /// Stage C: ask frameworks to vacate agents with scheduled
    /// maintenance. An empty resource set in an inverse offer means "all
    /// of your holdings on this agent".
    fn inverse_offer_stage(&mut self, outcome: &mut RoundOutcome) {
        let unavailable: Vec<(AgentId, Unavailability)> = self
            .agents
            .iter()
            .filter_map(|(id, agent)| {
                agent.unavailability.clone().map(|u| (*id, u))
            })
            .collect();

        for (agent_id, unavailability) in unavailable {
            let holders: Vec<(FrameworkId, RoleName)> = self
                .frameworks
                .iter()
                .map(|(framework_id, framework)| (*framework_id, framework.role.clone()))
                .collect();
            for (framework_id, role) in holders {
                let held = self
                    .roles
                    .framework_allocation_on(&role, &framework_id, &agent_id);
                if held.is_empty() {
                    continue;
                }
                if self.filters.is_inverse_filtered(&framework_id, &agent_id) {
                    continue;
                }
                outcome
                    .inverse_offers
                    .entry(framework_id)
                    .or_default()
                    .insert(agent_id, unavailability.clone());
            }
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn metrics(&self) -> crate::metrics::AllocatorMetrics {
        crate::metrics::snapshot(self)
    }

    /// Read access to one agent's bookkeeping, for embedding services
    /// and invariant checks.
    pub fn agent(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id).ok()
    }

    pub(crate) fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub(crate) fn frameworks(&self) -> &FrameworkRegistry {
        &self.frameworks
    }

    pub(crate) fn roles(&self) -> &RoleTree {
        &self.roles
    }

    pub(crate) fn quotas(&self) -> &QuotaBook {
        &self.quotas
    }

    pub(crate) fn charged_for_metrics(&self, role: &RoleName) -> Quantities {
        self.charged(role)
    }
}
