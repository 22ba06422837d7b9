//! The two-level role tree.
//!
//! Fairness is hierarchical: roles are ordered against each other by the
//! aggregate share of everything their frameworks hold, and frameworks
//! are ordered inside their role. A third sorter mirrors the role sorter
//! but only over quota'ed roles and non-revocable resources; quota is
//! satisfied against a different total, so it cannot share the outer
//! sorter. The tree is composition all the way down: one [`DrfSorter`]
//! per level.

use std::collections::{HashMap, HashSet};

use acre_id::{AgentId, FrameworkId, RoleName};
use acre_resources::{Quantities, ResourceVector};
use tracing::debug;

use crate::sorter::DrfSorter;

const DEFAULT_WEIGHT: f64 = 1.0;

pub struct RoleTree {
    /// Roles with at least one framework, by aggregate share.
    role_sorter: DrfSorter<RoleName>,
    /// Quota'ed roles by aggregate non-revocable share.
    quota_role_sorter: DrfSorter<RoleName>,
    /// Per-role framework orderings, computed against the cluster total.
    framework_sorters: HashMap<RoleName, DrfSorter<FrameworkId>>,
    /// Framework membership per role.
    memberships: HashMap<RoleName, HashSet<FrameworkId>>,
    /// Explicit weights; unlisted roles weigh 1.0. Weights survive the
    /// role's frameworks coming and going.
    weights: HashMap<RoleName, f64>,
    /// Cluster-wide totals, used to seed new sorters.
    total: Quantities,
    total_non_revocable: Quantities,
    fairness_excluded: HashSet<String>,
}

impl RoleTree {
    pub fn new(fairness_excluded: HashSet<String>) -> Self {
        Self {
            role_sorter: DrfSorter::new(fairness_excluded.iter().cloned()),
            quota_role_sorter: DrfSorter::new(fairness_excluded.iter().cloned()),
            framework_sorters: HashMap::new(),
            memberships: HashMap::new(),
            weights: HashMap::new(),
            total: Quantities::new(),
            total_non_revocable: Quantities::new(),
            fairness_excluded,
        }
    }

    pub fn weight_of(&self, role: &RoleName) -> f64 {
        self.weights.get(role).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    // ── Framework membership ────────────────────────────────────────

    /// Registers a framework under its role, creating the role's sorter
    /// entry on first membership.
    pub fn add_framework(&mut self, role: &RoleName, framework: FrameworkId) {
        if !self.memberships.contains_key(role) {
            debug!(%role, "role becomes active");
            let weight = self.weight_of(role);
            self.role_sorter.add(role.clone(), weight);
            let mut sorter = DrfSorter::new(self.fairness_excluded.iter().cloned());
            sorter.add_total(&self.total);
            self.framework_sorters.insert(role.clone(), sorter);
        }
        self.memberships
            .entry(role.clone())
            .or_default()
            .insert(framework);
        if let Some(sorter) = self.framework_sorters.get_mut(role) {
            sorter.add(framework, DEFAULT_WEIGHT);
        }
    }

    /// Unregisters a framework. The caller must have recovered its
    /// allocations first. Drops the role's sorter entry with the last
    /// member; quota and weights survive.
    pub fn remove_framework(&mut self, role: &RoleName, framework: &FrameworkId) {
        if let Some(sorter) = self.framework_sorters.get_mut(role) {
            sorter.remove(framework);
        }
        let emptied = match self.memberships.get_mut(role) {
            Some(members) => {
                members.remove(framework);
                members.is_empty()
            }
            None => false,
        };
        if emptied {
            debug!(%role, "role has no frameworks left");
            self.memberships.remove(role);
            self.framework_sorters.remove(role);
            self.role_sorter.remove(role);
        }
    }

    pub fn activate_framework(&mut self, role: &RoleName, framework: &FrameworkId) {
        if let Some(sorter) = self.framework_sorters.get_mut(role) {
            sorter.activate(framework);
        }
    }

    pub fn deactivate_framework(&mut self, role: &RoleName, framework: &FrameworkId) {
        if let Some(sorter) = self.framework_sorters.get_mut(role) {
            sorter.deactivate(framework);
        }
    }

    pub fn has_frameworks(&self, role: &RoleName) -> bool {
        self.memberships.contains_key(role)
    }

    pub fn has_active_frameworks(&self, role: &RoleName) -> bool {
        self.framework_sorters
            .get(role)
            .is_some_and(DrfSorter::has_active)
    }

    // ── Cluster totals ──────────────────────────────────────────────

    pub fn agent_added(&mut self, total: &ResourceVector) {
        let quantities = total.quantities();
        let non_revocable = total.non_revocable().quantities();

        self.total.add_all(&quantities);
        self.total_non_revocable.add_all(&non_revocable);
        self.role_sorter.add_total(&quantities);
        self.quota_role_sorter.add_total(&non_revocable);
        for sorter in self.framework_sorters.values_mut() {
            sorter.add_total(&quantities);
        }
    }

    pub fn agent_removed(&mut self, total: &ResourceVector) {
        let quantities = total.quantities();
        let non_revocable = total.non_revocable().quantities();

        self.total.subtract_all(&quantities);
        self.total_non_revocable.subtract_all(&non_revocable);
        self.role_sorter.subtract_total(&quantities);
        self.quota_role_sorter.subtract_total(&non_revocable);
        for sorter in self.framework_sorters.values_mut() {
            sorter.subtract_total(&quantities);
        }
    }

    pub fn agent_updated(&mut self, old_total: &ResourceVector, new_total: &ResourceVector) {
        self.agent_removed(old_total);
        self.agent_added(new_total);
    }

    pub fn cluster_total(&self) -> &Quantities {
        &self.total
    }

    // ── Allocation bookkeeping ──────────────────────────────────────

    /// Records a grant through all levels of the tree.
    pub fn allocated(
        &mut self,
        role: &RoleName,
        framework: &FrameworkId,
        agent: AgentId,
        resources: &ResourceVector,
        quota_role: bool,
    ) {
        self.role_sorter.allocated(role, agent, resources);
        if let Some(sorter) = self.framework_sorters.get_mut(role) {
            sorter.allocated(framework, agent, resources);
        }
        if quota_role {
            self.quota_role_sorter
                .allocated(role, agent, &resources.non_revocable());
        }
    }

    /// Records a recovery through all levels of the tree.
    pub fn recovered(
        &mut self,
        role: &RoleName,
        framework: &FrameworkId,
        agent: AgentId,
        resources: &ResourceVector,
        quota_role: bool,
    ) {
        self.role_sorter.unallocated(role, agent, resources);
        if let Some(sorter) = self.framework_sorters.get_mut(role) {
            sorter.unallocated(framework, agent, resources);
        }
        if quota_role {
            self.quota_role_sorter
                .unallocated(role, agent, &resources.non_revocable());
        }
    }

    /// Replaces a framework's holding on one agent after in-place
    /// operations transformed it.
    pub fn updated(
        &mut self,
        role: &RoleName,
        framework: &FrameworkId,
        agent: AgentId,
        old: &ResourceVector,
        new: &ResourceVector,
        quota_role: bool,
    ) {
        self.role_sorter.update(role, agent, old, new);
        if let Some(sorter) = self.framework_sorters.get_mut(role) {
            sorter.update(framework, agent, old, new);
        }
        if quota_role {
            self.quota_role_sorter
                .update(role, agent, &old.non_revocable(), &new.non_revocable());
        }
    }

    pub fn framework_allocation_on(
        &self,
        role: &RoleName,
        framework: &FrameworkId,
        agent: &AgentId,
    ) -> ResourceVector {
        self.framework_sorters
            .get(role)
            .map(|sorter| sorter.allocation_on(framework, agent))
            .unwrap_or_default()
    }

    pub fn framework_allocations(
        &self,
        role: &RoleName,
        framework: &FrameworkId,
    ) -> HashMap<AgentId, ResourceVector> {
        self.framework_sorters
            .get(role)
            .map(|sorter| sorter.allocations(framework))
            .unwrap_or_default()
    }

    /// Aggregate non-revocable quantities counted against a role's quota.
    pub fn quota_allocation_totals(&self, role: &RoleName) -> Quantities {
        self.quota_role_sorter.allocation_totals(role)
    }

    pub fn role_share(&self, role: &RoleName) -> f64 {
        self.role_sorter.weighted_share_of(role)
    }

    // ── Quota membership ────────────────────────────────────────────

    /// Adds a role to the quota sorter, seeding it with the role's
    /// current non-revocable allocations.
    pub fn quota_added(&mut self, role: &RoleName) {
        if self.quota_role_sorter.contains(role) {
            return;
        }
        let weight = self.weight_of(role);
        self.quota_role_sorter.add(role.clone(), weight);
        if let Some(sorter) = self.framework_sorters.get(role) {
            let members: Vec<FrameworkId> = self
                .memberships
                .get(role)
                .map(|m| m.iter().copied().collect())
                .unwrap_or_default();
            for framework in members {
                for (agent, resources) in sorter.allocations(&framework) {
                    self.quota_role_sorter
                        .allocated(role, agent, &resources.non_revocable());
                }
            }
        }
    }

    pub fn quota_removed(&mut self, role: &RoleName) {
        self.quota_role_sorter.remove(role);
    }

    // ── Weights ─────────────────────────────────────────────────────

    pub fn set_weight(&mut self, role: RoleName, weight: f64) {
        self.role_sorter.set_weight(&role, weight);
        self.quota_role_sorter.set_weight(&role, weight);
        self.weights.insert(role, weight);
    }

    // ── Ordering views ──────────────────────────────────────────────

    /// Active roles in ascending weighted aggregate share.
    pub fn sorted_roles(&self) -> Vec<RoleName> {
        self.role_sorter.sort()
    }

    /// Quota'ed roles in ascending weighted non-revocable share.
    pub fn sorted_quota_roles(&self) -> Vec<RoleName> {
        self.quota_role_sorter.sort()
    }

    /// A role's schedulable frameworks in ascending share order.
    pub fn sorted_frameworks(&self, role: &RoleName) -> Vec<FrameworkId> {
        self.framework_sorters
            .get(role)
            .map(DrfSorter::sort)
            .unwrap_or_default()
    }
}
