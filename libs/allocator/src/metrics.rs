//! Point-in-time allocator metrics.
//!
//! The snapshot carries the numbers; shipping them anywhere is the
//! embedding service's job.

use std::collections::BTreeMap;

use acre_resources::Quantities;
use serde::Serialize;

use crate::engine::AllocatorState;

/// Quota standing for one role.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaMetrics {
    pub guarantee: Quantities,
    /// Allocated plus reserved-but-unallocated, i.e. what counts against
    /// the guarantee.
    pub charged: Quantities,
}

/// A snapshot of the allocator's externally interesting state.
#[derive(Debug, Clone, Serialize)]
pub struct AllocatorMetrics {
    pub allocation_runs: u64,
    pub agent_count: usize,
    pub framework_count: usize,
    /// Cluster-wide scalar totals.
    pub cluster_total: Quantities,
    /// Weighted dominant share per active role.
    pub dominant_shares: BTreeMap<String, f64>,
    /// Quota standing per quota'ed role.
    pub quotas: BTreeMap<String, QuotaMetrics>,
}

pub(crate) fn snapshot(state: &AllocatorState) -> AllocatorMetrics {
    let dominant_shares = state
        .roles()
        .sorted_roles()
        .into_iter()
        .map(|role| {
            let share = state.roles().role_share(&role);
            (role.to_string(), share)
        })
        .collect();

    let quotas = state
        .quotas()
        .iter()
        .map(|(role, guarantee)| {
            (
                role.to_string(),
                QuotaMetrics {
                    guarantee: guarantee.clone(),
                    charged: state.charged_for_metrics(role),
                },
            )
        })
        .collect();

    AllocatorMetrics {
        allocation_runs: state.rounds_completed(),
        agent_count: state.agents().len(),
        framework_count: state.frameworks().len(),
        cluster_total: state.roles().cluster_total().clone(),
        dominant_shares,
        quotas,
    }
}
