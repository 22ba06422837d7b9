//! # acre-allocator
//!
//! A hierarchical fair-share allocator for a two-level cluster scheduler.
//!
//! The coordinator feeds agent and framework lifecycle events in through
//! the [`Allocator`] handle; the allocator periodically (and on relevant
//! events) runs an allocation round and pushes decisions out through two
//! callbacks: offers (`framework <- {agent -> resources}`) and inverse
//! offers (`framework <- {agent -> unavailability}`). It decides, it does
//! not deliver — wire formats, persistence and RPC all live elsewhere.
//!
//! A round is three stages:
//!
//! 1. **Quota** — roles with unsatisfied guarantees pick first, from
//!    non-revocable resources only.
//! 2. **Fair share** — weighted dominant-resource fairness over the rest,
//!    with enough unreserved headroom withheld that outstanding
//!    guarantees stay satisfiable.
//! 3. **Inverse offers** — frameworks holding resources on agents with
//!    scheduled maintenance are asked to give them back.
//!
//! Fairness is two-level: a DRF sorter over roles, and one over the
//! frameworks inside each role. Declines install per-(framework, agent)
//! filters that outlive their wall-clock timeout until a full round has
//! run past it, so a short refuse timeout cannot bounce the same offer
//! straight back.

mod agents;
mod config;
mod engine;
mod error;
mod filters;
mod frameworks;
mod metrics;
mod process;
mod quota;
mod roles;
mod sorter;
mod types;

pub use agents::Agent;
pub use config::{AllocatorConfig, MIN_ALLOCATABLE_CPUS, MIN_ALLOCATABLE_MEM};
pub use engine::{AllocatorState, RoundOutcome};
pub use error::AllocatorError;
pub use metrics::{AllocatorMetrics, QuotaMetrics};
pub use process::Allocator;
pub use sorter::DrfSorter;
pub use types::{
    AgentInfo, Capabilities, Capability, FrameworkInfo, InverseOfferBundle,
    InverseOfferCallback, OfferBundle, OfferCallback, Unavailability,
};
