//! Allocator error types.
//!
//! Mutation errors are returned in the mutation's completion future and
//! always leave state untouched. Round-level decisions are never errors:
//! an unallocatable or filtered candidate is silently skipped.

use acre_id::{AgentId, FrameworkId, RoleName};
use acre_resources::ResourceError;
use thiserror::Error;

use crate::types::Capability;

/// Errors surfaced by allocator mutations.
#[derive(Debug, Error)]
pub enum AllocatorError {
    #[error("unknown framework {0}")]
    UnknownFramework(FrameworkId),

    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    #[error("framework {0} is already registered")]
    FrameworkExists(FrameworkId),

    #[error("agent {0} is already registered")]
    AgentExists(AgentId),

    /// Arithmetic failures (underflow) and malformed in-place operations.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// In-place operations must not change quantities.
    #[error("operations changed resource quantities: {before} -> {after}")]
    NotValuePreserving { before: String, after: String },

    /// The mutation requires a capability the framework has not opted
    /// into.
    #[error("framework {framework} lacks the {capability:?} capability")]
    CapabilityMismatch {
        framework: FrameworkId,
        capability: Capability,
    },

    /// A framework's role is fixed for its lifetime.
    #[error("framework {framework} cannot move from role {from} to {to}")]
    RoleChange {
        framework: FrameworkId,
        from: RoleName,
        to: RoleName,
    },

    /// The allocator task is gone; no further mutations are possible.
    #[error("allocator is shut down")]
    Shutdown,
}
