//! # acre-id
//!
//! Typed identifiers for the entities the allocator tracks.
//!
//! ## Design Principles
//!
//! - Agent and framework ids are stable, coordinator-generated, and typed
//!   so the two can never be mixed up at a call site
//! - Role names are operator-controlled labels with strict validation
//! - Every identifier round-trips through its canonical string form
//!
//! ## Id Format
//!
//! Generated ids use a prefixed format: `{prefix}_{ulid}`
//!
//! Examples:
//! - `agent_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `fw_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//!
//! Role names are plain hierarchical paths (`engineering/backend`), not
//! ULIDs, because operators choose them; see [`RoleName`] for the rules.

mod error;
mod macros;
mod role;
mod types;

pub use error::IdError;
pub use role::RoleName;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
