//! Error types for resource arithmetic and offer operations.

use thiserror::Error;

/// Errors from resource parsing, arithmetic and operation application.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A resource string or constructed resource is malformed.
    #[error("malformed resource: {0}")]
    Malformed(String),

    /// A subtraction would remove more than is present.
    #[error("cannot subtract '{subtrahend}' from '{minuend}'")]
    Underflow {
        minuend: String,
        subtrahend: String,
    },

    /// An operation needs a resource the vector does not hold.
    #[error("operation requires '{0}' which is not present")]
    MissingResource(String),

    /// RESERVE needs role-reserved resources, UNRESERVE reserved ones.
    #[error("{op} requires {requirement}")]
    BadReservation {
        op: &'static str,
        requirement: &'static str,
    },

    /// CREATE of a persistence id that already exists on the agent.
    #[error("persistent volume '{0}' already exists")]
    VolumeExists(String),

    /// DESTROY of something that is not a persistent volume.
    #[error("'{0}' is not a persistent volume")]
    NotPersistent(String),
}
