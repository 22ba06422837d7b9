//! Error types for identifier parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("identifier cannot be empty")]
    Empty,

    /// The id has the wrong prefix for its type.
    #[error("wrong id prefix: expected '{expected}', got '{actual}'")]
    WrongPrefix {
        expected: &'static str,
        actual: String,
    },

    /// The id is missing the underscore separator between prefix and ULID.
    #[error("id missing underscore separator")]
    MissingSeparator,

    /// The ULID portion of the id is invalid.
    #[error("invalid ULID: {0}")]
    InvalidUlid(String),

    /// The role name violates the role path rules.
    #[error("invalid role name '{name}': {reason}")]
    InvalidRole { name: String, reason: &'static str },
}
