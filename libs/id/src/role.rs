//! Validated role names.
//!
//! Roles are operator-chosen hierarchical paths (`engineering`,
//! `engineering/backend`). They are the unit of fairness, weights, quota
//! and reservations, so a malformed name must never enter the allocator.

use std::borrow::Borrow;
use std::fmt;

use crate::IdError;

/// The catch-all role every framework belongs to unless told otherwise.
/// Resources can never be reserved for it.
pub const DEFAULT_ROLE: &str = "*";

/// A validated role path.
///
/// Rules:
/// - non-empty, and `*` is only valid as the entire name,
/// - `/`-separated segments, none empty (no leading, trailing or double
///   slashes),
/// - no segment may be `.` or `..`, start with `-`, or contain
///   whitespace, control characters or `*`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleName(String);

impl RoleName {
    /// Parses and validates a role path.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        validate(s)?;
        Ok(Self(s.to_string()))
    }

    /// The default `*` role.
    #[must_use]
    pub fn default_role() -> Self {
        Self(DEFAULT_ROLE.to_string())
    }

    /// Whether this is the default `*` role.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_ROLE
    }

    /// The role path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate(s: &str) -> Result<(), IdError> {
    let invalid = |reason| IdError::InvalidRole {
        name: s.to_string(),
        reason,
    };

    if s.is_empty() {
        return Err(invalid("role name cannot be empty"));
    }
    if s == DEFAULT_ROLE {
        return Ok(());
    }

    for segment in s.split('/') {
        if segment.is_empty() {
            return Err(invalid("role path segments cannot be empty"));
        }
        if segment == "." || segment == ".." {
            return Err(invalid("role path segments cannot be '.' or '..'"));
        }
        if segment.starts_with('-') {
            return Err(invalid("role path segments cannot start with '-'"));
        }
        if segment.contains('*') {
            return Err(invalid("'*' is only valid as the entire role name"));
        }
        if segment
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(invalid("role names cannot contain whitespace"));
        }
    }

    Ok(())
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RoleName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Borrow<str> for RoleName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for RoleName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for RoleName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
