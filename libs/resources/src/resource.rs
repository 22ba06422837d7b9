//! A single tagged resource line item.
//!
//! The tags (reservation, revocable, disk metadata, shared) are what make
//! arithmetic a multiset operation: two line items only merge when every
//! tag matches, otherwise they accumulate side by side.

use std::fmt;

use acre_id::RoleName;
use serde::{Deserialize, Serialize};

use crate::{Ranges, ResourceError, Scalar, TextSet, Value};

/// Who a resource is earmarked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reservation {
    /// Part of the common pool, offerable to any role.
    Unreserved,
    /// Earmarked for one role, statically (agent config) or dynamically
    /// (RESERVE operation).
    Role(RoleName),
}

impl Reservation {
    pub fn role(&self) -> Option<&RoleName> {
        match self {
            Reservation::Unreserved => None,
            Reservation::Role(role) => Some(role),
        }
    }
}

/// Persistent volume metadata on a disk resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiskInfo {
    /// Persistence id, unique per agent.
    pub id: String,
    /// Container mount path the volume is exposed at.
    pub container_path: String,
}

/// A named, tagged quantity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub value: Value,
    pub reservation: Reservation,
    /// Revocable resources may be reclaimed by the agent at any time and
    /// are only offered to frameworks that opted in.
    pub revocable: bool,
    /// Set on persistent volumes carved out of disk.
    pub disk: Option<DiskInfo>,
    /// Shared volumes may appear in several concurrent offers. Only valid
    /// together with `disk`.
    pub shared: bool,
}

impl Resource {
    /// An unreserved, non-revocable scalar.
    pub fn scalar(name: impl Into<String>, value: Scalar) -> Self {
        Self {
            name: name.into(),
            value: Value::Scalar(value),
            reservation: Reservation::Unreserved,
            revocable: false,
            disk: None,
            shared: false,
        }
    }

    /// An unreserved range resource, e.g. ports.
    pub fn ranges(name: impl Into<String>, ranges: Ranges) -> Self {
        Self {
            name: name.into(),
            value: Value::Ranges(ranges),
            reservation: Reservation::Unreserved,
            revocable: false,
            disk: None,
            shared: false,
        }
    }

    /// An unreserved set resource.
    pub fn set(name: impl Into<String>, set: TextSet) -> Self {
        Self {
            name: name.into(),
            value: Value::Set(set),
            reservation: Reservation::Unreserved,
            revocable: false,
            disk: None,
            shared: false,
        }
    }

    #[must_use]
    pub fn reserved_for(mut self, role: RoleName) -> Self {
        self.reservation = Reservation::Role(role);
        self
    }

    #[must_use]
    pub fn revocable(mut self) -> Self {
        self.revocable = true;
        self
    }

    /// Turns a disk resource into a persistent volume.
    #[must_use]
    pub fn with_volume(mut self, id: impl Into<String>, container_path: impl Into<String>) -> Self {
        self.disk = Some(DiskInfo {
            id: id.into(),
            container_path: container_path.into(),
        });
        self
    }

    /// Marks a persistent volume as shared.
    #[must_use]
    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    /// Structural validity: the tag combinations the allocator relies on.
    pub fn validate(&self) -> Result<(), ResourceError> {
        if self.name.is_empty() {
            return Err(ResourceError::Malformed("resource name is empty".into()));
        }
        if self.disk.is_some() && self.name != "disk" {
            return Err(ResourceError::Malformed(format!(
                "volume metadata on non-disk resource '{}'",
                self.name
            )));
        }
        if self.shared && self.disk.is_none() {
            return Err(ResourceError::Malformed(format!(
                "shared flag on non-volume resource '{}'",
                self.name
            )));
        }
        if let Some(disk) = &self.disk {
            if disk.id.is_empty() {
                return Err(ResourceError::Malformed("empty persistence id".into()));
            }
            if !matches!(self.value, Value::Scalar(_)) {
                return Err(ResourceError::Malformed(
                    "persistent volume must be a scalar".into(),
                ));
            }
        }
        Ok(())
    }

    /// Whether two line items are the same object: every tag matches and
    /// the values are mergeable. Quantity is not part of identity.
    pub fn same_object(&self, other: &Resource) -> bool {
        self.name == other.name
            && self.reservation == other.reservation
            && self.revocable == other.revocable
            && self.disk == other.disk
            && self.shared == other.shared
            && self.value.same_kind(&other.value)
    }

    pub fn is_unreserved(&self) -> bool {
        self.reservation == Reservation::Unreserved
    }

    pub fn is_persistent_volume(&self) -> bool {
        self.disk.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The same resource with the reservation stripped. Used to check and
    /// apply RESERVE / UNRESERVE conversions.
    #[must_use]
    pub fn unreserved_counterpart(&self) -> Resource {
        let mut counterpart = self.clone();
        counterpart.reservation = Reservation::Unreserved;
        counterpart
    }

    /// The same resource with volume metadata stripped. Used to check and
    /// apply CREATE / DESTROY conversions.
    #[must_use]
    pub fn without_volume(&self) -> Resource {
        let mut stripped = self.clone();
        stripped.disk = None;
        stripped.shared = false;
        stripped
    }

    /// Scalar amount, zero for ranges and sets.
    pub fn scalar_value(&self) -> Scalar {
        match &self.value {
            Value::Scalar(s) => *s,
            _ => Scalar::ZERO,
        }
    }
}

// The text form is name(role)[id:path]:value, with a trailing `{rev}`
// marker for revocable and `<shared>` for shared volumes.
impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Reservation::Role(role) = &self.reservation {
            write!(f, "({role})")?;
        }
        if let Some(disk) = &self.disk {
            write!(f, "[{}:{}]", disk.id, disk.container_path)?;
        }
        write!(f, ":{}", self.value)?;
        if self.revocable {
            write!(f, "{{rev}}")?;
        }
        if self.shared {
            write!(f, "<shared>")?;
        }
        Ok(())
    }
}
