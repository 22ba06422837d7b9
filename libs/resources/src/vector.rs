//! The tag-preserving resource multiset.
//!
//! A `ResourceVector` is a list of tagged line items. Addition merges line
//! items that are the same object (every tag equal); subtraction removes
//! quantity from the matching line item and drops it when drained. Shared
//! volumes are counted: adding the same shared volume twice bumps a use
//! count instead of doubling the quantity.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use acre_id::RoleName;
use serde::{Deserialize, Serialize};

use crate::{Quantities, Reservation, Resource, ResourceError, Scalar, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    resource: Resource,
    /// Concurrent uses of a shared volume; always 1 for everything else.
    #[serde(default = "one")]
    copies: u32,
}

fn one() -> u32 {
    1
}

/// An ordered multiset of tagged resources.
///
/// Line-item order is insertion order; equality is order-insensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceVector {
    items: Vec<Entry>,
}

impl ResourceVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the `name(role):value` text form; see the `parse` module.
    pub fn parse(s: &str) -> Result<Self, ResourceError> {
        crate::parse::parse_vector(s)
    }

    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        let mut vector = Self::new();
        for resource in resources {
            vector.push(resource);
        }
        vector
    }

    /// Sums vectors, e.g. all offers in a callback.
    pub fn sum<'a>(vectors: impl IntoIterator<Item = &'a ResourceVector>) -> Self {
        let mut total = Self::new();
        for vector in vectors {
            total += vector.clone();
        }
        total
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> + '_ {
        self.items.iter().map(|entry| &entry.resource)
    }

    fn find_mut(&mut self, resource: &Resource) -> Option<&mut Entry> {
        self.items
            .iter_mut()
            .find(|entry| entry.resource.same_object(resource))
    }

    /// Adds one resource, merging with an existing same-object line item.
    pub fn push(&mut self, resource: Resource) {
        if resource.is_empty() {
            return;
        }
        match self.find_mut(&resource) {
            Some(entry) => {
                if entry.resource.shared {
                    entry.copies += 1;
                } else {
                    entry.resource.value.merge(&resource.value);
                }
            }
            None => self.items.push(Entry {
                resource,
                copies: 1,
            }),
        }
    }

    /// Removes one resource: saturating on quantity, decrementing the use
    /// count for shared volumes. Removing something absent is a no-op.
    pub fn remove(&mut self, resource: &Resource) {
        if resource.is_empty() {
            return;
        }
        let Some(index) = self
            .items
            .iter()
            .position(|entry| entry.resource.same_object(resource))
        else {
            return;
        };

        let entry = &mut self.items[index];
        if entry.resource.shared {
            entry.copies -= 1;
            if entry.copies == 0 {
                self.items.remove(index);
            }
        } else {
            entry.resource.value.remove(&resource.value);
            if entry.resource.is_empty() {
                self.items.remove(index);
            }
        }
    }

    /// Whether a single resource is wholly present.
    pub fn contains_resource(&self, resource: &Resource) -> bool {
        if resource.is_empty() {
            return true;
        }
        self.items.iter().any(|entry| {
            entry.resource.same_object(resource)
                && if entry.resource.shared {
                    entry.copies >= 1
                } else {
                    entry.resource.value.contains(&resource.value)
                }
        })
    }

    /// Whether `other` is wholly contained, tag for tag.
    pub fn contains(&self, other: &ResourceVector) -> bool {
        other.items.iter().all(|needed| {
            self.items.iter().any(|entry| {
                entry.resource.same_object(&needed.resource)
                    && if entry.resource.shared {
                        entry.copies >= needed.copies
                    } else {
                        entry.resource.value.contains(&needed.resource.value)
                    }
            })
        })
    }

    /// Subtraction that fails instead of saturating when `other` is not
    /// wholly contained.
    pub fn try_sub(&self, other: &ResourceVector) -> Result<ResourceVector, ResourceError> {
        if !self.contains(other) {
            return Err(ResourceError::Underflow {
                minuend: self.to_string(),
                subtrahend: other.to_string(),
            });
        }
        Ok(self.clone() - other.clone())
    }

    // ── Partition filters ───────────────────────────────────────────

    fn filtered(&self, keep: impl Fn(&Resource) -> bool) -> ResourceVector {
        ResourceVector {
            items: self
                .items
                .iter()
                .filter(|entry| keep(&entry.resource))
                .cloned()
                .collect(),
        }
    }

    /// Resources in the common pool.
    pub fn unreserved(&self) -> ResourceVector {
        self.filtered(|r| r.reservation == Reservation::Unreserved)
    }

    /// Resources earmarked for `role`. Empty for the default `*` role,
    /// which can never hold reservations.
    pub fn reserved(&self, role: &RoleName) -> ResourceVector {
        if role.is_default() {
            return ResourceVector::new();
        }
        self.filtered(|r| r.reservation.role() == Some(role))
    }

    /// Resources reserved for any role.
    pub fn reserved_any(&self) -> ResourceVector {
        self.filtered(|r| r.reservation != Reservation::Unreserved)
    }

    pub fn non_revocable(&self) -> ResourceVector {
        self.filtered(|r| !r.revocable)
    }

    pub fn revocable(&self) -> ResourceVector {
        self.filtered(|r| r.revocable)
    }

    pub fn shared_volumes(&self) -> ResourceVector {
        self.filtered(|r| r.shared)
    }

    pub fn non_shared(&self) -> ResourceVector {
        self.filtered(|r| !r.shared)
    }

    pub fn persistent_volumes(&self) -> ResourceVector {
        self.filtered(|r| r.is_persistent_volume())
    }

    // ── Totals ──────────────────────────────────────────────────────

    /// Total scalar amount under `name`, across all tags.
    pub fn scalar_total(&self, name: &str) -> Scalar {
        self.items
            .iter()
            .filter(|entry| entry.resource.name == name)
            .map(|entry| entry.resource.scalar_value())
            .sum()
    }

    /// Tag-stripped scalar totals. Each use of a shared volume counts.
    pub fn quantities(&self) -> Quantities {
        let mut quantities = Quantities::new();
        for entry in &self.items {
            if let Value::Scalar(amount) = &entry.resource.value {
                for _ in 0..entry.copies {
                    quantities.add(&entry.resource.name, *amount);
                }
            }
        }
        quantities
    }
}

// Equality is order-insensitive containment both ways.
impl PartialEq for ResourceVector {
    fn eq(&self, other: &Self) -> bool {
        self.contains(other) && other.contains(self)
    }
}

impl Eq for ResourceVector {}

impl Add for ResourceVector {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for ResourceVector {
    fn add_assign(&mut self, rhs: Self) {
        for entry in rhs.items {
            for _ in 0..entry.copies.saturating_sub(1) {
                self.push(entry.resource.clone());
            }
            self.push(entry.resource);
        }
    }
}

impl Sub for ResourceVector {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        self -= rhs;
        self
    }
}

impl SubAssign for ResourceVector {
    fn sub_assign(&mut self, rhs: Self) {
        for entry in rhs.items {
            for _ in 0..entry.copies {
                self.remove(&entry.resource);
            }
        }
    }
}

impl FromIterator<Resource> for ResourceVector {
    fn from_iter<I: IntoIterator<Item = Resource>>(iter: I) -> Self {
        Self::from_resources(iter)
    }
}

impl fmt::Display for ResourceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return write!(f, "{{}}");
        }
        for (i, entry) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, "{}", entry.resource)?;
            if entry.copies > 1 {
                write!(f, "(x{})", entry.copies)?;
            }
        }
        Ok(())
    }
}
