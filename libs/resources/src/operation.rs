//! In-place offer operations.
//!
//! RESERVE / UNRESERVE flip the reservation tag of resources a framework
//! or operator holds; CREATE / DESTROY attach and detach persistent volume
//! metadata on disk. Operations are applied left to right, the whole batch
//! atomically: the first failure aborts with the input untouched. Every
//! operation is value-preserving — the scalar totals before and after are
//! identical.

use serde::{Deserialize, Serialize};

use crate::{ResourceError, ResourceVector};

/// An in-place transformation of held resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Operation {
    /// Convert unreserved resources into role-reserved ones.
    Reserve { resources: ResourceVector },
    /// Convert role-reserved resources back to unreserved.
    Unreserve { resources: ResourceVector },
    /// Carve persistent volumes out of plain disk.
    Create { volumes: ResourceVector },
    /// Turn persistent volumes back into plain disk.
    Destroy { volumes: ResourceVector },
}

impl ResourceVector {
    /// Applies one operation, returning the transformed vector.
    pub fn apply(&self, operation: &Operation) -> Result<ResourceVector, ResourceError> {
        let mut result = self.clone();

        match operation {
            Operation::Reserve { resources } => {
                for reserved in resources.iter() {
                    if reserved.reservation.role().is_none() {
                        return Err(ResourceError::BadReservation {
                            op: "RESERVE",
                            requirement: "role-reserved resources",
                        });
                    }
                    let unreserved = reserved.unreserved_counterpart();
                    if !result.contains_resource(&unreserved) {
                        return Err(ResourceError::MissingResource(unreserved.to_string()));
                    }
                    result.remove(&unreserved);
                    result.push(reserved.clone());
                }
            }

            Operation::Unreserve { resources } => {
                for reserved in resources.iter() {
                    if reserved.reservation.role().is_none() {
                        return Err(ResourceError::BadReservation {
                            op: "UNRESERVE",
                            requirement: "reserved resources",
                        });
                    }
                    if !result.contains_resource(reserved) {
                        return Err(ResourceError::MissingResource(reserved.to_string()));
                    }
                    result.remove(reserved);
                    result.push(reserved.unreserved_counterpart());
                }
            }

            Operation::Create { volumes } => {
                for volume in volumes.iter() {
                    let Some(disk) = &volume.disk else {
                        return Err(ResourceError::NotPersistent(volume.to_string()));
                    };
                    // Persistence ids are unique per agent.
                    let duplicate = result.persistent_volumes().iter().any(|existing| {
                        existing.disk.as_ref().is_some_and(|d| d.id == disk.id)
                    });
                    if duplicate {
                        return Err(ResourceError::VolumeExists(disk.id.clone()));
                    }
                    let stripped = volume.without_volume();
                    if !result.contains_resource(&stripped) {
                        return Err(ResourceError::MissingResource(stripped.to_string()));
                    }
                    result.remove(&stripped);
                    result.push(volume.clone());
                }
            }

            Operation::Destroy { volumes } => {
                for volume in volumes.iter() {
                    if volume.disk.is_none() {
                        return Err(ResourceError::NotPersistent(volume.to_string()));
                    }
                    if !result.contains_resource(volume) {
                        return Err(ResourceError::MissingResource(volume.to_string()));
                    }
                    result.remove(volume);
                    result.push(volume.without_volume());
                }
            }
        }

        Ok(result)
    }

    /// Applies a batch left to right; the first failure aborts the whole
    /// batch. No commutativity is assumed — order is the caller's choice.
    pub fn apply_all(
        &self,
        operations: &[Operation],
    ) -> Result<ResourceVector, ResourceError> {
        let mut result = self.clone();
        for operation in operations {
            result = result.apply(operation)?;
        }
        Ok(result)
    }
}
