//! # acre-resources
//!
//! The resource model the allocator does all of its arithmetic on.
//!
//! A resource is a named scalar, range or set quantity tagged with a
//! reservation (unreserved or earmarked for a role), a revocable flag, and
//! optional persistent-volume metadata. Two resources are the *same
//! object* only when every tag matches; a [`ResourceVector`] is the
//! multiset that merges same-object line items and keeps everything else
//! apart. That makes reservation routing, revocability gating and volume
//! bookkeeping fall out of plain `+`/`-`/`contains`.
//!
//! ```
//! use acre_resources::ResourceVector;
//!
//! let agent = ResourceVector::parse("cpus:2;cpus(engineering):2;mem:1024").unwrap();
//! let role = "engineering".parse().unwrap();
//! assert_eq!(agent.reserved(&role).to_string(), "cpus(engineering):2");
//! ```

mod error;
mod operation;
mod parse;
mod quantity;
mod resource;
mod scalar;
mod value;
mod vector;

pub use error::ResourceError;
pub use operation::Operation;
pub use quantity::Quantities;
pub use resource::{DiskInfo, Reservation, Resource};
pub use scalar::Scalar;
pub use value::{Ranges, TextSet, Value};
pub use vector::ResourceVector;
