//! Client ordering for allocation rounds.

mod drf;

pub use drf::DrfSorter;
