//! Resource value kinds: scalars, integer ranges, and text sets.
//!
//! Ranges model port-like resources, sets model label-like resources.
//! Both keep a canonical form so equality and subset tests are cheap.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Scalar;

/// The quantity carried by a resource line item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Scalar(Scalar),
    Ranges(Ranges),
    Set(TextSet),
}

impl Value {
    /// True when nothing is left: zero scalar, no ranges, empty set.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Scalar(s) => s.is_zero(),
            Value::Ranges(r) => r.is_empty(),
            Value::Set(s) => s.is_empty(),
        }
    }

    /// Whether two values are the same kind and can be merged.
    pub fn same_kind(&self, other: &Value) -> bool {
        matches!(
            (self, other),
            (Value::Scalar(_), Value::Scalar(_))
                | (Value::Ranges(_), Value::Ranges(_))
                | (Value::Set(_), Value::Set(_))
        )
    }

    /// Merge `other` in: scalar addition, range union, set union.
    /// Caller must have checked `same_kind`.
    pub(crate) fn merge(&mut self, other: &Value) {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => *a += *b,
            (Value::Ranges(a), Value::Ranges(b)) => a.union_with(b),
            (Value::Set(a), Value::Set(b)) => a.union_with(b),
            _ => {}
        }
    }

    /// Remove `other`: scalar subtraction saturating at zero, range and
    /// set difference. Caller must have checked `same_kind`.
    pub(crate) fn remove(&mut self, other: &Value) {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => *a = a.saturating_sub(*b),
            (Value::Ranges(a), Value::Ranges(b)) => a.subtract(b),
            (Value::Set(a), Value::Set(b)) => a.subtract(b),
            _ => {}
        }
    }

    /// Whether `other` is wholly contained in this value.
    pub fn contains(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => a >= b,
            (Value::Ranges(a), Value::Ranges(b)) => a.contains(b),
            (Value::Set(a), Value::Set(b)) => a.contains(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{s}"),
            Value::Ranges(r) => write!(f, "{r}"),
            Value::Set(s) => write!(f, "{s}"),
        }
    }
}

// =============================================================================
// Ranges
// =============================================================================

/// A canonical list of disjoint, inclusive integer ranges, e.g. ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ranges(Vec<(u64, u64)>);

impl Ranges {
    /// Builds the canonical form from arbitrary (begin, end) pairs.
    /// Pairs with `begin > end` are dropped.
    pub fn new(ranges: impl IntoIterator<Item = (u64, u64)>) -> Self {
        let mut sorted: Vec<(u64, u64)> =
            ranges.into_iter().filter(|(b, e)| b <= e).collect();
        sorted.sort_unstable();

        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(sorted.len());
        for (begin, end) in sorted {
            match merged.last_mut() {
                // Adjacent or overlapping ranges coalesce.
                Some((_, last_end)) if begin <= last_end.saturating_add(1) => {
                    *last_end = (*last_end).max(end);
                }
                _ => merged.push((begin, end)),
            }
        }
        Self(merged)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of integers covered.
    pub fn count(&self) -> u64 {
        self.0.iter().map(|(b, e)| e - b + 1).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.0.iter().copied()
    }

    pub fn union_with(&mut self, other: &Ranges) {
        *self = Ranges::new(self.iter().chain(other.iter()));
    }

    /// Removes every integer in `other` from this set of ranges.
    pub fn subtract(&mut self, other: &Ranges) {
        let mut result = Vec::with_capacity(self.0.len());
        for &(mut begin, end) in &self.0 {
            for (rb, re) in other.iter() {
                if re < begin || rb > end {
                    continue;
                }
                if rb > begin {
                    result.push((begin, rb - 1));
                }
                begin = re.saturating_add(1);
                if begin > end {
                    break;
                }
            }
            if begin <= end {
                result.push((begin, end));
            }
        }
        *self = Ranges::new(result);
    }

    pub fn contains(&self, other: &Ranges) -> bool {
        other.iter().all(|(ob, oe)| {
            self.0.iter().any(|&(b, e)| b <= ob && oe <= e)
        })
    }
}

impl fmt::Display for Ranges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (b, e)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{b}-{e}")?;
        }
        write!(f, "]")
    }
}

// =============================================================================
// Text sets
// =============================================================================

/// A set of distinct text items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSet(BTreeSet<String>);

impl TextSet {
    pub fn new(items: impl IntoIterator<Item = String>) -> Self {
        Self(items.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn union_with(&mut self, other: &TextSet) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn subtract(&mut self, other: &TextSet) {
        for item in &other.0 {
            self.0.remove(item);
        }
    }

    pub fn contains(&self, other: &TextSet) -> bool {
        other.0.is_subset(&self.0)
    }
}

impl fmt::Display for TextSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{item}")?;
        }
        write!(f, "}}")
    }
}
