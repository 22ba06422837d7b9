//! Tag-stripped scalar totals.
//!
//! Fairness, quota and headroom math all operate on plain `name -> amount`
//! totals with reservation and revocability stripped. Ranges and sets do
//! not participate; only scalars count.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Scalar;

/// Scalar totals by resource name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantities(BTreeMap<String, Scalar>);

impl Quantities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Scalar {
        self.0.get(name).copied().unwrap_or(Scalar::ZERO)
    }

    pub fn insert(&mut self, name: impl Into<String>, amount: Scalar) {
        if amount.is_positive() {
            self.0.insert(name.into(), amount);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Scalar)> + '_ {
        self.0.iter().map(|(name, amount)| (name.as_str(), *amount))
    }

    pub fn add(&mut self, name: &str, amount: Scalar) {
        if amount.is_zero() {
            return;
        }
        let entry = self.0.entry(name.to_string()).or_insert(Scalar::ZERO);
        *entry += amount;
    }

    /// Componentwise subtraction, saturating at zero; drained names are
    /// dropped.
    pub fn subtract(&mut self, name: &str, amount: Scalar) {
        if let Some(current) = self.0.get_mut(name) {
            *current = current.saturating_sub(amount);
            if current.is_zero() {
                self.0.remove(name);
            }
        }
    }

    pub fn add_all(&mut self, other: &Quantities) {
        for (name, amount) in other.iter() {
            self.add(name, amount);
        }
    }

    pub fn subtract_all(&mut self, other: &Quantities) {
        for (name, amount) in other.iter() {
            self.subtract(name, amount);
        }
    }

    /// Componentwise `self >= other`.
    pub fn contains(&self, other: &Quantities) -> bool {
        other.iter().all(|(name, amount)| self.get(name) >= amount)
    }

    /// Componentwise `max(0, self - other)`.
    #[must_use]
    pub fn saturating_sub(&self, other: &Quantities) -> Quantities {
        let mut result = self.clone();
        result.subtract_all(other);
        result
    }

    /// Componentwise minimum over the names present in both.
    #[must_use]
    pub fn min(&self, other: &Quantities) -> Quantities {
        let mut result = Quantities::new();
        for (name, amount) in self.iter() {
            let capped = amount.min(other.get(name));
            if capped.is_positive() {
                result.insert(name, capped);
            }
        }
        result
    }
}

impl FromIterator<(String, Scalar)> for Quantities {
    fn from_iter<I: IntoIterator<Item = (String, Scalar)>>(iter: I) -> Self {
        let mut quantities = Quantities::new();
        for (name, amount) in iter {
            quantities.add(&name, amount);
        }
        quantities
    }
}

impl fmt::Display for Quantities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, amount)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, "{name}:{amount}")?;
        }
        Ok(())
    }
}
