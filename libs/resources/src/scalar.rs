//! Fixed-point scalar quantities.
//!
//! Resource amounts are kept at a fixed precision of three decimal digits
//! (the smallest schedulable cpu slice is 0.001). Fixed-point integers make
//! equality and ordering exact, which the sorters and the conservation
//! invariant depend on.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use crate::ResourceError;

const PRECISION: i64 = 1_000;

/// A non-negative resource amount with millis precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scalar(i64);

impl Scalar {
    pub const ZERO: Self = Self(0);

    /// From whole units, e.g. `Scalar::units(2)` is two cpus.
    #[must_use]
    pub const fn units(units: i64) -> Self {
        Self(units * PRECISION)
    }

    /// From thousandths of a unit.
    #[must_use]
    pub const fn millis(millis: i64) -> Self {
        Self(millis)
    }

    /// From a float, rounded to the nearest thousandth.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        Self((value * PRECISION as f64).round() as i64)
    }

    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / PRECISION as f64
    }

    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Strictly positive check. Subtraction saturates at zero elsewhere,
    /// but intermediate math can still see non-positive values.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        if self.0 >= rhs.0 {
            Some(Self(self.0 - rhs.0))
        } else {
            None
        }
    }

    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self((self.0 - rhs.0).max(0))
    }

    #[must_use]
    pub fn min(self, rhs: Self) -> Self {
        Self(self.0.min(rhs.0))
    }
}

impl Add for Scalar {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Scalar {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Scalar {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }
}

impl SubAssign for Scalar {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Sum for Scalar {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % PRECISION == 0 {
            write!(f, "{}", self.0 / PRECISION)
        } else {
            let frac = format!("{:03}", self.0.abs() % PRECISION);
            write!(f, "{}.{}", self.0 / PRECISION, frac.trim_end_matches('0'))
        }
    }
}

impl std::str::FromStr for Scalar {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ResourceError::Malformed(format!("invalid scalar '{s}'"));

        if s.starts_with('-') {
            return Err(malformed());
        }
        let (whole, frac) = match s.split_once('.') {
            None => (s, ""),
            Some((w, f)) => (w, f),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(malformed());
        }
        if frac.len() > 3 {
            return Err(malformed());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| malformed())?
        };
        let frac: i64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<3}");
            padded.parse().map_err(|_| malformed())?
        };
        Ok(Self(whole * PRECISION + frac))
    }
}

impl serde::Serialize for Scalar {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> serde::Deserialize<'de> for Scalar {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(Self::from_f64(value))
    }
}
