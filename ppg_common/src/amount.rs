use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

//--------------------------------------     MinorAmount     ---------------------------------------------------------

/// A monetary amount in minor currency units (cents for EUR-like currencies).
///
/// All threshold comparisons in the gateway (notably the RBA step-up limit) are done on this type
/// to avoid floating-point money arithmetic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinorAmount(i64);

impl Add for MinorAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for MinorAmount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for MinorAmount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Sum for MinorAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a minor-unit amount: {0}")]
pub struct MinorAmountConversionError(String);

impl From<i64> for MinorAmount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for MinorAmount {
    type Error = MinorAmountConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MinorAmountConversionError(format!("Value {value} is too large for a minor-unit amount")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for MinorAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl MinorAmount {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(major: i64) -> Self {
        Self(major * 100)
    }
}
