use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "USD";

/// The marketplace service fee added on top of every checkout, as a whole percentage.
pub const SERVICE_FEE_PERCENT: i64 = 5;

//--------------------------------------       Cents         ---------------------------------------------------------
/// An amount of money in the minor unit of the marketplace currency.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("Value {} is too large to convert to Cents", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

/// Formats the amount as a decimal string in major units, e.g. `1250` cents is `12.50`. This is the format that both
/// payment providers expect for prices.
impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The service fee for this amount, rounded half-up to the nearest cent.
    pub fn service_fee(&self) -> Self {
        Self((self.0 * SERVICE_FEE_PERCENT + 50) / 100)
    }

    /// This amount with the service fee added, i.e. `amount * 1.05`.
    pub fn with_service_fee(&self) -> Self {
        *self + self.service_fee()
    }

    /// Like [`Cents::with_service_fee`], but returns `None` if the fee calculation would overflow.
    pub fn checked_with_service_fee(&self) -> Option<Self> {
        let fee = self.0.checked_mul(SERVICE_FEE_PERCENT)?.checked_add(50)? / 100;
        self.0.checked_add(fee).map(Self)
    }

    /// Multiplies the amount by a quantity, returning `None` on overflow.
    pub fn checked_mul(&self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }
}
