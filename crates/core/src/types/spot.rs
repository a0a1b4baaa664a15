//! Parking spot numbers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a number lies outside the lot's spot range.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("parking spot must be between {min} and {max} (got {got})", min = SpotNumber::MIN, max = SpotNumber::MAX)]
pub struct SpotNumberError {
    /// The rejected value.
    pub got: i64,
}

/// A validated parking spot number in `1..=16`.
///
/// Once a `SpotNumber` exists it is known to be inside the lot, so the
/// availability evaluator and the stores never re-check the range.
///
/// ```
/// use parkspot_core::SpotNumber;
///
/// assert_eq!(SpotNumber::new(5).unwrap().get(), 5);
/// assert!(SpotNumber::new(0).is_err());
/// assert!(SpotNumber::new(17).is_err());
/// assert_eq!(SpotNumber::all().count(), 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct SpotNumber(i32);

impl SpotNumber {
    /// Lowest spot number in the lot.
    pub const MIN: i32 = 1;
    /// Highest spot number in the lot.
    pub const MAX: i32 = 16;

    /// Validate a spot number.
    ///
    /// # Errors
    ///
    /// Returns [`SpotNumberError`] if `n` is outside `1..=16`.
    pub fn new(n: impl Into<i64>) -> Result<Self, SpotNumberError> {
        let n = n.into();
        i32::try_from(n)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
            .ok_or(SpotNumberError { got: n })
    }

    /// The spot number as an integer.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Every spot in the lot, in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

impl fmt::Display for SpotNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for SpotNumber {
    type Error = SpotNumberError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i32> for SpotNumber {
    type Error = SpotNumberError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SpotNumber> for i32 {
    fn from(spot: SpotNumber) -> Self {
        spot.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for SpotNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i32 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i32 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for SpotNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let n = <i32 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(n)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for SpotNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i32 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
