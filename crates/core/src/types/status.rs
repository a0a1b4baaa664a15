//! Status enums for users and bookings.

use serde::{Deserialize, Serialize};

/// Account type carried in the users table and in bearer token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parking.account_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Regular driver: may book spots and see occupancy.
    #[default]
    User,
    /// Operator: may cancel bookings, block spots and manage roles.
    Admin,
}

impl AccountType {
    /// Whether this account may use the admin endpoints.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Lower-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid account type: {s}")),
        }
    }
}

/// Stored lifecycle state of a booking.
///
/// Transitions only `Active -> Cancelled`. Natural expiry is not a state:
/// an `Active` booking whose window has passed is still `Active` in storage
/// and simply no longer occupies its spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parking.booking_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Active,
    Cancelled,
}

impl BookingStatus {
    /// Lower-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_round_trips_through_str() {
        for ty in [AccountType::User, AccountType::Admin] {
            assert_eq!(ty.to_string().parse::<AccountType>().unwrap(), ty);
        }
        assert!("superuser".parse::<AccountType>().is_err());
        assert!("Admin".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_account_type_wire_format() {
        assert_eq!(serde_json::to_string(&AccountType::Admin).unwrap(), "\"admin\"");
        assert!(serde_json::from_str::<AccountType>("\"root\"").is_err());
        assert!(AccountType::Admin.is_admin());
        assert!(!AccountType::User.is_admin());
    }

    #[test]
    fn test_booking_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!(BookingStatus::default(), BookingStatus::Active);
    }
}
