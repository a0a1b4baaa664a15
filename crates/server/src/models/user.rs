//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use parkspot_core::{AccountType, Email, UserId};

/// A parking account (domain type).
///
/// Serialised as `{id, email, account_type}`; the password hash never
/// leaves [`crate::db::users`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub account_type: AccountType,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
}

/// The caller identified by a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub account_type: AccountType,
}
