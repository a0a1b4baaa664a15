//! Business logic services.

pub mod auth;
pub mod availability;
pub mod booking;

pub use auth::{AuthError, AuthService, TokenError, TokenKeys};
pub use availability::{Availability, evaluate};
pub use booking::{BookingError, BookingService, ConflictReason};
