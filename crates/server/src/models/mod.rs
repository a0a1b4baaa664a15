//! Domain models for the parking server.

pub mod booking;
pub mod user;

pub use booking::{BlockedSpot, Booking, NewBooking, SpotSnapshot};
pub use user::{CurrentUser, User};
