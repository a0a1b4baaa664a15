//! Core types for Parkspot.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod spot;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use spot::{SpotNumber, SpotNumberError};
pub use status::*;
