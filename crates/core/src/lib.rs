//! Parkspot Core - Shared types library.
//!
//! This crate provides the domain vocabulary used across Parkspot components:
//! - `server` - REST backend for booking parking spots
//! - `cli` - Command-line tools for migrations and user bootstrap
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. With the `postgres` feature the types gain `sqlx`
//! encode/decode support so repositories can bind them directly.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, spot numbers and status enums
//! - [`clock`] - Time source abstraction used by availability checks

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod clock;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use types::*;
