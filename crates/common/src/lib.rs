//! Common utilities shared across Signal Relay crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT helpers (size limits, clock skew, bearer extraction)
pub mod jwt;
