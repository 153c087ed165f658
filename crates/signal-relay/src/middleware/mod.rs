//! HTTP middleware for Signal Relay.

pub mod auth;

pub use auth::{require_auth, AuthState};
