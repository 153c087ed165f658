//! Identity: session tokens, the per-connection identity and accounts.
//!
//! The relay core consumes only [`SessionIdentity`]; everything else here is
//! account glue for the HTTP surface.

pub mod claims;
pub mod jwt;
pub mod users;

pub use claims::{Claims, SessionIdentity};
pub use jwt::JwtManager;
pub use users::{UserProfile, UserStore};
