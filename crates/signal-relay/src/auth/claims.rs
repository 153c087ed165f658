//! Session token claims and the identity attached to a connection.
//!
//! The `sub` field is redacted in Debug output to keep user identifiers
//! out of logs that print whole structs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Claims carried by relay session tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id) - redacted in Debug output.
    pub sub: String,

    /// Display name at issuance time.
    pub username: String,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("username", &self.username)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

/// Authenticated `(user_id, username)` pair.
///
/// Produced once per request or connection by token validation and trusted
/// for the lifetime of that connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_id: String,
    pub username: String,
}

impl From<Claims> for SessionIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
        }
    }
}
