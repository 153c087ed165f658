//! Session token issuance and validation.
//!
//! Tokens are HS256 JWTs signed with the relay's shared secret.
//!
//! # Security
//!
//! - Tokens are size- and shape-checked BEFORE parsing
//! - Only HS256 is accepted
//! - Expiration and issued-at claims are validated, `iat` with clock skew tolerance
//! - Every failure maps to one generic message

use crate::auth::claims::{Claims, SessionIdentity};
use crate::errors::RelayError;
use common::jwt::{bounded_clock_skew, check_token_shape, validate_iat};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;
use tracing::instrument;

const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Issues and validates relay session tokens.
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    clock_skew: Duration,
}

impl JwtManager {
    /// Create a manager for `secret`.
    ///
    /// `clock_skew` is clamped to `common::jwt::MAX_CLOCK_SKEW`.
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration, clock_skew: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            ttl,
            clock_skew: bounded_clock_skew(clock_skew),
        }
    }

    /// Token lifetime handed to clients as `expires_in`.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `identity`, valid for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Internal` if signing fails.
    pub fn issue(&self, identity: &SessionIdentity) -> Result<String, RelayError> {
        self.issue_at(identity, chrono::Utc::now().timestamp())
    }

    /// Issue a token with an explicit `iat`.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Internal` if signing fails.
    pub fn issue_at(&self, identity: &SessionIdentity, iat: i64) -> Result<String, RelayError> {
        // TTL is bounded by config parsing to a u64 of seconds
        #[allow(clippy::cast_possible_wrap)]
        let exp = iat + self.ttl.as_secs() as i64;
        let claims = Claims {
            sub: identity.user_id.clone(),
            username: identity.username.clone(),
            iat,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(target: "relay.auth.jwt", error = %e, "Token signing failed");
            RelayError::Internal("token signing failed".to_string())
        })
    }

    /// Validate a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Unauthorized` with a generic message for every
    /// validation failure.
    #[instrument(skip_all)]
    pub fn validate(&self, token: &str) -> Result<Claims, RelayError> {
        check_token_shape(token).map_err(|e| {
            tracing::debug!(target: "relay.auth.jwt", error = ?e, "Token shape check failed");
            RelayError::Unauthorized(INVALID_TOKEN_MESSAGE.to_string())
        })?;

        let validation = Validation::new(Algorithm::HS256);
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                tracing::debug!(target: "relay.auth.jwt", error = %e, "Token verification failed");
                RelayError::Unauthorized(INVALID_TOKEN_MESSAGE.to_string())
            })?;

        let claims = token_data.claims;
        if let Err(e) = validate_iat(claims.iat, self.clock_skew) {
            tracing::debug!(target: "relay.auth.jwt", error = ?e, "Token iat validation failed");
            return Err(RelayError::Unauthorized(INVALID_TOKEN_MESSAGE.to_string()));
        }

        Ok(claims)
    }

    /// Validate a token and return the identity it carries.
    ///
    /// # Errors
    ///
    /// See [`JwtManager::validate`].
    pub fn identify(&self, token: &str) -> Result<SessionIdentity, RelayError> {
        self.validate(token).map(SessionIdentity::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new(
            &SecretString::from("relay-test-secret-0123456789abcdef"),
            Duration::from_secs(86_400),
            Duration::from_secs(300),
        )
    }

    fn alice() -> SessionIdentity {
        SessionIdentity {
            user_id: "user-alice".to_string(),
            username: "alice".to_string(),
        }
    }

    fn assert_generic_unauthorized(result: Result<Claims, RelayError>) {
        assert!(
            matches!(&result, Err(RelayError::Unauthorized(msg)) if msg == INVALID_TOKEN_MESSAGE),
            "expected generic Unauthorized, got {result:?}"
        );
    }

    #[test]
    fn test_issue_and_validate() {
        let jwt = manager();
        let token = jwt.issue(&alice()).unwrap();

        let claims = jwt.validate(&token).unwrap();
        assert_eq!(claims.sub, "user-alice");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp - claims.iat, 86_400);

        assert_eq!(jwt.identify(&token).unwrap(), alice());
    }

    #[test]
    fn test_rejects_token_signed_with_other_secret() {
        let other = JwtManager::new(
            &SecretString::from("another-secret-another-secret-000"),
            Duration::from_secs(60),
            Duration::from_secs(300),
        );
        let token = other.issue(&alice()).unwrap();

        assert_generic_unauthorized(manager().validate(&token));
    }

    #[test]
    fn test_rejects_expired_token() {
        let jwt = manager();
        let two_days_ago = chrono::Utc::now().timestamp() - 2 * 86_400;
        let token = jwt.issue_at(&alice(), two_days_ago).unwrap();

        assert_generic_unauthorized(jwt.validate(&token));
    }

    #[test]
    fn test_rejects_iat_far_in_future() {
        let jwt = manager();
        let future = chrono::Utc::now().timestamp() + 3600;
        let token = jwt.issue_at(&alice(), future).unwrap();

        assert_generic_unauthorized(jwt.validate(&token));
    }

    #[test]
    fn test_accepts_iat_within_skew() {
        let jwt = manager();
        let slightly_ahead = chrono::Utc::now().timestamp() + 60;
        let token = jwt.issue_at(&alice(), slightly_ahead).unwrap();

        assert!(jwt.validate(&token).is_ok());
    }

    #[test]
    fn test_rejects_malformed_and_oversized_tokens() {
        let jwt = manager();

        assert_generic_unauthorized(jwt.validate("not-a-jwt"));
        assert_generic_unauthorized(jwt.validate(""));

        let oversized = format!("{}.b.c", "a".repeat(common::jwt::MAX_JWT_SIZE_BYTES));
        assert_generic_unauthorized(jwt.validate(&oversized));
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let jwt = manager();
        let token = jwt.issue(&alice()).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let payload = parts.get_mut(1).unwrap();
        *payload = payload.chars().rev().collect();

        assert_generic_unauthorized(jwt.validate(&parts.join(".")));
    }
}
