//! JWT helpers shared by the relay's identity layer.
//!
//! - Size limits checked before any parsing
//! - Clock skew constants and `iat` validation
//! - Token extraction from an `Authorization` header value
//!
//! Signature verification itself lives with the service that owns the
//! signing secret; these helpers only cover the checks that do not need it.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Tokens larger than this are rejected before base64 decoding or signature
/// verification. Typical relay tokens are well under 400 bytes.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default JWT clock skew tolerance (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during pre-signature JWT checks.
///
/// Messages are intentionally generic; details are logged at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is empty or not shaped like `header.payload.signature`.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Functions
// =============================================================================

/// Reject tokens that are oversized or structurally not a JWT.
///
/// # Errors
///
/// - `TokenTooLarge` if the token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` if the token does not have exactly three non-empty parts
pub fn check_token_shape(token: &str) -> Result<(), JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    Ok(())
}

/// Extract the token from an `Authorization` header value.
///
/// Accepts `Bearer <token>` as well as a bare token, since some clients
/// send the token without a scheme. Returns `None` for empty values.
#[must_use]
pub fn token_from_authorization(header_value: &str) -> Option<&str> {
    let trimmed = header_value.trim();
    if trimmed.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))
        .unwrap_or(trimmed)
        .trim();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Clamp a configured clock skew to [`MAX_CLOCK_SKEW`].
#[must_use]
pub fn bounded_clock_skew(requested: Duration) -> Duration {
    requested.min(MAX_CLOCK_SKEW)
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more
/// than `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // clock_skew is bounded by MAX_CLOCK_SKEW at config load
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = bounded_clock_skew(clock_skew).as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_check_token_shape_accepts_three_parts() {
        assert!(check_token_shape("aGVhZGVy.cGF5bG9hZA.c2ln").is_ok());
    }

    #[test]
    fn test_check_token_shape_rejects_wrong_part_count() {
        assert_eq!(
            check_token_shape("only.two"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            check_token_shape("a.b.c.d"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(check_token_shape(""), Err(JwtValidationError::MalformedToken));
        assert_eq!(
            check_token_shape("a..c"),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_check_token_shape_rejects_oversized_token() {
        let big = format!("{}.b.c", "a".repeat(MAX_JWT_SIZE_BYTES));
        assert_eq!(
            check_token_shape(&big),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_token_from_authorization_variants() {
        assert_eq!(token_from_authorization("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(token_from_authorization("bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(token_from_authorization("abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(token_from_authorization("  Bearer   tok  "), Some("tok"));
        assert_eq!(token_from_authorization("Bearer "), None);
        assert_eq!(token_from_authorization(""), None);
    }

    #[test]
    fn test_validate_iat_boundaries() {
        let now = 1_700_000_000;
        let skew = Duration::from_secs(300);

        assert!(validate_iat_at(now, skew, now).is_ok());
        assert!(validate_iat_at(now - 3600, skew, now).is_ok());
        assert!(validate_iat_at(now + 300, skew, now).is_ok());
        assert_eq!(
            validate_iat_at(now + 301, skew, now),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_validate_iat_clamps_excessive_skew() {
        let now = 1_700_000_000;
        let huge = Duration::from_secs(86_400);

        assert_eq!(
            validate_iat_at(now + 601, huge, now),
            Err(JwtValidationError::IatTooFarInFuture)
        );
        assert!(validate_iat_at(now + 600, huge, now).is_ok());
    }

    #[test]
    fn test_error_messages_are_generic() {
        for err in [
            JwtValidationError::TokenTooLarge,
            JwtValidationError::MalformedToken,
            JwtValidationError::IatTooFarInFuture,
        ] {
            assert_eq!(err.to_string(), "The access token is invalid or expired");
        }
    }
}
