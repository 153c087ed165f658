//! Authentication middleware for protected routes.
//!
//! The token is read from the `Authorization` header (`Bearer <token>` or a
//! bare token). Clients that cannot set headers on a WebSocket handshake may
//! pass it as the `token` query parameter instead. On success the caller's
//! [`SessionIdentity`] is stored in request extensions.

use crate::auth::{JwtManager, SessionIdentity};
use crate::errors::RelayError;
use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::IntoResponse,
};
use common::jwt::token_from_authorization;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<JwtManager>,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Token from the header, falling back to the `token` query parameter.
fn extract_token(req: &Request) -> Result<String, RelayError> {
    if let Some(header) = req.headers().get(axum::http::header::AUTHORIZATION) {
        let value = header.to_str().map_err(|_| {
            tracing::debug!(target: "relay.middleware.auth", "Non-ASCII Authorization header");
            RelayError::Unauthorized("Invalid Authorization header".to_string())
        })?;
        return token_from_authorization(value)
            .map(str::to_string)
            .ok_or_else(|| RelayError::Unauthorized("Invalid Authorization header".to_string()));
    }

    Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "relay.middleware.auth", "No access token in request");
            RelayError::Unauthorized("Authorization required".to_string())
        })
}

/// Validate the caller's token and attach its identity.
///
/// # Response
///
/// - Returns 401 Unauthorized if the token is missing or invalid
/// - Continues with `SessionIdentity` in extensions otherwise
#[instrument(skip_all, name = "relay.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, RelayError> {
    let token = extract_token(&req)?;
    let identity: SessionIdentity = state.jwt.identify(&token)?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
