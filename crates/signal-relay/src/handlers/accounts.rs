//! Account handlers.
//!
//! - `POST /register` - Create an account
//! - `POST /login` - Exchange credentials for a session token
//!
//! Passwords are wrapped in `SecretString` as soon as they are parsed and
//! never logged.

use crate::auth::SessionIdentity;
use crate::errors::RelayError;
use crate::handlers::{parse_body, require_field};
use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Json};
use common::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: SecretString,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user_id: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    /// Username or email.
    identifier: String,
    password: SecretString,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user_id: String,
    pub username: String,
}

/// Handler for POST /register
///
/// # Response
///
/// - 201 Created: Account created
/// - 400 Bad Request: Missing or malformed fields
/// - 409 Conflict: Username or email already registered
#[instrument(skip_all, name = "relay.accounts.register")]
pub async fn register(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<RegisterResponse>), RelayError> {
    let request: RegisterRequest = parse_body(&body)?;
    require_field(&request.username, "username")?;
    require_field(&request.email, "email")?;

    let profile = state
        .users
        .register(&request.username, &request.email, request.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            user_id: profile.id,
        }),
    ))
}

/// Handler for POST /login
///
/// # Response
///
/// - 200 OK: Token issued
/// - 400 Bad Request: Malformed body
/// - 401 Unauthorized: Unknown identifier or wrong password
#[instrument(skip_all, name = "relay.accounts.login")]
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<Json<LoginResponse>, RelayError> {
    let request: LoginRequest = parse_body(&body)?;
    require_field(&request.identifier, "identifier")?;

    let profile = state
        .users
        .authenticate(&request.identifier, request.password)
        .await?;

    let identity = SessionIdentity {
        user_id: profile.id,
        username: profile.username,
    };
    let token = state.jwt.issue(&identity)?;

    info!(target: "relay.accounts", user_id = %identity.user_id, "Login successful");

    Ok(Json(LoginResponse {
        message: "Login successful",
        token,
        token_type: "Bearer",
        expires_in: state.jwt.ttl().as_secs(),
        user_id: identity.user_id,
        username: identity.username,
    }))
}
