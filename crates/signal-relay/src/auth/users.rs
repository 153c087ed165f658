//! In-memory account store.
//!
//! Passwords are hashed with bcrypt on the blocking thread pool so hashing
//! never stalls the async runtime. Accounts live for the process lifetime.

use crate::errors::RelayError;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use common::secret::{ExposeSecret, SecretString};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

struct UserRecord {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl UserRecord {
    fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public account fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Registered accounts keyed by user id.
pub struct UserStore {
    users: RwLock<HashMap<String, UserRecord>>,
    bcrypt_cost: u32,
}

impl UserStore {
    #[must_use]
    pub fn new(bcrypt_cost: u32) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            bcrypt_cost,
        }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for empty fields or an email without `@`
    /// - `Conflict` if the username or email is already taken
    /// - `Internal` if hashing fails
    #[instrument(skip_all, fields(username = %username))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: SecretString,
    ) -> Result<UserProfile, RelayError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() || password.expose_secret().is_empty() {
            return Err(RelayError::BadRequest(
                "username, email and password are required".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(RelayError::BadRequest("invalid email address".to_string()));
        }

        // Fast path: skip the expensive hash for obvious duplicates.
        Self::ensure_unique(&*self.users.read().await, username, email)?;

        let cost = self.bcrypt_cost;
        let password_hash =
            tokio::task::spawn_blocking(move || bcrypt::hash(password.expose_secret(), cost))
                .await
                .map_err(|e| RelayError::Internal(format!("hash task failed: {e}")))?
                .map_err(|e| RelayError::Internal(format!("password hashing failed: {e}")))?;

        let record = UserRecord {
            id: format!("user_{}", Uuid::new_v4().simple()),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            created_at: Utc::now(),
        };
        let profile = record.profile();

        let mut users = self.users.write().await;
        // Re-check under the write lock: a concurrent register may have won.
        Self::ensure_unique(&users, username, email)?;
        users.insert(record.id.clone(), record);
        drop(users);

        metrics::record_user_registered();
        tracing::info!(target: "relay.auth.users", user_id = %profile.id, "User registered");
        Ok(profile)
    }

    /// Check credentials; `identifier` may be a username or an email.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for an unknown identifier or wrong password.
    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        identifier: &str,
        password: SecretString,
    ) -> Result<UserProfile, RelayError> {
        let identifier = identifier.trim();
        let found = {
            let users = self.users.read().await;
            users
                .values()
                .find(|u| u.username == identifier || u.email == identifier)
                .map(|u| (u.profile(), u.password_hash.clone()))
        };

        let Some((profile, hash)) = found else {
            tracing::debug!(target: "relay.auth.users", "Login for unknown identifier");
            metrics::record_login("failure");
            return Err(RelayError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        let verified =
            tokio::task::spawn_blocking(move || bcrypt::verify(password.expose_secret(), &hash))
                .await
                .map_err(|e| RelayError::Internal(format!("verify task failed: {e}")))?
                .map_err(|e| RelayError::Internal(format!("password verification failed: {e}")))?;

        if !verified {
            tracing::debug!(target: "relay.auth.users", user_id = %profile.id, "Wrong password");
            metrics::record_login("failure");
            return Err(RelayError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        metrics::record_login("success");
        Ok(profile)
    }

    pub async fn get(&self, user_id: &str) -> Option<UserProfile> {
        self.users.read().await.get(user_id).map(UserRecord::profile)
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    fn ensure_unique(
        users: &HashMap<String, UserRecord>,
        username: &str,
        email: &str,
    ) -> Result<(), RelayError> {
        if users
            .values()
            .any(|u| u.username == username || u.email == email)
        {
            return Err(RelayError::Conflict("user already exists".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    // Minimum bcrypt cost keeps the tests fast.
    fn store() -> UserStore {
        UserStore::new(4)
    }

    fn pw(s: &str) -> SecretString {
        SecretString::from(s)
    }

    #[tokio::test]
    async fn test_register_and_login_by_username_or_email() {
        let users = store();
        let profile = users
            .register("alice", "alice@example.com", pw("hunter22"))
            .await
            .unwrap();
        assert!(profile.id.starts_with("user_"));

        let by_name = users.authenticate("alice", pw("hunter22")).await.unwrap();
        let by_email = users
            .authenticate("alice@example.com", pw("hunter22"))
            .await
            .unwrap();
        assert_eq!(by_name, profile);
        assert_eq!(by_email, profile);
        assert_eq!(users.get(&profile.id).await, Some(profile));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_username_or_email() {
        let users = store();
        users
            .register("alice", "alice@example.com", pw("a"))
            .await
            .unwrap();

        let same_name = users.register("alice", "other@example.com", pw("b")).await;
        assert!(matches!(same_name, Err(RelayError::Conflict(_))));

        let same_email = users.register("alice2", "alice@example.com", pw("b")).await;
        assert!(matches!(same_email, Err(RelayError::Conflict(_))));

        assert_eq!(users.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_validates_fields() {
        let users = store();
        assert!(matches!(
            users.register("", "a@example.com", pw("x")).await,
            Err(RelayError::BadRequest(_))
        ));
        assert!(matches!(
            users.register("bob", "not-an-email", pw("x")).await,
            Err(RelayError::BadRequest(_))
        ));
        assert!(matches!(
            users.register("bob", "bob@example.com", pw("")).await,
            Err(RelayError::BadRequest(_))
        ));
        assert!(users.is_empty().await);
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_indistinguishable() {
        let users = store();
        users
            .register("alice", "alice@example.com", pw("right"))
            .await
            .unwrap();

        let wrong_password = users.authenticate("alice", pw("wrong")).await.unwrap_err();
        let unknown_user = users.authenticate("mallory", pw("right")).await.unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert!(matches!(wrong_password, RelayError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_registration_has_single_winner() {
        let users = Arc::new(store());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let users = Arc::clone(&users);
                tokio::spawn(async move {
                    users
                        .register("carol", "carol@example.com", pw("pw"))
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(users.len().await, 1);
    }
}
