//! Pre-configured test data for relay tests.

use signal_relay::auth::SessionIdentity;
use signal_relay::config::Config;
use signal_relay::routes::AppState;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// HS256 secret used by every test relay (32+ bytes).
pub const TEST_JWT_SECRET: &str = "relay-test-secret-0123456789abcdef";

/// Lowest bcrypt cost accepted by configuration; keeps tests fast.
pub const TEST_BCRYPT_COST: &str = "4";

/// Test user fixture.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub user_id: String,
    pub username: String,
}

impl TestUser {
    /// Create a user named `username` with a random id.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            user_id: format!("user_{}", Uuid::new_v4().simple()),
            username: username.into(),
        }
    }

    #[must_use]
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
        }
    }
}

/// Configuration variables for a test relay rooted at `recordings_dir`.
#[must_use]
pub fn test_config_vars(recordings_dir: &std::path::Path) -> HashMap<String, String> {
    HashMap::from([
        ("RELAY_JWT_SECRET".to_string(), TEST_JWT_SECRET.to_string()),
        ("RELAY_BCRYPT_COST".to_string(), TEST_BCRYPT_COST.to_string()),
        (
            "RELAY_RECORDINGS_DIR".to_string(),
            recordings_dir.display().to_string(),
        ),
        ("RELAY_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
    ])
}

/// A fully wired `AppState` whose recordings live in a temp directory.
///
/// The directory is removed when the `TestRelay` is dropped.
pub struct TestRelay {
    pub state: Arc<AppState>,
    _recordings: TempDir,
}

impl TestRelay {
    #[must_use]
    pub fn new() -> Self {
        Self::with_vars(&[])
    }

    /// Build with extra or overriding configuration variables.
    #[must_use]
    pub fn with_vars(overrides: &[(&str, &str)]) -> Self {
        let recordings = tempfile::tempdir().expect("create temp recordings dir");
        let mut vars = test_config_vars(recordings.path());
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }
        let config = Config::from_vars(&vars).expect("valid test config");

        Self {
            state: Arc::new(AppState::new(config)),
            _recordings: recordings,
        }
    }

    /// Issue a session token for `user`.
    #[must_use]
    pub fn token_for(&self, user: &TestUser) -> String {
        self.state
            .jwt
            .issue(&user.identity())
            .expect("issue test token")
    }
}

impl Default for TestRelay {
    fn default() -> Self {
        Self::new()
    }
}
