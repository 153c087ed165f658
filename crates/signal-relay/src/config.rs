//! Signal Relay configuration.
//!
//! Configuration is loaded from environment variables. The JWT signing
//! secret is redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP + WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8181";

/// Default per-client signal channel capacity.
pub const DEFAULT_SIGNAL_CHANNEL_CAPACITY: usize = 100;

/// Default number of chat messages retained per room.
pub const DEFAULT_CHAT_HISTORY_LIMIT: usize = 100;

/// Default page size for the chat history endpoint.
pub const DEFAULT_CHAT_RECENT_DEFAULT: usize = 50;

/// Default directory for recording placeholder files.
pub const DEFAULT_RECORDINGS_DIR: &str = "./recordings";

/// Default issued token lifetime (24 hours).
pub const DEFAULT_JWT_TTL_SECONDS: u64 = 86_400;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Default idle-room reaper tick.
pub const DEFAULT_ROOM_REAP_INTERVAL_SECONDS: u64 = 60;

/// Default graceful shutdown drain bound.
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 30;

/// Minimum length of the HS256 signing secret in bytes.
pub const MIN_JWT_SECRET_BYTES: usize = 32;

/// Accepted bcrypt cost range.
const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Signal Relay configuration.
#[derive(Clone)]
pub struct Config {
    /// HS256 shared secret for session tokens.
    /// Protected by `SecretString` to prevent accidental logging.
    pub jwt_secret: SecretString,

    /// HTTP + WebSocket bind address (default: "0.0.0.0:8181").
    pub bind_address: String,

    /// Per-client bounded queue size (default: 100, minimum 1).
    pub signal_channel_capacity: usize,

    /// Chat messages retained per room (default: 100).
    pub chat_history_limit: usize,

    /// Messages returned by the history endpoint when no limit is given (default: 50).
    pub chat_recent_default: usize,

    /// Directory where recording placeholder files are created.
    pub recordings_dir: PathBuf,

    /// Issued token lifetime in seconds (default: 86400).
    pub jwt_ttl_seconds: u64,

    /// `iat` clock skew tolerance in seconds (default: 300, max: 600).
    pub jwt_clock_skew_seconds: u64,

    /// bcrypt cost factor (default: 12).
    pub bcrypt_cost: u32,

    /// Per-connection idle timeout in seconds; 0 disables.
    pub idle_timeout_seconds: u64,

    /// Idle-room reaper TTL in seconds; 0 disables.
    pub room_idle_ttl_seconds: u64,

    /// Reaper tick in seconds (default: 60).
    pub room_reap_interval_seconds: u64,

    /// Graceful shutdown drain bound in seconds (default: 30).
    pub shutdown_grace_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("signal_channel_capacity", &self.signal_channel_capacity)
            .field("chat_history_limit", &self.chat_history_limit)
            .field("chat_recent_default", &self.chat_recent_default)
            .field("recordings_dir", &self.recordings_dir)
            .field("jwt_ttl_seconds", &self.jwt_ttl_seconds)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("idle_timeout_seconds", &self.idle_timeout_seconds)
            .field("room_idle_ttl_seconds", &self.room_idle_ttl_seconds)
            .field(
                "room_reap_interval_seconds",
                &self.room_reap_interval_seconds,
            )
            .field("shutdown_grace_seconds", &self.shutdown_grace_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Parse an optional numeric variable, falling back to `default` when unset.
fn parse_or<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match vars.get(key) {
        Some(value_str) => value_str.trim().parse().map_err(|e| {
            ConfigError::InvalidValue(format!(
                "{key} must be a valid non-negative integer, got '{value_str}': {e}"
            ))
        }),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// fails validation.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_secret = SecretString::from(
            vars.get("RELAY_JWT_SECRET")
                .ok_or_else(|| ConfigError::MissingEnvVar("RELAY_JWT_SECRET".to_string()))?
                .clone(),
        );

        if jwt_secret.expose_secret().len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::InvalidValue(format!(
                "RELAY_JWT_SECRET must be at least {MIN_JWT_SECRET_BYTES} bytes"
            )));
        }

        let bind_address = vars
            .get("RELAY_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let signal_channel_capacity = parse_or(
            vars,
            "RELAY_SIGNAL_CHANNEL_CAPACITY",
            DEFAULT_SIGNAL_CHANNEL_CAPACITY,
        )?;
        if signal_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_SIGNAL_CHANNEL_CAPACITY must be greater than 0".to_string(),
            ));
        }

        let chat_history_limit =
            parse_or(vars, "RELAY_CHAT_HISTORY_LIMIT", DEFAULT_CHAT_HISTORY_LIMIT)?;
        if chat_history_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_CHAT_HISTORY_LIMIT must be greater than 0".to_string(),
            ));
        }

        let chat_recent_default =
            parse_or(vars, "RELAY_CHAT_RECENT_DEFAULT", DEFAULT_CHAT_RECENT_DEFAULT)?;

        let recordings_dir = PathBuf::from(
            vars.get("RELAY_RECORDINGS_DIR")
                .map_or(DEFAULT_RECORDINGS_DIR, String::as_str),
        );

        let jwt_ttl_seconds = parse_or(vars, "RELAY_JWT_TTL_SECONDS", DEFAULT_JWT_TTL_SECONDS)?;
        if jwt_ttl_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_JWT_TTL_SECONDS must be greater than 0".to_string(),
            ));
        }

        let jwt_clock_skew_seconds = parse_or(
            vars,
            "RELAY_JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_CLOCK_SKEW.as_secs(),
        )?;
        if jwt_clock_skew_seconds > MAX_CLOCK_SKEW.as_secs() {
            return Err(ConfigError::InvalidValue(format!(
                "RELAY_JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                MAX_CLOCK_SKEW.as_secs(),
                jwt_clock_skew_seconds
            )));
        }

        let bcrypt_cost = parse_or(vars, "RELAY_BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !BCRYPT_COST_RANGE.contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "RELAY_BCRYPT_COST must be between {} and {}, got {}",
                BCRYPT_COST_RANGE.start(),
                BCRYPT_COST_RANGE.end(),
                bcrypt_cost
            )));
        }

        let idle_timeout_seconds = parse_or(vars, "RELAY_IDLE_TIMEOUT_SECONDS", 0)?;
        let room_idle_ttl_seconds = parse_or(vars, "RELAY_ROOM_IDLE_TTL_SECONDS", 0)?;

        let room_reap_interval_seconds = parse_or(
            vars,
            "RELAY_ROOM_REAP_INTERVAL_SECONDS",
            DEFAULT_ROOM_REAP_INTERVAL_SECONDS,
        )?;
        if room_reap_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_ROOM_REAP_INTERVAL_SECONDS must be greater than 0".to_string(),
            ));
        }

        let shutdown_grace_seconds = parse_or(
            vars,
            "RELAY_SHUTDOWN_GRACE_SECONDS",
            DEFAULT_SHUTDOWN_GRACE_SECONDS,
        )?;

        Ok(Config {
            jwt_secret,
            bind_address,
            signal_channel_capacity,
            chat_history_limit,
            chat_recent_default,
            recordings_dir,
            jwt_ttl_seconds,
            jwt_clock_skew_seconds,
            bcrypt_cost,
            idle_timeout_seconds,
            room_idle_ttl_seconds,
            room_reap_interval_seconds,
            shutdown_grace_seconds,
        })
    }

    /// Per-connection idle timeout, `None` when disabled.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_seconds > 0).then(|| Duration::from_secs(self.idle_timeout_seconds))
    }

    /// Idle-room reaper TTL, `None` when disabled.
    #[must_use]
    pub fn room_idle_ttl(&self) -> Option<Duration> {
        (self.room_idle_ttl_seconds > 0).then(|| Duration::from_secs(self.room_idle_ttl_seconds))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "relay-test-secret-0123456789abcdef";

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([("RELAY_JWT_SECRET".to_string(), TEST_SECRET.to_string())])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let vars = base_vars();

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.jwt_secret.expose_secret(), TEST_SECRET);
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.signal_channel_capacity, 100);
        assert_eq!(config.chat_history_limit, 100);
        assert_eq!(config.chat_recent_default, 50);
        assert_eq!(config.recordings_dir, PathBuf::from("./recordings"));
        assert_eq!(config.jwt_ttl_seconds, 86_400);
        assert_eq!(config.jwt_clock_skew_seconds, 300);
        assert_eq!(config.bcrypt_cost, DEFAULT_BCRYPT_COST);
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.room_idle_ttl(), None);
        assert_eq!(config.room_reap_interval_seconds, 60);
        assert_eq!(config.shutdown_grace_seconds, 30);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert(
            "RELAY_BIND_ADDRESS".to_string(),
            "127.0.0.1:9000".to_string(),
        );
        vars.insert(
            "RELAY_SIGNAL_CHANNEL_CAPACITY".to_string(),
            "16".to_string(),
        );
        vars.insert("RELAY_CHAT_HISTORY_LIMIT".to_string(), "20".to_string());
        vars.insert("RELAY_CHAT_RECENT_DEFAULT".to_string(), "5".to_string());
        vars.insert(
            "RELAY_RECORDINGS_DIR".to_string(),
            "/var/lib/relay/rec".to_string(),
        );
        vars.insert("RELAY_JWT_TTL_SECONDS".to_string(), "3600".to_string());
        vars.insert(
            "RELAY_JWT_CLOCK_SKEW_SECONDS".to_string(),
            "60".to_string(),
        );
        vars.insert("RELAY_BCRYPT_COST".to_string(), "4".to_string());
        vars.insert("RELAY_IDLE_TIMEOUT_SECONDS".to_string(), "90".to_string());
        vars.insert(
            "RELAY_ROOM_IDLE_TTL_SECONDS".to_string(),
            "600".to_string(),
        );
        vars.insert(
            "RELAY_ROOM_REAP_INTERVAL_SECONDS".to_string(),
            "15".to_string(),
        );
        vars.insert(
            "RELAY_SHUTDOWN_GRACE_SECONDS".to_string(),
            "5".to_string(),
        );

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.signal_channel_capacity, 16);
        assert_eq!(config.chat_history_limit, 20);
        assert_eq!(config.chat_recent_default, 5);
        assert_eq!(config.recordings_dir, PathBuf::from("/var/lib/relay/rec"));
        assert_eq!(config.jwt_ttl_seconds, 3600);
        assert_eq!(config.jwt_clock_skew_seconds, 60);
        assert_eq!(config.bcrypt_cost, 4);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.room_idle_ttl(), Some(Duration::from_secs(600)));
        assert_eq!(config.room_reap_interval_seconds, 15);
        assert_eq!(config.shutdown_grace_seconds, 5);
    }

    #[test]
    fn test_from_vars_missing_jwt_secret() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "RELAY_JWT_SECRET"));
    }

    #[test]
    fn test_from_vars_rejects_short_jwt_secret() {
        let vars = HashMap::from([("RELAY_JWT_SECRET".to_string(), "too-short".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("at least 32 bytes"))
        );
    }

    #[test]
    fn test_from_vars_rejects_zero_channel_capacity() {
        let mut vars = base_vars();
        vars.insert("RELAY_SIGNAL_CHANNEL_CAPACITY".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("RELAY_SIGNAL_CHANNEL_CAPACITY"))
        );
    }

    #[test]
    fn test_from_vars_rejects_non_numeric_value() {
        let mut vars = base_vars();
        vars.insert("RELAY_CHAT_HISTORY_LIMIT".to_string(), "lots".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("must be a valid non-negative integer"))
        );
    }

    #[test]
    fn test_from_vars_rejects_excessive_clock_skew() {
        let mut vars = base_vars();
        vars.insert(
            "RELAY_JWT_CLOCK_SKEW_SECONDS".to_string(),
            "601".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("must not exceed 600"))
        );
    }

    #[test]
    fn test_from_vars_accepts_max_clock_skew() {
        let mut vars = base_vars();
        vars.insert(
            "RELAY_JWT_CLOCK_SKEW_SECONDS".to_string(),
            "600".to_string(),
        );

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.jwt_clock_skew_seconds, 600);
    }

    #[test]
    fn test_from_vars_rejects_bcrypt_cost_out_of_range() {
        for cost in ["3", "32"] {
            let mut vars = base_vars();
            vars.insert("RELAY_BCRYPT_COST".to_string(), cost.to_string());

            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidValue(ref msg)) if msg.contains("RELAY_BCRYPT_COST")),
                "cost {cost} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_vars_rejects_zero_reap_interval() {
        let mut vars = base_vars();
        vars.insert(
            "RELAY_ROOM_REAP_INTERVAL_SECONDS".to_string(),
            "0".to_string(),
        );

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let vars = base_vars();
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(TEST_SECRET));
        assert!(debug_output.contains("0.0.0.0:8181"));
    }
}
