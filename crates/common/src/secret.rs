//! Secret types for keeping sensitive values out of logs.
//!
//! Re-exports the [`secrecy`] types used by the relay for the JWT signing
//! secret and for passwords in flight between the HTTP layer and the user
//! store. Any struct that derives `Debug` while holding a `SecretString`
//! prints `[REDACTED]` for that field.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginForm {
//!     identifier: String,
//!     password: SecretString,
//! }
//!
//! let form = LoginForm {
//!     identifier: "alice".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! assert!(!format!("{form:?}").contains("hunter2"));
//! assert_eq!(form.password.expose_secret(), "hunter2");
//! ```
//!
//! Use `SecretString` for passwords, bearer tokens and signing secrets.
//! Use `SecretBox<T>` for binary key material.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("hunter2");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("relay-signing-secret");
        assert_eq!(secret.expose_secret(), "relay-signing-secret");
    }

    #[test]
    fn test_register_form_deserializes_without_leaking() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct RegisterForm {
            username: String,
            password: SecretString,
        }

        let json = r#"{"username": "bob", "password": "correct horse"}"#;
        let form: RegisterForm = serde_json::from_str(json).expect("deserialize");

        assert_eq!(form.password.expose_secret(), "correct horse");

        let debug = format!("{form:?}");
        assert!(debug.contains("bob"));
        assert!(!debug.contains("correct horse"));
    }
}
