//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Request handling never reads process-wide environment variables.

use clinic_types::EmailAddress;
use std::time::Duration;

use crate::constants::{
    DEFAULT_MESSAGE_HISTORY_LIMIT, DEFAULT_PRESENCE_WRITE_TIMEOUT_MS, MIN_PASSWORD_LEN,
};
use crate::{ClinicError, ClinicResult};

/// Credentials of an administrator created at startup when no user has that email yet.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: EmailAddress,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    presence_write_timeout: Duration,
    message_history_limit: usize,
    bootstrap_admin: Option<BootstrapAdmin>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::BadRequest`] if the timeout is zero or the history limit is zero.
    pub fn new(presence_write_timeout: Duration, message_history_limit: usize) -> ClinicResult<Self> {
        if presence_write_timeout.is_zero() {
            return Err(ClinicError::bad_request(
                "presence write timeout must be greater than zero",
            ));
        }
        if message_history_limit == 0 {
            return Err(ClinicError::bad_request(
                "message history limit must be greater than zero",
            ));
        }

        Ok(Self {
            presence_write_timeout,
            message_history_limit,
            bootstrap_admin: None,
        })
    }

    /// Attach bootstrap administrator credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::BadRequest`] for a malformed email or a short password.
    pub fn with_bootstrap_admin(mut self, email: &str, password: String) -> ClinicResult<Self> {
        let email = EmailAddress::parse(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClinicError::bad_request(format!(
                "bootstrap admin password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        self.bootstrap_admin = Some(BootstrapAdmin { email, password });
        Ok(self)
    }

    pub fn presence_write_timeout(&self) -> Duration {
        self.presence_write_timeout
    }

    pub fn message_history_limit(&self) -> usize {
        self.message_history_limit
    }

    pub fn bootstrap_admin(&self) -> Option<&BootstrapAdmin> {
        self.bootstrap_admin.as_ref()
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            presence_write_timeout: Duration::from_millis(DEFAULT_PRESENCE_WRITE_TIMEOUT_MS),
            message_history_limit: DEFAULT_MESSAGE_HISTORY_LIMIT,
            bootstrap_admin: None,
        }
    }
}

/// Parse a millisecond duration from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns `default_ms`.
pub fn duration_ms_from_env_value(value: Option<String>, default_ms: u64) -> ClinicResult<Duration> {
    let ms = number_from_env_value(value, default_ms)?;
    Ok(Duration::from_millis(ms))
}

/// Parse an unsigned number from an optional string value, falling back to `default`.
pub fn number_from_env_value<T>(value: Option<String>, default: T) -> ClinicResult<T>
where
    T: std::str::FromStr,
{
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse::<T>()
            .map_err(|_| ClinicError::bad_request(format!("'{v}' is not a valid number"))),
        None => Ok(default),
    }
}
