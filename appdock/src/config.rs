//! Host configuration loaded from the environment.
//!
//! All keys are optional; defaults suit local development against a
//! backend on port 3001. Parsing and validation are separate so the CLI
//! can report a bad value before anything starts.

use crate::loader::RetryPolicy;
use std::time::Duration;
use thiserror::Error;

/// Default backend base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3001";
/// Default log directory, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "logs";
/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "appdock.log";

/// Environment variable names.
pub const ENV_BACKEND_URL: &str = "APPDOCK_BACKEND_URL";
pub const ENV_HEARTBEAT_INTERVAL_SECS: &str = "APPDOCK_HEARTBEAT_INTERVAL_SECS";
pub const ENV_LOAD_MAX_ATTEMPTS: &str = "APPDOCK_LOAD_MAX_ATTEMPTS";
pub const ENV_LOAD_BASE_DELAY_MS: &str = "APPDOCK_LOAD_BASE_DELAY_MS";
pub const ENV_LOAD_MAX_DELAY_MS: &str = "APPDOCK_LOAD_MAX_DELAY_MS";
pub const ENV_LOG_DIR: &str = "APPDOCK_LOG_DIR";
pub const ENV_LOG_FILE: &str = "APPDOCK_LOG_FILE";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// An environment variable held a value that failed to parse.
    #[error("invalid value {value:?} for {key}: {message}")]
    InvalidValue {
        key: &'static str,
        value: String,
        message: String,
    },
    /// A parsed value failed a sanity check.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete host configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Platform backend base URL.
    pub backend_url: String,
    /// Interval between heartbeat beats.
    pub heartbeat_interval: Duration,
    /// Retry policy for remote module loads.
    pub retry: RetryPolicy,
    /// Directory log files are written to.
    pub log_dir: String,
    /// Log file name within `log_dir`.
    pub log_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            heartbeat_interval: crate::heartbeat::DEFAULT_HEARTBEAT_INTERVAL,
            retry: RetryPolicy::default(),
            log_dir: DEFAULT_LOG_DIR.to_string(),
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through an arbitrary key lookup.
    ///
    /// Tests pass a closure over a map instead of mutating the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(url) = lookup(ENV_BACKEND_URL) {
            settings.backend_url = url;
        }
        if let Some(raw) = lookup(ENV_HEARTBEAT_INTERVAL_SECS) {
            settings.heartbeat_interval =
                Duration::from_secs(parse(ENV_HEARTBEAT_INTERVAL_SECS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_LOAD_MAX_ATTEMPTS) {
            settings.retry.max_attempts = parse(ENV_LOAD_MAX_ATTEMPTS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LOAD_BASE_DELAY_MS) {
            settings.retry.base_delay = Duration::from_millis(parse(ENV_LOAD_BASE_DELAY_MS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_LOAD_MAX_DELAY_MS) {
            settings.retry.max_delay = Duration::from_millis(parse(ENV_LOAD_MAX_DELAY_MS, &raw)?);
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            settings.log_dir = dir;
        }
        if let Some(file) = lookup(ENV_LOG_FILE) {
            settings.log_file = file;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Sanity-checks parsed values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_url.is_empty() {
            return Err(ConfigError::Invalid("backend URL must not be empty".into()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "heartbeat interval must be greater than zero".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "load retry attempts must be at least 1".into(),
            ));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(ConfigError::Invalid(
                "retry base delay must not exceed the max delay".into(),
            ));
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(pairs: &'a [(&'static str, &'a str)]) -> impl Fn(&'static str) -> Option<String> + 'a {
        let map: HashMap<&'static str, String> = pairs
            .iter()
            .map(|(k, v)| (*k, v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(settings.retry.max_attempts, 3);
    }

    #[test]
    fn overrides_are_picked_up() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_BACKEND_URL, "https://platform.example.com"),
            (ENV_HEARTBEAT_INTERVAL_SECS, "5"),
            (ENV_LOAD_MAX_ATTEMPTS, "7"),
            (ENV_LOAD_BASE_DELAY_MS, "250"),
        ]))
        .unwrap();

        assert_eq!(settings.backend_url, "https://platform.example.com");
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(settings.retry.max_attempts, 7);
        assert_eq!(settings.retry.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn unparsable_value_names_the_key() {
        let err = Settings::from_lookup(lookup(&[(ENV_LOAD_MAX_ATTEMPTS, "lots")])).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, ENV_LOAD_MAX_ATTEMPTS);
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_attempts_fails_validation() {
        let err = Settings::from_lookup(lookup(&[(ENV_LOAD_MAX_ATTEMPTS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn inverted_delays_fail_validation() {
        let err = Settings::from_lookup(lookup(&[
            (ENV_LOAD_BASE_DELAY_MS, "5000"),
            (ENV_LOAD_MAX_DELAY_MS, "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
