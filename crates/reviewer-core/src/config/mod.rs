//! Client configuration resolved from the environment.
//!
//! Every value has a default so a client can run fully offline with no
//! configuration at all; setting `REVIEWER_API_URL` enables sync.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

/// Remote collection notes are pushed to and pulled from
pub const DEFAULT_REMOTE_COLLECTION: &str = "notes";
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tuning of the sync engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Period of the background sync timer
    pub interval: Duration,
    /// Attempts before a failing mutation is dropped
    pub max_attempts: u32,
    /// Remote records fetched per pull
    pub page_size: usize,
    /// Remote collection documents are written to
    pub remote_collection: String,
    /// First retry delay; zero retries on the next cycle
    pub retry_base_delay: Duration,
    /// Upper bound for the exponential retry delay
    pub retry_max_delay: Duration,
    /// Drop mutations on the first non-retryable failure
    pub drop_permanent_failures: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            page_size: DEFAULT_PAGE_SIZE,
            remote_collection: DEFAULT_REMOTE_COLLECTION.to_string(),
            retry_base_delay: Duration::ZERO,
            retry_max_delay: DEFAULT_MAX_BACKOFF,
            drop_permanent_failures: false,
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub const fn with_retry_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self
    }

    #[must_use]
    pub const fn dropping_permanent_failures(mut self, enabled: bool) -> Self {
        self.drop_permanent_failures = enabled;
        self
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let interval = parse_optional::<u64>(lookup, "REVIEWER_SYNC_INTERVAL_SECS")?
            .map_or(defaults.interval, Duration::from_secs);
        if interval.is_zero() {
            return Err(ConfigError::Invalid(
                "REVIEWER_SYNC_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let max_attempts = parse_optional::<u32>(lookup, "REVIEWER_SYNC_MAX_ATTEMPTS")?
            .unwrap_or(defaults.max_attempts);
        if max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "REVIEWER_SYNC_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let page_size = parse_optional::<usize>(lookup, "REVIEWER_SYNC_PAGE_SIZE")?
            .unwrap_or(defaults.page_size);
        if page_size == 0 {
            return Err(ConfigError::Invalid(
                "REVIEWER_SYNC_PAGE_SIZE must be at least 1".to_string(),
            ));
        }

        let remote_collection = optional_trimmed(lookup, "REVIEWER_SYNC_COLLECTION")
            .unwrap_or(defaults.remote_collection);

        let retry_base_delay = parse_optional::<u64>(lookup, "REVIEWER_SYNC_BACKOFF_MS")?
            .map_or(defaults.retry_base_delay, Duration::from_millis);
        let retry_max_delay = parse_optional::<u64>(lookup, "REVIEWER_SYNC_BACKOFF_MAX_MS")?
            .map_or(defaults.retry_max_delay, Duration::from_millis);

        let drop_permanent_failures =
            parse_bool(lookup, "REVIEWER_SYNC_DROP_PERMANENT")?.unwrap_or(false);

        Ok(Self {
            interval,
            max_attempts,
            page_size,
            remote_collection,
            retry_base_delay,
            retry_max_delay,
            drop_permanent_failures,
        })
    }
}

/// Everything a client needs to open its store and reach the remote
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Offline store location; the caller picks a default when unset
    pub db_path: Option<PathBuf>,
    /// Records service base URL; sync is disabled when unset
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    /// Vault new notes are filed under
    pub default_vault: Option<String>,
    pub sync: SyncSettings,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("db_path", &self.db_path)
            .field("api_url", &self.api_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("default_vault", &self.default_vault)
            .field("sync", &self.sync)
            .finish()
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path = optional_trimmed(&lookup, "REVIEWER_DB_PATH").map(PathBuf::from);

        let api_url = optional_trimmed(&lookup, "REVIEWER_API_URL");
        if let Some(url) = &api_url {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(
                    "REVIEWER_API_URL must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(Self {
            db_path,
            api_url: api_url.map(|url| url.trim_end_matches('/').to_string()),
            api_token: optional_trimmed(&lookup, "REVIEWER_API_TOKEN"),
            default_vault: optional_trimmed(&lookup, "REVIEWER_VAULT"),
            sync: SyncSettings::from_lookup(&lookup)?,
        })
    }

    /// Whether a remote is configured
    pub const fn is_sync_configured(&self) -> bool {
        self.api_url.is_some()
    }
}

fn optional_trimmed(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

fn parse_optional<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    optional_trimmed(lookup, name)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid(format!("{name} has invalid value '{value}'")))
        })
        .transpose()
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<bool>, ConfigError> {
    optional_trimmed(lookup, name)
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid(format!(
                "{name} must be a boolean, got '{value}'"
            ))),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        ClientConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(!config.is_sync_configured());
        assert_eq!(config.db_path, None);
        assert_eq!(config.sync, SyncSettings::default());
        assert_eq!(config.sync.interval, Duration::from_secs(30));
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.sync.page_size, 100);
        assert_eq!(config.sync.remote_collection, "notes");
        assert!(config.sync.retry_base_delay.is_zero());
        assert!(!config.sync.drop_permanent_failures);
    }

    #[test]
    fn reads_all_sync_settings() {
        let config = config_from(&[
            ("REVIEWER_API_URL", " https://api.example.com/ "),
            ("REVIEWER_API_TOKEN", "token"),
            ("REVIEWER_DB_PATH", "/tmp/reviewer.db"),
            ("REVIEWER_VAULT", "work"),
            ("REVIEWER_SYNC_INTERVAL_SECS", "5"),
            ("REVIEWER_SYNC_MAX_ATTEMPTS", "4"),
            ("REVIEWER_SYNC_PAGE_SIZE", "25"),
            ("REVIEWER_SYNC_COLLECTION", "drafts"),
            ("REVIEWER_SYNC_BACKOFF_MS", "250"),
            ("REVIEWER_SYNC_BACKOFF_MAX_MS", "1000"),
            ("REVIEWER_SYNC_DROP_PERMANENT", "yes"),
        ])
        .unwrap();

        assert_eq!(config.api_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/reviewer.db")));
        assert_eq!(config.default_vault.as_deref(), Some("work"));
        assert_eq!(
            config.sync,
            SyncSettings {
                interval: Duration::from_secs(5),
                max_attempts: 4,
                page_size: 25,
                remote_collection: "drafts".to_string(),
                retry_base_delay: Duration::from_millis(250),
                retry_max_delay: Duration::from_millis(1000),
                drop_permanent_failures: true,
            }
        );
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(config_from(&[("REVIEWER_API_URL", "api.example.com")]).is_err());
        assert!(config_from(&[("REVIEWER_SYNC_INTERVAL_SECS", "0")]).is_err());
        assert!(config_from(&[("REVIEWER_SYNC_MAX_ATTEMPTS", "zero")]).is_err());
        assert!(config_from(&[("REVIEWER_SYNC_PAGE_SIZE", "0")]).is_err());
        let err = config_from(&[("REVIEWER_SYNC_DROP_PERMANENT", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("REVIEWER_SYNC_DROP_PERMANENT"));
    }

    #[test]
    fn debug_redacts_token() {
        let config = config_from(&[
            ("REVIEWER_API_URL", "https://api.example.com"),
            ("REVIEWER_API_TOKEN", "sensitive-token"),
        ])
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sensitive-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
