//! Client sync configuration.
//!
//! Provides a `SyncConfig` used by every client of the sync server to locate
//! the server and tune debounce and reconnect timing.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::util::non_blank;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Timing and endpoint settings for a client sync orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Base URL of the sync server, without trailing slash.
    pub server_url: String,
    /// Quiet period collapsing bursts of local edits into one sync.
    pub debounce: Duration,
    /// Quiet period collapsing bursts of push notifications.
    pub notification_debounce: Duration,
    /// Delay before reopening a closed push channel while online.
    pub reconnect_interval: Duration,
    /// Connectivity poll interval while offline.
    pub offline_poll_interval: Duration,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// Upper bound on consecutive rounds of one `sync()` call.
    pub max_sync_rounds: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            debounce: Duration::from_millis(500),
            notification_debounce: Duration::from_millis(300),
            reconnect_interval: Duration::from_secs(2),
            offline_poll_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            max_sync_rounds: 5,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let server_url = normalize_server_url(
            optional_trimmed(&lookup, "SHOPLIST_SERVER_URL")
                .unwrap_or(defaults.server_url),
        )?;

        let debounce_ms = parse_in_range(&lookup, "SHOPLIST_SYNC_DEBOUNCE_MS", 500, 10..=60_000)?;
        let notification_debounce_ms =
            parse_in_range(&lookup, "SHOPLIST_PUSH_DEBOUNCE_MS", 300, 10..=60_000)?;
        let reconnect_secs = parse_in_range(&lookup, "SHOPLIST_RECONNECT_SECS", 2, 1..=10)?;
        let offline_poll_secs =
            parse_in_range(&lookup, "SHOPLIST_OFFLINE_POLL_SECS", 10, 5..=600)?;
        let request_timeout_secs =
            parse_in_range(&lookup, "SHOPLIST_REQUEST_TIMEOUT_SECS", 10, 1..=120)?;
        let max_sync_rounds = parse_in_range(&lookup, "SHOPLIST_MAX_SYNC_ROUNDS", 5, 2..=20)?;

        Ok(Self {
            server_url,
            debounce: Duration::from_millis(debounce_ms),
            notification_debounce: Duration::from_millis(notification_debounce_ms),
            reconnect_interval: Duration::from_secs(reconnect_secs),
            offline_poll_interval: Duration::from_secs(offline_poll_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_sync_rounds: u32::try_from(max_sync_rounds).unwrap_or(u32::MAX),
        })
    }

    /// Override the server URL (e.g. from a CLI flag), validating it.
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Result<Self, ConfigError> {
        self.server_url = normalize_server_url(server_url.into())?;
        Ok(self)
    }
}

/// Trim and validate a server base URL.
pub fn normalize_server_url(raw: String) -> Result<String, ConfigError> {
    let url = non_blank(Some(raw)).ok_or_else(|| {
        ConfigError::Invalid("SHOPLIST_SERVER_URL must not be empty".to_string())
    })?;
    if !["http://", "https://"].iter().any(|scheme| url.starts_with(scheme)) {
        return Err(ConfigError::Invalid(
            "SHOPLIST_SERVER_URL must start with http:// or https://".to_string(),
        ));
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn parse_in_range(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(default);
    };
    let value = raw.parse::<u64>().map_err(|_| {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    })?;
    if !range.contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{}, {}]",
            range.start(),
            range.end()
        )));
    }
    Ok(value)
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    non_blank(lookup(name))
}
