use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use shoplist_core::store::DEFAULT_NOTIFY_CAPACITY;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Directory holding one JSON file per list; `None` keeps lists in memory.
    pub data_dir: Option<PathBuf>,
    pub notify_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "SHOPLIST_API_BIND_ADDR", "127.0.0.1:8080");

        let data_dir = match optional_trimmed(&lookup, "SHOPLIST_DATA_DIR").as_deref() {
            None => Some(PathBuf::from("data")),
            Some(":memory:") => None,
            Some(dir) => Some(PathBuf::from(dir)),
        };

        let default_capacity = DEFAULT_NOTIFY_CAPACITY.to_string();
        let notify_capacity =
            value_or_default(&lookup, "SHOPLIST_NOTIFY_CAPACITY", &default_capacity)
                .parse::<usize>()
                .map_err(|_| {
                    ConfigError::Invalid(
                        "SHOPLIST_NOTIFY_CAPACITY must be an integer in [1, 4096]".to_string(),
                    )
                })?;
        if !(1..=4096).contains(&notify_capacity) {
            return Err(ConfigError::Invalid(
                "SHOPLIST_NOTIFY_CAPACITY must be in [1, 4096]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            data_dir,
            notify_capacity,
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
