//! Environment configuration helpers
//!
//! Thin typed wrappers over `std::env` used by the configuration builders of
//! the other crates. Empty values are treated as unset.

use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty
    #[error("environment variable {0} is not set")]
    Missing(String),

    /// A variable is set but cannot be parsed
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Read a variable, returning `None` when it is unset or blank
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable; `Ok(None)` when unset
pub fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                name: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Read a comma-separated list; blank entries are dropped
pub fn env_list(name: &str) -> Option<Vec<String>> {
    env_var(name).map(|raw| split_list(&raw))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
