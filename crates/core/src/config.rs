//! Environment-variable helpers shared by the hub and agent configs.
//!
//! Both binaries call `dotenvy::dotenv()` first; these helpers then read
//! through a lookup function so configs can be built from a map in tests.

use std::str::FromStr;

use crate::error::ConfigError;

/// Parse `name` if set, otherwise return `default`.
pub fn parse_or<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
        }),
        None => Ok(default),
    }
}

/// Parse `name`, failing if it is unset.
pub fn parse_required<T, F>(lookup: &F, name: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name).ok_or(ConfigError::Missing(name))?;
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value: raw })
}

/// Lookup backed by the process environment.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
