//! Typed environment lookups
//!
//! Unset variables fall back to the caller's default. Variables that are set but
//! malformed are reported as [`ConfigError::Invalid`] so a typo in a deployment
//! never silently turns into a default.

use std::str::FromStr;

use crate::error::{ConfigError, Result};

/// Values that switch a cron schedule (or any optional feature) off.
pub const DISABLED_VALUES: &[&str] = &["", "false", "off", "disable", "disabled", "no"];

/// Read a variable and parse it, falling back to `default` when unset.
pub fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => {
            let trimmed = raw.trim();
            trimmed
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(key, trimmed, e.to_string()))
        },
        Err(_) => Ok(default),
    }
}

/// Read a string variable, falling back to `default` when unset.
pub fn string_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| default.to_string())
}

/// Read an optional, non-empty string variable.
pub fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read a required, non-empty string variable.
pub fn required(key: &str) -> Result<String> {
    optional(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

/// Truthy flag: only a case-insensitive `true` (or `1`/`yes`) enables it.
pub fn flag(key: &str) -> bool {
    std::env::var(key).map(|v| is_truthy(&v)).unwrap_or(false)
}

pub fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Whether a value is one of the recognised "switched off" spellings.
pub fn is_disabled(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    DISABLED_VALUES.contains(&lowered.as_str())
}
