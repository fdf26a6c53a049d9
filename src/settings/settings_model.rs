//! Engine configuration.
//!
//! Defaults mirror the platform's deployment values; each field can be
//! overridden from the environment the way the host application configures
//! its services.

use serde::Deserialize;

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_API_EXTENDED_TIMEOUT_SECS, DEFAULT_API_RETRY_ATTEMPTS,
    DEFAULT_API_RETRY_DELAY_MS, DEFAULT_API_TIMEOUT_SECS, DEFAULT_RATE_MAX_AGE_SECS,
};
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FxSettings {
    /// Provider API key.
    pub api_key: String,
    /// Provider endpoint root, without trailing slash.
    pub base_url: String,
    /// Standard HTTP timeout for provider calls, in seconds.
    pub timeout_secs: u64,
    /// Timeout for the bulk-fetch retry pass, in seconds.
    pub extended_timeout_secs: u64,
    /// Attempts per timeout tier for the bulk fetch.
    pub retry_attempts: u32,
    /// Delay between retry attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Age after which a cached rate is stale and must be refreshed
    /// before use, in seconds.
    pub rate_max_age_secs: i64,
}

impl Default for FxSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            extended_timeout_secs: DEFAULT_API_EXTENDED_TIMEOUT_SECS,
            retry_attempts: DEFAULT_API_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_API_RETRY_DELAY_MS,
            rate_max_age_secs: DEFAULT_RATE_MAX_AGE_SECS,
        }
    }
}

impl FxSettings {
    /// Loads settings from process environment variables.
    ///
    /// `EXCHANGE_RATE_API_KEY` is required; everything else falls back to
    /// the defaults above.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let api_key = lookup("EXCHANGE_RATE_API_KEY")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::MissingConfigKey("EXCHANGE_RATE_API_KEY".to_string()))?;

        Ok(Self {
            api_key,
            base_url: lookup("EXCHANGE_RATE_API_BASE_URL").unwrap_or(defaults.base_url),
            timeout_secs: parse_or(
                lookup("EXCHANGE_RATE_API_TIMEOUT"),
                "EXCHANGE_RATE_API_TIMEOUT",
                defaults.timeout_secs,
            )?,
            extended_timeout_secs: parse_or(
                lookup("EXCHANGE_RATE_API_EXTENDED_TIMEOUT"),
                "EXCHANGE_RATE_API_EXTENDED_TIMEOUT",
                defaults.extended_timeout_secs,
            )?,
            retry_attempts: parse_or(
                lookup("EXCHANGE_RATE_API_RETRY"),
                "EXCHANGE_RATE_API_RETRY",
                defaults.retry_attempts,
            )?,
            retry_delay_ms: parse_or(
                lookup("EXCHANGE_RATE_API_RETRY_DELAY"),
                "EXCHANGE_RATE_API_RETRY_DELAY",
                defaults.retry_delay_ms,
            )?,
            rate_max_age_secs: parse_or(
                lookup("CURRENCY_EXCHANGE_CACHE_TTL"),
                "CURRENCY_EXCHANGE_CACHE_TTL",
                defaults.rate_max_age_secs,
            )?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::InvalidConfigValue(format!("{}={}", key, raw))),
        None => Ok(default),
    }
}
