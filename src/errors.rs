//! Root error types for the currency exchange engine.
//!
//! Module-specific errors (`FxError`) are wrapped here so callers at the
//! request boundary only ever match on one type.

use thiserror::Error;

use crate::fx::FxError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the exchange engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Currency exchange failed: {0}")]
    Fx(#[from] FxError),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Missing configuration key: {0}")]
    MissingConfigKey(String),
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
