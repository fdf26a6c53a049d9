use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Errors surfaced by the currency exchange engine.
///
/// Every failure mode is reported to the caller; there is no silent
/// fallback rate. Callers handle these at the request boundary.
#[derive(Error, Debug)]
pub enum FxError {
    /// The currency code is not in the platform registry.
    #[error("Currency '{0}' is not supported")]
    UnsupportedCurrency(String),

    /// Conversion amounts must be non-negative.
    #[error("Amount must not be negative, got {0}")]
    NegativeAmount(Decimal),

    /// The converted amount does not fit the decimal range.
    #[error("Amount {0} is too large to convert")]
    AmountOutOfRange(Decimal),

    /// No cached rate and no refresh succeeded for the pair.
    #[error("Exchange rate not found for {0}/{1}")]
    RateNotFound(String, String),

    /// The provider could not be reached (connect failure or timeout).
    #[error("Exchange rate provider unreachable: {0}")]
    ProviderUnreachable(String),

    /// The provider answered with a documented error code.
    #[error("Exchange rate provider error: {0}")]
    Api(ApiErrorKind),

    /// The provider answered but the payload is not usable.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// The provider returned a rate that cannot be used (zero or negative).
    #[error("Invalid exchange rate {rate} for {base}/{quote}")]
    InvalidRate {
        base: String,
        quote: String,
        rate: Decimal,
    },
}

/// Documented `error-type` codes of the ExchangeRate-API style provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorKind {
    UnsupportedCode,
    InvalidApiKey,
    QuotaReached,
    MalformedRequest,
    InactiveAccount,
    Other(String),
}

impl ApiErrorKind {
    pub fn from_error_type(error_type: &str) -> Self {
        match error_type {
            "unsupported-code" => Self::UnsupportedCode,
            "invalid-key" => Self::InvalidApiKey,
            "quota-reached" => Self::QuotaReached,
            "malformed-request" => Self::MalformedRequest,
            "inactive-account" => Self::InactiveAccount,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedCode => write!(f, "currency code not supported by the provider"),
            Self::InvalidApiKey => write!(f, "API key is invalid or missing"),
            Self::QuotaReached => write!(f, "API request quota has been reached"),
            Self::MalformedRequest => write!(f, "the API request was malformed"),
            Self::InactiveAccount => write!(f, "API account is inactive"),
            Self::Other(code) => write!(f, "{}", code),
        }
    }
}

impl From<reqwest::Error> for FxError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            FxError::ProviderUnreachable(err.to_string())
        } else if err.is_decode() {
            FxError::MalformedResponse(err.to_string())
        } else {
            FxError::ProviderUnreachable(err.to_string())
        }
    }
}
