/// Decimal precision for stored exchange rates
pub const RATE_DECIMAL_PRECISION: u32 = 6;

/// Relative change below which a refreshed rate is not counted as updated
pub const MIN_RELATIVE_RATE_CHANGE: &str = "0.000001";

/// Default provider endpoint (ExchangeRate-API v6 pair/latest layout)
pub const DEFAULT_API_BASE_URL: &str = "https://v6.exchangerate-api.com/v6";

/// Default provider HTTP timeout in seconds
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Extended timeout used for the bulk-fetch retry pass
pub const DEFAULT_API_EXTENDED_TIMEOUT_SECS: u64 = 45;

/// Default retry attempts per timeout tier
pub const DEFAULT_API_RETRY_ATTEMPTS: u32 = 2;

/// Default delay between retries in milliseconds
pub const DEFAULT_API_RETRY_DELAY_MS: u64 = 1000;

/// Default age in seconds after which a cached rate is considered stale
pub const DEFAULT_RATE_MAX_AGE_SECS: i64 = 3600;
