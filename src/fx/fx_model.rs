use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::currency::minor_unit_decimals;
use crate::constants::RATE_DECIMAL_PRECISION;

/// Ordered (base, quote) currency pair. Codes are stored normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    pub fn inverse(&self) -> Self {
        Self::new(self.quote.clone(), self.base.clone())
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A cached conversion factor for one currency pair.
///
/// Overwritten on each refresh; read-only to conversion callers.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub base_currency: String,
    pub quote_currency: String,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(
        base: impl Into<String>,
        quote: impl Into<String>,
        rate: Decimal,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            base_currency: base.into(),
            quote_currency: quote.into(),
            rate: rate.round_dp(RATE_DECIMAL_PRECISION),
            fetched_at,
        }
    }

    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.base_currency.clone(), self.quote_currency.clone())
    }

    /// Derives the opposite-direction rate with the same timestamp.
    /// Callers must not invert a zero rate.
    pub fn inverted(&self) -> Self {
        Self::new(
            self.quote_currency.clone(),
            self.base_currency.clone(),
            Decimal::ONE / self.rate,
            self.fetched_at,
        )
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }
}

/// An immutable monetary amount in a specific currency.
///
/// Produced by conversion; the amount is rounded to the currency's
/// minor-unit precision on construction using half-away-from-zero
/// (round-half-up for positive amounts).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    amount: Decimal,
    currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        let currency = currency.into();
        let amount = amount.round_dp_with_strategy(
            minor_unit_decimals(&currency),
            RoundingStrategy::MidpointAwayFromZero,
        );
        Self { amount, currency }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Per-pair cache status exposed to the admin rates screen.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RateInfo {
    pub base_currency: String,
    pub quote_currency: String,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
    pub age_secs: i64,
    pub is_stale: bool,
}

/// Result of one refresh cycle against the provider.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    /// Pairs whose rate changed by more than the significance threshold.
    pub updated_count: usize,
    /// Quote currencies touched by those updates.
    pub updated_currencies: BTreeSet<String>,
    /// Pairs refreshed but unchanged within the threshold.
    pub skipped_count: usize,
}
