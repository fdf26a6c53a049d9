use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

use super::fx_errors::FxError;
use super::fx_model::{Money, RateInfo, RefreshOutcome};
use crate::errors::Result;

/// Contract for the outbound exchange-rate provider.
///
/// Implemented by the HTTP client and by in-memory mocks in tests.
#[async_trait]
pub trait RateProviderTrait: Send + Sync {
    /// Fetches the conversion rate for one (from, to) pair.
    async fn fetch_pair_rate(&self, from: &str, to: &str) -> std::result::Result<Decimal, FxError>;

    /// Fetches the full latest-rates table for a base currency,
    /// keyed by quote currency code.
    async fn fetch_latest_rates(
        &self,
        base: &str,
    ) -> std::result::Result<HashMap<String, Decimal>, FxError>;
}

/// Contract for currency exchange operations the rest of the platform
/// depends on. Injected explicitly; constructed once at process start.
#[async_trait]
pub trait FxServiceTrait: Send + Sync {
    /// Converts an amount between two currency codes, refreshing the rate
    /// from the provider when it is missing or stale.
    async fn convert_with_amount(&self, from: &str, to: &str, amount: Decimal) -> Result<Money>;

    /// Fixed-pair convenience wrapper for the platform's main corridor.
    async fn convert_usd_to_frw(&self, amount: Decimal) -> Result<Money>;

    /// Fixed-pair convenience wrapper for the platform's main corridor.
    async fn convert_frw_to_usd(&self, amount: Decimal) -> Result<Money>;

    /// Fetches the latest rate table for `base` and upserts the store,
    /// emitting `ExchangeRatesUpdated` when anything changed.
    async fn refresh_rates(&self, base: &str) -> Result<RefreshOutcome>;

    /// Runs `refresh_rates` only when the cache is stale.
    /// Returns true when a refresh was performed.
    async fn refresh_if_stale(&self, base: &str) -> Result<bool>;

    /// Renders a money value with symbol and locale grouping.
    fn format_money(&self, money: &Money) -> String;

    /// Cache status for one pair, if cached in either direction.
    fn rate_info(&self, from: &str, to: &str) -> Result<Option<RateInfo>>;

    /// Cache status for every cached pair.
    fn rates_overview(&self) -> Vec<RateInfo>;

    /// True when no cached rate is fresh enough to use.
    fn rates_are_stale(&self) -> bool;

    /// Drops one cached pair, or everything when `pair` is `None`.
    fn clear_cache(&self, pair: Option<(&str, &str)>);
}
