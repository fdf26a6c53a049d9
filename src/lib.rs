//! hostpanel-fx - currency exchange engine for the HostPanel platform.
//!
//! Converts monetary amounts between currency codes using a rate table
//! refreshed from an external exchange-rate provider, with an in-process
//! cache, staleness handling, and a domain event emitted after refreshes.
//!
//! The service is constructed once at process start and injected into
//! callers; the free functions below are the boundary contract the rest of
//! the platform depends on.

pub mod constants;
pub mod errors;
pub mod events;
pub mod fx;
pub mod settings;

pub use errors::{Error, Result};
pub use fx::{
    ApiErrorKind, CurrencyExchangeService, CurrencyPair, ExchangeRate, ExchangeRateApiClient,
    FxError, FxServiceTrait, Money, RateInfo, RateProviderTrait, RefreshOutcome,
};
pub use settings::FxSettings;

use rust_decimal::Decimal;

/// Converts an amount between two currency codes.
pub async fn currency_convert(
    service: &dyn FxServiceTrait,
    amount: Decimal,
    from: &str,
    to: &str,
) -> Result<Money> {
    service.convert_with_amount(from, to, amount).await
}

/// Renders a money value with its currency symbol and grouped thousands.
pub fn format_money(money: &Money) -> String {
    fx::currency::format_money(money)
}

/// Converts a USD amount into Rwandan francs.
pub async fn usd_to_frw(service: &dyn FxServiceTrait, amount: Decimal) -> Result<Money> {
    service.convert_usd_to_frw(amount).await
}

/// Converts a Rwandan franc amount into USD.
pub async fn frw_to_usd(service: &dyn FxServiceTrait, amount: Decimal) -> Result<Money> {
    service.convert_frw_to_usd(amount).await
}
