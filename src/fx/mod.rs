//! FX (Foreign Exchange) module - domain models, services, and traits.

pub mod currency;
mod fx_errors;
mod fx_model;
mod fx_provider;
mod fx_service;
mod fx_store;
mod fx_traits;

pub use currency::{currency_info, format_money, is_supported, normalize_currency_code};
pub use fx_errors::{ApiErrorKind, FxError};
pub use fx_model::{CurrencyPair, ExchangeRate, Money, RateInfo, RefreshOutcome};
pub use fx_provider::ExchangeRateApiClient;
pub use fx_service::CurrencyExchangeService;
pub use fx_traits::{FxServiceTrait, RateProviderTrait};
