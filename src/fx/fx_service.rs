use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::currency::{self, is_supported, normalize_currency_code};
use super::fx_errors::FxError;
use super::fx_model::{CurrencyPair, ExchangeRate, Money, RateInfo, RefreshOutcome};
use super::fx_store::RateStore;
use super::fx_traits::{FxServiceTrait, RateProviderTrait};
use crate::constants::MIN_RELATIVE_RATE_CHANGE;
use crate::errors::Result;
use crate::events::{DomainEvent, DomainEventSink, NoOpDomainEventSink};
use crate::settings::FxSettings;

/// Currency exchange service backed by the shared rate store and an
/// external rate provider.
///
/// Constructed once at process start and injected into callers. Conversion
/// reads the store and falls back to a single-flighted provider fetch on a
/// miss or a stale entry; a failed refresh fails the conversion rather than
/// silently reusing the stale value.
#[derive(Clone)]
pub struct CurrencyExchangeService {
    store: Arc<RateStore>,
    provider: Arc<dyn RateProviderTrait>,
    event_sink: Arc<dyn DomainEventSink>,
    settings: FxSettings,
    /// Per-pair refresh guards, so N concurrent misses for one pair make
    /// exactly one outbound call.
    inflight: Arc<DashMap<CurrencyPair, Arc<Mutex<()>>>>,
}

impl CurrencyExchangeService {
    pub fn new(provider: Arc<dyn RateProviderTrait>, settings: FxSettings) -> Self {
        Self {
            store: Arc::new(RateStore::new()),
            provider,
            event_sink: Arc::new(NoOpDomainEventSink),
            settings,
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Sets the domain event sink for this service.
    pub fn with_event_sink(mut self, event_sink: Arc<dyn DomainEventSink>) -> Self {
        self.event_sink = event_sink;
        self
    }

    fn max_age(&self) -> Duration {
        Duration::seconds(self.settings.rate_max_age_secs)
    }

    /// Normalizes a code and checks it against the platform registry.
    fn validate_code(code: &str) -> std::result::Result<String, FxError> {
        let normalized = normalize_currency_code(code);
        let well_formed =
            normalized.len() == 3 && normalized.chars().all(|c| c.is_ascii_alphabetic());
        if !well_formed || !is_supported(&normalized) {
            return Err(FxError::UnsupportedCurrency(code.to_string()));
        }
        Ok(normalized)
    }

    /// Current usable rate for two distinct normalized codes.
    async fn current_rate(&self, from: &str, to: &str) -> std::result::Result<Decimal, FxError> {
        let pair = CurrencyPair::new(from, to);
        let now = Utc::now();

        if let Some(rate) = self.store.get_either(&pair) {
            if !rate.is_stale(now, self.max_age()) {
                return Ok(rate.rate);
            }
            debug!("cached rate for {} is stale, refreshing before use", pair);
        }

        self.refresh_pair(pair).await
    }

    /// Fetches one pair from the provider under a per-pair lock.
    ///
    /// After the lock is acquired the store is checked again: whoever lost
    /// the race reuses the winner's freshly cached rate.
    async fn refresh_pair(&self, pair: CurrencyPair) -> std::result::Result<Decimal, FxError> {
        let guard = self
            .inflight
            .entry(pair.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _held = guard.lock().await;

        let now = Utc::now();
        if let Some(rate) = self.store.get_either(&pair) {
            if !rate.is_stale(now, self.max_age()) {
                return Ok(rate.rate);
            }
        }

        let fetched = self
            .provider
            .fetch_pair_rate(&pair.base, &pair.quote)
            .await?;
        if fetched <= Decimal::ZERO {
            return Err(FxError::InvalidRate {
                base: pair.base.clone(),
                quote: pair.quote.clone(),
                rate: fetched,
            });
        }

        let rate = ExchangeRate::new(pair.base.clone(), pair.quote.clone(), fetched, Utc::now());
        let stored = rate.rate;
        // a tiny positive rate can round to zero at storage precision
        if stored.is_zero() {
            return Err(FxError::InvalidRate {
                base: pair.base.clone(),
                quote: pair.quote.clone(),
                rate: fetched,
            });
        }
        let previous = self.store.upsert(rate);

        if previous.map_or(true, |prev| is_significant_change(prev, stored)) {
            self.event_sink.emit(DomainEvent::exchange_rates_updated(
                1,
                BTreeSet::from([pair.quote.clone()]),
            ));
        }
        debug!("refreshed rate {} = {}", pair, stored);

        Ok(stored)
    }
}

#[async_trait]
impl FxServiceTrait for CurrencyExchangeService {
    async fn convert_with_amount(&self, from: &str, to: &str, amount: Decimal) -> Result<Money> {
        let from = Self::validate_code(from)?;
        let to = Self::validate_code(to)?;
        if amount.is_sign_negative() {
            return Err(FxError::NegativeAmount(amount).into());
        }

        if from == to {
            return Ok(Money::new(amount, to));
        }

        let rate = self.current_rate(&from, &to).await?;
        let converted = amount
            .checked_mul(rate)
            .ok_or(FxError::AmountOutOfRange(amount))?;
        Ok(Money::new(converted, to))
    }

    async fn convert_usd_to_frw(&self, amount: Decimal) -> Result<Money> {
        self.convert_with_amount("USD", "RWF", amount).await
    }

    async fn convert_frw_to_usd(&self, amount: Decimal) -> Result<Money> {
        self.convert_with_amount("RWF", "USD", amount).await
    }

    async fn refresh_rates(&self, base: &str) -> Result<RefreshOutcome> {
        let base = Self::validate_code(base)?;
        let fetched = self.provider.fetch_latest_rates(&base).await?;
        // Deterministic processing order for logs and the event payload.
        let fetched: BTreeMap<String, Decimal> = fetched.into_iter().collect();

        let now = Utc::now();
        let mut outcome = RefreshOutcome::default();

        for (code, rate) in fetched {
            let quote = normalize_currency_code(&code);
            if quote == base {
                continue;
            }
            if !is_supported(&quote) {
                debug!("currency {} not in platform registry, skipping", quote);
                continue;
            }
            if rate <= Decimal::ZERO {
                warn!("invalid exchange rate {} for {}/{}, skipping", rate, base, quote);
                continue;
            }

            let entry = ExchangeRate::new(base.clone(), quote.clone(), rate, now);
            let stored = entry.rate;
            if stored.is_zero() {
                warn!(
                    "rate {} for {}/{} rounds to zero at storage precision, skipping",
                    rate, base, quote
                );
                continue;
            }
            let previous = self.store.upsert(entry);

            match previous {
                Some(prev) if !is_significant_change(prev, stored) => {
                    outcome.skipped_count += 1;
                }
                previous => {
                    debug!(
                        "rate updated {}/{}: {:?} -> {}",
                        base, quote, previous, stored
                    );
                    outcome.updated_count += 1;
                    outcome.updated_currencies.insert(quote);
                }
            }
        }

        if outcome.updated_count > 0 {
            self.event_sink.emit(DomainEvent::exchange_rates_updated(
                outcome.updated_count,
                outcome.updated_currencies.clone(),
            ));
        } else {
            warn!("no exchange rates were updated for base {}", base);
        }
        info!(
            "exchange rate refresh for {} complete: {} updated, {} unchanged",
            base, outcome.updated_count, outcome.skipped_count
        );

        Ok(outcome)
    }

    async fn refresh_if_stale(&self, base: &str) -> Result<bool> {
        if !self.rates_are_stale() {
            return Ok(false);
        }
        self.refresh_rates(base).await?;
        Ok(true)
    }

    fn format_money(&self, money: &Money) -> String {
        currency::format_money(money)
    }

    fn rate_info(&self, from: &str, to: &str) -> Result<Option<RateInfo>> {
        let from = Self::validate_code(from)?;
        let to = Self::validate_code(to)?;
        let now = Utc::now();
        let max_age = self.max_age();

        Ok(self
            .store
            .get_either(&CurrencyPair::new(from, to))
            .map(|rate| RateInfo {
                base_currency: rate.base_currency.clone(),
                quote_currency: rate.quote_currency.clone(),
                rate: rate.rate,
                fetched_at: rate.fetched_at,
                age_secs: rate.age(now).num_seconds(),
                is_stale: rate.is_stale(now, max_age),
            }))
    }

    fn rates_overview(&self) -> Vec<RateInfo> {
        self.store.overview(Utc::now(), self.max_age())
    }

    fn rates_are_stale(&self) -> bool {
        match self.store.newest_fetch() {
            Some(newest) => Utc::now() - newest > self.max_age(),
            None => true,
        }
    }

    fn clear_cache(&self, pair: Option<(&str, &str)>) {
        match pair {
            Some((from, to)) => {
                let pair = CurrencyPair::new(normalize_currency_code(from), normalize_currency_code(to));
                self.store.remove_pair(&pair);
                debug!("cleared cached rate for {}", pair);
            }
            None => {
                self.store.clear();
                debug!("cleared all cached exchange rates");
            }
        }
    }
}

/// True when the relative change between two stored rates crosses the
/// significance threshold. A previous rate of zero always counts.
fn is_significant_change(previous: Decimal, current: Decimal) -> bool {
    if previous.is_zero() {
        return true;
    }
    let threshold = Decimal::from_str(MIN_RELATIVE_RATE_CHANGE).unwrap_or(Decimal::ZERO);
    ((current - previous) / previous).abs() >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    use super::super::fx_errors::ApiErrorKind;
    use crate::events::MockDomainEventSink;

    #[derive(Default)]
    struct MockProvider {
        pair_rates: DashMap<(String, String), Decimal>,
        latest_rates: DashMap<String, Decimal>,
        calls: AtomicUsize,
        fail: AtomicBool,
        delay_ms: u64,
    }

    impl MockProvider {
        fn with_pair(self, from: &str, to: &str, rate: Decimal) -> Self {
            self.pair_rates
                .insert((from.to_string(), to.to_string()), rate);
            self
        }

        fn with_latest(self, quote: &str, rate: Decimal) -> Self {
            self.latest_rates.insert(quote.to_string(), rate);
            self
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RateProviderTrait for MockProvider {
        async fn fetch_pair_rate(
            &self,
            from: &str,
            to: &str,
        ) -> std::result::Result<Decimal, FxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(StdDuration::from_millis(self.delay_ms)).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(FxError::ProviderUnreachable("mock outage".to_string()));
            }
            self.pair_rates
                .get(&(from.to_string(), to.to_string()))
                .map(|r| *r)
                .ok_or_else(|| FxError::Api(ApiErrorKind::UnsupportedCode))
        }

        async fn fetch_latest_rates(
            &self,
            _base: &str,
        ) -> std::result::Result<HashMap<String, Decimal>, FxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(FxError::ProviderUnreachable("mock outage".to_string()));
            }
            Ok(self
                .latest_rates
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect())
        }
    }

    fn service_with(provider: MockProvider) -> (CurrencyExchangeService, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let service = CurrencyExchangeService::new(provider.clone(), FxSettings::default());
        (service, provider)
    }

    fn seed(service: &CurrencyExchangeService, from: &str, to: &str, rate: Decimal, age_secs: i64) {
        service.store.upsert(ExchangeRate::new(
            from,
            to,
            rate,
            Utc::now() - Duration::seconds(age_secs),
        ));
    }

    #[tokio::test]
    async fn test_convert_uses_cached_rate_without_provider_call() {
        let (service, provider) = service_with(MockProvider::default());
        seed(&service, "USD", "RWF", dec!(1300), 0);

        let money = service
            .convert_with_amount("USD", "RWF", dec!(10))
            .await
            .unwrap();
        assert_eq!(money.amount(), dec!(13000));
        assert_eq!(money.currency(), "RWF");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_convert_usd_to_frw_example() {
        let (service, _provider) = service_with(MockProvider::default());
        seed(&service, "USD", "RWF", dec!(1300.0), 0);

        let money = service.convert_usd_to_frw(dec!(10.0)).await.unwrap();
        assert_eq!(money.amount(), dec!(13000));
        assert_eq!(money.currency(), "RWF");
        assert_eq!(service.format_money(&money), "FRW13,000");
    }

    #[tokio::test]
    async fn test_convert_frw_to_usd_uses_inverse_rate() {
        let (service, provider) = service_with(MockProvider::default());
        seed(&service, "USD", "RWF", dec!(1300), 0);

        let money = service.convert_frw_to_usd(dec!(13000)).await.unwrap();
        // inverse rate is stored at 6 dp, so the round trip is off by
        // fractions of a cent before rounding
        assert_eq!(money.amount(), dec!(10.00));
        assert_eq!(money.currency(), "USD");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_miss_fetches_and_emits() {
        let sink = Arc::new(MockDomainEventSink::new());
        let provider = Arc::new(MockProvider::default().with_pair("USD", "RWF", dec!(1300)));
        let service = CurrencyExchangeService::new(provider.clone(), FxSettings::default())
            .with_event_sink(sink.clone());

        let money = service
            .convert_with_amount("USD", "RWF", dec!(2))
            .await
            .unwrap();
        assert_eq!(money.amount(), dec!(2600));
        assert_eq!(provider.call_count(), 1);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let DomainEvent::ExchangeRatesUpdated {
            updated_count,
            updated_currencies,
        } = &events[0];
        assert_eq!(*updated_count, 1);
        assert!(updated_currencies.contains("RWF"));
    }

    #[tokio::test]
    async fn test_concurrent_misses_trigger_single_fetch() {
        let provider = MockProvider::default().with_pair("USD", "RWF", dec!(1300));
        let (service, provider) = service_with(MockProvider {
            delay_ms: 50,
            ..provider
        });
        let service = Arc::new(service);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.convert_with_amount("USD", "RWF", dec!(1)).await
            }));
        }
        for handle in handles {
            let money = handle.await.unwrap().unwrap();
            assert_eq!(money.amount(), dec!(1300));
        }

        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_currency_is_rejected_without_side_effects() {
        let (service, provider) = service_with(MockProvider::default());

        let err = service
            .convert_with_amount("USD", "XXX", dec!(10))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not supported"));
        assert!(service.store.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_negative_amount_is_rejected() {
        let (service, _provider) = service_with(MockProvider::default());
        let err = service
            .convert_with_amount("USD", "RWF", dec!(-1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[tokio::test]
    async fn test_overflowing_amount_returns_error_instead_of_panicking() {
        let (service, _provider) = service_with(MockProvider::default());
        seed(&service, "USD", "RWF", dec!(1300), 0);

        let err = service
            .convert_with_amount("USD", "RWF", Decimal::MAX)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn test_rate_rounding_to_zero_is_rejected() {
        // below half the storage precision step, so it rounds to 0.000000
        let (service, _provider) = service_with(
            MockProvider::default().with_pair("USD", "RWF", dec!(0.0000004)),
        );

        let err = service
            .convert_with_amount("USD", "RWF", dec!(10))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid exchange rate"));
        assert!(service.store.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_skips_rate_that_rounds_to_zero() {
        let provider = Arc::new(
            MockProvider::default()
                .with_latest("RWF", dec!(1300))
                .with_latest("EUR", dec!(0.0000004)),
        );
        let service = CurrencyExchangeService::new(provider.clone(), FxSettings::default());

        let outcome = service.refresh_rates("USD").await.unwrap();
        assert_eq!(outcome.updated_count, 1);
        assert_eq!(service.store.len(), 1);
        assert!(service
            .store
            .get(&CurrencyPair::new("USD", "EUR"))
            .is_none());
    }

    #[tokio::test]
    async fn test_same_currency_is_identity() {
        let (service, provider) = service_with(MockProvider::default());
        let money = service
            .convert_with_amount("USD", "USD", dec!(42.424))
            .await
            .unwrap();
        assert_eq!(money.amount(), dec!(42.42));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_legacy_frw_code_is_accepted() {
        let (service, _provider) = service_with(MockProvider::default());
        seed(&service, "USD", "RWF", dec!(1300), 0);

        let money = service
            .convert_with_amount("usd", "frw", dec!(1))
            .await
            .unwrap();
        assert_eq!(money.currency(), "RWF");
        assert_eq!(money.amount(), dec!(1300));
    }

    #[tokio::test]
    async fn test_stale_rate_is_refreshed_before_use() {
        let (service, provider) = service_with(
            MockProvider::default().with_pair("USD", "RWF", dec!(1400)),
        );
        seed(&service, "USD", "RWF", dec!(1300), 7200);

        let money = service
            .convert_with_amount("USD", "RWF", dec!(10))
            .await
            .unwrap();
        assert_eq!(money.amount(), dec!(14000));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_on_stale_rate_fails_conversion() {
        let (service, provider) = service_with(MockProvider::default());
        seed(&service, "USD", "RWF", dec!(1300), 7200);
        provider.set_fail(true);

        let err = service
            .convert_with_amount("USD", "RWF", dec!(10))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unreachable"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_rates_counts_updates_and_emits() {
        let sink = Arc::new(MockDomainEventSink::new());
        let provider = Arc::new(
            MockProvider::default()
                .with_latest("RWF", dec!(1300))
                .with_latest("EUR", dec!(0.92))
                .with_latest("XTS", dec!(5)) // not in the registry
                .with_latest("KES", dec!(-1)), // invalid, skipped
        );
        let service = CurrencyExchangeService::new(provider.clone(), FxSettings::default())
            .with_event_sink(sink.clone());

        let outcome = service.refresh_rates("USD").await.unwrap();
        assert_eq!(outcome.updated_count, 2);
        assert_eq!(outcome.skipped_count, 0);
        assert_eq!(
            outcome.updated_currencies,
            BTreeSet::from(["EUR".to_string(), "RWF".to_string()])
        );

        assert_eq!(service.store.len(), 2);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_skips_insignificant_change_but_bumps_freshness() {
        let sink = Arc::new(MockDomainEventSink::new());
        let provider = Arc::new(MockProvider::default().with_latest("RWF", dec!(1300)));
        let service = CurrencyExchangeService::new(provider.clone(), FxSettings::default())
            .with_event_sink(sink.clone());
        seed(&service, "USD", "RWF", dec!(1300), 7200);

        let outcome = service.refresh_rates("USD").await.unwrap();
        assert_eq!(outcome.updated_count, 0);
        assert_eq!(outcome.skipped_count, 1);
        assert!(sink.is_empty());

        // the unchanged rate is fresh again and usable without a new fetch
        assert!(!service.rates_are_stale());
    }

    #[tokio::test]
    async fn test_refresh_if_stale_runs_only_when_needed() {
        let provider = Arc::new(MockProvider::default().with_latest("RWF", dec!(1300)));
        let service = CurrencyExchangeService::new(provider.clone(), FxSettings::default());

        assert!(service.rates_are_stale());
        assert!(service.refresh_if_stale("USD").await.unwrap());
        assert_eq!(provider.call_count(), 1);

        assert!(!service.refresh_if_stale("USD").await.unwrap());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rate_info_and_overview() {
        let (service, _provider) = service_with(MockProvider::default());
        seed(&service, "USD", "RWF", dec!(1300), 60);

        let info = service.rate_info("USD", "FRW").unwrap().unwrap();
        assert_eq!(info.rate, dec!(1300));
        assert!(!info.is_stale);
        assert!(info.age_secs >= 60);

        let overview = service.rates_overview();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].base_currency, "USD");

        assert!(service.rate_info("EUR", "USD").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let (service, _provider) = service_with(MockProvider::default());
        seed(&service, "USD", "RWF", dec!(1300), 0);
        seed(&service, "EUR", "USD", dec!(1.08), 0);

        service.clear_cache(Some(("FRW", "USD")));
        assert_eq!(service.store.len(), 1);

        service.clear_cache(None);
        assert!(service.store.is_empty());
    }
}
