//! Shared in-process rate store.
//!
//! One entry per ordered currency pair, overwritten atomically on refresh.
//! The store is shared across concurrent request handlers; `DashMap` gives
//! per-shard locking so two racing refreshes of the same pair cannot lose
//! an update.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use super::fx_model::{CurrencyPair, ExchangeRate, RateInfo};

#[derive(Default)]
pub struct RateStore {
    rates: DashMap<CurrencyPair, ExchangeRate>,
}

impl RateStore {
    pub fn new() -> Self {
        Self {
            rates: DashMap::new(),
        }
    }

    /// Looks up the exact pair.
    pub fn get(&self, pair: &CurrencyPair) -> Option<ExchangeRate> {
        self.rates.get(pair).map(|r| r.clone())
    }

    /// Looks up the pair directly, falling back to the inverted opposite
    /// direction when only that is cached.
    pub fn get_either(&self, pair: &CurrencyPair) -> Option<ExchangeRate> {
        if let Some(rate) = self.get(pair) {
            return Some(rate);
        }
        self.get(&pair.inverse())
            .filter(|r| !r.rate.is_zero())
            .map(|r| r.inverted())
    }

    /// Inserts or overwrites the rate for its pair.
    /// Returns the previous rate value when one existed.
    pub fn upsert(&self, rate: ExchangeRate) -> Option<Decimal> {
        self.rates.insert(rate.pair(), rate).map(|prev| prev.rate)
    }

    /// Removes both directions of a pair.
    pub fn remove_pair(&self, pair: &CurrencyPair) {
        self.rates.remove(pair);
        self.rates.remove(&pair.inverse());
    }

    pub fn clear(&self) {
        self.rates.clear();
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Timestamp of the most recent refresh across all pairs.
    pub fn newest_fetch(&self) -> Option<DateTime<Utc>> {
        self.rates.iter().map(|r| r.fetched_at).max()
    }

    /// Snapshot of every cached pair with its age, sorted by pair.
    pub fn overview(&self, now: DateTime<Utc>, max_age: Duration) -> Vec<RateInfo> {
        let mut infos: Vec<RateInfo> = self
            .rates
            .iter()
            .map(|entry| {
                let rate = entry.value();
                RateInfo {
                    base_currency: rate.base_currency.clone(),
                    quote_currency: rate.quote_currency.clone(),
                    rate: rate.rate,
                    fetched_at: rate.fetched_at,
                    age_secs: rate.age(now).num_seconds(),
                    is_stale: rate.is_stale(now, max_age),
                }
            })
            .collect();
        infos.sort_by(|a, b| {
            (a.base_currency.as_str(), a.quote_currency.as_str())
                .cmp(&(b.base_currency.as_str(), b.quote_currency.as_str()))
        });
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd_rwf(rate: Decimal) -> ExchangeRate {
        ExchangeRate::new("USD", "RWF", rate, Utc::now())
    }

    #[test]
    fn test_upsert_overwrites_and_returns_previous() {
        let store = RateStore::new();
        assert!(store.upsert(usd_rwf(dec!(1300))).is_none());
        assert_eq!(store.upsert(usd_rwf(dec!(1310))), Some(dec!(1300)));
        assert_eq!(store.len(), 1);

        let pair = CurrencyPair::new("USD", "RWF");
        assert_eq!(store.get(&pair).unwrap().rate, dec!(1310));
    }

    #[test]
    fn test_get_either_uses_inverse_direction() {
        let store = RateStore::new();
        store.upsert(usd_rwf(dec!(1300)));

        let inverse_pair = CurrencyPair::new("RWF", "USD");
        let rate = store.get_either(&inverse_pair).unwrap();
        assert_eq!(rate.base_currency, "RWF");
        assert_eq!(rate.rate, dec!(0.000769));
    }

    #[test]
    fn test_get_either_misses_when_nothing_cached() {
        let store = RateStore::new();
        assert!(store
            .get_either(&CurrencyPair::new("USD", "EUR"))
            .is_none());
    }

    #[test]
    fn test_remove_pair_clears_both_directions() {
        let store = RateStore::new();
        store.upsert(usd_rwf(dec!(1300)));
        store.upsert(ExchangeRate::new("RWF", "USD", dec!(0.000769), Utc::now()));

        store.remove_pair(&CurrencyPair::new("USD", "RWF"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_overview_sorted_with_staleness() {
        let now = Utc::now();
        let store = RateStore::new();
        store.upsert(ExchangeRate::new(
            "USD",
            "RWF",
            dec!(1300),
            now - Duration::hours(2),
        ));
        store.upsert(ExchangeRate::new("EUR", "USD", dec!(1.08), now));

        let overview = store.overview(now, Duration::hours(1));
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].base_currency, "EUR");
        assert!(!overview[0].is_stale);
        assert!(overview[1].is_stale);
    }
}
