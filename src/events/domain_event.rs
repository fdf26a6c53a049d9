//! Domain event types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Domain events emitted by the engine after successful mutations.
///
/// These represent facts about rate data changes. The host application
/// translates them into side effects (price cache invalidation, admin
/// notifications, cart recalculation).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A refresh cycle changed at least one cached rate.
    ExchangeRatesUpdated {
        updated_count: usize,
        updated_currencies: BTreeSet<String>,
    },
}

impl DomainEvent {
    /// Creates an ExchangeRatesUpdated event.
    pub fn exchange_rates_updated(
        updated_count: usize,
        updated_currencies: BTreeSet<String>,
    ) -> Self {
        Self::ExchangeRatesUpdated {
            updated_count,
            updated_currencies,
        }
    }
}
