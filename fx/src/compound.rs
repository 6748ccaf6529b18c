//! Ordered chain of providers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{FxError, FxResult};
use crate::provider::RateProvider;
use crate::rate::{RateQuery, RateRecord};

/// Name reported by [`CompoundRateProvider`].
pub const COMPOUND: &str = "COMPOUND";

/// Asks each provider in turn; the first rate returned wins.
///
/// Providers that fail for any reason other than "no such rate" are logged
/// and skipped, so a provider stuck without data never hides the others.
pub struct CompoundRateProvider {
    providers: Vec<Arc<dyn RateProvider>>,
}

impl CompoundRateProvider {
    pub fn new(providers: Vec<Arc<dyn RateProvider>>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[Arc<dyn RateProvider>] {
        &self.providers
    }

    /// Provider names in query order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn RateProvider>> {
        self.providers.iter().find(|p| p.name().eq_ignore_ascii_case(name))
    }
}

#[async_trait]
impl RateProvider for CompoundRateProvider {
    fn name(&self) -> &str {
        COMPOUND
    }

    fn is_available(&self, query: &RateQuery) -> bool {
        self.providers.iter().any(|p| p.is_available(query))
    }

    async fn get_rate(&self, query: &RateQuery) -> FxResult<RateRecord> {
        let mut failures = 0usize;

        for provider in &self.providers {
            if !provider.is_available(query) {
                continue;
            }

            match provider.get_rate(query).await {
                Ok(rate) => {
                    debug!(
                        provider = provider.name(),
                        query = %query,
                        factor = %rate.factor(),
                        "Got rate from provider"
                    );
                    return Ok(rate);
                }
                Err(e) if e.is_unavailable() => {
                    debug!(provider = provider.name(), query = %query, "Provider has no rate");
                }
                Err(e) => {
                    warn!(provider = provider.name(), query = %query, error = %e, "Provider failed");
                    failures += 1;
                }
            }
        }

        debug!(query = %query, failures, "No provider could answer");
        Err(FxError::unavailable(query.pair(), COMPOUND))
    }

    /// Routes the reversal to the provider that produced `record`.
    async fn get_reversed(&self, record: &RateRecord) -> FxResult<RateRecord> {
        match self.find(record.provider()) {
            Some(provider) => provider.get_reversed(record).await,
            None => {
                let mut query = RateQuery::new(record.term().clone(), record.base().clone());
                query.as_of = record.as_of();
                self.get_rate(&query).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RateBuilder;
    use crate::provider::MockRateProvider;
    use crate::rate::{RateContext, RateKind};
    use pivotfx_common::Currency;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn record(provider: &str, base: Currency, term: Currency, factor: Decimal) -> RateRecord {
        RateBuilder::new(RateContext::new(provider, RateKind::Historic))
            .base(base)
            .term(term)
            .factor(factor)
            .build()
            .unwrap()
    }

    fn chain() -> (Arc<MockRateProvider>, Arc<MockRateProvider>, CompoundRateProvider) {
        let first = Arc::new(MockRateProvider::new("FIRST"));
        let second = Arc::new(MockRateProvider::new("SECOND"));
        let compound = CompoundRateProvider::new(vec![first.clone(), second.clone()]);
        (first, second, compound)
    }

    #[tokio::test]
    async fn test_first_answer_wins() {
        let (first, second, compound) = chain();
        first.set_rate(record("FIRST", Currency::usd(), Currency::eur(), dec!(0.91)));
        second.set_rate(record("SECOND", Currency::usd(), Currency::eur(), dec!(0.95)));

        let rate = compound
            .get_rate(&RateQuery::new(Currency::usd(), Currency::eur()))
            .await
            .unwrap();
        assert_eq!(rate.provider(), "FIRST");
    }

    #[tokio::test]
    async fn test_falls_through_missing_and_failing_providers() {
        let (first, second, compound) = chain();
        first.fail_with("no data yet");
        second.set_rate(record("SECOND", Currency::usd(), Currency::eur(), dec!(0.95)));

        let query = RateQuery::new(Currency::usd(), Currency::eur());
        assert_eq!(compound.get_rate(&query).await.unwrap().provider(), "SECOND");

        let missing = compound.get_rate(&query.reversed()).await;
        assert!(missing.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn test_filter_restricts_providers() {
        let (first, second, compound) = chain();
        first.set_rate(record("FIRST", Currency::usd(), Currency::eur(), dec!(0.91)));
        second.set_rate(record("SECOND", Currency::usd(), Currency::eur(), dec!(0.95)));

        let query = RateQuery::new(Currency::usd(), Currency::eur()).with_provider("second");
        assert!(compound.is_available(&query));
        assert_eq!(compound.get_rate(&query).await.unwrap().provider(), "SECOND");

        let nobody = RateQuery::new(Currency::usd(), Currency::eur()).with_provider("ECB");
        assert!(!compound.is_available(&nobody));
    }

    #[tokio::test]
    async fn test_reversal_routed_to_producer() {
        let (first, second, compound) = chain();
        let forward = record("SECOND", Currency::usd(), Currency::eur(), dec!(0.95));
        second.set_rate(forward.clone());
        first.set_rate(record("FIRST", Currency::eur(), Currency::usd(), dec!(1.10)));
        second.set_rate(record("SECOND", Currency::eur(), Currency::usd(), dec!(1.05)));

        let reversed = compound.get_reversed(&forward).await.unwrap();
        assert_eq!(reversed.provider(), "SECOND");
        assert_eq!(reversed.factor(), dec!(1.05));
    }
}
