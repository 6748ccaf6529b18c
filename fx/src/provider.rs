//! Rate provider trait and test double.

use async_trait::async_trait;

use crate::error::FxResult;
use crate::rate::{RateQuery, RateRecord};

/// Trait for exchange rate providers.
///
/// "No such rate" is reported as [`crate::FxError::ConversionUnavailable`];
/// any other error means the provider could not answer at all.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Whether the query's provider filter admits this provider.
    fn is_available(&self, query: &RateQuery) -> bool {
        query.accepts_provider(self.name())
    }

    /// Resolve a rate.
    async fn get_rate(&self, query: &RateQuery) -> FxResult<RateRecord>;

    /// The rate in the opposite direction, on the same day as `record`.
    ///
    /// The reverse is looked up again rather than computed as `1 / factor`.
    async fn get_reversed(&self, record: &RateRecord) -> FxResult<RateRecord> {
        let mut query = RateQuery::new(record.term().clone(), record.base().clone());
        query.as_of = record.as_of();
        self.get_rate(&query).await
    }
}

/// Mock rate provider for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateProvider {
    name: String,
    rates: dashmap::DashMap<String, RateRecord>,
    failure: parking_lot::Mutex<Option<String>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateProvider {
    /// Create a new mock provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: dashmap::DashMap::new(),
            failure: parking_lot::Mutex::new(None),
        }
    }

    /// Serve `rate` for its pair.
    pub fn set_rate(&self, rate: RateRecord) {
        self.rates.insert(rate.pair().to_string(), rate);
    }

    /// Make every query fail with a non-availability error.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_rate(&self, query: &RateQuery) -> FxResult<RateRecord> {
        if let Some(message) = self.failure.lock().clone() {
            return Err(crate::error::FxError::DataLoadTimeout {
                provider: self.name.clone(),
                last_error: Some(message),
            });
        }
        self.rates
            .get(&query.pair().to_string())
            .map(|r| r.clone())
            .ok_or_else(|| crate::error::FxError::unavailable(query.pair(), &self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RateBuilder;
    use crate::rate::{RateContext, RateKind};
    use chrono::NaiveDate;
    use pivotfx_common::Currency;
    use rust_decimal_macros::dec;

    fn record(base: Currency, term: Currency, factor: rust_decimal::Decimal) -> RateRecord {
        RateBuilder::new(RateContext::new("MOCK", RateKind::Historic))
            .base(base)
            .term(term)
            .factor(factor)
            .as_of(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_mock_provider() {
        let provider = MockRateProvider::new("MOCK");
        provider.set_rate(record(Currency::usd(), Currency::eur(), dec!(0.91)));

        let query = RateQuery::new(Currency::usd(), Currency::eur());
        let result = provider.get_rate(&query).await.unwrap();
        assert_eq!(result.factor(), dec!(0.91));

        let missing = provider.get_rate(&query.reversed()).await;
        assert!(missing.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn test_default_reversal_requeries() {
        let provider = MockRateProvider::new("MOCK");
        let forward = record(Currency::usd(), Currency::eur(), dec!(0.91));
        provider.set_rate(forward.clone());
        // independently quoted, not 1/0.91
        provider.set_rate(record(Currency::eur(), Currency::usd(), dec!(1.0987)));

        let reversed = provider.get_reversed(&forward).await.unwrap();
        assert_eq!(reversed.factor(), dec!(1.0987));
    }

    #[test]
    fn test_default_availability_uses_filter() {
        let provider = MockRateProvider::new("MOCK");
        let query = RateQuery::new(Currency::usd(), Currency::eur());
        assert!(provider.is_available(&query));
        assert!(!provider.is_available(&query.clone().with_provider("ECB")));
    }
}
