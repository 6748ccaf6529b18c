//! Provider answering same-currency queries.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::builder::RateBuilder;
use crate::error::{FxError, FxResult};
use crate::provider::RateProvider;
use crate::rate::{RateContext, RateKind, RateQuery, RateRecord};

/// Name of the identity provider.
pub const IDENT: &str = "IDENT";

/// Returns a factor of exactly one whenever base and term are the same
/// currency, and nothing otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRateProvider;

impl IdentityRateProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RateProvider for IdentityRateProvider {
    fn name(&self) -> &str {
        IDENT
    }

    async fn get_rate(&self, query: &RateQuery) -> FxResult<RateRecord> {
        if !self.is_available(query) || query.base != query.term {
            return Err(FxError::unavailable(query.pair(), IDENT));
        }

        let mut builder = RateBuilder::new(RateContext::new(IDENT, RateKind::Identity))
            .base(query.base.clone())
            .term(query.term.clone())
            .factor(Decimal::ONE);
        if let Some(date) = query.as_of {
            builder = builder.as_of(date);
        }
        builder.build()
    }

    async fn get_reversed(&self, record: &RateRecord) -> FxResult<RateRecord> {
        Ok(record.clone())
    }
}
