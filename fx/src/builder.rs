//! Assembly of rate records, including multi-hop chains.

use chrono::NaiveDate;
use pivotfx_common::Currency;
use rust_decimal::Decimal;

use crate::error::{FxError, FxResult};
use crate::rate::{RateContext, RateRecord};

/// Mutable accumulator for a [`RateRecord`]. Nothing is validated until
/// [`RateBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct RateBuilder {
    context: Option<RateContext>,
    base: Option<Currency>,
    term: Option<Currency>,
    factor: Option<Decimal>,
    chain: Vec<RateRecord>,
    as_of: Option<NaiveDate>,
}

impl RateBuilder {
    pub fn new(context: RateContext) -> Self {
        Self {
            context: Some(context),
            ..Default::default()
        }
    }

    pub fn base(mut self, base: Currency) -> Self {
        self.base = Some(base);
        self
    }

    pub fn term(mut self, term: Currency) -> Self {
        self.term = Some(term);
        self
    }

    pub fn factor(mut self, factor: Decimal) -> Self {
        self.factor = Some(factor);
        self
    }

    pub fn context(mut self, context: RateContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Set the constituent rates, in bridging order.
    pub fn chain(mut self, records: Vec<RateRecord>) -> Self {
        self.chain = records;
        self
    }

    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    /// Build the record.
    ///
    /// Fails if base, term, factor or context is missing, if the factor is not
    /// positive, or if a non-empty chain does not multiply out to the factor.
    pub fn build(self) -> FxResult<RateRecord> {
        let context = self
            .context
            .ok_or_else(|| FxError::InvalidRate("missing rate context".to_string()))?;
        let base = self
            .base
            .ok_or_else(|| FxError::InvalidRate("missing base currency".to_string()))?;
        let term = self
            .term
            .ok_or_else(|| FxError::InvalidRate("missing term currency".to_string()))?;
        let factor = self
            .factor
            .ok_or_else(|| FxError::InvalidRate(format!("missing factor for {base}/{term}")))?;

        if factor <= Decimal::ZERO {
            return Err(FxError::InvalidRate(format!(
                "factor {factor} for {base}/{term} must be positive"
            )));
        }

        if !self.chain.is_empty() {
            let product = chain_product(&self.chain)?;
            if product != factor {
                return Err(FxError::InvalidRate(format!(
                    "factor {factor} for {base}/{term} differs from chain product {product}"
                )));
            }
        }

        Ok(RateRecord {
            context,
            base,
            term,
            factor,
            chain: self.chain,
            as_of: self.as_of,
        })
    }
}

impl From<&RateRecord> for RateBuilder {
    /// Copy every field of an existing record.
    fn from(record: &RateRecord) -> Self {
        Self {
            context: Some(record.context.clone()),
            base: Some(record.base.clone()),
            term: Some(record.term.clone()),
            factor: Some(record.factor),
            chain: record.chain.clone(),
            as_of: record.as_of,
        }
    }
}

/// Product of the chain's factors, in order.
pub fn chain_product(chain: &[RateRecord]) -> FxResult<Decimal> {
    chain.iter().try_fold(Decimal::ONE, |acc, record| {
        acc.checked_mul(record.factor)
            .ok_or_else(|| FxError::InvalidRate("chain product overflows".to_string()))
    })
}
