//! Pivot bridging: deriving any pair from quotes against one pivot currency.
//!
//! Both table layouts answer the same four cases:
//!
//! 1. `pivot -> pivot` is a unit rate;
//! 2. `X -> pivot` is the currency's quote towards the pivot;
//! 3. `pivot -> Y` is the pivot's quote for the currency;
//! 4. `X -> Y` chains `X -> pivot` and `pivot -> Y` from the same day.
//!
//! The day is the first "trading day" candidate the table covers.

use chrono::NaiveDate;
use pivotfx_common::{lagged_window, probe_window, Currency};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::builder::{chain_product, RateBuilder};
use crate::error::{FxError, FxResult};
use crate::rate::{RateContext, RateKind, RateQuery, RateRecord};
use crate::table::{DirectRateTable, DualPivotTable, RateTable};

/// How a provider's feed quotes against its pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotStrategy {
    /// One `pivot -> currency` quote per currency and day.
    Direct,
    /// Independent `currency -> unit` and `unit -> currency` series.
    DualPivot,
}

/// Significant digits kept when a direct quote has to be inverted.
pub const RECIPROCAL_PRECISION: u32 = 16;

/// Pivot lookups over one table layout.
trait PivotLookup {
    fn pivot(&self) -> &Currency;

    /// Days to probe, most preferred first.
    fn candidates(&self, as_of: Option<NaiveDate>, today: NaiveDate) -> Vec<NaiveDate>;

    /// Whether `date` holds what a `base -> term` query needs.
    fn covers(&self, date: NaiveDate, base: &Currency, term: &Currency) -> bool;

    /// `currency -> pivot` on `date`.
    fn to_pivot(&self, currency: &Currency, date: NaiveDate) -> FxResult<Option<RateRecord>>;

    /// `pivot -> currency` on `date`.
    fn from_pivot(&self, currency: &Currency, date: NaiveDate) -> Option<RateRecord>;
}

impl PivotLookup for DirectRateTable {
    fn pivot(&self) -> &Currency {
        DirectRateTable::pivot(self)
    }

    fn candidates(&self, as_of: Option<NaiveDate>, _today: NaiveDate) -> Vec<NaiveDate> {
        match as_of {
            Some(date) => probe_window(date),
            None => self.latest_date().into_iter().collect(),
        }
    }

    fn covers(&self, date: NaiveDate, _base: &Currency, _term: &Currency) -> bool {
        self.has_day(date)
    }

    fn to_pivot(&self, currency: &Currency, date: NaiveDate) -> FxResult<Option<RateRecord>> {
        // The feed only quotes pivot -> currency.
        let Some(leaf) = self.leaf(date, currency) else {
            return Ok(None);
        };
        let inverse = Decimal::ONE
            .checked_div(leaf.factor())
            .and_then(|f| f.round_sf(RECIPROCAL_PRECISION))
            .ok_or_else(|| FxError::InvalidRate(format!("cannot invert {leaf}")))?;

        RateBuilder::from(leaf)
            .base(leaf.term().clone())
            .term(leaf.base().clone())
            .factor(inverse)
            .build()
            .map(Some)
    }

    fn from_pivot(&self, currency: &Currency, date: NaiveDate) -> Option<RateRecord> {
        self.leaf(date, currency).cloned()
    }
}

impl PivotLookup for DualPivotTable {
    fn pivot(&self) -> &Currency {
        self.unit()
    }

    fn candidates(&self, as_of: Option<NaiveDate>, today: NaiveDate) -> Vec<NaiveDate> {
        match as_of {
            Some(date) => probe_window(date),
            None => lagged_window(today),
        }
    }

    fn covers(&self, date: NaiveDate, base: &Currency, term: &Currency) -> bool {
        let unit = self.unit();
        if base == unit && term == unit {
            return self.has_day(date);
        }
        (base == unit || self.to_unit(base, date).is_some())
            && (term == unit || self.from_unit(term, date).is_some())
    }

    fn to_pivot(&self, currency: &Currency, date: NaiveDate) -> FxResult<Option<RateRecord>> {
        Ok(DualPivotTable::to_unit(self, currency, date).cloned())
    }

    fn from_pivot(&self, currency: &Currency, date: NaiveDate) -> Option<RateRecord> {
        DualPivotTable::from_unit(self, currency, date).cloned()
    }
}

/// Resolve `query` against `table` on behalf of `provider`.
///
/// `today` anchors the lagged window used when a dual-pivot query has no date.
pub fn resolve(
    table: &RateTable,
    provider: &str,
    query: &RateQuery,
    today: NaiveDate,
) -> FxResult<RateRecord> {
    match table {
        RateTable::Empty => Err(FxError::unavailable(query.pair(), provider)),
        RateTable::Direct(table) => bridge(table, provider, query, today),
        RateTable::DualPivot(table) => bridge(table, provider, query, today),
    }
}

fn bridge<L: PivotLookup>(
    lookup: &L,
    provider: &str,
    query: &RateQuery,
    today: NaiveDate,
) -> FxResult<RateRecord> {
    let unavailable = || FxError::unavailable(query.pair(), provider);
    let (base, term) = (&query.base, &query.term);

    let date = lookup
        .candidates(query.as_of, today)
        .into_iter()
        .find(|date| lookup.covers(*date, base, term))
        .ok_or_else(unavailable)?;

    let pivot = lookup.pivot();
    let derived = || RateContext::new(provider, RateKind::Historic);

    if base == pivot && term == pivot {
        return RateBuilder::new(derived())
            .base(base.clone())
            .term(term.clone())
            .factor(Decimal::ONE)
            .as_of(date)
            .build();
    }
    if term == pivot {
        return lookup.to_pivot(base, date)?.ok_or_else(unavailable);
    }
    if base == pivot {
        return lookup.from_pivot(term, date).ok_or_else(unavailable);
    }

    let first = lookup.to_pivot(base, date)?.ok_or_else(unavailable)?;
    let second = lookup.from_pivot(term, date).ok_or_else(unavailable)?;
    let chain = vec![first, second];
    let factor = chain_product(&chain)?;

    RateBuilder::new(derived())
        .base(base.clone())
        .term(term.clone())
        .factor(factor)
        .chain(chain)
        .as_of(date)
        .build()
}
