//! Date-indexed rate tables.
//!
//! Tables are built privately by a feed parser and then published whole;
//! nothing mutates a table that readers can see.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use pivotfx_common::Currency;
use serde::Serialize;

use crate::rate::RateRecord;
use crate::strategy::PivotStrategy;

/// `pivot -> currency` quotes per calendar day.
#[derive(Debug, Clone)]
pub struct DirectRateTable {
    pivot: Currency,
    days: BTreeMap<NaiveDate, HashMap<Currency, RateRecord>>,
}

impl DirectRateTable {
    pub fn new(pivot: Currency) -> Self {
        Self {
            pivot,
            days: BTreeMap::new(),
        }
    }

    pub fn pivot(&self) -> &Currency {
        &self.pivot
    }

    /// Add the `pivot -> record.term()` quote for `date`, replacing any
    /// previous quote for that currency and day.
    pub fn insert(&mut self, date: NaiveDate, record: RateRecord) {
        self.days
            .entry(date)
            .or_default()
            .insert(record.term().clone(), record);
    }

    /// Quote `pivot -> currency` on `date`.
    pub fn leaf(&self, date: NaiveDate, currency: &Currency) -> Option<&RateRecord> {
        self.days.get(&date).and_then(|quotes| quotes.get(currency))
    }

    pub fn has_day(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn quote_count(&self) -> usize {
        self.days.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    fn currencies(&self) -> BTreeSet<&Currency> {
        self.days.values().flat_map(|quotes| quotes.keys()).collect()
    }

    /// A new table holding this table's days overlaid with `newer`'s.
    /// Days present in `newer` replace the corresponding day here whole.
    pub fn merged(&self, newer: DirectRateTable) -> DirectRateTable {
        let mut days = self.days.clone();
        days.extend(newer.days);
        DirectRateTable {
            pivot: newer.pivot,
            days,
        }
    }
}

/// Two directional series per currency, bridged through a unit currency.
#[derive(Debug, Clone)]
pub struct DualPivotTable {
    unit: Currency,
    to_unit: HashMap<Currency, Vec<RateRecord>>,
    from_unit: HashMap<Currency, Vec<RateRecord>>,
    dates: BTreeSet<NaiveDate>,
}

impl DualPivotTable {
    pub fn new(unit: Currency) -> Self {
        Self {
            unit,
            to_unit: HashMap::new(),
            from_unit: HashMap::new(),
            dates: BTreeSet::new(),
        }
    }

    pub fn unit(&self) -> &Currency {
        &self.unit
    }

    /// Add a dated `currency -> unit` record.
    pub fn push_to_unit(&mut self, record: RateRecord) {
        if let Some(date) = record.as_of() {
            self.dates.insert(date);
        }
        self.to_unit.entry(record.base().clone()).or_default().push(record);
    }

    /// Add a dated `unit -> currency` record.
    pub fn push_from_unit(&mut self, record: RateRecord) {
        if let Some(date) = record.as_of() {
            self.dates.insert(date);
        }
        self.from_unit.entry(record.term().clone()).or_default().push(record);
    }

    /// Sort every series by date, oldest first, keeping the last record
    /// pushed for a repeated day. Must be called before the table is queried.
    pub fn finish(mut self) -> Self {
        for series in self.to_unit.values_mut().chain(self.from_unit.values_mut()) {
            series.sort_by_key(|r| r.as_of());
            series.reverse();
            series.dedup_by_key(|r| r.as_of());
            series.reverse();
        }
        self
    }

    /// `currency -> unit` on `date`.
    pub fn to_unit(&self, currency: &Currency, date: NaiveDate) -> Option<&RateRecord> {
        Self::lookup(self.to_unit.get(currency)?, date)
    }

    /// `unit -> currency` on `date`.
    pub fn from_unit(&self, currency: &Currency, date: NaiveDate) -> Option<&RateRecord> {
        Self::lookup(self.from_unit.get(currency)?, date)
    }

    fn lookup(series: &[RateRecord], date: NaiveDate) -> Option<&RateRecord> {
        series
            .binary_search_by_key(&Some(date), |r| r.as_of())
            .ok()
            .map(|idx| &series[idx])
    }

    pub fn has_day(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.dates.iter().next_back().copied()
    }

    pub fn day_count(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_unit.is_empty() && self.from_unit.is_empty()
    }

    fn currencies(&self) -> BTreeSet<&Currency> {
        self.to_unit.keys().chain(self.from_unit.keys()).collect()
    }
}

/// A provider's rate data.
#[derive(Debug, Clone, Default)]
pub enum RateTable {
    /// Nothing loaded yet.
    #[default]
    Empty,
    Direct(DirectRateTable),
    DualPivot(DualPivotTable),
}

impl RateTable {
    pub fn is_empty(&self) -> bool {
        match self {
            RateTable::Empty => true,
            RateTable::Direct(table) => table.is_empty(),
            RateTable::DualPivot(table) => table.is_empty(),
        }
    }

    /// Bridging strategy matching this layout; `None` before the first load.
    pub fn strategy(&self) -> Option<PivotStrategy> {
        match self {
            RateTable::Empty => None,
            RateTable::Direct(_) => Some(PivotStrategy::Direct),
            RateTable::DualPivot(_) => Some(PivotStrategy::DualPivot),
        }
    }

    /// Currency every quote is expressed against.
    pub fn pivot(&self) -> Option<&Currency> {
        match self {
            RateTable::Empty => None,
            RateTable::Direct(table) => Some(table.pivot()),
            RateTable::DualPivot(table) => Some(table.unit()),
        }
    }

    /// Combine the current table with freshly parsed data. Direct tables
    /// merge by day; anything else is replaced wholesale.
    pub fn merged(&self, fresh: RateTable) -> RateTable {
        match (self, fresh) {
            (RateTable::Direct(current), RateTable::Direct(fresh)) => {
                RateTable::Direct(current.merged(fresh))
            }
            (_, fresh) => fresh,
        }
    }

    pub fn summary(&self) -> TableSummary {
        match self {
            RateTable::Empty => TableSummary::default(),
            RateTable::Direct(table) => TableSummary {
                days: table.day_count(),
                currencies: table.currencies().len(),
                latest: table.latest_date(),
            },
            RateTable::DualPivot(table) => TableSummary {
                days: table.day_count(),
                currencies: table.currencies().len(),
                latest: table.latest_date(),
            },
        }
    }
}

/// Size of a table, for logs and statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub days: usize,
    pub currencies: usize,
    pub latest: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RateBuilder;
    use crate::rate::{RateContext, RateKind};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn quote(base: &Currency, term: &str, factor: Decimal, date: NaiveDate) -> RateRecord {
        RateBuilder::new(RateContext::new("TEST", RateKind::Historic))
            .base(base.clone())
            .term(Currency::new(term))
            .factor(factor)
            .as_of(date)
            .build()
            .unwrap()
    }

    #[test]
    fn test_direct_merge_replaces_whole_days() {
        let eur = Currency::eur();
        let mut old = DirectRateTable::new(eur.clone());
        old.insert(day(2), quote(&eur, "USD", dec!(1.10), day(2)));
        old.insert(day(2), quote(&eur, "JPY", dec!(160.0), day(2)));
        old.insert(day(3), quote(&eur, "USD", dec!(1.09), day(3)));

        let mut fresh = DirectRateTable::new(eur.clone());
        fresh.insert(day(3), quote(&eur, "USD", dec!(1.08), day(3)));
        fresh.insert(day(4), quote(&eur, "USD", dec!(1.07), day(4)));

        let merged = old.merged(fresh);

        assert_eq!(merged.day_count(), 3);
        assert_eq!(merged.latest_date(), Some(day(4)));
        assert_eq!(merged.leaf(day(3), &Currency::usd()).unwrap().factor(), dec!(1.08));
        assert!(merged.leaf(day(2), &Currency::jpy()).is_some());
        // the old table is untouched
        assert_eq!(old.leaf(day(3), &Currency::usd()).unwrap().factor(), dec!(1.09));
    }

    #[test]
    fn test_dual_series_sorted_and_deduplicated() {
        let sdr = Currency::sdr();
        let usd = Currency::usd();
        let mut table = DualPivotTable::new(sdr.clone());
        for (d, f) in [(4, dec!(0.74)), (2, dec!(0.75)), (3, dec!(0.76)), (3, dec!(0.77))] {
            table.push_to_unit(quote(&usd, "SDR", f, day(d)));
        }
        table.push_from_unit(quote(&sdr, "USD", dec!(1.33), day(2)));
        let table = table.finish();

        assert_eq!(table.to_unit(&usd, day(3)).unwrap().factor(), dec!(0.77));
        assert_eq!(table.to_unit(&usd, day(2)).unwrap().factor(), dec!(0.75));
        assert!(table.to_unit(&usd, day(5)).is_none());
        assert_eq!(table.from_unit(&usd, day(2)).unwrap().factor(), dec!(1.33));
        assert_eq!(table.day_count(), 3);
        assert_eq!(table.latest_date(), Some(day(4)));
    }

    #[test]
    fn test_dual_tables_replace_wholesale() {
        let sdr = Currency::sdr();
        let mut first = DualPivotTable::new(sdr.clone());
        first.push_from_unit(quote(&sdr, "USD", dec!(1.33), day(2)));
        let current = RateTable::DualPivot(first.finish());

        let mut second = DualPivotTable::new(sdr.clone());
        second.push_from_unit(quote(&sdr, "JPY", dec!(190), day(5)));
        let merged = current.merged(RateTable::DualPivot(second.finish()));

        let summary = merged.summary();
        assert_eq!(summary.days, 1);
        assert_eq!(summary.latest, Some(day(5)));
        assert_eq!(merged.strategy(), Some(PivotStrategy::DualPivot));
        assert_eq!(merged.pivot(), Some(&sdr));
    }

    #[test]
    fn test_empty_table() {
        let table = RateTable::default();
        assert!(table.is_empty());
        assert_eq!(table.summary(), TableSummary::default());
        assert!(table.strategy().is_none());
        assert!(table.pivot().is_none());
    }
}
