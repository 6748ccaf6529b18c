//! Rate queries and immutable rate records.

use std::fmt;

use chrono::NaiveDate;
use pivotfx_common::{Currency, CurrencyPair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Freshness classification of a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    /// Live quote.
    Spot,
    /// Quote for a past day.
    Historic,
    /// Quote for today, published with a delay.
    Deferred,
    /// Conversion of a currency to itself.
    Identity,
}

impl fmt::Display for RateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RateKind::Spot => "spot",
            RateKind::Historic => "historic",
            RateKind::Deferred => "deferred",
            RateKind::Identity => "identity",
        };
        f.write_str(name)
    }
}

/// Who produced a rate and how fresh it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateContext {
    pub provider: String,
    pub kind: RateKind,
}

impl RateContext {
    pub fn new(provider: impl Into<String>, kind: RateKind) -> Self {
        Self {
            provider: provider.into(),
            kind,
        }
    }

    /// Same provider, different kind.
    pub fn with_kind(&self, kind: RateKind) -> Self {
        Self {
            provider: self.provider.clone(),
            kind,
        }
    }
}

/// A request for the rate between two currencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateQuery {
    /// Currency converted from.
    pub base: Currency,
    /// Currency converted to.
    pub term: Currency,
    /// Day the rate must be valid for; `None` means the most recent available.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    /// Providers allowed to answer; empty means any.
    #[serde(default)]
    pub providers: Vec<String>,
}

impl RateQuery {
    pub fn new(base: Currency, term: Currency) -> Self {
        Self {
            base,
            term,
            as_of: None,
            providers: Vec::new(),
        }
    }

    /// Pin the query to a calendar day.
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    /// Restrict the query to a provider (may be called repeatedly).
    pub fn with_provider(mut self, name: impl Into<String>) -> Self {
        self.providers.push(name.into());
        self
    }

    pub fn with_providers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers.extend(names.into_iter().map(Into::into));
        self
    }

    /// The same query with base and term swapped.
    pub fn reversed(&self) -> Self {
        Self {
            base: self.term.clone(),
            term: self.base.clone(),
            as_of: self.as_of,
            providers: self.providers.clone(),
        }
    }

    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.base.clone(), self.term.clone())
    }

    /// Whether the provider filter admits `provider`.
    pub fn accepts_provider(&self, provider: &str) -> bool {
        self.providers.is_empty() || self.providers.iter().any(|p| p.eq_ignore_ascii_case(provider))
    }
}

impl fmt::Display for RateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.term)?;
        if let Some(date) = self.as_of {
            write!(f, " on {date}")?;
        }
        if !self.providers.is_empty() {
            write!(f, " via {}", self.providers.join(","))?;
        }
        Ok(())
    }
}

/// An immutable exchange rate: `term = base * factor`.
///
/// A record with an empty chain is a leaf quote taken from a feed. A derived
/// record lists the rates it was bridged through, and its factor is their
/// product. Records are built with [`crate::RateBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateRecord {
    pub(crate) context: RateContext,
    pub(crate) base: Currency,
    pub(crate) term: Currency,
    pub(crate) factor: Decimal,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) chain: Vec<RateRecord>,
    pub(crate) as_of: Option<NaiveDate>,
}

impl RateRecord {
    pub fn context(&self) -> &RateContext {
        &self.context
    }

    pub fn provider(&self) -> &str {
        &self.context.provider
    }

    pub fn kind(&self) -> RateKind {
        self.context.kind
    }

    pub fn base(&self) -> &Currency {
        &self.base
    }

    pub fn term(&self) -> &Currency {
        &self.term
    }

    pub fn factor(&self) -> Decimal {
        self.factor
    }

    pub fn chain(&self) -> &[RateRecord] {
        &self.chain
    }

    pub fn as_of(&self) -> Option<NaiveDate> {
        self.as_of
    }

    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.base.clone(), self.term.clone())
    }

    /// Whether this rate was bridged through other rates.
    pub fn is_derived(&self) -> bool {
        !self.chain.is_empty()
    }
}

impl fmt::Display for RateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {} ({}, {}",
            self.base, self.term, self.factor, self.context.provider, self.context.kind
        )?;
        if let Some(date) = self.as_of {
            write!(f, ", {date}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_reversed_keeps_date_and_filter() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let query = RateQuery::new(Currency::usd(), Currency::new("BRL"))
            .on(date)
            .with_provider("ECB");

        let reversed = query.reversed();
        assert_eq!(reversed.base, Currency::new("BRL"));
        assert_eq!(reversed.term, Currency::usd());
        assert_eq!(reversed.as_of, Some(date));
        assert_eq!(reversed.providers, vec!["ECB".to_string()]);
    }

    #[test]
    fn test_provider_filter() {
        let open = RateQuery::new(Currency::usd(), Currency::eur());
        assert!(open.accepts_provider("ECB"));

        let filtered = open.clone().with_providers(["IMF", "ecb-hist"]);
        assert!(filtered.accepts_provider("ECB-HIST"));
        assert!(!filtered.accepts_provider("ECB"));
    }

    #[test]
    fn test_query_from_json() {
        let query: RateQuery =
            serde_json::from_str(r#"{"base": "usd", "term": "JPY", "as_of": "2024-01-02"}"#).unwrap();
        assert_eq!(query.base, Currency::usd());
        assert!(query.providers.is_empty());
        assert_eq!(query.to_string(), "USD/JPY on 2024-01-02");
    }
}
