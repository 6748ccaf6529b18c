//! European Central Bank reference rate XML.
//!
//! ```xml
//! <Cube>
//!   <Cube time="2024-01-02">
//!     <Cube currency="USD" rate="1.0956"/>
//!   </Cube>
//! </Cube>
//! ```

use std::str::FromStr;

use chrono::NaiveDate;
use pivotfx_common::Currency;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::{FeedParser, ParseContext};
use crate::builder::RateBuilder;
use crate::error::{FxError, FxResult};
use crate::rate::RateContext;
use crate::table::{DirectRateTable, RateTable};

/// Parser for the ECB daily, 90-day and full-history feeds. All quotes are
/// `EUR -> currency`.
#[derive(Debug, Clone, Default)]
pub struct EcbFeedParser;

#[derive(Default)]
struct CubeAttributes {
    time: Option<String>,
    currency: Option<String>,
    rate: Option<String>,
}

impl EcbFeedParser {
    pub fn new() -> Self {
        Self
    }

    fn read_attributes(element: &BytesStart<'_>) -> Result<CubeAttributes, String> {
        let mut attrs = CubeAttributes::default();
        for attr in element.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
            match attr.key.local_name().as_ref() {
                b"time" => attrs.time = Some(value),
                b"currency" => attrs.currency = Some(value),
                b"rate" => attrs.rate = Some(value),
                _ => {}
            }
        }
        Ok(attrs)
    }
}

impl FeedParser for EcbFeedParser {
    fn format(&self) -> &str {
        "ecb-xml"
    }

    fn parse(&self, data: &[u8], ctx: &ParseContext<'_>) -> FxResult<RateTable> {
        let eur = Currency::eur();
        let mut table = DirectRateTable::new(eur.clone());
        let mut reader = Reader::from_reader(data);
        let mut buf = Vec::new();
        let mut day: Option<NaiveDate> = None;
        let mut skipped = 0usize;

        loop {
            buf.clear();
            let element = match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"Cube" => e,
                Ok(Event::Eof) => break,
                Ok(_) => continue,
                Err(e) => {
                    return Err(FxError::feed_parse(
                        ctx.provider,
                        format!("XML error at byte {}: {e}", reader.buffer_position()),
                    ))
                }
            };

            let attrs = match Self::read_attributes(&element) {
                Ok(attrs) => attrs,
                Err(e) => {
                    warn!(provider = ctx.provider, error = %e, "Skipping malformed Cube element");
                    skipped += 1;
                    continue;
                }
            };

            if let Some(time) = attrs.time {
                day = NaiveDate::parse_from_str(time.trim(), "%Y-%m-%d").ok();
                if day.is_none() {
                    warn!(provider = ctx.provider, time = %time, "Skipping day with malformed date");
                    skipped += 1;
                }
            }

            if let (Some(currency), Some(rate)) = (attrs.currency, attrs.rate) {
                let Some(date) = day else {
                    warn!(provider = ctx.provider, currency = %currency, "Skipping quote outside a valid day");
                    skipped += 1;
                    continue;
                };

                let quote = Currency::parse(&currency)
                    .map_err(|e| e.to_string())
                    .and_then(|term| {
                        let factor = Decimal::from_str(rate.trim())
                            .or_else(|_| Decimal::from_scientific(rate.trim()))
                            .map_err(|e| format!("rate {rate:?}: {e}"))?;
                        RateBuilder::new(RateContext::new(ctx.provider, ctx.kind_for(date)))
                            .base(eur.clone())
                            .term(term)
                            .factor(factor)
                            .as_of(date)
                            .build()
                            .map_err(|e| e.to_string())
                    });

                match quote {
                    Ok(record) => table.insert(date, record),
                    Err(e) => {
                        warn!(provider = ctx.provider, currency = %currency, %date, error = %e, "Skipping malformed quote");
                        skipped += 1;
                    }
                }
            }
        }

        if table.is_empty() {
            return Err(FxError::feed_parse(ctx.provider, "payload contains no quotes"));
        }

        debug!(
            provider = ctx.provider,
            days = table.day_count(),
            quotes = table.quote_count(),
            skipped,
            "Parsed ECB feed"
        );
        Ok(RateTable::Direct(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::RateKind;
    use rust_decimal_macros::dec;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gesmes:Envelope xmlns:gesmes="http://www.gesmes.org/xml/2002-08-01" xmlns="http://www.ecb.int/vocabulary/2002-08-01/eurofxref">
  <gesmes:subject>Reference rates</gesmes:subject>
  <Cube>
    <Cube time="2024-01-03">
      <Cube currency="USD" rate="1.0919"/>
      <Cube currency="JPY" rate="155.52"/>
    </Cube>
    <Cube time="2024-01-02">
      <Cube currency="USD" rate="1.0956"/>
      <Cube currency="XX1" rate="1.0"/>
      <Cube currency="GBP" rate="n/a"/>
    </Cube>
    <Cube time="not-a-date">
      <Cube currency="USD" rate="9.99"/>
    </Cube>
  </Cube>
</gesmes:Envelope>"#;

    fn ctx(today: NaiveDate) -> ParseContext<'static> {
        ParseContext { provider: "ECB", today }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn direct(table: RateTable) -> DirectRateTable {
        match table {
            RateTable::Direct(table) => table,
            other => panic!("expected direct table, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_days_and_quotes() {
        let table = direct(EcbFeedParser::new().parse(FEED.as_bytes(), &ctx(day(3))).unwrap());

        assert_eq!(table.day_count(), 2);
        assert_eq!(table.quote_count(), 3);

        let usd = table.leaf(day(2), &Currency::usd()).unwrap();
        assert_eq!(usd.factor(), dec!(1.0956));
        assert_eq!(usd.base(), &Currency::eur());
        assert_eq!(usd.kind(), RateKind::Historic);
        assert_eq!(usd.as_of(), Some(day(2)));

        let today = table.leaf(day(3), &Currency::jpy()).unwrap();
        assert_eq!(today.kind(), RateKind::Deferred);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let table = direct(EcbFeedParser::new().parse(FEED.as_bytes(), &ctx(day(3))).unwrap());
        assert!(table.leaf(day(2), &Currency::gbp()).is_none());
        assert!(table.leaf(day(2), &Currency::new("XX1")).is_none());
        // quotes below an unparseable day are not attributed to the previous day
        assert_eq!(table.leaf(day(2), &Currency::usd()).unwrap().factor(), dec!(1.0956));
    }

    #[test]
    fn test_payload_without_quotes_is_an_error() {
        let result = EcbFeedParser::new().parse(b"<html><body>Request Rejected</body></html>", &ctx(day(3)));
        assert!(matches!(result, Err(FxError::FeedParse { .. })));
    }

    #[test]
    fn test_broken_xml_is_an_error() {
        let result = EcbFeedParser::new().parse(b"<Cube><Cube time=\"2024-01-02\"></Cub>", &ctx(day(3)));
        assert!(matches!(result, Err(FxError::FeedParse { .. })));
    }
}
