//! IMF "Representative rates / rates of SDR" tab separated table.

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use pivotfx_common::Currency;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::{FeedParser, ParseContext};
use crate::builder::RateBuilder;
use crate::currency_names::CurrencyNames;
use crate::error::{FxError, FxResult};
use crate::rate::RateContext;
use crate::table::{DualPivotTable, RateTable};

const TO_UNIT_SECTION: &str = "SDRs per Currency unit";
const FROM_UNIT_SECTION: &str = "Currency units per SDR";
const DATE_HEADER: &str = "Currency";
const DATE_FORMAT: &str = "%B %d, %Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Rows are `currency -> SDR` factors.
    ToUnit,
    /// Rows are `SDR -> currency` factors.
    FromUnit,
}

/// Parser for the IMF SDR table.
///
/// The payload holds two sections, each with a header row of dates and one
/// row per currency display name. Names are resolved through a
/// [`CurrencyNames`] registry.
#[derive(Debug, Clone)]
pub struct ImfFeedParser {
    names: Arc<CurrencyNames>,
    rejection_sentinel: String,
}

impl ImfFeedParser {
    pub fn new(names: Arc<CurrencyNames>) -> Self {
        Self {
            names,
            rejection_sentinel: "Request Rejected".to_string(),
        }
    }

    fn parse_dates<'r>(cells: impl Iterator<Item = &'r str>, provider: &str) -> Vec<Option<NaiveDate>> {
        cells
            .map(|cell| {
                let date = NaiveDate::parse_from_str(cell, DATE_FORMAT).ok();
                if date.is_none() && !cell.is_empty() {
                    warn!(provider, header = %cell, "Unreadable date column");
                }
                date
            })
            .collect()
    }

    fn parse_value(cell: &str) -> Result<Option<Decimal>, String> {
        if cell.is_empty() || cell.eq_ignore_ascii_case("NA") {
            return Ok(None);
        }
        let cleaned = cell.replace(',', "");
        Decimal::from_str(&cleaned)
            .or_else(|_| Decimal::from_scientific(&cleaned))
            .map(Some)
            .map_err(|e| format!("{cell:?}: {e}"))
    }
}

impl FeedParser for ImfFeedParser {
    fn format(&self) -> &str {
        "imf-tsv"
    }

    fn parse(&self, data: &[u8], ctx: &ParseContext<'_>) -> FxResult<RateTable> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(data);

        let sdr = Currency::sdr();
        let mut table = DualPivotTable::new(sdr.clone());
        let mut section: Option<Section> = None;
        let mut dates: Vec<Option<NaiveDate>> = Vec::new();
        let mut quotes = 0usize;
        let mut skipped = 0usize;

        for (row, result) in reader.records().enumerate() {
            let record = result.map_err(|e| FxError::feed_parse(ctx.provider, e))?;

            if row == 0 && record.iter().any(|cell| cell.contains(&self.rejection_sentinel)) {
                return Err(FxError::feed_parse(ctx.provider, "request rejected by server"));
            }

            let Some(name) = record.get(0) else {
                continue;
            };
            if record.iter().all(str::is_empty) {
                continue;
            }
            if name.starts_with(TO_UNIT_SECTION) {
                section = Some(Section::ToUnit);
                dates.clear();
                continue;
            }
            if name.starts_with(FROM_UNIT_SECTION) {
                section = Some(Section::FromUnit);
                dates.clear();
                continue;
            }
            if name == DATE_HEADER {
                dates = Self::parse_dates(record.iter().skip(1), ctx.provider);
                continue;
            }

            let Some(section) = section else {
                debug!(provider = ctx.provider, line = %name, "Ignoring row before the first section");
                continue;
            };

            let Some(currency) = self.names.lookup(name) else {
                if record.len() > 1 {
                    warn!(provider = ctx.provider, name = %name, "Uninterpretable currency name in IMF feed");
                    skipped += 1;
                }
                continue;
            };

            for (idx, cell) in record.iter().skip(1).enumerate() {
                let Some(date) = dates.get(idx).copied().flatten() else {
                    continue;
                };
                let factor = match Self::parse_value(cell) {
                    Ok(Some(factor)) => factor,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(provider = ctx.provider, currency = %currency, %date, error = %e, "Skipping malformed value");
                        skipped += 1;
                        continue;
                    }
                };

                let builder = RateBuilder::new(RateContext::new(ctx.provider, ctx.kind_for(date)))
                    .factor(factor)
                    .as_of(date);
                let rate = match section {
                    Section::ToUnit => builder.base(currency.clone()).term(sdr.clone()).build(),
                    Section::FromUnit => builder.base(sdr.clone()).term(currency.clone()).build(),
                };

                match rate {
                    Ok(rate) => {
                        match section {
                            Section::ToUnit => table.push_to_unit(rate),
                            Section::FromUnit => table.push_from_unit(rate),
                        }
                        quotes += 1;
                    }
                    Err(e) => {
                        warn!(provider = ctx.provider, currency = %currency, %date, error = %e, "Skipping invalid rate");
                        skipped += 1;
                    }
                }
            }
        }

        if quotes == 0 {
            return Err(FxError::feed_parse(ctx.provider, "payload contains no rates"));
        }

        let table = table.finish();
        debug!(
            provider = ctx.provider,
            days = table.day_count(),
            quotes,
            skipped,
            "Parsed IMF feed"
        );
        Ok(RateTable::DualPivot(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::RateKind;
    use rust_decimal_macros::dec;

    const FEED: &str = "SDRs per Currency unit (2)\n\
\n\
Currency\tJanuary 03, 2024\tJanuary 02, 2024\n\
Euro\t0.8193420000\t0.8218720000\n\
U.S. Dollar\t0.7480450000\tNA\n\
Japanese Yen\t0.0052741100\t\n\
Imaginary Crown\t1.0\t1.0\n\
\n\
Currency units per SDR(3)\n\
\n\
Currency\tJanuary 03, 2024\tJanuary 02, 2024\n\
Euro\t1.220490\t1.216730\n\
U.S. Dollar\t1.336820\t1.333590\n\
Japanese Yen\t189.606000\tbroken\n\
Korean Won\t1,743.350000\t1,738.120000\n";

    fn ctx(today: NaiveDate) -> ParseContext<'static> {
        ParseContext { provider: "IMF", today }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn parse(feed: &str, today: NaiveDate) -> FxResult<DualPivotTable> {
        let parser = ImfFeedParser::new(Arc::new(CurrencyNames::with_defaults()));
        parser.parse(feed.as_bytes(), &ctx(today)).map(|table| match table {
            RateTable::DualPivot(table) => table,
            other => panic!("expected dual pivot table, got {other:?}"),
        })
    }

    #[test]
    fn test_sections_map_to_directional_series() {
        let table = parse(FEED, day(10)).unwrap();
        let usd = Currency::usd();

        let to_sdr = table.to_unit(&usd, day(3)).unwrap();
        assert_eq!(to_sdr.base(), &usd);
        assert_eq!(to_sdr.term(), &Currency::sdr());
        assert_eq!(to_sdr.factor(), dec!(0.7480450000));
        assert_eq!(to_sdr.kind(), RateKind::Historic);

        let from_sdr = table.from_unit(&usd, day(2)).unwrap();
        assert_eq!(from_sdr.base(), &Currency::sdr());
        assert_eq!(from_sdr.factor(), dec!(1.333590));
    }

    #[test]
    fn test_missing_and_malformed_cells_skipped() {
        let table = parse(FEED, day(10)).unwrap();
        assert!(table.to_unit(&Currency::usd(), day(2)).is_none());
        assert!(table.to_unit(&Currency::jpy(), day(2)).is_none());
        assert!(table.from_unit(&Currency::jpy(), day(2)).is_none());
        assert!(table.from_unit(&Currency::jpy(), day(3)).is_some());
    }

    #[test]
    fn test_thousands_separators_stripped() {
        let table = parse(FEED, day(10)).unwrap();
        let krw = table.from_unit(&Currency::new("KRW"), day(3)).unwrap();
        assert_eq!(krw.factor(), dec!(1743.35));
    }

    #[test]
    fn test_today_is_deferred() {
        let table = parse(FEED, day(3)).unwrap();
        assert_eq!(table.to_unit(&Currency::eur(), day(3)).unwrap().kind(), RateKind::Deferred);
        assert_eq!(table.to_unit(&Currency::eur(), day(2)).unwrap().kind(), RateKind::Historic);
    }

    #[test]
    fn test_rejection_page_is_an_error() {
        let result = parse("<html>Request Rejected</html>\nsupport id: 1", day(3));
        assert!(matches!(result, Err(FxError::FeedParse { .. })));
    }

    #[test]
    fn test_quoted_cells_are_unquoted() {
        let feed = "Currency units per SDR\n\
Currency\tJanuary 03, 2024\n\
Korean Won\t\"1,743.350000\"\n";
        let table = parse(feed, day(10)).unwrap();
        let krw = table.from_unit(&Currency::new("KRW"), day(3)).unwrap();
        assert_eq!(krw.factor(), dec!(1743.35));
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let mut feed = b"Currency units per SDR\nCurrency\tJanuary 03, 2024\nU.S. Dollar\t1.3".to_vec();
        feed.extend_from_slice(&[0xff, 0xfe]);
        feed.push(b'\n');

        let parser = ImfFeedParser::new(Arc::new(CurrencyNames::with_defaults()));
        let result = parser.parse(&feed, &ctx(day(10)));
        assert!(matches!(result, Err(FxError::FeedParse { .. })));
    }

    #[test]
    fn test_no_rates_is_an_error() {
        let result = parse("SDRs per Currency unit (2)\nCurrency\tJanuary 03, 2024\n", day(3));
        assert!(matches!(result, Err(FxError::FeedParse { .. })));
    }
}
