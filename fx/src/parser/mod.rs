//! Feed parsers turning raw payloads into rate tables.

mod ecb;
mod imf;

pub use ecb::EcbFeedParser;
pub use imf::ImfFeedParser;

use chrono::NaiveDate;

use crate::error::FxResult;
use crate::rate::RateKind;
use crate::table::RateTable;

/// What a parser needs to know about the provider it parses for.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub provider: &'a str,
    pub today: NaiveDate,
}

impl ParseContext<'_> {
    /// Kind of a feed quote dated `date`.
    pub fn kind_for(&self, date: NaiveDate) -> RateKind {
        if date == self.today {
            RateKind::Deferred
        } else {
            RateKind::Historic
        }
    }
}

/// Parses one wire format into a fresh table.
///
/// Malformed entries are skipped; a payload that yields no quotes at all is
/// an error so that the previous table stays in place.
pub trait FeedParser: Send + Sync {
    /// Format name used in logs.
    fn format(&self) -> &str;

    fn parse(&self, data: &[u8], ctx: &ParseContext<'_>) -> FxResult<RateTable>;
}
