//! Calendar and timing utilities shared by the loader and the rate providers.

use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;

/// Timing constants.
pub mod constants {
    use std::time::Duration;

    /// How long a query waits for a provider's first successful load (30 seconds).
    pub const INITIAL_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default refresh period for scheduled resources (3 hours).
    pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(3 * 60 * 60);

    /// Default HTTP request timeout for remote resources.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Number of days probed before the requested date when resolving a rate.
    pub const TRADING_DAY_PROBE_DAYS: i64 = 3;
}

/// Source of "today" for date resolution.
///
/// Rate resolution and feed parsing depend on the current calendar day
/// (feed lag, deferred vs historic quotes); tests pin it with [`FixedClock`].
pub trait Clock: Send + Sync {
    /// The current calendar day.
    fn today(&self) -> NaiveDate;
}

/// Clock backed by the system time (UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock that always reports the same day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Create the default system clock handle.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// The trading-day probe window ending at `date`: `[date, date-1, .., date-N]`.
///
/// Days before the start of the calendar are left out.
pub fn probe_window(date: NaiveDate) -> Vec<NaiveDate> {
    days_before(date, 0..=constants::TRADING_DAY_PROBE_DAYS)
}

/// The lagged window used when a feed publishes with a delay:
/// `[today-1, .., today-N]`.
pub fn lagged_window(today: NaiveDate) -> Vec<NaiveDate> {
    days_before(today, 1..=constants::TRADING_DAY_PROBE_DAYS)
}

fn days_before(date: NaiveDate, offsets: std::ops::RangeInclusive<i64>) -> Vec<NaiveDate> {
    offsets
        .map_while(|days| date.checked_sub_signed(Duration::days(days)))
        .collect()
}

/// Parse a duration written as `HH:MM`, `HH:MM:SS` or a plain number of seconds.
///
/// Returns `None` for malformed or out of range values.
pub fn parse_period(value: &str) -> Option<std::time::Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if !value.contains(':') {
        return value.parse::<u64>().ok().map(std::time::Duration::from_secs);
    }

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }
    let mut seconds = 0u64;
    for (idx, part) in parts.iter().enumerate() {
        let n: u64 = part.trim().parse().ok()?;
        if idx > 0 && n >= 60 {
            return None;
        }
        seconds = seconds.checked_mul(60)?.checked_add(n)?;
    }
    if parts.len() == 2 {
        seconds = seconds.checked_mul(60)?;
    }
    Some(std::time::Duration::from_secs(seconds))
}
