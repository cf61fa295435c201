//! Session-zone time handling.
//!
//! All candle and trade timestamps are stored in UTC; any comparison against
//! the trading session (window checks, daily-limit day, report day) goes
//! through this module so the zone conversion happens in exactly one place.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Convert a UTC timestamp into the trading-session zone.
pub fn to_session(ts: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    ts.with_timezone(&tz)
}

/// Calendar day of `ts` in the session zone. This is the "trading day"
/// used by the one-trade-per-day rule and the daily report watermark.
pub fn trading_day(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}
