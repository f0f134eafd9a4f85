//! China Standard Time clock and trading-session calendar

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc, Weekday};

const CST_OFFSET_SECS: i32 = 8 * 3600;

/// UTC+8
pub fn china_offset() -> FixedOffset {
    FixedOffset::east_opt(CST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current time in China Standard Time
pub fn china_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&china_offset())
}

/// Whether `at` falls inside the continuous-auction sessions
///
/// Weekdays 09:30–11:30 and 13:00–15:00, China Standard Time. Exchange
/// holidays are not modelled.
pub fn is_trading_session(at: &DateTime<FixedOffset>) -> bool {
    let local = at.with_timezone(&china_offset());
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let minutes = local.hour() * 60 + local.minute();
    let morning = (9 * 60 + 30)..=(11 * 60 + 30);
    let afternoon = (13 * 60)..=(15 * 60);
    morning.contains(&minutes) || afternoon.contains(&minutes)
}
