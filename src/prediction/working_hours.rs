use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::calendar::{BusinessCalendar, WorkingDays};

/// Output format of every timestamp in a working-hour sequence
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Daily trading window, both ends inclusive
pub const MARKET_OPEN_HOUR: u32 = 10;
pub const MARKET_CLOSE_HOUR: u32 = 16;

/// Hourly slots per working day (10:00 through 16:00)
pub const TRADING_HOURS_PER_DAY: i64 = (MARKET_CLOSE_HOUR - MARKET_OPEN_HOUR + 1) as i64;

pub fn in_trading_window(time: NaiveTime) -> bool {
    let open = NaiveTime::from_hms_opt(MARKET_OPEN_HOUR, 0, 0);
    let close = NaiveTime::from_hms_opt(MARKET_CLOSE_HOUR, 0, 0);
    match (open, close) {
        (Some(open), Some(close)) => time >= open && time <= close,
        _ => false,
    }
}

/// Every hourly timestamp in `[from, to]` that falls inside the trading
/// window on a working day, formatted and in ascending order.
pub fn generate(from: NaiveDateTime, to: NaiveDateTime, calendar: &dyn BusinessCalendar) -> Vec<String> {
    let mut days = WorkingDays::new(calendar);
    let mut hours = Vec::new();
    let mut current = from;

    while current <= to {
        if in_trading_window(current.time()) && days.is_working_day(current.date()) {
            hours.push(current.format(TIMESTAMP_FORMAT).to_string());
        }
        current = match current.checked_add_signed(Duration::hours(1)) {
            Some(next) => next,
            None => break,
        };
    }

    hours
}
