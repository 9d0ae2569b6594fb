use chrono::NaiveDateTime;

use super::working_hours::TRADING_HOURS_PER_DAY;
use crate::calendar::BusinessCalendar;

/// Map `from` into the model's index space.
///
/// The model was trained with one index per trading hour and pins
/// `pred_start_date` to `pred_start_index`. The working days separating
/// `from` and the reference date, times the slots per day, give the
/// offset; it is negative when `from` precedes the reference.
pub fn align(
    from: NaiveDateTime,
    pred_start_date: NaiveDateTime,
    pred_start_index: i64,
    calendar: &dyn BusinessCalendar,
) -> i64 {
    let working_days = i64::from(calendar.working_days_between(from.date(), pred_start_date.date()));
    let offset = if from >= pred_start_date {
        working_days
    } else {
        -working_days
    };

    pred_start_index + offset * TRADING_HOURS_PER_DAY
}
