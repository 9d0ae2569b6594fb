use chrono::{Days, NaiveDate};

use super::{easter_sunday, is_weekend, BusinessCalendar, Holiday};

const FIXED_HOLIDAYS: &[(u32, u32, &str)] = &[
    (1, 1, "New year"),
    (4, 21, "Tiradentes' Day"),
    (5, 1, "Labour Day"),
    (9, 7, "Independence Day"),
    (10, 12, "Our Lady of Aparecida"),
    (11, 2, "All Souls' Day"),
    (11, 15, "Republic Day"),
    (12, 25, "Christmas Day"),
];

/// Black Consciousness Day became a national holiday in 2024
const CONSCIENCIA_NEGRA_SINCE: i32 = 2024;

/// Brazilian national holidays
#[derive(Debug, Clone, Copy, Default)]
pub struct Brazil;

impl BusinessCalendar for Brazil {
    fn name(&self) -> &str {
        "Brazil"
    }

    fn holidays(&self, year: i32) -> Vec<Holiday> {
        let mut holidays: Vec<Holiday> = FIXED_HOLIDAYS
            .iter()
            .filter_map(|&(m, d, label)| {
                NaiveDate::from_ymd_opt(year, m, d).map(|date| Holiday::new(date, label))
            })
            .collect();

        if year >= CONSCIENCIA_NEGRA_SINCE {
            if let Some(date) = NaiveDate::from_ymd_opt(year, 11, 20) {
                holidays.push(Holiday::new(date, "Black Consciousness Day"));
            }
        }

        if let Some(easter) = easter_sunday(year) {
            if let Some(date) = easter.checked_sub_days(Days::new(2)) {
                holidays.push(Holiday::new(date, "Good Friday"));
            }
        }

        holidays.sort_by_key(|h| h.date);
        holidays
    }
}

/// B3 exchange calendar: national holidays plus the days the exchange
/// closes on its own (Carnival, Corpus Christi, year-end).
#[derive(Debug, Clone, Copy, Default)]
pub struct BrazilB3;

impl BusinessCalendar for BrazilB3 {
    fn name(&self) -> &str {
        "Brazil (B3)"
    }

    fn holidays(&self, year: i32) -> Vec<Holiday> {
        let mut holidays = Brazil.holidays(year);

        if let Some(easter) = easter_sunday(year) {
            let relative = [
                (48, "Carnival Monday"),
                (47, "Carnival Tuesday"),
            ];
            for (days_before, label) in relative {
                if let Some(date) = easter.checked_sub_days(Days::new(days_before)) {
                    holidays.push(Holiday::new(date, label));
                }
            }
            if let Some(date) = easter.checked_add_days(Days::new(60)) {
                holidays.push(Holiday::new(date, "Corpus Christi"));
            }
        }

        if let Some(date) = NaiveDate::from_ymd_opt(year, 12, 24) {
            holidays.push(Holiday::new(date, "Christmas Eve"));
        }
        if let Some(date) = last_trading_day_of_year(year, &holidays) {
            holidays.push(Holiday::new(date, "Last business day of the year"));
        }

        holidays.sort_by_key(|h| h.date);
        holidays
    }
}

/// The exchange closes on the last weekday of the year that is not
/// already a holiday, which is 12-31 only when that falls on a weekday.
fn last_trading_day_of_year(year: i32, holidays: &[Holiday]) -> Option<NaiveDate> {
    let mut date = NaiveDate::from_ymd_opt(year, 12, 31)?;
    while is_weekend(date) || holidays.iter().any(|h| h.date == date) {
        date = date.checked_sub_days(Days::new(1))?;
    }
    Some(date)
}
