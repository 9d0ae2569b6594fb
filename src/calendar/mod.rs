pub mod brazil;
pub mod easter;

pub use brazil::{Brazil, BrazilB3};
pub use easter::easter_sunday;

use anyhow::anyhow;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A named non-working date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub label: &'static str,
}

impl Holiday {
    pub fn new(date: NaiveDate, label: &'static str) -> Self {
        Self { date, label }
    }
}

/// Working-day rules for one market region.
///
/// Implementors only need to list their holidays; weekend handling and
/// working-day counting come from the default methods.
pub trait BusinessCalendar: Send + Sync {
    fn name(&self) -> &str;

    /// All holidays observed in `year`, in calendar order
    fn holidays(&self, year: i32) -> Vec<Holiday>;

    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays(date.year()).iter().any(|h| h.date == date)
    }

    fn is_working_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date) && !self.is_holiday(date)
    }

    /// Number of working days in `(min(a, b), max(a, b)]`.
    ///
    /// Zero when both dates are equal. The count carries no direction.
    fn working_days_between(&self, a: NaiveDate, b: NaiveDate) -> u32 {
        if a == b {
            return 0;
        }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };

        let mut days = WorkingDays::new(self);
        let mut count = 0;
        let mut day = lo;
        while day < hi {
            day = match day.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => break,
            };
            if days.is_working_day(day) {
                count += 1;
            }
        }
        count
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Two-digit years from here up are 19xx, below it 20xx
pub const CENTURY_PIVOT: u32 = 69;

/// Rewrite a `YY-...` date to `YYYY-...`.
///
/// The year must be exactly two ASCII digits followed by `-`; anything else
/// yields `None`. The rest of the text is left for the caller's format.
pub fn expand_two_digit_year(input: &str) -> Option<String> {
    let (yy, rest) = input.split_once('-')?;
    if yy.len() != 2 || !yy.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let yy: u32 = yy.parse().ok()?;
    let century = if yy >= CENTURY_PIVOT { 1900 } else { 2000 };
    Some(format!("{}-{}", century + yy, rest))
}

/// Working-day checks for walks over many dates.
///
/// `holidays(year)` runs once per year visited instead of once per date.
/// Dates should be visited in order; jumping between years recomputes.
pub struct WorkingDays<'a, C: BusinessCalendar + ?Sized> {
    calendar: &'a C,
    year: Option<i32>,
    holidays: HashSet<NaiveDate>,
}

impl<'a, C: BusinessCalendar + ?Sized> WorkingDays<'a, C> {
    pub fn new(calendar: &'a C) -> Self {
        Self {
            calendar,
            year: None,
            holidays: HashSet::new(),
        }
    }

    pub fn is_working_day(&mut self, date: NaiveDate) -> bool {
        if is_weekend(date) {
            return false;
        }
        let year = date.year();
        if self.year != Some(year) {
            self.holidays = self.calendar.holidays(year).into_iter().map(|h| h.date).collect();
            self.year = Some(year);
        }
        !self.holidays.contains(&date)
    }
}

/// Supported calendar regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    #[default]
    Brazil,
    BrazilB3,
}

impl Region {
    pub fn as_str(&self) -> &str {
        match self {
            Region::Brazil => "brazil",
            Region::BrazilB3 => "brazil_b3",
        }
    }

    pub fn calendar(&self) -> Arc<dyn BusinessCalendar> {
        match self {
            Region::Brazil => Arc::new(Brazil),
            Region::BrazilB3 => Arc::new(BrazilB3),
        }
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "brazil" | "br" => Ok(Region::Brazil),
            "brazil_b3" | "b3" => Ok(Region::BrazilB3),
            _ => Err(anyhow!("Unknown calendar region: {}", s)),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
