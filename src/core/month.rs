//! Calendar-month keys.
//!
//! A [`MonthRef`] is the `YYYY-MM` key that groups transactions and drives
//! automation. Day arithmetic clamps to the last valid day of the month, so
//! a due day of 31 lands on the 30th in April and on the 28th or 29th in
//! February.

use crate::errors::{Error, Result};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthRef {
    year: i32,
    month: u32,
}

impl MonthRef {
    /// Builds a month key, rejecting months outside 1..=12 and years
    /// outside 1..=9999.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::validation(format!("month must be 1-12, got {month}")));
        }
        if !(1..=9999).contains(&year) {
            return Err(Error::validation(format!(
                "year must be 1-9999, got {year}"
            )));
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`. Dates outside years 1..=9999 are rejected.
    pub fn from_date(date: NaiveDate) -> Result<Self> {
        Self::new(date.year(), date.month())
    }

    /// Calendar year
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Calendar month, 1-12
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// The month before this one. Fails on `0001-01`.
    pub fn previous(self) -> Result<Self> {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    /// The month after this one. Fails on `9999-12`.
    pub fn next(self) -> Result<Self> {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    /// First day of the month.
    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        // year and month are validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Number of days in the month.
    #[must_use]
    pub fn days_in_month(self) -> u32 {
        let first = self.first_day();
        first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .map_or(31, |last| last.day())
    }

    /// The given day within this month, clamped to `1..=days_in_month()`.
    #[must_use]
    pub fn date_with_day(self, day: u32) -> NaiveDate {
        let day = day.clamp(1, self.days_in_month());
        NaiveDate::from_ymd_opt(self.year, self.month, day).unwrap_or_else(|| self.first_day())
    }

    /// Whether `date` falls inside this month.
    #[must_use]
    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for MonthRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed =
            || Error::validation(format!("malformed month key '{s}', expected YYYY-MM"));

        let (year, month) = s.trim().split_once('-').ok_or_else(malformed)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(malformed());
        }
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let month: u32 = month.parse().map_err(|_| malformed())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for MonthRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MonthRef> for String {
    fn from(value: MonthRef) -> Self {
        value.to_string()
    }
}

/// Advances a date by exactly one calendar month, clamping to the last day
/// of the target month when the source day does not exist there.
#[must_use]
pub fn add_one_month(date: NaiveDate) -> NaiveDate {
    date.checked_add_months(Months::new(1)).unwrap_or(date)
}
