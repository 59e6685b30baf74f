//! The calendar month that budgets and transaction listings are grouped by.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{Date, Month};

use crate::Error;

/// The earliest year accepted for a budget period.
pub const MIN_YEAR: i32 = 1970;
/// The latest year accepted for a budget period.
pub const MAX_YEAR: i32 = 9999;

/// A calendar month in a specific year, e.g. March 2025.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BudgetPeriod {
    /// The calendar year.
    pub year: i32,
    /// The month of the year, starting from 1 for January.
    pub month: u8,
}

impl BudgetPeriod {
    /// Create a period from a year and a one-based month.
    ///
    /// # Errors
    /// Returns [Error::InvalidMonth] if `month` is not in 1..=12, or
    /// [Error::InvalidYear] if `year` is outside [MIN_YEAR]..=[MAX_YEAR].
    pub fn new(year: i32, month: u8) -> Result<Self, Error> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidMonth(month));
        }

        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(Error::InvalidYear(year));
        }

        Ok(Self { year, month })
    }

    /// The period that `date` falls in.
    pub fn containing(date: Date) -> Self {
        Self {
            year: date.year(),
            month: date.month() as u8,
        }
    }

    /// The first day of the month.
    pub fn first_day(&self) -> Date {
        // The constructor guarantees the month and year are in range.
        let month = Month::try_from(self.month).unwrap_or(Month::January);
        Date::from_calendar_date(self.year, month, 1).unwrap_or(Date::MIN)
    }

    /// The period immediately after this one.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The dates covered by the period as a half-open range: the first
    /// day of the month and the first day of the following month.
    pub fn date_bounds(&self) -> (Date, Date) {
        (self.first_day(), self.next().first_day())
    }

    /// Whether `date` falls within the period.
    pub fn contains(&self, date: Date) -> bool {
        Self::containing(date) == *self
    }
}

impl Display for BudgetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BudgetPeriod {
    type Err = Error;

    /// Parse a period written as "YYYY-MM".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| Error::InvalidDateFormat("expected YYYY-MM".to_owned(), s.to_owned()))?;

        let year = year
            .parse()
            .map_err(|error| Error::InvalidDateFormat(format!("{error}"), s.to_owned()))?;
        let month = month
            .parse()
            .map_err(|error| Error::InvalidDateFormat(format!("{error}"), s.to_owned()))?;

        Self::new(year, month)
    }
}

/// Query parameters that select a period, falling back to the current month.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct PeriodQuery {
    /// The year to select, defaults to the current year.
    pub year: Option<i32>,
    /// The month to select, defaults to the current month.
    pub month: Option<u8>,
}

impl PeriodQuery {
    /// Fill in any missing parts of the query from `today`.
    ///
    /// # Errors
    /// Returns an error if the resulting year or month is out of range.
    pub fn resolve(&self, today: Date) -> Result<BudgetPeriod, Error> {
        let current = BudgetPeriod::containing(today);

        BudgetPeriod::new(
            self.year.unwrap_or(current.year),
            self.month.unwrap_or(current.month),
        )
    }
}
