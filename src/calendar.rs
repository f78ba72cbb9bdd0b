// src/calendar.rs
use chrono::{Datelike, Month, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::models::{Holiday, User, WorkHoursEntry};
use crate::payroll::{compute_totals, PayrollTotals};
use crate::store::{DateRange, HolidayStore, StoreError, WorkHoursStore};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("bad month number {0}; must be 1-12")]
    IllegalMonth(i64),
    #[error("year {0} is out of range")]
    YearOutOfRange(i64),
    #[error("Invalid {field} value '{value}': expected an integer")]
    NotAnInteger { field: &'static str, value: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

// --- Month arithmetic ---

/// Years a calendar page can show: four-digit years of the common era.
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32, CalendarError> {
    let days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => return Err(CalendarError::IllegalMonth(month as i64)),
    };
    Ok(days)
}

/// A (year, month) pair. Navigation is plain arithmetic; validity is checked when the
/// month is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRef {
    pub year: i32,
    pub month: u32,
}

impl MonthRef {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    /// Coerces raw query values into a month, falling back to the month of `today`
    /// for missing components.
    pub fn from_query(
        year: Option<&str>,
        month: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, CalendarError> {
        let current = Self::containing(today);
        let year = match year {
            Some(raw) => parse_integer("year", raw)?,
            None => current.year as i64,
        };
        let month = match month {
            Some(raw) => parse_integer("month", raw)?,
            None => current.month as i64,
        };
        if !(1..=12).contains(&month) {
            return Err(CalendarError::IllegalMonth(month));
        }
        if !(MIN_YEAR as i64..=MAX_YEAR as i64).contains(&year) {
            return Err(CalendarError::YearOutOfRange(year));
        }
        Ok(Self::new(year as i32, month as u32))
    }

    pub fn previous(&self) -> Self {
        if self.month > 1 {
            Self::new(self.year, self.month - 1)
        } else {
            Self::new(self.year - 1, 12)
        }
    }

    pub fn next(&self) -> Self {
        if self.month < 12 {
            Self::new(self.year, self.month + 1)
        } else {
            Self::new(self.year + 1, 1)
        }
    }

    pub fn first_day(&self) -> Result<NaiveDate, CalendarError> {
        if !(1..=12).contains(&self.month) {
            return Err(CalendarError::IllegalMonth(self.month as i64));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err(CalendarError::YearOutOfRange(self.year as i64));
        }
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .ok_or(CalendarError::YearOutOfRange(self.year as i64))
    }

    pub fn date_range(&self) -> Result<DateRange, CalendarError> {
        let start = self.first_day()?;
        let last_day = days_in_month(self.year, self.month)?;
        let end = NaiveDate::from_ymd_opt(self.year, self.month, last_day)
            .ok_or(CalendarError::YearOutOfRange(self.year as i64))?;
        Ok(DateRange::new(start, end))
    }

    pub fn name(&self) -> &'static str {
        u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
            .unwrap_or("")
    }
}

fn parse_integer(field: &'static str, raw: &str) -> Result<i64, CalendarError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| CalendarError::NotAnInteger {
            field,
            value: raw.to_string(),
        })
}

/// Week-partitioned layout of a month, Monday first. Days outside the month are 0.
pub fn month_calendar(year: i32, month: u32) -> Result<Vec<[u32; 7]>, CalendarError> {
    let period = MonthRef::new(year, month);
    let first = period.first_day()?;
    let days = days_in_month(year, month)?;
    let leading = first.weekday().num_days_from_monday();

    let mut weeks = Vec::new();
    let mut week = [0u32; 7];
    let mut slot = leading as usize;
    for day in 1..=days {
        week[slot] = day;
        slot += 1;
        if slot == 7 {
            weeks.push(week);
            week = [0u32; 7];
            slot = 0;
        }
    }
    if slot > 0 {
        weeks.push(week);
    }
    Ok(weeks)
}

// --- Grid ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DayCell {
    Outside,
    Day {
        day: u32,
        hours: Option<Decimal>,
        is_absence: bool,
        holiday: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarGrid {
    pub period: MonthRef,
    pub weeks: Vec<Vec<DayCell>>,
    /// The month's rows the cells were built from.
    #[serde(skip)]
    pub entries: Vec<WorkHoursEntry>,
}

impl CalendarGrid {
    /// Merges one user's entries and the global holidays into the month layout.
    /// Rows dated outside the month are ignored.
    pub fn build(
        period: MonthRef,
        entries: Vec<WorkHoursEntry>,
        holidays: &[Holiday],
    ) -> Result<Self, CalendarError> {
        let layout = month_calendar(period.year, period.month)?;
        let entries: Vec<WorkHoursEntry> = entries
            .into_iter()
            .filter(|e| e.date.year() == period.year && e.date.month() == period.month)
            .collect();
        let hours_by_date: HashMap<NaiveDate, &WorkHoursEntry> =
            entries.iter().map(|e| (e.date, e)).collect();
        let holiday_by_date: HashMap<NaiveDate, &Holiday> =
            holidays.iter().map(|h| (h.date, h)).collect();

        let mut weeks = Vec::with_capacity(layout.len());
        for week in layout {
            let mut cells = Vec::with_capacity(7);
            for day in week {
                if day == 0 {
                    cells.push(DayCell::Outside);
                    continue;
                }
                let date = NaiveDate::from_ymd_opt(period.year, period.month, day)
                    .ok_or(CalendarError::YearOutOfRange(period.year as i64))?;
                let entry = hours_by_date.get(&date);
                cells.push(DayCell::Day {
                    day,
                    hours: entry.map(|e| e.hours),
                    is_absence: entry.map_or(false, |e| e.is_absence),
                    holiday: holiday_by_date.get(&date).map(|h| h.name.clone()),
                });
            }
            weeks.push(cells);
        }
        drop(hours_by_date);
        Ok(Self {
            period,
            weeks,
            entries,
        })
    }

    pub fn in_month_days(&self) -> usize {
        self.weeks
            .iter()
            .flatten()
            .filter(|cell| matches!(cell, DayCell::Day { .. }))
            .count()
    }
}

pub fn build_calendar_grid<S>(
    store: &S,
    user: &User,
    period: MonthRef,
) -> Result<CalendarGrid, CalendarError>
where
    S: WorkHoursStore + HolidayStore + ?Sized,
{
    let range = period.date_range()?;
    let entries = store.find_work_hours(user.id, Some(range))?;
    let holidays = store.find_holidays(range)?;
    debug!(
        "Building calendar grid for {} {}-{:02}: {} entries, {} holidays",
        user.email,
        period.year,
        period.month,
        entries.len(),
        holidays.len()
    );
    CalendarGrid::build(period, entries, &holidays)
}

// --- Calendar view ---

/// Everything the calendar screen shows for one user and month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarView {
    pub employee_email: String,
    pub employee_name: String,
    pub year: i32,
    pub month: u32,
    pub month_name: &'static str,
    pub weeks: Vec<Vec<DayCell>>,
    pub total_hours: Decimal,
    pub total_salary: Decimal,
    pub previous: MonthRef,
    pub next: MonthRef,
}

pub fn calendar_view<S>(store: &S, user: &User, period: MonthRef) -> Result<CalendarView, CalendarError>
where
    S: WorkHoursStore + HolidayStore + ?Sized,
{
    let grid = build_calendar_grid(store, user, period)?;
    let PayrollTotals {
        total_hours,
        total_salary,
    } = compute_totals(&grid.entries, user.hourly_wage);
    debug!(
        "Calendar view for {}: {} days, {} hours",
        user.email,
        grid.in_month_days(),
        total_hours
    );

    Ok(CalendarView {
        employee_email: user.email.clone(),
        employee_name: user.full_name(),
        year: period.year,
        month: period.month,
        month_name: period.name(),
        weeks: grid.weeks,
        total_hours,
        total_salary,
        previous: period.previous(),
        next: period.next(),
    })
}
