// src/hours_entry.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize, Serializer};
use std::{collections::HashMap, fmt::Display, str::FromStr};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{User, UserId, WorkHoursEntry};
use crate::store::{StoreError, UserStore, WorkHoursStore};

/// Largest value an hours column can hold (5 digits, 2 of them decimals).
pub const MAX_HOURS: Decimal = dec!(999.99);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("Invalid hours value '{0}'")]
    InvalidHours(String),
    #[error("Hours cannot be negative ({0})")]
    NegativeHours(Decimal),
    #[error("Hours cannot exceed {max} ({value})")]
    HoursOutOfRange { value: Decimal, max: Decimal },
    #[error("Please provide a valid number of hours.")]
    MissingHours,
    #[error("Invalid date format '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("User {0} is not an employee")]
    NotAnEmployee(UserId),
    #[error("More than one entry submitted for user {0}")]
    DuplicateEntry(UserId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// --- Raw input ---

/// A number as submitted by a client: either a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(serde_json::Number),
    Text(String),
}

impl NumericInput {
    pub fn as_text(&self) -> String {
        match self {
            NumericInput::Number(n) => n.to_string(),
            NumericInput::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        NumericInput::Text(value.to_string())
    }
}

/// Parses a decimal the way a form field would be read: surrounding whitespace is
/// ignored, plain and scientific notation are accepted.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
        .map(|value| if value.is_zero() { Decimal::ZERO } else { value })
}

pub fn parse_hours(raw: &str) -> Result<Decimal, EntryError> {
    let hours = parse_decimal(raw).ok_or_else(|| EntryError::InvalidHours(raw.to_string()))?;
    if hours < Decimal::ZERO {
        return Err(EntryError::NegativeHours(hours));
    }
    let hours = hours.round_dp(2);
    if hours > MAX_HOURS {
        return Err(EntryError::HoursOutOfRange {
            value: hours,
            max: MAX_HOURS,
        });
    }
    Ok(hours)
}

/// Missing or blank input means "no value supplied".
pub fn parse_optional_hours(raw: Option<&NumericInput>) -> Result<Option<Decimal>, EntryError> {
    match raw.map(NumericInput::as_text) {
        Some(text) if !text.trim().is_empty() => parse_hours(&text).map(Some),
        _ => Ok(None),
    }
}

pub fn parse_entry_date(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate, EntryError> {
    match raw.map(str::trim) {
        Some(text) if !text.is_empty() => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map_err(|_| EntryError::InvalidDate(text.to_string())),
        _ => Ok(today),
    }
}

// --- Requests and outcomes ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryInput {
    pub hours: Option<NumericInput>,
    #[serde(default)]
    pub is_absence: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndividualEntry {
    pub user_id: UserId,
    pub hours: Option<NumericInput>,
    #[serde(default)]
    pub is_absence: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    Written {
        entry: WorkHoursEntry,
    },
    Skipped,
    Rejected {
        #[serde(serialize_with = "serialize_display")]
        reason: EntryError,
    },
}

fn serialize_display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserEntryResult {
    pub user_id: UserId,
    pub email: String,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

impl UserEntryResult {
    pub fn is_rejected(&self) -> bool {
        matches!(self.outcome, EntryOutcome::Rejected { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EntryAction {
    Absence,
    Hours(Decimal),
    Skip,
}

/// Absence wins over any hours value; otherwise hours are validated.
fn resolve(hours: Option<&NumericInput>, is_absence: bool) -> Result<EntryAction, EntryError> {
    if is_absence {
        return Ok(EntryAction::Absence);
    }
    Ok(match parse_optional_hours(hours)? {
        Some(value) => EntryAction::Hours(value),
        None => EntryAction::Skip,
    })
}

fn write_one<S>(store: &S, user: &User, date: NaiveDate, action: EntryAction) -> UserEntryResult
where
    S: WorkHoursStore + ?Sized,
{
    let written = match action {
        EntryAction::Skip => {
            return UserEntryResult {
                user_id: user.id,
                email: user.email.clone(),
                outcome: EntryOutcome::Skipped,
            }
        }
        EntryAction::Absence => store.upsert_work_hours(user.id, date, Decimal::ZERO, true),
        EntryAction::Hours(hours) => store.upsert_work_hours(user.id, date, hours, false),
    };
    let outcome = match written {
        Ok(entry) => {
            info!(
                "Upserted work hours: Emp={}, Date={}, Hours={}, Absence={}",
                user.email, date, entry.hours, entry.is_absence
            );
            EntryOutcome::Written { entry }
        }
        Err(e) => {
            warn!("Failed to upsert work hours for {} on {}: {}", user.email, date, e);
            EntryOutcome::Rejected { reason: e.into() }
        }
    };
    UserEntryResult {
        user_id: user.id,
        email: user.email.clone(),
        outcome,
    }
}

fn rejected(user: &User, reason: EntryError) -> UserEntryResult {
    warn!("Rejected work-hours input for {}: {}", user.email, reason);
    UserEntryResult {
        user_id: user.id,
        email: user.email.clone(),
        outcome: EntryOutcome::Rejected { reason },
    }
}

// --- Writers ---

/// Applies one input to every employee for `date`. A request without hours and
/// without the absence flag is rejected as a whole; an invalid hours value is
/// reported for each employee and nothing is written.
pub fn apply_bulk_entry<S>(
    store: &S,
    date: NaiveDate,
    input: &EntryInput,
) -> Result<Vec<UserEntryResult>, EntryError>
where
    S: UserStore + WorkHoursStore + ?Sized,
{
    let action = resolve(input.hours.as_ref(), input.is_absence);
    if action == Ok(EntryAction::Skip) {
        return Err(EntryError::MissingHours);
    }
    let employees = store.list_employees()?;
    info!(
        "Applying bulk entry for {} employees on {}",
        employees.len(),
        date
    );

    let results = employees
        .iter()
        .map(|user| match &action {
            Ok(action) => write_one(store, user, date, *action),
            Err(e) => rejected(user, e.clone()),
        })
        .collect();
    Ok(results)
}

pub fn apply_bulk_absence<S>(store: &S, date: NaiveDate) -> Result<Vec<UserEntryResult>, EntryError>
where
    S: UserStore + WorkHoursStore + ?Sized,
{
    apply_bulk_entry(
        store,
        date,
        &EntryInput {
            hours: None,
            is_absence: true,
        },
    )
}

/// Applies per-employee inputs for `date`. Each row succeeds or fails on its own;
/// employees without a row are skipped, rows for non-employees are rejected and a
/// user named by more than one row is rejected without a write.
pub fn apply_individual_entries<S>(
    store: &S,
    date: NaiveDate,
    rows: &[IndividualEntry],
) -> Result<Vec<UserEntryResult>, EntryError>
where
    S: UserStore + WorkHoursStore + ?Sized,
{
    let employees = store.list_employees()?;
    let mut by_user: HashMap<UserId, Vec<&IndividualEntry>> = HashMap::new();
    for row in rows {
        by_user.entry(row.user_id).or_default().push(row);
    }
    info!(
        "Applying {} individual entries for {} employees on {}",
        rows.len(),
        employees.len(),
        date
    );

    let mut results = Vec::with_capacity(employees.len());
    for user in &employees {
        let result = match by_user.remove(&user.id).as_deref() {
            None | Some([]) => write_one(store, user, date, EntryAction::Skip),
            Some([row]) => match resolve(row.hours.as_ref(), row.is_absence) {
                Ok(action) => write_one(store, user, date, action),
                Err(e) => rejected(user, e),
            },
            Some(_) => rejected(user, EntryError::DuplicateEntry(user.id)),
        };
        results.push(result);
    }

    let mut strays: Vec<UserId> = by_user.into_keys().collect();
    strays.sort_unstable();
    for user_id in strays {
        let email = store
            .get_user(user_id)?
            .map(|u| u.email)
            .unwrap_or_default();
        warn!("Ignoring entry for non-employee user {}", user_id);
        results.push(UserEntryResult {
            user_id,
            email,
            outcome: EntryOutcome::Rejected {
                reason: EntryError::NotAnEmployee(user_id),
            },
        });
    }
    Ok(results)
}

// --- Day roster ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayRoster {
    pub date: NaiveDate,
    pub employees: Vec<User>,
    pub entries: Vec<WorkHoursEntry>,
}

pub fn day_roster<S>(store: &S, date: NaiveDate) -> Result<DayRoster, EntryError>
where
    S: UserStore + WorkHoursStore + ?Sized,
{
    Ok(DayRoster {
        date,
        employees: store.list_employees()?,
        entries: store.work_hours_on(date)?,
    })
}
