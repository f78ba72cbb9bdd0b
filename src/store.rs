// src/store.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{EntryId, Holiday, HolidayId, NewUser, User, UserId, WorkHoursEntry};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("User {0} not found")]
    UserNotFound(UserId),
    #[error("Holiday {0} not found")]
    HolidayNotFound(HolidayId),
    #[error("A user with email {0} already exists")]
    DuplicateEmail(String),
    #[error("A holiday already exists on {0}")]
    DuplicateHolidayDate(NaiveDate),
    #[error("Store lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Inclusive date range used for month-scoped queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

// --- Storage contracts ---

pub trait UserStore {
    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// All users ordered by email.
    fn list_users(&self) -> Result<Vec<User>, StoreError>;
    /// Users with the employee flag, ordered by email.
    fn list_employees(&self) -> Result<Vec<User>, StoreError>;
    fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError>;
    /// Removes the user together with all of their work-hours entries.
    fn delete_user(&self, id: UserId) -> Result<User, StoreError>;
}

pub trait WorkHoursStore {
    /// Entries for one user, ordered by date. `None` means all dates.
    fn find_work_hours(
        &self,
        user_id: UserId,
        range: Option<DateRange>,
    ) -> Result<Vec<WorkHoursEntry>, StoreError>;
    fn work_hours_on(&self, date: NaiveDate) -> Result<Vec<WorkHoursEntry>, StoreError>;
    /// Creates or fully replaces the entry for (user, date).
    fn upsert_work_hours(
        &self,
        user_id: UserId,
        date: NaiveDate,
        hours: Decimal,
        is_absence: bool,
    ) -> Result<WorkHoursEntry, StoreError>;
}

pub trait HolidayStore {
    fn find_holidays(&self, range: DateRange) -> Result<Vec<Holiday>, StoreError>;
    /// All holidays ordered by date.
    fn list_holidays(&self) -> Result<Vec<Holiday>, StoreError>;
    fn insert_holiday(&self, date: NaiveDate, name: String) -> Result<Holiday, StoreError>;
    fn delete_holiday(&self, id: HolidayId) -> Result<Holiday, StoreError>;
}

// --- In-memory implementation ---

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    work_hours: HashMap<(UserId, NaiveDate), WorkHoursEntry>,
    holidays: BTreeMap<HolidayId, Holiday>,
    next_user_id: UserId,
    next_entry_id: EntryId,
    next_holiday_id: HolidayId,
}

impl Tables {
    fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut tables = Tables {
            next_user_id: snapshot.next_user_id,
            next_entry_id: snapshot.next_entry_id,
            next_holiday_id: snapshot.next_holiday_id,
            ..Default::default()
        };
        for user in snapshot.users {
            tables.next_user_id = tables.next_user_id.max(user.id);
            tables.users.insert(user.id, user);
        }
        for entry in snapshot.work_hours {
            tables.next_entry_id = tables.next_entry_id.max(entry.id);
            tables.work_hours.insert((entry.user_id, entry.date), entry);
        }
        for holiday in snapshot.holidays {
            tables.next_holiday_id = tables.next_holiday_id.max(holiday.id);
            tables.holidays.insert(holiday.id, holiday);
        }
        tables
    }

    fn allocate_user_id(&mut self) -> UserId {
        self.next_user_id += 1;
        self.next_user_id
    }

    fn allocate_entry_id(&mut self) -> EntryId {
        self.next_entry_id += 1;
        self.next_entry_id
    }

    fn allocate_holiday_id(&mut self) -> HolidayId {
        self.next_holiday_id += 1;
        self.next_holiday_id
    }
}

/// Flat, serializable copy of every table plus the id counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub users: Vec<User>,
    pub work_hours: Vec<WorkHoursEntry>,
    pub holidays: Vec<Holiday>,
    pub next_user_id: UserId,
    pub next_entry_id: EntryId,
    pub next_holiday_id: HolidayId,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::from_snapshot(snapshot))),
        }
    }

    /// Replaces every table with `snapshot`, in place, so clones see the change.
    pub fn restore(&self, snapshot: StoreSnapshot) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        *tables = Tables::from_snapshot(snapshot);
        Ok(())
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        let tables = self.lock()?;
        let mut work_hours: Vec<WorkHoursEntry> = tables.work_hours.values().cloned().collect();
        work_hours.sort_by_key(|e| (e.user_id, e.date));
        Ok(StoreSnapshot {
            users: tables.users.values().cloned().collect(),
            work_hours,
            holidays: tables.holidays.values().cloned().collect(),
            next_user_id: tables.next_user_id,
            next_entry_id: tables.next_entry_id,
            next_holiday_id: tables.next_holiday_id,
        })
    }

    /// (users, work-hours rows, holidays)
    pub fn counts(&self) -> Result<(usize, usize, usize), StoreError> {
        let tables = self.lock()?;
        Ok((
            tables.users.len(),
            tables.work_hours.len(),
            tables.holidays.len(),
        ))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

fn sorted_by_email(mut users: Vec<User>) -> Vec<User> {
    users.sort_by(|a, b| a.email.cmp(&b.email));
    users
}

impl UserStore for InMemoryStore {
    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = self.lock()?.users.values().cloned().collect();
        Ok(sorted_by_email(users))
    }

    fn list_employees(&self) -> Result<Vec<User>, StoreError> {
        let employees = self
            .lock()?
            .users
            .values()
            .filter(|u| u.is_employee)
            .cloned()
            .collect();
        Ok(sorted_by_email(employees))
    }

    fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.lock()?;
        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email))
        {
            return Err(StoreError::DuplicateEmail(new_user.email));
        }
        let id = tables.allocate_user_id();
        let user = new_user.into_user(id);
        tables.users.insert(id, user.clone());
        info!("Stored user: ID={}, Email={}", user.id, user.email);
        Ok(user)
    }

    fn delete_user(&self, id: UserId) -> Result<User, StoreError> {
        let mut tables = self.lock()?;
        let user = tables
            .users
            .remove(&id)
            .ok_or(StoreError::UserNotFound(id))?;
        let before = tables.work_hours.len();
        tables.work_hours.retain(|(user_id, _), _| *user_id != id);
        info!(
            "Deleted user: ID={}, Email={} ({} work-hours rows removed)",
            user.id,
            user.email,
            before - tables.work_hours.len()
        );
        Ok(user)
    }
}

impl WorkHoursStore for InMemoryStore {
    fn find_work_hours(
        &self,
        user_id: UserId,
        range: Option<DateRange>,
    ) -> Result<Vec<WorkHoursEntry>, StoreError> {
        let tables = self.lock()?;
        let mut entries: Vec<WorkHoursEntry> = tables
            .work_hours
            .values()
            .filter(|e| e.user_id == user_id)
            .filter(|e| range.map_or(true, |r| r.contains(e.date)))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.date);
        debug!(
            "Found {} work-hours rows for user {} in {:?}",
            entries.len(),
            user_id,
            range
        );
        Ok(entries)
    }

    fn work_hours_on(&self, date: NaiveDate) -> Result<Vec<WorkHoursEntry>, StoreError> {
        let tables = self.lock()?;
        let mut entries: Vec<WorkHoursEntry> = tables
            .work_hours
            .values()
            .filter(|e| e.date == date)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.user_id);
        Ok(entries)
    }

    fn upsert_work_hours(
        &self,
        user_id: UserId,
        date: NaiveDate,
        hours: Decimal,
        is_absence: bool,
    ) -> Result<WorkHoursEntry, StoreError> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::UserNotFound(user_id));
        }
        let hours = if is_absence { Decimal::ZERO } else { hours };
        let id = match tables.work_hours.get(&(user_id, date)) {
            Some(existing) => existing.id,
            None => tables.allocate_entry_id(),
        };
        let entry = WorkHoursEntry {
            id,
            user_id,
            date,
            hours,
            is_absence,
        };
        tables.work_hours.insert((user_id, date), entry.clone());
        Ok(entry)
    }
}

impl HolidayStore for InMemoryStore {
    fn find_holidays(&self, range: DateRange) -> Result<Vec<Holiday>, StoreError> {
        let tables = self.lock()?;
        let mut holidays: Vec<Holiday> = tables
            .holidays
            .values()
            .filter(|h| range.contains(h.date))
            .cloned()
            .collect();
        holidays.sort_by_key(|h| h.date);
        Ok(holidays)
    }

    fn list_holidays(&self) -> Result<Vec<Holiday>, StoreError> {
        let mut holidays: Vec<Holiday> = self.lock()?.holidays.values().cloned().collect();
        holidays.sort_by_key(|h| h.date);
        Ok(holidays)
    }

    fn insert_holiday(&self, date: NaiveDate, name: String) -> Result<Holiday, StoreError> {
        let mut tables = self.lock()?;
        if tables.holidays.values().any(|h| h.date == date) {
            return Err(StoreError::DuplicateHolidayDate(date));
        }
        let id = tables.allocate_holiday_id();
        let holiday = Holiday { id, date, name };
        tables.holidays.insert(id, holiday.clone());
        Ok(holiday)
    }

    fn delete_holiday(&self, id: HolidayId) -> Result<Holiday, StoreError> {
        self.lock()?
            .holidays
            .remove(&id)
            .ok_or(StoreError::HolidayNotFound(id))
    }
}
