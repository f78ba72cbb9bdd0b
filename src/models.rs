// src/models.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type EntryId = u64;
pub type HolidayId = u64;

// --- Users ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_employee: bool,
    pub is_admin: bool,
    pub is_superuser: bool,
    pub is_contracted: bool,
    pub hourly_wage: Decimal,
    pub account_number: String,
    pub visa_type: String,
    pub bank_name: String,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Validated registration data, ready to be stored. Ids are assigned by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_employee: bool,
    pub is_admin: bool,
    pub is_superuser: bool,
    pub is_contracted: bool,
    pub hourly_wage: Decimal,
    pub account_number: String,
    pub visa_type: String,
    pub bank_name: String,
}

impl NewUser {
    pub(crate) fn into_user(self, id: UserId) -> User {
        User {
            id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            is_employee: self.is_employee,
            is_admin: self.is_admin,
            is_superuser: self.is_superuser,
            is_contracted: self.is_contracted,
            hourly_wage: self.hourly_wage,
            account_number: self.account_number,
            visa_type: self.visa_type,
            bank_name: self.bank_name,
        }
    }
}

// --- Work hours ---

/// One row per (user, date). Absence rows always carry zero hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkHoursEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub hours: Decimal,
    pub is_absence: bool,
}

// --- Holidays ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holiday {
    pub id: HolidayId,
    pub date: NaiveDate,
    pub name: String,
}

// --- Payroll settings ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollSettings {
    pub minimum_wage: Decimal,
}

impl Default for PayrollSettings {
    fn default() -> Self {
        Self {
            minimum_wage: Decimal::ZERO,
        }
    }
}
