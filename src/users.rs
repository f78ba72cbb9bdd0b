// src/users.rs
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::access::{can_delete_user, AccessError};
use crate::hours_entry::{parse_decimal, NumericInput};
use crate::models::{NewUser, User, UserId};
use crate::store::{StoreError, UserStore};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email regex is valid")
});

/// Wage column: 10 digits, 2 of them decimals.
pub const MAX_HOURLY_WAGE: Decimal = dec!(99999999.99);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserError {
    #[error("Email is required.")]
    MissingEmail,
    #[error("Invalid email address '{0}'")]
    InvalidEmail(String),
    #[error("{field} must be at most {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
    #[error("Invalid hourly wage '{0}'")]
    InvalidWage(String),
    #[error("Hourly wage cannot be negative ({0})")]
    NegativeWage(Decimal),
    #[error("Hourly wage cannot exceed {max} ({value})")]
    WageOutOfRange { value: Decimal, max: Decimal },
    #[error("User not found.")]
    NotFound(UserId),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub account_number: String,
    pub is_contracted: bool,
    pub visa_type: String,
    pub bank_name: String,
    pub hourly_wage: Option<NumericInput>,
    pub is_employee: bool,
    pub is_admin: bool,
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), UserError> {
    if value.chars().count() > max {
        return Err(UserError::FieldTooLong { field, max });
    }
    Ok(())
}

/// Missing or blank wage means 0.00.
pub fn parse_hourly_wage(raw: Option<&NumericInput>) -> Result<Decimal, UserError> {
    let text = match raw.map(NumericInput::as_text) {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Ok(Decimal::ZERO),
    };
    let wage = parse_decimal(&text).ok_or_else(|| UserError::InvalidWage(text.clone()))?;
    if wage < Decimal::ZERO {
        return Err(UserError::NegativeWage(wage));
    }
    let wage = wage.round_dp(2);
    if wage > MAX_HOURLY_WAGE {
        return Err(UserError::WageOutOfRange {
            value: wage,
            max: MAX_HOURLY_WAGE,
        });
    }
    Ok(wage)
}

impl RegistrationForm {
    /// Registration never grants superuser rights.
    pub fn validate(&self) -> Result<NewUser, UserError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(UserError::MissingEmail);
        }
        if !EMAIL_RE.is_match(email) {
            return Err(UserError::InvalidEmail(email.to_string()));
        }
        check_length("email", email, 254)?;
        check_length("first_name", &self.first_name, 100)?;
        check_length("last_name", &self.last_name, 100)?;
        check_length("account_number", &self.account_number, 20)?;
        check_length("visa_type", &self.visa_type, 50)?;
        check_length("bank_name", &self.bank_name, 100)?;

        Ok(NewUser {
            email: email.to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            is_employee: self.is_employee,
            is_admin: self.is_admin,
            is_superuser: false,
            is_contracted: self.is_contracted,
            hourly_wage: parse_hourly_wage(self.hourly_wage.as_ref())?,
            account_number: self.account_number.trim().to_string(),
            visa_type: self.visa_type.trim().to_string(),
            bank_name: self.bank_name.trim().to_string(),
        })
    }
}

pub fn register_user<S>(store: &S, form: &RegistrationForm) -> Result<User, UserError>
where
    S: UserStore + ?Sized,
{
    let new_user = form.validate().map_err(|e| {
        warn!("Registration rejected for '{}': {}", form.email, e);
        e
    })?;
    let user = store.insert_user(new_user)?;
    info!(
        "Registered user: ID={}, Email={}, Employee={}, Admin={}",
        user.id, user.email, user.is_employee, user.is_admin
    );
    Ok(user)
}

pub fn delete_user<S>(store: &S, caller: &User, target_id: UserId) -> Result<User, UserError>
where
    S: UserStore + ?Sized,
{
    let target = store
        .get_user(target_id)?
        .ok_or(UserError::NotFound(target_id))?;
    if !can_delete_user(caller, &target) {
        warn!(
            "{} attempted to delete {} without permission",
            caller.email, target.email
        );
        return Err(AccessError::CannotDeleteUser.into());
    }
    let deleted = store.delete_user(target_id).map_err(|e| match e {
        StoreError::UserNotFound(id) => UserError::NotFound(id),
        other => other.into(),
    })?;
    info!("{} deleted user {}", caller.email, deleted.email);
    Ok(deleted)
}

/// Seeds a superuser with the given email unless a user with that email exists.
pub fn ensure_bootstrap_superuser<S>(store: &S, email: &str) -> Result<User, UserError>
where
    S: UserStore + ?Sized,
{
    if let Some(existing) = store.find_user_by_email(email)? {
        if !existing.is_superuser {
            warn!(
                "Bootstrap user {} exists but is not a superuser; leaving it unchanged",
                existing.email
            );
        }
        return Ok(existing);
    }
    let email = email.trim();
    if !EMAIL_RE.is_match(email) {
        return Err(UserError::InvalidEmail(email.to_string()));
    }
    let user = store.insert_user(NewUser {
        email: email.to_string(),
        is_superuser: true,
        ..Default::default()
    })?;
    info!("Seeded bootstrap superuser {}", user.email);
    Ok(user)
}
