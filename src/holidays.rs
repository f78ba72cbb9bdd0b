// src/holidays.rs
use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::models::{Holiday, HolidayId};
use crate::store::{HolidayStore, StoreError};

const MAX_NAME_LEN: usize = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HolidayError {
    #[error("Date and name are required.")]
    MissingField,
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Holiday name must be at most {MAX_NAME_LEN} characters")]
    NameTooLong,
    #[error("Holiday not found.")]
    NotFound(HolidayId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HolidayForm {
    pub date: Option<String>,
    pub name: Option<String>,
}

fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validates everything before touching the store, so a failure never leaves a
/// partial holiday behind.
pub fn add_holiday<S>(store: &S, form: &HolidayForm) -> Result<Holiday, HolidayError>
where
    S: HolidayStore + ?Sized,
{
    let (Some(date_str), Some(name)) = (
        required(form.date.as_deref()),
        required(form.name.as_deref()),
    ) else {
        return Err(HolidayError::MissingField);
    };
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| HolidayError::InvalidDate(date_str.to_string()))?;
    if name.chars().count() > MAX_NAME_LEN {
        return Err(HolidayError::NameTooLong);
    }

    match store.insert_holiday(date, name.to_string()) {
        Ok(holiday) => {
            info!("Holiday added: {} on {}", holiday.name, holiday.date);
            Ok(holiday)
        }
        Err(e) => {
            error!(
                "Failed to add holiday. Date: '{}', Name: '{}', Error: {}",
                date_str, name, e
            );
            Err(e.into())
        }
    }
}

pub fn delete_holiday<S>(store: &S, id: HolidayId) -> Result<Holiday, HolidayError>
where
    S: HolidayStore + ?Sized,
{
    match store.delete_holiday(id) {
        Ok(holiday) => {
            info!("Holiday '{}' ({}) deleted", holiday.name, holiday.date);
            Ok(holiday)
        }
        Err(StoreError::HolidayNotFound(id)) => Err(HolidayError::NotFound(id)),
        Err(e) => {
            error!("Failed to delete holiday ID {}. Error: {}", id, e);
            Err(e.into())
        }
    }
}

pub fn list_holidays<S>(store: &S) -> Result<Vec<Holiday>, HolidayError>
where
    S: HolidayStore + ?Sized,
{
    Ok(store.list_holidays()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn form(date: Option<&str>, name: Option<&str>) -> HolidayForm {
        HolidayForm {
            date: date.map(String::from),
            name: name.map(String::from),
        }
    }

    #[test]
    fn add_and_list_ordered_by_date() {
        let store = InMemoryStore::new();
        add_holiday(&store, &form(Some("2025-12-25"), Some("Christmas"))).unwrap();
        add_holiday(&store, &form(Some("2025-01-01"), Some("New Year"))).unwrap();

        let names: Vec<String> = list_holidays(&store)
            .unwrap()
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, vec!["New Year", "Christmas"]);
    }

    #[test]
    fn missing_or_invalid_input_creates_nothing() {
        let store = InMemoryStore::new();
        assert_eq!(
            add_holiday(&store, &form(None, Some("Christmas"))),
            Err(HolidayError::MissingField)
        );
        assert_eq!(
            add_holiday(&store, &form(Some("2025-12-25"), Some("   "))),
            Err(HolidayError::MissingField)
        );
        assert_eq!(
            add_holiday(&store, &form(Some("25/12/2025"), Some("Christmas"))),
            Err(HolidayError::InvalidDate("25/12/2025".to_string()))
        );
        assert_eq!(
            add_holiday(&store, &form(Some("2025-02-30"), Some("Nope"))),
            Err(HolidayError::InvalidDate("2025-02-30".to_string()))
        );
        assert!(list_holidays(&store).unwrap().is_empty());
    }

    #[test]
    fn same_date_twice_is_rejected() {
        let store = InMemoryStore::new();
        add_holiday(&store, &form(Some("2025-10-03"), Some("National Foundation Day"))).unwrap();
        let again = add_holiday(&store, &form(Some("2025-10-03"), Some("Duplicate")));
        assert!(matches!(
            again,
            Err(HolidayError::Store(StoreError::DuplicateHolidayDate(_)))
        ));
    }

    #[test]
    fn delete_missing_holiday_is_not_found() {
        let store = InMemoryStore::new();
        let holiday = add_holiday(&store, &form(Some("2025-10-09"), Some("Hangul Day"))).unwrap();
        assert_eq!(delete_holiday(&store, holiday.id).unwrap().name, "Hangul Day");
        assert_eq!(
            delete_holiday(&store, holiday.id),
            Err(HolidayError::NotFound(holiday.id))
        );
    }
}
