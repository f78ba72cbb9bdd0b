// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::access::AccessError;
use crate::calendar::CalendarError;
use crate::holidays::HolidayError;
use crate::hours_entry::EntryError;
use crate::payroll::PayrollError;
use crate::persistence::PersistenceError;
use crate::settings::SettingsError;
use crate::store::StoreError;
use crate::users::UserError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required.")]
    Unauthenticated,
    #[error("Unknown user {0}.")]
    UnknownCaller(String),
    #[error("Employee not found or not an employee.")]
    EmployeeNotFound,
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Entry(#[from] EntryError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Holiday(#[from] HolidayError),
    #[error(transparent)]
    Payroll(#[from] PayrollError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("Configuration error: {0}")]
    Config(#[from] envy::Error),
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::UserNotFound(_) | StoreError::HolidayNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::DuplicateEmail(_) | StoreError::DuplicateHolidayDate(_) => StatusCode::CONFLICT,
        StoreError::LockPoisoned(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated | AppError::UnknownCaller(_) => StatusCode::UNAUTHORIZED,
            AppError::EmployeeNotFound => StatusCode::NOT_FOUND,
            AppError::Access(_) => StatusCode::FORBIDDEN,
            AppError::Calendar(CalendarError::Store(e)) => store_status(e),
            AppError::Calendar(_) => StatusCode::BAD_REQUEST,
            AppError::Entry(EntryError::Store(e)) => store_status(e),
            AppError::Entry(_) => StatusCode::BAD_REQUEST,
            AppError::User(UserError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::User(UserError::Access(_)) => StatusCode::FORBIDDEN,
            AppError::User(UserError::Store(e)) => store_status(e),
            AppError::User(_) => StatusCode::BAD_REQUEST,
            AppError::Holiday(HolidayError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Holiday(HolidayError::Store(e)) => store_status(e),
            AppError::Holiday(_) => StatusCode::BAD_REQUEST,
            AppError::Payroll(PayrollError::Store(e)) => store_status(e),
            AppError::Settings(
                SettingsError::MissingMinimumWage
                | SettingsError::InvalidMinimumWage(_)
                | SettingsError::NegativeMinimumWage(_)
                | SettingsError::MinimumWageOutOfRange { .. },
            ) => StatusCode::BAD_REQUEST,
            AppError::Settings(SettingsError::AlreadyInitialized) => StatusCode::CONFLICT,
            AppError::Store(e) => store_status(e),
            AppError::Payroll(_)
            | AppError::Settings(_)
            | AppError::Persistence(_)
            | AppError::Config(_)
            | AppError::TlsConfig(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let message = if status_code.is_server_error() {
            error!("Error occurred: {:?}", self);
            "Internal server error.".to_string()
        } else {
            warn!("Request failed ({}): {}", status_code, self);
            self.to_string()
        };
        (status_code, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
