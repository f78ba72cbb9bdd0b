// src/routes.rs
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::access::{require, Capability};
use crate::calendar::{calendar_view, CalendarView, MonthRef};
use crate::error::AppError;
use crate::holidays::{self, HolidayForm};
use crate::hours_entry::{
    apply_bulk_absence, apply_bulk_entry, apply_individual_entries, day_roster, parse_entry_date, DayRoster, EntryInput, EntryOutcome, IndividualEntry, NumericInput,
    UserEntryResult,
};
use crate::models::{Holiday, HolidayId, PayrollSettings, User, UserId};
use crate::payroll::{build_dashboard, dashboard_csv, Dashboard};
use crate::persistence::save_data_file;
use crate::settings::{parse_minimum_wage, SettingsSlot};
use crate::store::{InMemoryStore, StoreError, UserStore};
use crate::users::{self, RegistrationForm};

/// Header set by the authenticating proxy in front of this service.
pub const IDENTITY_HEADER: &str = "x-authenticated-email";

#[derive(Clone)]
pub struct AppState {
    pub store: InMemoryStore,
    pub settings: SettingsSlot,
    pub data_file: Option<PathBuf>,
    save_guard: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: InMemoryStore, settings: SettingsSlot, data_file: Option<PathBuf>) -> Self {
        Self {
            store,
            settings,
            data_file,
            save_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Runs `op` and, when a data file is configured, saves the snapshot afterwards.
    /// Persisted mutations run one at a time; when the save fails the store and the
    /// settings slot are put back to what they were before `op`.
    fn mutate<T>(&self, op: impl FnOnce() -> Result<T, AppError>) -> Result<T, AppError> {
        let Some(path) = &self.data_file else {
            return op();
        };
        let _guard = self
            .save_guard
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let store_before = self.store.snapshot()?;
        let settings_before = self.settings.get()?;

        let value = op()?;
        if let Err(e) = save_data_file(path, &self.store, &self.settings) {
            error!("Save failed, rolling back the last mutation: {}", e);
            self.store.restore(store_before)?;
            self.settings.restore(settings_before)?;
            return Err(e.into());
        }
        Ok(value)
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

// --- Caller identity ---

pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthenticated)?;
        let user = state
            .store
            .find_user_by_email(email)?
            .ok_or_else(|| AppError::UnknownCaller(email.to_string()))?;
        debug!("Request by {}", user.email);
        Ok(CurrentUser(user))
    }
}

// --- Request / response bodies ---

#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    pub year: Option<String>,
    pub month: Option<String>,
}

impl MonthQuery {
    fn month_ref(&self) -> Result<MonthRef, AppError> {
        Ok(MonthRef::from_query(
            self.year.as_deref(),
            self.month.as_deref(),
            today(),
        )?)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkEntryRequest {
    pub date: Option<String>,
    pub hours: Option<NumericInput>,
    #[serde(default)]
    pub is_absence: bool,
}

#[derive(Debug, Deserialize)]
pub struct IndividualEntriesRequest {
    pub date: Option<String>,
    #[serde(default)]
    pub entries: Vec<IndividualEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkAbsenceRequest {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub date: NaiveDate,
    pub written: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub results: Vec<UserEntryResult>,
}

impl EntryResponse {
    fn new(date: NaiveDate, results: Vec<UserEntryResult>) -> Self {
        let written = results
            .iter()
            .filter(|r| matches!(r.outcome, EntryOutcome::Written { .. }))
            .count();
        let rejected = results.iter().filter(|r| r.is_rejected()).count();
        let skipped = results.len() - written - rejected;
        Self {
            date,
            written,
            skipped,
            rejected,
            results,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
    pub minimum_wage: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct MinimumWageRequest {
    pub minimum_wage: Option<NumericInput>,
}

// --- Router ---

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/calendar", get(handle_own_calendar))
        .route("/employees/{id}/calendar", get(handle_employee_calendar))
        .route("/hours", get(handle_day_roster))
        .route("/hours/bulk", post(handle_bulk_hours))
        .route("/hours/individual", post(handle_individual_hours))
        .route("/hours/bulk-absence", post(handle_bulk_absence))
        .route("/dashboard", get(handle_dashboard))
        .route("/dashboard.csv", get(handle_dashboard_csv))
        .route("/users", get(handle_list_users).post(handle_register_user))
        .route("/users/{id}", delete(handle_delete_user))
        .route("/settings", get(handle_get_settings))
        .route("/settings/minimum-wage", put(handle_set_minimum_wage))
        .route("/holidays", get(handle_list_holidays).post(handle_add_holiday))
        .route("/holidays/{id}", delete(handle_delete_holiday));

    Router::new()
        .nest("/api", api_routes)
        .route("/status", get(handle_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Calendar ---

async fn handle_own_calendar(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<MonthQuery>,
) -> Result<Json<CalendarView>, AppError> {
    require(&caller, Capability::ViewOwnCalendar)?;
    let period = query.month_ref()?;
    Ok(Json(calendar_view(&state.store, &caller, period)?))
}

async fn handle_employee_calendar(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(user_id): Path<UserId>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<CalendarView>, AppError> {
    require(&caller, Capability::ViewPayroll)?;
    let employee = state
        .store
        .get_user(user_id)?
        .filter(|u| u.is_employee)
        .ok_or(AppError::EmployeeNotFound)?;
    let period = query.month_ref()?;
    Ok(Json(calendar_view(&state.store, &employee, period)?))
}

// --- Hours entry ---

async fn handle_day_roster(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<DayRoster>, AppError> {
    require(&caller, Capability::EnterHours)?;
    let date = parse_entry_date(query.date.as_deref(), today())?;
    Ok(Json(day_roster(&state.store, date)?))
}

async fn handle_bulk_hours(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(body): Json<BulkEntryRequest>,
) -> Result<Json<EntryResponse>, AppError> {
    require(&caller, Capability::EnterHours)?;
    let date = parse_entry_date(body.date.as_deref(), today())?;
    let input = EntryInput {
        hours: body.hours,
        is_absence: body.is_absence,
    };
    let results = state.mutate(|| Ok(apply_bulk_entry(&state.store, date, &input)?))?;
    info!("{} applied bulk hours for {}", caller.email, date);
    Ok(Json(EntryResponse::new(date, results)))
}

async fn handle_individual_hours(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(body): Json<IndividualEntriesRequest>,
) -> Result<Json<EntryResponse>, AppError> {
    require(&caller, Capability::EnterHours)?;
    let date = parse_entry_date(body.date.as_deref(), today())?;
    let results =
        state.mutate(|| Ok(apply_individual_entries(&state.store, date, &body.entries)?))?;
    info!("{} applied individual hours for {}", caller.email, date);
    Ok(Json(EntryResponse::new(date, results)))
}

async fn handle_bulk_absence(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(body): Json<BulkAbsenceRequest>,
) -> Result<Json<EntryResponse>, AppError> {
    require(&caller, Capability::EnterHours)?;
    let date = parse_entry_date(body.date.as_deref(), today())?;
    let results = state.mutate(|| Ok(apply_bulk_absence(&state.store, date)?))?;
    info!("{} marked all employees absent on {}", caller.email, date);
    Ok(Json(EntryResponse::new(date, results)))
}

// --- Payroll ---

fn dashboard_for(state: &AppState, query: &MonthQuery) -> Result<Dashboard, AppError> {
    let range = if query.year.is_some() || query.month.is_some() {
        Some(query.month_ref()?.date_range()?)
    } else {
        None
    };
    let employees = state.store.list_employees()?;
    Ok(build_dashboard(&state.store, &employees, range)?)
}

async fn handle_dashboard(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Dashboard>, AppError> {
    require(&caller, Capability::ViewPayroll)?;
    Ok(Json(dashboard_for(&state, &query)?))
}

async fn handle_dashboard_csv(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, AppError> {
    require(&caller, Capability::ViewPayroll)?;
    let csv = dashboard_csv(&dashboard_for(&state, &query)?)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"payroll.csv\"",
            ),
        ],
        csv,
    ))
}

// --- Users & settings ---

async fn handle_list_users(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<UsersResponse>, AppError> {
    require(&caller, Capability::ManageUsers)?;
    let settings = state.settings.get_or_create()?;
    Ok(Json(UsersResponse {
        users: state.store.list_users()?,
        minimum_wage: settings.minimum_wage,
    }))
}

async fn handle_register_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(form): Json<RegistrationForm>,
) -> Result<Json<User>, AppError> {
    require(&caller, Capability::ManageUsers)?;
    let user = state.mutate(|| Ok(users::register_user(&state.store, &form)?))?;
    Ok(Json(user))
}

async fn handle_delete_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    require(&caller, Capability::ManageUsers)?;
    let deleted = state.mutate(|| Ok(users::delete_user(&state.store, &caller, user_id)?))?;
    Ok(Json(deleted))
}

async fn handle_get_settings(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<PayrollSettings>, AppError> {
    require(&caller, Capability::ManageUsers)?;
    Ok(Json(state.settings.get_or_create()?))
}

async fn handle_set_minimum_wage(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(body): Json<MinimumWageRequest>,
) -> Result<Json<PayrollSettings>, AppError> {
    require(&caller, Capability::ManageUsers)?;
    let wage = parse_minimum_wage(body.minimum_wage.as_ref())?;
    let settings = state.mutate(|| Ok(state.settings.update_minimum_wage(wage)?))?;
    Ok(Json(settings))
}

// --- Holidays ---

async fn handle_list_holidays(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
) -> Result<Json<Vec<Holiday>>, AppError> {
    Ok(Json(holidays::list_holidays(&state.store)?))
}

async fn handle_add_holiday(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(form): Json<HolidayForm>,
) -> Result<Json<Holiday>, AppError> {
    require(&caller, Capability::ManageHolidays)?;
    let holiday = state.mutate(|| Ok(holidays::add_holiday(&state.store, &form)?))?;
    Ok(Json(holiday))
}

async fn handle_delete_holiday(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(holiday_id): Path<HolidayId>,
) -> Result<Json<Holiday>, AppError> {
    require(&caller, Capability::ManageHolidays)?;
    let holiday = state.mutate(|| Ok(holidays::delete_holiday(&state.store, holiday_id)?))?;
    Ok(Json(holiday))
}

// --- Status ---

async fn handle_status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let (users, work_hours, holidays) = state.store.counts()?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "server_time": chrono::Local::now().to_rfc3339(),
        "users": users,
        "work_hours_rows": work_hours,
        "holidays": holidays,
        "persistent": state.data_file.is_some(),
    })))
}
