// src/payroll.rs
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{User, UserId, WorkHoursEntry};
use crate::store::{DateRange, StoreError, WorkHoursStore};

#[derive(Error, Debug)]
pub enum PayrollError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV export failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV export produced invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PayrollTotals {
    pub total_hours: Decimal,
    pub total_salary: Decimal,
}

/// Sums worked hours (absence rows count as zero) and prices them at `hourly_wage`.
/// Strictly linear: no rounding, overtime or holiday multipliers.
pub fn compute_totals(entries: &[WorkHoursEntry], hourly_wage: Decimal) -> PayrollTotals {
    let total_hours: Decimal = entries
        .iter()
        .filter(|e| !e.is_absence)
        .map(|e| e.hours)
        .sum();
    PayrollTotals {
        total_hours,
        total_salary: total_hours * hourly_wage,
    }
}

// --- Dashboard ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeSummary {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_number: String,
    pub is_contracted: bool,
    pub visa_type: String,
    pub bank_name: String,
    pub hourly_wage: Decimal,
    pub total_hours: Decimal,
    pub absences: usize,
    pub salary: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub range: Option<DateRange>,
    pub employees: Vec<EmployeeSummary>,
    pub total_salary: Decimal,
}

/// Aggregates hours, absences and salary for every employee in `users`.
/// Non-employees are ignored; employees without rows contribute zero.
pub fn build_dashboard<S>(
    store: &S,
    users: &[User],
    range: Option<DateRange>,
) -> Result<Dashboard, PayrollError>
where
    S: WorkHoursStore + ?Sized,
{
    let mut employees = Vec::new();
    let mut total_salary = Decimal::ZERO;

    for user in users.iter().filter(|u| u.is_employee) {
        let entries = store.find_work_hours(user.id, range)?;
        let totals = compute_totals(&entries, user.hourly_wage);
        let absences = entries.iter().filter(|e| e.is_absence).count();
        debug!(
            "Dashboard row: Emp={}, Hours={}, Absences={}, Salary={}",
            user.email, totals.total_hours, absences, totals.total_salary
        );
        total_salary += totals.total_salary;
        employees.push(EmployeeSummary {
            user_id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            account_number: user.account_number.clone(),
            is_contracted: user.is_contracted,
            visa_type: user.visa_type.clone(),
            bank_name: user.bank_name.clone(),
            hourly_wage: user.hourly_wage,
            total_hours: totals.total_hours,
            absences,
            salary: totals.total_salary,
        });
    }

    info!(
        "Built payroll dashboard for {} employees, total salary {}",
        employees.len(),
        total_salary
    );
    Ok(Dashboard {
        range,
        employees,
        total_salary,
    })
}

const CSV_HEADERS: [&str; 12] = [
    "user_id",
    "first_name",
    "last_name",
    "email",
    "account_number",
    "is_contracted",
    "visa_type",
    "bank_name",
    "hourly_wage",
    "total_hours",
    "absences",
    "salary",
];

/// One row per employee followed by a `TOTAL` row carrying the grand total salary.
pub fn dashboard_csv(dashboard: &Dashboard) -> Result<String, PayrollError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;
    for row in &dashboard.employees {
        writer.write_record([
            row.user_id.to_string(),
            row.first_name.clone(),
            row.last_name.clone(),
            row.email.clone(),
            row.account_number.clone(),
            row.is_contracted.to_string(),
            row.visa_type.clone(),
            row.bank_name.clone(),
            row.hourly_wage.to_string(),
            row.total_hours.to_string(),
            row.absences.to_string(),
            row.salary.to_string(),
        ])?;
    }
    let mut total_row = vec![String::new(); CSV_HEADERS.len()];
    total_row[0] = "TOTAL".to_string();
    total_row[CSV_HEADERS.len() - 1] = dashboard.total_salary.to_string();
    writer.write_record(&total_row)?;

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}
