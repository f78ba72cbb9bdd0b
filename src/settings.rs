// src/settings.rs
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{info, warn};

use crate::hours_entry::{parse_decimal, NumericInput};
use crate::models::PayrollSettings;

/// Same column width as the hourly wage: 10 digits, 2 of them decimals.
pub const MAX_MINIMUM_WAGE: Decimal = dec!(99999999.99);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Payroll settings already exist; only one instance is allowed")]
    AlreadyInitialized,
    #[error("Please provide a minimum wage.")]
    MissingMinimumWage,
    #[error("Invalid minimum wage '{0}'")]
    InvalidMinimumWage(String),
    #[error("Minimum wage cannot be negative: {0}")]
    NegativeMinimumWage(Decimal),
    #[error("Minimum wage cannot exceed {max} ({value})")]
    MinimumWageOutOfRange { value: Decimal, max: Decimal },
    #[error("Settings lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Reads a submitted minimum wage: required, numeric, non-negative, at most
/// [`MAX_MINIMUM_WAGE`] after rounding to cents.
pub fn parse_minimum_wage(raw: Option<&NumericInput>) -> Result<Decimal, SettingsError> {
    let text = match raw.map(NumericInput::as_text) {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Err(SettingsError::MissingMinimumWage),
    };
    let wage = parse_decimal(&text).ok_or_else(|| SettingsError::InvalidMinimumWage(text.clone()))?;
    check_minimum_wage(wage.round_dp(2))
}

fn check_minimum_wage(wage: Decimal) -> Result<Decimal, SettingsError> {
    if wage < Decimal::ZERO {
        return Err(SettingsError::NegativeMinimumWage(wage));
    }
    if wage > MAX_MINIMUM_WAGE {
        return Err(SettingsError::MinimumWageOutOfRange {
            value: wage,
            max: MAX_MINIMUM_WAGE,
        });
    }
    Ok(wage)
}

/// Holds the one and only `PayrollSettings` value.
///
/// The slot starts empty and is filled exactly once, either explicitly through
/// [`SettingsSlot::create`] (as when a snapshot is loaded) or lazily through
/// [`SettingsSlot::get_or_create`]. There is no way to remove the value again.
#[derive(Clone, Default)]
pub struct SettingsSlot {
    slot: Arc<Mutex<Option<PayrollSettings>>>,
}

impl SettingsSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, settings: PayrollSettings) -> Result<PayrollSettings, SettingsError> {
        let mut slot = self.lock()?;
        if slot.is_some() {
            return Err(SettingsError::AlreadyInitialized);
        }
        info!(
            "Initializing payroll settings: minimum_wage={}",
            settings.minimum_wage
        );
        *slot = Some(settings.clone());
        Ok(settings)
    }

    pub fn get(&self) -> Result<Option<PayrollSettings>, SettingsError> {
        Ok(self.lock()?.clone())
    }

    pub fn get_or_create(&self) -> Result<PayrollSettings, SettingsError> {
        let mut slot = self.lock()?;
        let settings = slot.get_or_insert_with(|| {
            info!("Payroll settings missing, initializing defaults");
            PayrollSettings::default()
        });
        Ok(settings.clone())
    }

    pub fn update_minimum_wage(&self, wage: Decimal) -> Result<PayrollSettings, SettingsError> {
        let wage = check_minimum_wage(wage)?;
        let mut slot = self.lock()?;
        let settings = slot.get_or_insert_with(PayrollSettings::default);
        settings.minimum_wage = wage;
        info!("Minimum wage updated to {}", wage);
        Ok(settings.clone())
    }

    /// Puts back a value captured with [`SettingsSlot::get`] when the mutation that
    /// followed could not be saved.
    pub(crate) fn restore(&self, previous: Option<PayrollSettings>) -> Result<(), SettingsError> {
        warn!("Rolling payroll settings back to {:?}", previous);
        *self.lock()? = previous;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<PayrollSettings>>, SettingsError> {
        self.slot
            .lock()
            .map_err(|e| SettingsError::LockPoisoned(e.to_string()))
    }
}
