//! Parking fee calculation
//!
//! Durations are billed in whole units, always rounding up, and every
//! session pays for at least one unit.

use thiserror::Error;

/// Default billing unit length (minutes)
pub const DEFAULT_UNIT_MINUTES: f64 = 5.0;
/// Default price of one billing unit (currency units)
pub const DEFAULT_UNIT_FEE: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BillingError {
    #[error("invalid session duration {0} minutes")]
    InvalidDuration(f64),
    #[error("fee for {units} units at {unit_fee} per unit overflows")]
    FeeOverflow { units: u64, unit_fee: u64 },
}

/// Pricing policy applied to completed sessions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tariff {
    unit_minutes: f64,
    unit_fee: u64,
}

impl Tariff {
    /// Create a tariff. Non-positive unit lengths fall back to the default.
    pub fn new(unit_minutes: f64, unit_fee: u64) -> Self {
        let unit_minutes =
            if unit_minutes.is_finite() && unit_minutes > 0.0 { unit_minutes } else { DEFAULT_UNIT_MINUTES };
        Self { unit_minutes, unit_fee }
    }

    /// Number of billing units for a duration (at least one)
    pub fn units(&self, duration_minutes: f64) -> Result<u64, BillingError> {
        if !duration_minutes.is_finite() || duration_minutes < 0.0 {
            return Err(BillingError::InvalidDuration(duration_minutes));
        }
        let units = (duration_minutes / self.unit_minutes).ceil() as u64;
        Ok(units.max(1))
    }

    pub fn fee(&self, duration_minutes: f64) -> Result<u64, BillingError> {
        let units = self.units(duration_minutes)?;
        units
            .checked_mul(self.unit_fee)
            .ok_or(BillingError::FeeOverflow { units, unit_fee: self.unit_fee })
    }

    pub fn unit_minutes(&self) -> f64 {
        self.unit_minutes
    }

    pub fn unit_fee(&self) -> u64 {
        self.unit_fee
    }
}

impl Default for Tariff {
    fn default() -> Self {
        Self { unit_minutes: DEFAULT_UNIT_MINUTES, unit_fee: DEFAULT_UNIT_FEE }
    }
}

/// Fee for a session under the default tariff
pub fn compute_fee(duration_minutes: f64) -> Result<u64, BillingError> {
    Tariff::default().fee(duration_minutes)
}
