//! Error taxonomy for the planning core.
//!
//! Only [`PlannerError::EmptyDataset`], [`PlannerError::InvalidSweepRange`] and
//! [`PlannerError::InvalidDiscount`] abort an analysis. The remaining variants are surfaced as warnings on a result or as failed
//! sweep rows.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlannerError {
    /// No requests to aggregate, so no minute index can be built.
    #[error("dataset contains no requests")]
    EmptyDataset,

    /// Monthly scaling is undefined for a non-positive sample duration.
    #[error("sample duration must be positive, got {days} days; monthly overflow cost reported as 0")]
    InvalidDuration { days: f64 },

    /// Partial-fit split denominator was not positive; request routed to overflow.
    #[error("output weight {weight} produced a non-positive split denominator")]
    DegenerateWeight { weight: f64 },

    #[error("invalid sweep range: min_units={min_units}, max_units={max_units}, step={step}")]
    InvalidSweepRange {
        min_units: u64,
        max_units: u64,
        step: u64,
    },

    #[error("{num_units} units x {capacity_per_unit} tpm overflows the capacity range")]
    CapacityOverflow {
        num_units: u64,
        capacity_per_unit: u64,
    },

    #[error("{name} must be a finite, non-negative number, got {value}")]
    InvalidPrice { name: &'static str, value: f64 },

    #[error("unit discount must be between 0 and 100 percent, got {discount_pct}")]
    InvalidDiscount { discount_pct: f64 },
}

pub type PlannerResult<T> = std::result::Result<T, PlannerError>;
