//! Cost Evaluation
//!
//! Converts an [`AllocationResult`] into monthly cost figures.
//!
//! Reserved capacity is a flat recurring cost: `num_units * unit_monthly_price`, paid whether
//! or not it is used. Overflow is billed per 1,000 tokens over the sample period and then
//! extrapolated to a 30.4375-day month.
//!
//! ## Modeling Assumption
//!
//! Monthly overflow scaling assumes usage is uniform across the sample period and
//! extrapolates linearly. It is an estimate, not a measurement: [`CostResult`] keeps the
//! measured sample-period cost next to the extrapolated one and marks the latter as such.

use crate::error::{PlannerError, PlannerResult};
use crate::models::{
    AllocationResult, CapacityConfiguration, CostResult, UnitPricing, DAYS_PER_MONTH,
};
use tracing::warn;

/// Relative capacity cost of an output token, derived from overflow prices.
///
/// Falls back to 1.0 when the input price is zero.
pub fn output_weight(input_price: f64, output_price: f64) -> f64 {
    if input_price == 0.0 {
        1.0
    } else {
        output_price / input_price
    }
}

/// Apply a percentage discount to the list price of a unit. The result is rounded to cents.
pub fn unit_pricing(base_monthly_price: f64, discount_pct: f64) -> PlannerResult<UnitPricing> {
    if !(0.0..=100.0).contains(&discount_pct) {
        return Err(PlannerError::InvalidDiscount { discount_pct });
    }

    let discounted = base_monthly_price * (1.0 - discount_pct / 100.0);
    Ok(UnitPricing {
        base_monthly_price,
        discount_pct,
        unit_monthly_price: (discounted * 100.0).round() / 100.0,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEvaluator {
    /// Overflow price per 1,000 input tokens.
    pub input_price: f64,
    /// Overflow price per 1,000 output tokens.
    pub output_price: f64,
    pub sample_duration_days: f64,
}

impl CostEvaluator {
    pub fn new(input_price: f64, output_price: f64, sample_duration_days: f64) -> Self {
        Self {
            input_price,
            output_price,
            sample_duration_days,
        }
    }

    /// `30.4375 / sample_duration_days`, or the error explaining why scaling is undefined.
    pub fn month_scale(&self) -> Result<f64, PlannerError> {
        let days = self.sample_duration_days;
        if days.is_finite() && days > 0.0 {
            Ok(DAYS_PER_MONTH / days)
        } else {
            Err(PlannerError::InvalidDuration { days })
        }
    }

    pub fn overflow_cost(&self, allocation: &AllocationResult) -> f64 {
        (allocation.overflow_input / 1000.0) * self.input_price
            + (allocation.overflow_output / 1000.0) * self.output_price
    }

    pub fn evaluate(
        &self,
        allocation: &AllocationResult,
        config: &CapacityConfiguration,
    ) -> CostResult {
        let reserved_monthly_cost = config.num_units as f64 * config.unit_monthly_price;
        let overflow_cost_for_sample_period = self.overflow_cost(allocation);

        let mut warnings = Vec::new();
        let (month_scale, overflow_monthly_cost) = match self.month_scale() {
            Ok(scale) => (Some(scale), overflow_cost_for_sample_period * scale),
            Err(e) => {
                warn!(
                    num_units = config.num_units,
                    sample_duration_days = self.sample_duration_days,
                    "Cannot scale overflow cost to a month"
                );
                warnings.push(e.to_string());
                (None, 0.0)
            }
        };

        if allocation.degenerate_splits > 0 {
            warnings.push(
                PlannerError::DegenerateWeight {
                    weight: output_weight(self.input_price, self.output_price),
                }
                .to_string(),
            );
        }

        CostResult {
            reserved_monthly_cost,
            overflow_cost_for_sample_period,
            overflow_monthly_cost,
            total_monthly_cost: reserved_monthly_cost + overflow_monthly_cost,
            sample_duration_days: self.sample_duration_days,
            month_scale,
            extrapolated: true,
            warnings,
        }
    }
}
