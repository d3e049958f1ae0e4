//! Capacity Sweep
//!
//! Runs the allocator and cost evaluator for every candidate unit count and picks a
//! recommended operating point.
//!
//! ## Candidates
//!
//! `{0} ∪ {min_units, min_units + step, …, max_units}`. The zero entry is always present and
//! is the pure-overflow baseline.
//!
//! ## Isolation
//!
//! Every candidate is an independent simulation over the same read-only [`Dataset`]; no
//! state is shared between candidates. With the `parallel` feature candidates are evaluated
//! on the rayon pool. A failure in one candidate becomes a failed row and the sweep carries
//! on. Cancellation is cooperative and is only checked between candidates.
//!
//! ## Recommendation Policy
//!
//! Among completed candidates with reserved units, prefer the smallest non-negative
//! `candidate_cost - baseline_cost`: the cheapest reserved configuration that costs at least
//! as much as pure overflow, favoring guaranteed throughput over marginal savings. If every
//! candidate is cheaper than the baseline, take the one closest to the baseline from below.
//! This is a documented policy, not an optimum search.

use crate::aggregator::utilization_pct;
use crate::allocator::CapacityAllocator;
use crate::cost::{output_weight, CostEvaluator};
use crate::dataset::Dataset;
use crate::error::{PlannerError, PlannerResult};
use crate::models::{
    CandidateOutcome, CapacityConfiguration, SweepParameters, SweepReport, SweepRow,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const DEFAULT_MIN_UNITS: u64 = 15;
pub const DEFAULT_STEP: u64 = 5;

#[derive(Debug, Clone, Default)]
pub struct SweepOrchestrator {
    cancel: Option<Arc<AtomicBool>>,
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    sequential: bool,
}

impl SweepOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop starting new candidates once `flag` is set.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Evaluate candidates one after another even when `parallel` is enabled.
    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    /// Candidate unit counts, ascending, baseline first.
    ///
    /// A range with `max_units < min_units` is empty and leaves only the baseline. Only a zero
    /// step is rejected.
    pub fn candidates(params: &SweepParameters) -> PlannerResult<Vec<u64>> {
        if params.step == 0 {
            return Err(PlannerError::InvalidSweepRange {
                min_units: params.min_units,
                max_units: params.max_units,
                step: params.step,
            });
        }

        let mut units = vec![0];
        if params.max_units < params.min_units {
            return Ok(units);
        }
        let mut n = params.min_units;
        loop {
            if n > 0 {
                units.push(n);
            }
            match n.checked_add(params.step) {
                Some(next) if next <= params.max_units => n = next,
                _ => break,
            }
        }

        Ok(units)
    }

    pub fn run(&self, dataset: &Dataset, params: &SweepParameters) -> PlannerResult<SweepReport> {
        let candidates = Self::candidates(params)?;
        let weight = output_weight(params.input_price, params.output_price);

        let span = info_span!("sweep", candidates = candidates.len(), output_weight = weight);
        let _enter = span.enter();
        info!(
            min_units = params.min_units,
            max_units = params.max_units,
            step = params.step,
            "Starting capacity sweep"
        );

        let evaluate = |&num_units: &u64| {
            if self.is_cancelled() {
                return SweepRow {
                    num_units,
                    total_capacity_tpm: num_units.checked_mul(params.capacity_per_unit),
                    outcome: CandidateOutcome::Cancelled,
                    recommended: false,
                };
            }
            evaluate_candidate(dataset, params, weight, num_units)
        };

        #[cfg(feature = "parallel")]
        let mut rows: Vec<SweepRow> = if self.sequential {
            candidates.iter().map(evaluate).collect()
        } else {
            candidates.par_iter().map(evaluate).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let mut rows: Vec<SweepRow> = candidates.iter().map(evaluate).collect();

        rows.sort_by_key(|r| r.num_units);

        let (baseline_cost, recommended_index) = recommend(&rows);
        if let Some(i) = recommended_index {
            rows[i].recommended = true;
        }

        let report = SweepReport {
            parameters: params.clone(),
            output_weight: weight,
            rows,
            baseline_cost,
            recommended_index,
        };

        let failed = report.failed_rows();
        if failed > 0 {
            warn!(failed, "Some sweep candidates failed");
        }
        info!(
            baseline_cost = ?report.baseline_cost,
            recommended_units = ?report.recommended().map(|r| r.num_units),
            "Capacity sweep complete"
        );

        Ok(report)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

fn evaluate_candidate(
    dataset: &Dataset,
    params: &SweepParameters,
    weight: f64,
    num_units: u64,
) -> SweepRow {
    let config =
        CapacityConfiguration::new(num_units, params.capacity_per_unit, params.unit_monthly_price);
    let total_capacity_tpm = config.total_capacity_tpm();

    let outcome = match simulate(dataset, params, weight, &config) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(num_units, error = %e, "Sweep candidate failed");
            CandidateOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    SweepRow {
        num_units,
        total_capacity_tpm,
        outcome,
        recommended: false,
    }
}

fn simulate(
    dataset: &Dataset,
    params: &SweepParameters,
    weight: f64,
    config: &CapacityConfiguration,
) -> PlannerResult<CandidateOutcome> {
    check_price("input_price", params.input_price)?;
    check_price("output_price", params.output_price)?;
    check_price("unit_monthly_price", config.unit_monthly_price)?;

    let total_capacity_tpm =
        config
            .total_capacity_tpm()
            .ok_or(PlannerError::CapacityOverflow {
                num_units: config.num_units,
                capacity_per_unit: config.capacity_per_unit,
            })?;

    let allocation = CapacityAllocator::new(total_capacity_tpm, weight).allocate(dataset.requests());
    let cost = CostEvaluator::new(
        params.input_price,
        params.output_price,
        params.sample_duration_days,
    )
    .evaluate(&allocation, config);
    let utilization = utilization_pct(dataset.minutes(), total_capacity_tpm);

    debug!(
        num_units = config.num_units,
        total_capacity_tpm,
        total_monthly_cost = cost.total_monthly_cost,
        utilization_pct = utilization,
        "Candidate evaluated"
    );

    Ok(CandidateOutcome::Completed {
        reserved_share: allocation.reserved_share(),
        allocation,
        cost,
        utilization_pct: utilization,
    })
}

fn check_price(name: &'static str, value: f64) -> PlannerResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PlannerError::InvalidPrice { name, value })
    }
}

/// Baseline cost and the index of the recommended row in `rows`.
///
/// Ties on the cost difference go to the row that comes first, i.e. the fewest units when
/// `rows` is sorted ascending.
pub fn recommend(rows: &[SweepRow]) -> (Option<f64>, Option<usize>) {
    let Some(baseline) = rows
        .iter()
        .find(|r| r.num_units == 0)
        .and_then(|r| r.total_monthly_cost())
    else {
        return (None, None);
    };

    let diffs: Vec<(usize, f64)> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| r.num_units > 0)
        .filter_map(|(i, r)| r.total_monthly_cost().map(|c| (i, c - baseline)))
        .collect();

    let mut at_or_above: Option<(usize, f64)> = None;
    let mut below: Option<(usize, f64)> = None;
    for &(i, diff) in &diffs {
        if diff >= 0.0 {
            if at_or_above.map_or(true, |(_, best)| diff < best) {
                at_or_above = Some((i, diff));
            }
        } else if below.map_or(true, |(_, best)| diff > best) {
            below = Some((i, diff));
        }
    }

    (Some(baseline), at_or_above.or(below).map(|(i, _)| i))
}
