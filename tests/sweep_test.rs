//! Sweep orchestration over a small synthetic dataset.
//!
//! Ten minutes, one request per minute of 1,000 input and 500 output tokens. Prices of 0.01
//! and 0.02 per 1k give an output weight of 2, so each request demands 2,000 capacity units.

use ptu_planner::{
    CandidateOutcome, Dataset, PlannerError, SweepOrchestrator, SweepParameters,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

mod common;
use common::{assert_close, request};

fn dataset() -> Dataset {
    Dataset::new((0..10).map(|m| request(m, 30, 1_000, 500)).collect()).unwrap()
}

fn params(unit_monthly_price: f64) -> SweepParameters {
    SweepParameters {
        min_units: 5,
        max_units: 20,
        step: 5,
        capacity_per_unit: 100,
        unit_monthly_price,
        input_price: 0.01,
        output_price: 0.02,
        sample_duration_days: dataset().sample_duration_days(),
    }
}

#[test]
fn test_sweep_rows_and_baseline() {
    let report = SweepOrchestrator::new().run(&dataset(), &params(40.0)).unwrap();

    let units: Vec<u64> = report.rows.iter().map(|r| r.num_units).collect();
    assert_eq!(units, vec![0, 5, 10, 15, 20]);
    assert_close(report.output_weight, 2.0);

    // 0.2 over nine minutes from first to last request, scaled by 30.4375 / (9 / 1440)
    let baseline = report.baseline_cost.unwrap();
    assert_close(baseline, 974.0);

    let zero = report.row_for_units(0).unwrap();
    assert_eq!(zero.allocation().unwrap().reserved_total(), 0.0);
    assert_eq!(zero.utilization_pct(), Some(0.0));
    assert_eq!(zero.total_capacity_tpm, Some(0));
}

#[test]
fn test_sweep_partial_and_full_candidates() {
    let report = SweepOrchestrator::new().run(&dataset(), &params(40.0)).unwrap();

    // 500 tpm: denom 4/3, 375 tokens reserved per minute (250 in, 125 out)
    let five = report.row_for_units(5).unwrap();
    let allocation = five.allocation().unwrap();
    assert_close(allocation.reserved_input, 2_500.0);
    assert_close(allocation.reserved_output, 1_250.0);
    assert_close(allocation.overflow_input, 7_500.0);
    assert_close(allocation.overflow_output, 3_750.0);
    let cost = five.cost().unwrap();
    assert_close(cost.reserved_monthly_cost, 200.0);
    assert_close(cost.overflow_monthly_cost, 730.5);
    assert_close(five.utilization_pct().unwrap(), 100.0);

    let share = five.reserved_share().unwrap();
    assert_close(share.input_pct, 25.0);
    assert_close(share.output_pct, 25.0);
    assert_close(share.total_pct, 25.0);

    // 2000 tpm covers every request
    let twenty = report.row_for_units(20).unwrap();
    assert_close(twenty.allocation().unwrap().overflow_total(), 0.0);
    assert_close(twenty.total_monthly_cost().unwrap(), 800.0);
    assert_close(twenty.utilization_pct().unwrap(), 75.0);
    assert_close(twenty.reserved_share().unwrap().total_pct, 100.0);
}

#[test]
fn test_recommends_closest_below_when_all_cheaper() {
    let report = SweepOrchestrator::new().run(&dataset(), &params(40.0)).unwrap();

    // Every reserved option beats the baseline; 5 units is closest to it.
    let recommended = report.recommended().unwrap();
    assert_eq!(recommended.num_units, 5);
    assert!(recommended.recommended);
    assert_eq!(report.rows.iter().filter(|r| r.recommended).count(), 1);
}

#[test]
fn test_recommends_cheapest_at_or_above_baseline() {
    // Per 5 units: +300 reserved, -243.5 overflow, so cost rises with units.
    let report = SweepOrchestrator::new().run(&dataset(), &params(60.0)).unwrap();

    assert_eq!(report.recommended().unwrap().num_units, 5);
    assert_close(report.recommended().unwrap().total_monthly_cost().unwrap(), 1030.5);
}

#[test]
fn test_parallel_and_sequential_agree() {
    let data = dataset();
    let p = params(40.0);

    let parallel = SweepOrchestrator::new().run(&data, &p).unwrap();
    let sequential = SweepOrchestrator::new().sequential().run(&data, &p).unwrap();

    assert_eq!(parallel, sequential);
}

#[test]
fn test_capacity_overflow_becomes_failed_row() {
    let mut p = params(40.0);
    p.capacity_per_unit = u64::MAX / 8;

    let report = SweepOrchestrator::new().run(&dataset(), &p).unwrap();

    assert!(report.row_for_units(0).unwrap().is_completed());
    assert!(report.row_for_units(5).unwrap().is_completed());
    for units in [10, 15, 20] {
        let row = report.row_for_units(units).unwrap();
        assert!(matches!(row.outcome, CandidateOutcome::Failed { .. }));
        assert_eq!(row.total_capacity_tpm, None);
    }
    assert_eq!(report.failed_rows(), 3);
    assert_eq!(report.recommended().unwrap().num_units, 5);
}

#[test]
fn test_invalid_price_fails_rows_not_sweep() {
    let mut p = params(40.0);
    p.output_price = f64::NAN;

    let report = SweepOrchestrator::new().run(&dataset(), &p).unwrap();

    assert_eq!(report.failed_rows(), report.rows.len());
    assert_eq!(report.baseline_cost, None);
    assert_eq!(report.recommended_index, None);
}

#[test]
fn test_invalid_duration_is_warned_per_row() {
    let mut p = params(40.0);
    p.sample_duration_days = 0.0;

    let report = SweepOrchestrator::new().run(&dataset(), &p).unwrap();

    for row in &report.rows {
        let cost = row.cost().unwrap();
        assert_eq!(cost.overflow_monthly_cost, 0.0);
        assert!(!cost.is_reliable());
    }
    // Only reserved cost remains, so the baseline is free and 5 units is the cheapest above it
    assert_eq!(report.baseline_cost, Some(0.0));
    assert_eq!(report.recommended().unwrap().num_units, 5);
}

#[test]
fn test_cancelled_sweep_marks_rows() {
    let cancel = Arc::new(AtomicBool::new(true));

    let report = SweepOrchestrator::new()
        .with_cancellation(cancel)
        .run(&dataset(), &params(40.0))
        .unwrap();

    assert!(report
        .rows
        .iter()
        .all(|r| matches!(r.outcome, CandidateOutcome::Cancelled)));
    assert_eq!(report.recommended_index, None);
}

#[test]
fn test_zero_step_aborts() {
    let mut p = params(40.0);
    p.step = 0;

    let err = SweepOrchestrator::new().run(&dataset(), &p).unwrap_err();

    assert!(matches!(err, PlannerError::InvalidSweepRange { step: 0, .. }));
}

#[test]
fn test_inverted_range_sweeps_baseline_only() {
    let mut p = params(40.0);
    p.min_units = 20;
    p.max_units = 5;

    let report = SweepOrchestrator::new().run(&dataset(), &p).unwrap();

    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].num_units, 0);
    assert_close(report.baseline_cost.unwrap(), 974.0);
    assert_eq!(report.recommended_index, None);
}

#[test]
fn test_report_serializes_for_callers() {
    let report = SweepOrchestrator::new().run(&dataset(), &params(40.0)).unwrap();

    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["recommendedIndex"], 1);
    assert_eq!(json["rows"][1]["recommended"], true);
    assert_eq!(json["rows"][0]["outcome"]["status"], "completed");
    assert_eq!(json["rows"][0]["outcome"]["cost"]["extrapolated"], true);
}
