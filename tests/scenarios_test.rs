//! Worked allocation and costing scenarios with hand-computed results.

use ptu_planner::{AllocationResult, CapacityAllocator, CapacityConfiguration, CostEvaluator};

mod common;
use common::{assert_close, request};

#[test]
fn test_zero_capacity_everything_overflows() {
    let requests = vec![request(0, 0, 100, 50)];

    let result = CapacityAllocator::new(0, 1.0).allocate(&requests);

    assert_eq!(result.overflow_input, 100.0);
    assert_eq!(result.overflow_output, 50.0);
    assert_eq!(result.reserved_input, 0.0);
    assert_eq!(result.reserved_output, 0.0);
}

#[test]
fn test_request_within_capacity_fully_reserved() {
    let requests = vec![request(0, 0, 100, 50)];

    let result = CapacityAllocator::new(200, 1.0).allocate(&requests);

    assert_eq!(result.reserved_input, 100.0);
    assert_eq!(result.reserved_output, 50.0);
    assert_eq!(result.overflow_input, 0.0);
    assert_eq!(result.overflow_output, 0.0);
}

#[test]
fn test_partial_fit_splits_proportionally() {
    let requests = vec![request(0, 0, 80, 80)];

    let result = CapacityAllocator::new(100, 1.0).allocate(&requests);

    assert_eq!(result.reserved_input, 50.0);
    assert_eq!(result.reserved_output, 50.0);
    assert_eq!(result.overflow_input, 30.0);
    assert_eq!(result.overflow_output, 30.0);
}

#[test]
fn test_second_request_takes_leftover_capacity() {
    let requests = vec![request(0, 0, 60, 0), request(0, 10, 70, 0)];

    let result = CapacityAllocator::new(100, 1.0).allocate(&requests);

    assert_eq!(result.reserved_input, 100.0);
    assert_eq!(result.overflow_input, 30.0);
    assert_eq!(result.reserved_output, 0.0);
    assert_eq!(result.overflow_output, 0.0);
}

#[test]
fn test_leftover_capacity_does_not_carry_into_next_minute() {
    // Minute 0 leaves 90 unused; minute 1 still only gets 100.
    let requests = vec![request(0, 0, 10, 0), request(1, 0, 150, 0)];

    let result = CapacityAllocator::new(100, 1.0).allocate(&requests);

    assert_eq!(result.reserved_input, 110.0);
    assert_eq!(result.overflow_input, 50.0);
}

#[test]
fn test_capacity_resets_after_exhaustion() {
    let requests = vec![
        request(0, 0, 250, 0),
        request(0, 59, 20, 0),
        request(1, 0, 20, 0),
    ];

    let result = CapacityAllocator::new(100, 1.0).allocate(&requests);

    assert_eq!(result.reserved_input, 120.0);
    assert_eq!(result.overflow_input, 170.0);
}

#[test]
fn test_monthly_scaling_of_ten_day_sample() {
    // 100,000 overflow input tokens at 1.0 per 1k is 100 over the sample.
    let allocation = AllocationResult {
        overflow_input: 100_000.0,
        ..AllocationResult::default()
    };
    let evaluator = CostEvaluator::new(1.0, 3.0, 10.0);

    let cost = evaluator.evaluate(&allocation, &CapacityConfiguration::new(0, 1_000, 260.0));

    assert_close(cost.overflow_cost_for_sample_period, 100.0);
    assert_close(cost.overflow_monthly_cost, 304.375);
    assert_close(cost.total_monthly_cost, 304.375);
    assert_eq!(cost.sample_duration_days, 10.0);
    assert!(cost.extrapolated);
}

#[test]
fn test_reserved_and_overflow_costs_add_up() {
    let allocation = AllocationResult {
        reserved_input: 5_000.0,
        reserved_output: 1_000.0,
        overflow_input: 2_000.0,
        overflow_output: 1_000.0,
        degenerate_splits: 0,
    };
    let evaluator = CostEvaluator::new(0.01, 0.03, 30.4375);

    let cost = evaluator.evaluate(&allocation, &CapacityConfiguration::new(3, 1_000, 100.0));

    assert_close(cost.reserved_monthly_cost, 300.0);
    assert_close(cost.overflow_cost_for_sample_period, 0.05);
    assert_close(cost.overflow_monthly_cost, 0.05);
    assert_close(cost.total_monthly_cost, 300.05);
}
