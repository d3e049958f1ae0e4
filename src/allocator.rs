//! Capacity Allocation Simulator
//!
//! Replays a time-ordered request stream against a reserved tokens-per-minute budget and
//! splits every request between reserved capacity and overflow billing.
//!
//! ## Allocation Rules
//!
//! - Capacity resets to the full budget whenever a request falls into a new minute. Unused
//!   capacity never carries over.
//! - A request costs `input_tokens + output_tokens * output_weight` capacity units.
//! - A request that fits is served entirely from reserved capacity.
//! - A request that does not fit takes whatever capacity is left, split proportionally to
//!   its input/output mix, and the rest overflows. Remaining capacity then drops to zero.
//! - Once capacity is exhausted, the rest of the minute overflows.
//!
//! This is a first-come-first-served greedy fill. It never reorders or defers requests, so it
//! stays causal even though it runs over historical data. The pass is inherently sequential
//! within a minute; parallelism belongs across capacity levels (see [`crate::sweep`]).

use crate::models::{AllocationResult, Request};
use tracing::{debug, warn};

/// Stateless entry point; every call runs a fresh, isolated simulation.
#[derive(Debug, Clone, Copy)]
pub struct CapacityAllocator {
    total_capacity_tpm: u64,
    output_weight: f64,
}

impl CapacityAllocator {
    pub fn new(total_capacity_tpm: u64, output_weight: f64) -> Self {
        Self {
            total_capacity_tpm,
            output_weight,
        }
    }

    pub fn total_capacity_tpm(&self) -> u64 {
        self.total_capacity_tpm
    }

    pub fn output_weight(&self) -> f64 {
        self.output_weight
    }

    /// Run the allocation over `requests`, which must be sorted by ascending timestamp.
    ///
    /// Requests sharing a timestamp are served in slice order.
    pub fn allocate(&self, requests: &[Request]) -> AllocationResult {
        // u64 totals of very large counts would overflow
        let total_input: f64 = requests.iter().map(|r| r.input_tokens as f64).sum();
        let total_output: f64 = requests.iter().map(|r| r.output_tokens as f64).sum();

        if self.total_capacity_tpm == 0 {
            return AllocationResult {
                overflow_input: total_input,
                overflow_output: total_output,
                ..AllocationResult::default()
            };
        }

        let capacity = self.total_capacity_tpm as f64;
        let weight = self.output_weight;

        let mut state = MinuteState::default();
        let mut reserved_input = 0.0_f64;
        let mut reserved_output = 0.0_f64;
        let mut degenerate_splits = 0u64;

        for request in requests {
            state.roll_to(request.minute_index(), capacity);

            let input = request.input_tokens as f64;
            let output = request.output_tokens as f64;
            let demand = input + output * weight;

            if demand <= state.remaining {
                state.remaining -= demand;
                reserved_input += input;
                reserved_output += output;
            } else if state.remaining > 0.0 {
                let total = input + output;
                if total == 0.0 {
                    continue;
                }

                let input_ratio = input / total;
                let output_ratio = output / total;
                let denom = input_ratio + output_ratio * weight;

                if denom > 0.0 {
                    let ptu_tokens = (state.remaining / denom).min(total);
                    reserved_input += ptu_tokens * input_ratio;
                    reserved_output += ptu_tokens * output_ratio;
                    state.remaining = 0.0;
                } else {
                    degenerate_splits += 1;
                }
            }
        }

        if degenerate_splits > 0 {
            warn!(
                output_weight = weight,
                degenerate_splits, "Non-positive split denominator, requests routed to overflow"
            );
        }

        let result = AllocationResult {
            reserved_input,
            reserved_output,
            overflow_input: total_input - reserved_input,
            overflow_output: total_output - reserved_output,
            degenerate_splits,
        };

        debug!(
            total_capacity_tpm = self.total_capacity_tpm,
            reserved = result.reserved_total(),
            overflow = result.overflow_total(),
            "Allocation pass complete"
        );

        result
    }
}

/// Capacity left in the minute currently being replayed.
#[derive(Debug, Default)]
struct MinuteState {
    current_minute: Option<i64>,
    remaining: f64,
}

impl MinuteState {
    fn roll_to(&mut self, minute: i64, capacity: f64) {
        if self.current_minute != Some(minute) {
            self.current_minute = Some(minute);
            self.remaining = capacity;
        }
    }
}
