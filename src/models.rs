//! Core Data Models
//!
//! This module defines the primary data structures used throughout the capacity planning
//! pipeline. These models represent the complete data flow from raw request records to the
//! ranked sweep table handed back to the caller.
//!
//! ## Data Flow
//!
//! 1. **Raw Data**: [`Request`] - Individual requests loaded from request logs
//! 2. **Aggregation**: [`MinuteBucket`] - Per-minute token sums over a gap-free minute index
//! 3. **Simulation**: [`AllocationResult`] - Reserved vs overflow token totals for one capacity level
//! 4. **Costing**: [`CostResult`] - Monthly cost figures for one capacity level
//! 5. **Reports**: [`SweepRow`], [`SweepReport`] - One row per candidate plus the recommendation
//!
//! ## Numeric Conventions
//!
//! - Source token counts are integers; simulated splits are `f64` and are never rounded
//!   before display.
//! - Prices are per 1,000 tokens for overflow billing and per unit per month for reserved
//!   capacity.

use chrono::{DateTime, Duration, DurationRound, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Average month length used to normalize a sample period to a full month.
pub const DAYS_PER_MONTH: f64 = 30.4375;

/// Whether a request's token counts were read from the log or estimated from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    #[default]
    Exact,
    Estimated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "inputTokens")]
    pub input_tokens: u64,
    #[serde(rename = "outputTokens")]
    pub output_tokens: u64,
    #[serde(default, rename = "tokenSource")]
    pub token_source: TokenSource,
    /// Deployment model, when the log records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, rename = "modelVersion", skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl Request {
    pub fn new(timestamp: DateTime<Utc>, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            timestamp,
            input_tokens,
            output_tokens,
            token_source: TokenSource::Exact,
            model: None,
            model_version: None,
        }
    }

    pub fn estimated(timestamp: DateTime<Utc>, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            token_source: TokenSource::Estimated,
            ..Self::new(timestamp, input_tokens, output_tokens)
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    /// Saturates instead of wrapping on absurd counts.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Index of the UTC minute this request falls into (`floor(unix_seconds / 60)`).
    pub fn minute_index(&self) -> i64 {
        self.timestamp.timestamp().div_euclid(60)
    }

    /// The request's timestamp floored to the minute.
    pub fn minute(&self) -> DateTime<Utc> {
        self.timestamp
            .duration_trunc(Duration::minutes(1))
            .unwrap_or(self.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteBucket {
    pub minute: DateTime<Utc>,
    #[serde(rename = "inputTokens")]
    pub input_tokens: u64,
    #[serde(rename = "outputTokens")]
    pub output_tokens: u64,
    #[serde(rename = "totalTokens")]
    pub total_tokens: u64,
    #[serde(rename = "requestCount")]
    pub request_count: u64,
}

impl MinuteBucket {
    pub fn empty(minute: DateTime<Utc>) -> Self {
        Self {
            minute,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            request_count: 0,
        }
    }

    pub fn add(&mut self, request: &Request) {
        self.input_tokens = self.input_tokens.saturating_add(request.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(request.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(request.total_tokens());
        self.request_count += 1;
    }
}

/// One reserved-capacity level under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityConfiguration {
    #[serde(rename = "numUnits")]
    pub num_units: u64,
    /// Tokens per minute provided by one unit.
    #[serde(rename = "capacityPerUnit")]
    pub capacity_per_unit: u64,
    /// Currency per unit per month.
    #[serde(rename = "unitMonthlyPrice")]
    pub unit_monthly_price: f64,
}

impl CapacityConfiguration {
    pub fn new(num_units: u64, capacity_per_unit: u64, unit_monthly_price: f64) -> Self {
        Self {
            num_units,
            capacity_per_unit,
            unit_monthly_price,
        }
    }

    /// Total reserved tokens per minute, or `None` if the product overflows.
    pub fn total_capacity_tpm(&self) -> Option<u64> {
        self.num_units.checked_mul(self.capacity_per_unit)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    #[serde(rename = "reservedInput")]
    pub reserved_input: f64,
    #[serde(rename = "reservedOutput")]
    pub reserved_output: f64,
    #[serde(rename = "overflowInput")]
    pub overflow_input: f64,
    #[serde(rename = "overflowOutput")]
    pub overflow_output: f64,
    /// Partial fits sent to overflow because the split denominator was not positive.
    #[serde(rename = "degenerateSplits")]
    pub degenerate_splits: u64,
}

impl AllocationResult {
    pub fn reserved_total(&self) -> f64 {
        self.reserved_input + self.reserved_output
    }

    pub fn overflow_total(&self) -> f64 {
        self.overflow_input + self.overflow_output
    }

    /// Percentage of tokens served from reserved capacity; 0 where there were no tokens.
    pub fn reserved_share(&self) -> ReservedShare {
        ReservedShare {
            input_pct: percentage(self.reserved_input, self.reserved_input + self.overflow_input),
            output_pct: percentage(
                self.reserved_output,
                self.reserved_output + self.overflow_output,
            ),
            total_pct: percentage(
                self.reserved_total(),
                self.reserved_total() + self.overflow_total(),
            ),
        }
    }
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReservedShare {
    #[serde(rename = "inputPct")]
    pub input_pct: f64,
    #[serde(rename = "outputPct")]
    pub output_pct: f64,
    #[serde(rename = "totalPct")]
    pub total_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostResult {
    #[serde(rename = "reservedMonthlyCost")]
    pub reserved_monthly_cost: f64,
    /// Measured overflow cost for the sample period, not extrapolated.
    #[serde(rename = "overflowCostForSamplePeriod")]
    pub overflow_cost_for_sample_period: f64,
    /// Sample-period overflow cost scaled linearly to a 30.4375-day month.
    #[serde(rename = "overflowMonthlyCost")]
    pub overflow_monthly_cost: f64,
    #[serde(rename = "totalMonthlyCost")]
    pub total_monthly_cost: f64,
    #[serde(rename = "sampleDurationDays")]
    pub sample_duration_days: f64,
    /// `30.4375 / sample_duration_days`, absent when the duration is unusable.
    #[serde(rename = "monthScale")]
    pub month_scale: Option<f64>,
    /// Always true: the monthly overflow figure is an extrapolation.
    pub extrapolated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl CostResult {
    pub fn is_reliable(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CandidateOutcome {
    Completed {
        allocation: AllocationResult,
        cost: CostResult,
        #[serde(rename = "utilizationPct")]
        utilization_pct: f64,
        #[serde(rename = "reservedShare")]
        reserved_share: ReservedShare,
    },
    Failed {
        reason: String,
    },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    #[serde(rename = "numUnits")]
    pub num_units: u64,
    #[serde(rename = "totalCapacityTpm")]
    pub total_capacity_tpm: Option<u64>,
    pub outcome: CandidateOutcome,
    #[serde(default)]
    pub recommended: bool,
}

impl SweepRow {
    pub fn total_monthly_cost(&self) -> Option<f64> {
        match &self.outcome {
            CandidateOutcome::Completed { cost, .. } => Some(cost.total_monthly_cost),
            _ => None,
        }
    }

    pub fn allocation(&self) -> Option<&AllocationResult> {
        match &self.outcome {
            CandidateOutcome::Completed { allocation, .. } => Some(allocation),
            _ => None,
        }
    }

    pub fn cost(&self) -> Option<&CostResult> {
        match &self.outcome {
            CandidateOutcome::Completed { cost, .. } => Some(cost),
            _ => None,
        }
    }

    pub fn utilization_pct(&self) -> Option<f64> {
        match &self.outcome {
            CandidateOutcome::Completed {
                utilization_pct, ..
            } => Some(*utilization_pct),
            _ => None,
        }
    }

    pub fn reserved_share(&self) -> Option<ReservedShare> {
        match &self.outcome {
            CandidateOutcome::Completed { reserved_share, .. } => Some(*reserved_share),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, CandidateOutcome::Completed { .. })
    }
}

/// Inputs of one sweep invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepParameters {
    #[serde(rename = "minUnits")]
    pub min_units: u64,
    #[serde(rename = "maxUnits")]
    pub max_units: u64,
    pub step: u64,
    #[serde(rename = "capacityPerUnit")]
    pub capacity_per_unit: u64,
    #[serde(rename = "unitMonthlyPrice")]
    pub unit_monthly_price: f64,
    /// Overflow price per 1,000 input tokens.
    #[serde(rename = "inputPrice")]
    pub input_price: f64,
    /// Overflow price per 1,000 output tokens.
    #[serde(rename = "outputPrice")]
    pub output_price: f64,
    #[serde(rename = "sampleDurationDays")]
    pub sample_duration_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub parameters: SweepParameters,
    #[serde(rename = "outputWeight")]
    pub output_weight: f64,
    pub rows: Vec<SweepRow>,
    #[serde(rename = "baselineCost")]
    pub baseline_cost: Option<f64>,
    #[serde(rename = "recommendedIndex")]
    pub recommended_index: Option<usize>,
}

impl SweepReport {
    pub fn recommended(&self) -> Option<&SweepRow> {
        self.recommended_index.and_then(|i| self.rows.get(i))
    }

    pub fn row_for_units(&self, num_units: u64) -> Option<&SweepRow> {
        self.rows.iter().find(|r| r.num_units == num_units)
    }

    pub fn failed_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r.outcome, CandidateOutcome::Failed { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MinuteStats {
    #[serde(rename = "meanTpm")]
    pub mean_tpm: f64,
    #[serde(rename = "p95Tpm")]
    pub p95_tpm: u64,
    #[serde(rename = "p99Tpm")]
    pub p99_tpm: u64,
    #[serde(rename = "peakTpm")]
    pub peak_tpm: u64,
    #[serde(rename = "activeMinutes")]
    pub active_minutes: usize,
}

/// Throughput over one UTC calendar day of the gap-filled minute series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub minutes: usize,
    #[serde(rename = "maxTpm")]
    pub max_tpm: u64,
    #[serde(rename = "minTpm")]
    pub min_tpm: u64,
    #[serde(rename = "medianTpm")]
    pub median_tpm: f64,
    #[serde(rename = "meanTpm")]
    pub mean_tpm: f64,
}

/// Reserved unit price before and after a negotiated discount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitPricing {
    #[serde(rename = "baseMonthlyPrice")]
    pub base_monthly_price: f64,
    #[serde(rename = "discountPct")]
    pub discount_pct: f64,
    /// Price actually charged per unit per month, rounded to cents.
    #[serde(rename = "unitMonthlyPrice")]
    pub unit_monthly_price: f64,
}

/// Metadata a caller needs to judge how far the reported numbers can be trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    #[serde(rename = "requestCount")]
    pub request_count: usize,
    #[serde(rename = "exactRequests")]
    pub exact_requests: usize,
    #[serde(rename = "estimatedRequests")]
    pub estimated_requests: usize,
    #[serde(rename = "firstMinute")]
    pub first_minute: DateTime<Utc>,
    #[serde(rename = "lastMinute")]
    pub last_minute: DateTime<Utc>,
    #[serde(rename = "minuteCount")]
    pub minute_count: usize,
    #[serde(rename = "sampleDurationDays")]
    pub sample_duration_days: f64,
    #[serde(rename = "totalInputTokens")]
    pub total_input_tokens: u64,
    #[serde(rename = "totalOutputTokens")]
    pub total_output_tokens: u64,
    #[serde(rename = "minuteStats")]
    pub minute_stats: MinuteStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_request_minute_floors() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 42).unwrap()
            + Duration::milliseconds(250);
        let request = Request::new(ts, 10, 5);
        assert_eq!(
            request.minute(),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap()
        );
        assert_eq!(request.minute_index(), request.minute().timestamp() / 60);
        assert_eq!(request.total_tokens(), 15);
    }

    #[test]
    fn test_minute_index_before_epoch() {
        let ts = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 30).unwrap();
        assert_eq!(Request::new(ts, 1, 1).minute_index(), -1);
    }

    #[test]
    fn test_capacity_overflow_detected() {
        let config = CapacityConfiguration::new(u64::MAX, 2, 1.0);
        assert_eq!(config.total_capacity_tpm(), None);
        assert_eq!(
            CapacityConfiguration::new(15, 2500, 260.0).total_capacity_tpm(),
            Some(37_500)
        );
    }

    #[test]
    fn test_token_sums_saturate() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let huge = Request::new(ts, u64::MAX, 10);
        assert_eq!(huge.total_tokens(), u64::MAX);

        let mut bucket = MinuteBucket::empty(ts);
        bucket.add(&huge);
        bucket.add(&Request::new(ts, 5, 5));
        assert_eq!(bucket.input_tokens, u64::MAX);
        assert_eq!(bucket.output_tokens, 15);
        assert_eq!(bucket.total_tokens, u64::MAX);
        assert_eq!(bucket.request_count, 2);
    }

    #[test]
    fn test_reserved_share() {
        let allocation = AllocationResult {
            reserved_input: 250.0,
            reserved_output: 50.0,
            overflow_input: 750.0,
            overflow_output: 0.0,
            degenerate_splits: 0,
        };
        let share = allocation.reserved_share();
        assert_eq!(share.input_pct, 25.0);
        assert_eq!(share.output_pct, 100.0);
        assert_eq!(share.total_pct, 300.0 / 1050.0 * 100.0);

        // No output tokens at all
        assert_eq!(AllocationResult::default().reserved_share(), ReservedShare::default());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let row = SweepRow {
            num_units: 5,
            total_capacity_tpm: Some(500),
            outcome: CandidateOutcome::Failed {
                reason: "boom".to_string(),
            },
            recommended: false,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["numUnits"], 5);
    }
}
