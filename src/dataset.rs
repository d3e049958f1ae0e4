//! Validated request stream plus its minute series.
//!
//! A [`Dataset`] is built once per analysis and is read-only afterwards; every sweep
//! candidate borrows it.

use crate::aggregator::{aggregate_minutes, daily_stats, minute_stats, sample_duration_days};
use crate::error::PlannerResult;
use crate::models::{DailyStats, DatasetSummary, MinuteBucket, Request, TokenSource};

#[derive(Debug, Clone)]
pub struct Dataset {
    requests: Vec<Request>,
    minutes: Vec<MinuteBucket>,
}

impl Dataset {
    /// Sort `requests` by timestamp and derive the minute series.
    ///
    /// The sort is stable: requests with identical timestamps keep their input order, which
    /// decides who gets scarce capacity within a minute.
    pub fn new(mut requests: Vec<Request>) -> PlannerResult<Self> {
        requests.sort_by_key(|r| r.timestamp);
        let minutes = aggregate_minutes(&requests)?;
        Ok(Self { requests, minutes })
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn minutes(&self) -> &[MinuteBucket] {
        &self.minutes
    }

    /// Days between the first and last request; zero for a single instant.
    pub fn sample_duration_days(&self) -> f64 {
        sample_duration_days(&self.requests)
    }

    pub fn daily_stats(&self) -> Vec<DailyStats> {
        daily_stats(&self.minutes)
    }

    pub fn summary(&self) -> DatasetSummary {
        let estimated_requests = self
            .requests
            .iter()
            .filter(|r| r.token_source == TokenSource::Estimated)
            .count();

        // Dataset::new guarantees at least one minute
        let first_minute = self.minutes.first().map(|b| b.minute).unwrap_or_default();
        let last_minute = self.minutes.last().map(|b| b.minute).unwrap_or_default();

        DatasetSummary {
            request_count: self.requests.len(),
            exact_requests: self.requests.len() - estimated_requests,
            estimated_requests,
            first_minute,
            last_minute,
            minute_count: self.minutes.len(),
            sample_duration_days: self.sample_duration_days(),
            total_input_tokens: self
                .requests
                .iter()
                .fold(0u64, |acc, r| acc.saturating_add(r.input_tokens)),
            total_output_tokens: self
                .requests
                .iter()
                .fold(0u64, |acc, r| acc.saturating_add(r.output_tokens)),
            minute_stats: minute_stats(&self.minutes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlannerError;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_empty_dataset_rejected() {
        assert_eq!(Dataset::new(Vec::new()).err(), Some(PlannerError::EmptyDataset));
    }

    #[test]
    fn test_sort_is_stable_for_tied_timestamps() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let dataset = Dataset::new(vec![
            Request::new(t0 + Duration::seconds(30), 3, 0),
            Request::new(t0, 1, 0),
            Request::estimated(t0, 2, 0),
        ])
        .unwrap();

        let order: Vec<u64> = dataset.requests().iter().map(|r| r.input_tokens).collect();
        assert_eq!(order, vec![1, 2, 3]);

        let summary = dataset.summary();
        assert_eq!(summary.request_count, 3);
        assert_eq!(summary.estimated_requests, 1);
        assert_eq!(summary.exact_requests, 2);
        assert_eq!(summary.minute_count, 1);
        assert_eq!(summary.total_input_tokens, 6);
        assert_eq!(summary.first_minute, t0);
        assert!((summary.sample_duration_days - 30.0 / 86_400.0).abs() < 1e-15);
    }

    #[test]
    fn test_single_request_has_zero_duration() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let dataset = Dataset::new(vec![Request::new(t0, 10, 5)]).unwrap();

        assert_eq!(dataset.sample_duration_days(), 0.0);
        assert_eq!(dataset.minutes().len(), 1);
        assert_eq!(dataset.daily_stats().len(), 1);
    }
}
