//! Minute Aggregation
//!
//! Groups requests into per-minute token totals over a complete, contiguous minute index.
//! Minutes without traffic are present with zero sums, because utilization is averaged over
//! elapsed time rather than over occupied minutes.

use crate::error::{PlannerError, PlannerResult};
use crate::models::{DailyStats, MinuteBucket, MinuteStats, Request};
use chrono::Duration;
use std::collections::BTreeMap;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Build the gap-filled minute series for `requests`, sorted by minute.
///
/// Input order does not matter.
pub fn aggregate_minutes(requests: &[Request]) -> PlannerResult<Vec<MinuteBucket>> {
    if requests.is_empty() {
        return Err(PlannerError::EmptyDataset);
    }

    let mut by_minute: BTreeMap<i64, MinuteBucket> = BTreeMap::new();
    for request in requests {
        by_minute
            .entry(request.minute_index())
            .or_insert_with(|| MinuteBucket::empty(request.minute()))
            .add(request);
    }

    // Non-empty, so both ends exist
    let (Some((&first_idx, first)), Some(&last_idx)) =
        (by_minute.iter().next(), by_minute.keys().next_back())
    else {
        return Err(PlannerError::EmptyDataset);
    };
    let first_minute = first.minute;

    let mut buckets = Vec::with_capacity((last_idx - first_idx + 1) as usize);
    for offset in 0..=(last_idx - first_idx) {
        match by_minute.remove(&(first_idx + offset)) {
            Some(bucket) => buckets.push(bucket),
            None => buckets.push(MinuteBucket::empty(
                first_minute + Duration::minutes(offset),
            )),
        }
    }

    Ok(buckets)
}

/// Time between the earliest and latest request, in days.
///
/// A sample of one instant has zero duration and cannot be scaled to a month.
pub fn sample_duration_days(requests: &[Request]) -> f64 {
    let first = requests.iter().map(|r| r.timestamp).min();
    let last = requests.iter().map(|r| r.timestamp).max();
    match (first, last) {
        (Some(first), Some(last)) => (last - first).num_milliseconds() as f64 / MILLIS_PER_DAY,
        _ => 0.0,
    }
}

/// Mean over all minutes of `clip(minute_tokens / capacity, 0, 1)`, as a percentage.
pub fn utilization_pct(buckets: &[MinuteBucket], total_capacity_tpm: u64) -> f64 {
    if total_capacity_tpm == 0 || buckets.is_empty() {
        return 0.0;
    }

    let capacity = total_capacity_tpm as f64;
    let sum: f64 = buckets
        .iter()
        .map(|b| (b.total_tokens as f64 / capacity).clamp(0.0, 1.0))
        .sum();

    sum / buckets.len() as f64 * 100.0
}

/// Throughput statistics over the minute series.
pub fn minute_stats(buckets: &[MinuteBucket]) -> MinuteStats {
    if buckets.is_empty() {
        return MinuteStats::default();
    }

    let mut totals: Vec<u64> = buckets.iter().map(|b| b.total_tokens).collect();
    totals.sort_unstable();

    let sum: f64 = totals.iter().map(|&t| t as f64).sum();
    MinuteStats {
        mean_tpm: sum / totals.len() as f64,
        p95_tpm: nearest_rank(&totals, 95.0),
        p99_tpm: nearest_rank(&totals, 99.0),
        peak_tpm: totals.last().copied().unwrap_or(0),
        active_minutes: buckets.iter().filter(|b| b.request_count > 0).count(),
    }
}

/// Max, min, median and mean tokens per minute for each UTC date.
///
/// Expects the gap-filled series, so idle minutes count towards the daily figures.
pub fn daily_stats(buckets: &[MinuteBucket]) -> Vec<DailyStats> {
    buckets
        .chunk_by(|a, b| a.minute.date_naive() == b.minute.date_naive())
        .map(|day| {
            let mut totals: Vec<u64> = day.iter().map(|b| b.total_tokens).collect();
            totals.sort_unstable();

            let n = totals.len();
            let median_tpm = if n % 2 == 0 {
                (totals[n / 2 - 1] as f64 + totals[n / 2] as f64) / 2.0
            } else {
                totals[n / 2] as f64
            };

            DailyStats {
                date: day[0].minute.date_naive(),
                minutes: n,
                max_tpm: totals[n - 1],
                min_tpm: totals[0],
                median_tpm,
                mean_tpm: totals.iter().map(|&t| t as f64).sum::<f64>() / n as f64,
            }
        })
        .collect()
}

fn nearest_rank(sorted: &[u64], percentile: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (percentile / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(h: u32, m: u32, s: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_empty_input_fails() {
        assert_eq!(aggregate_minutes(&[]), Err(PlannerError::EmptyDataset));
    }

    #[test]
    fn test_gaps_are_zero_filled() {
        let requests = vec![
            Request::new(at(10, 3, 5), 10, 1),
            Request::new(at(10, 0, 59), 100, 50),
            Request::new(at(10, 0, 1), 20, 5),
        ];

        let buckets = aggregate_minutes(&requests).unwrap();

        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[0].minute, at(10, 0, 0));
        assert_eq!(buckets[0].input_tokens, 120);
        assert_eq!(buckets[0].output_tokens, 55);
        assert_eq!(buckets[0].total_tokens, 175);
        assert_eq!(buckets[0].request_count, 2);
        assert_eq!(buckets[1], MinuteBucket::empty(at(10, 1, 0)));
        assert_eq!(buckets[2], MinuteBucket::empty(at(10, 2, 0)));
        assert_eq!(buckets[3].minute, at(10, 3, 0));
        assert_eq!(buckets[3].total_tokens, 11);
    }

    #[test]
    fn test_sample_duration_spans_first_to_last_request() {
        let requests = vec![Request::new(at(18, 0, 0), 1, 1), Request::new(at(12, 0, 0), 1, 1)];
        assert!((sample_duration_days(&requests) - 0.25).abs() < 1e-12);

        let requests = vec![Request::new(at(10, 0, 0), 1, 1), Request::new(at(10, 0, 30), 1, 1)];
        assert!((sample_duration_days(&requests) - 30.0 / 86_400.0).abs() < 1e-15);
    }

    #[test]
    fn test_single_instant_has_no_duration() {
        assert_eq!(sample_duration_days(&[Request::new(at(10, 0, 0), 1, 1)]), 0.0);
        assert_eq!(sample_duration_days(&[]), 0.0);
    }

    #[test]
    fn test_daily_stats_split_at_midnight() {
        let next_day = Utc.with_ymd_and_hms(2024, 5, 2, 0, 1, 0).unwrap();
        let requests = vec![
            Request::new(at(23, 57, 0), 100, 0),
            Request::new(at(23, 58, 0), 40, 0),
            Request::new(at(23, 59, 0), 70, 10),
            Request::new(next_day, 5, 5),
        ];
        let stats = daily_stats(&aggregate_minutes(&requests).unwrap());

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].date, at(0, 0, 0).date_naive());
        assert_eq!(stats[0].minutes, 3);
        assert_eq!(stats[0].max_tpm, 100);
        assert_eq!(stats[0].min_tpm, 40);
        assert_eq!(stats[0].median_tpm, 80.0);
        assert!((stats[0].mean_tpm - 220.0 / 3.0).abs() < 1e-9);

        // 00:00 is idle and gap-filled, 00:01 carries 10 tokens
        assert_eq!(stats[1].minutes, 2);
        assert_eq!(stats[1].min_tpm, 0);
        assert_eq!(stats[1].median_tpm, 5.0);
        assert_eq!(stats[1].mean_tpm, 5.0);
    }

    #[test]
    fn test_utilization_clips_and_averages() {
        let requests = vec![
            Request::new(at(10, 0, 0), 300, 0), // over capacity, clipped to 100%
            Request::new(at(10, 2, 0), 50, 0),  // 50%
        ];
        let buckets = aggregate_minutes(&requests).unwrap();

        // (100 + 0 + 50) / 3 minutes
        assert!((utilization_pct(&buckets, 100) - 50.0).abs() < 1e-9);
        assert_eq!(utilization_pct(&buckets, 0), 0.0);
    }

    #[test]
    fn test_minute_stats() {
        let requests: Vec<Request> = (0..20)
            .map(|i| Request::new(at(10, i, 0), (i as u64 + 1) * 10, 0))
            .collect();
        let stats = minute_stats(&aggregate_minutes(&requests).unwrap());

        assert_eq!(stats.peak_tpm, 200);
        assert_eq!(stats.p95_tpm, 190);
        assert_eq!(stats.p99_tpm, 200);
        assert_eq!(stats.active_minutes, 20);
        assert!((stats.mean_tpm - 105.0).abs() < 1e-9);
    }
}
