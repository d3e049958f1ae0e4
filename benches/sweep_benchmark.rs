//! Performance benchmarks for parsing, allocation and the capacity sweep
//!
//! Run with: cargo bench

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ptu_planner::parser::RequestLogParser;
use ptu_planner::{CapacityAllocator, Dataset, Request, SweepOrchestrator, SweepParameters};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Roughly twenty requests per minute with a daily-ish load curve
fn generate_requests(count: usize) -> Vec<Request> {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let burst = if (i / 600) % 3 == 0 { 4 } else { 1 };
            Request::new(
                start + Duration::seconds(3 * i as i64),
                (200 + (i % 1_500) as u64) * burst,
                (50 + (i % 400) as u64) * burst,
            )
        })
        .collect()
}

fn create_large_jsonl_file(dir: &std::path::Path, entries: usize) -> anyhow::Result<PathBuf> {
    let path = dir.join("requests_benchmark.jsonl");
    let mut content = String::new();

    for request in generate_requests(entries) {
        content.push_str(&format!(
            "{{\"timestamp\": \"{}\", \"usage\": {{\"prompt_tokens\": {}, \"completion_tokens\": {}}}}}\n",
            request.timestamp.to_rfc3339(),
            request.input_tokens,
            request.output_tokens
        ));
    }

    fs::write(&path, content)?;
    Ok(path)
}

fn benchmark_jsonl_loading(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let path = create_large_jsonl_file(temp_dir.path(), 10_000).unwrap();
    let parser = RequestLogParser::new();

    c.bench_function("parse_jsonl_10000_requests", |b| {
        b.iter(|| {
            let parsed = parser.parse_file(black_box(&path)).unwrap();
            black_box(parsed)
        })
    });
}

fn benchmark_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate");

    for size in [1_000, 10_000, 100_000].iter() {
        let dataset = Dataset::new(generate_requests(*size)).unwrap();
        let allocator = CapacityAllocator::new(50_000, 4.0);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(allocator.allocate(black_box(dataset.requests()))))
        });
    }

    group.finish();
}

fn benchmark_sweep(c: &mut Criterion) {
    let dataset = Dataset::new(generate_requests(50_000)).unwrap();
    let params = SweepParameters {
        min_units: 15,
        max_units: 200,
        step: 5,
        capacity_per_unit: 2_500,
        unit_monthly_price: 260.0,
        input_price: 0.0025,
        output_price: 0.01,
        sample_duration_days: dataset.sample_duration_days(),
    };

    let mut group = c.benchmark_group("sweep");
    group.sample_size(10);

    group.bench_function("parallel", |b| {
        let orchestrator = SweepOrchestrator::new();
        b.iter(|| black_box(orchestrator.run(&dataset, black_box(&params)).unwrap()))
    });
    group.bench_function("sequential", |b| {
        let orchestrator = SweepOrchestrator::new().sequential();
        b.iter(|| black_box(orchestrator.run(&dataset, black_box(&params)).unwrap()))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_jsonl_loading,
    benchmark_allocation,
    benchmark_sweep
);
criterion_main!(benches);
