//! Per-model grouping, sweeps and combined totals.

use ptu_planner::batch::{group_by_model, select_groups, BatchReport, ModelResult};
use ptu_planner::pricing::{ModelPrice, PriceLookup};
use ptu_planner::{Dataset, SweepOrchestrator, SweepParameters};
use tempfile::tempdir;

mod common;
use common::{assert_close, model_requests};

fn sweep_group(key: String, model: String, requests: Vec<ptu_planner::Request>) -> ModelResult {
    let dataset = Dataset::new(requests).unwrap();
    let params = SweepParameters {
        min_units: 5,
        max_units: 20,
        step: 5,
        capacity_per_unit: 100,
        unit_monthly_price: 40.0,
        input_price: 0.01,
        output_price: 0.02,
        sample_duration_days: dataset.sample_duration_days(),
    };
    let report = SweepOrchestrator::new().run(&dataset, &params).unwrap();
    let pricing = PriceLookup::manual(ModelPrice::new(0.01, 0.02));
    ModelResult::new(key, model, dataset.summary(), pricing, report)
}

fn batch() -> BatchReport {
    let mut requests = model_requests("gpt-4o-mini", 0, 3, 100, 10);
    requests.extend(model_requests("gpt-4o", 0, 10, 1_000, 500));

    let (selected, skipped) = select_groups(group_by_model(requests, false), 5, None);
    let results = selected
        .into_iter()
        .map(|g| sweep_group(g.key, g.model, g.requests))
        .collect();
    BatchReport::new(results, skipped)
}

#[test]
fn test_batch_totals_follow_recommendations() {
    let report = batch();

    assert_eq!(report.models.len(), 1);
    let gpt4o = &report.models[0];
    assert_eq!(gpt4o.key, "gpt-4o");
    assert_eq!(gpt4o.requests, 10);
    assert_eq!(gpt4o.recommended_units, 5);
    assert_close(gpt4o.paygo_cost.unwrap(), 974.0);
    assert_close(gpt4o.recommended_cost.unwrap(), 930.5);
    assert_close(gpt4o.cost_difference().unwrap(), -43.5);

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.totals.models_skipped, 1);
    assert_close(report.totals.total_paygo_cost, 974.0);
    assert_close(report.totals.total_recommended_cost, 930.5);
    assert_close(report.totals.difference_pct, -43.5 / 974.0 * 100.0);
}

#[test]
fn test_models_ordered_by_request_count() {
    let mut requests = model_requests("b-model", 0, 2, 100, 10);
    requests.extend(model_requests("a-model", 0, 4, 100, 10));

    let results = group_by_model(requests, false)
        .into_iter()
        .rev()
        .map(|g| sweep_group(g.key, g.model, g.requests))
        .collect();
    let report = BatchReport::new(results, Vec::new());

    let keys: Vec<&str> = report.models.iter().map(|m| m.key.as_str()).collect();
    assert_eq!(keys, vec!["a-model", "b-model"]);
}

#[test]
fn test_empty_batch_has_zero_difference() {
    let report = BatchReport::new(Vec::new(), Vec::new());

    assert_eq!(report.totals.models_analyzed, 0);
    assert_eq!(report.totals.difference, 0.0);
    assert_eq!(report.totals.difference_pct, 0.0);
}

#[test]
fn test_results_written_per_model() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("results");

    let written = batch().write_to_dir(&out, true).unwrap();

    assert_eq!(written.len(), 2);
    assert!(out.join("gpt-4o_ptu_analysis.json").is_file());
    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["totals"]["modelsAnalyzed"], 1);
    assert_eq!(summary["models"][0]["recommendedUnits"], 5);
    assert_eq!(summary["skipped"][0]["key"], "gpt-4o-mini");
}
