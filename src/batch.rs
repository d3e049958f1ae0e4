//! Per-Model Batch Analysis
//!
//! Splits a mixed request log by deployment model and sweeps each model on its own, so every
//! model gets its own reserved-capacity recommendation and the totals show what following all
//! of them would cost.
//!
//! Models are keyed by name, or by `"model (version)"` when versions are kept apart. Requests
//! without a model or version are grouped under `unknown`.

use crate::models::{DatasetSummary, Request, SweepReport};
use crate::pricing::PriceLookup;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const UNKNOWN_MODEL: &str = "unknown";
pub const DEFAULT_MIN_REQUESTS: usize = 1_000;

/// Requests sharing one model key.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelGroup {
    pub key: String,
    /// Model name used for the price lookup.
    pub model: String,
    pub requests: Vec<Request>,
}

/// Group `requests` by model, busiest group first. Equal counts are ordered by key.
pub fn group_by_model(requests: Vec<Request>, by_version: bool) -> Vec<ModelGroup> {
    let mut groups: HashMap<String, ModelGroup> = HashMap::new();

    for request in requests {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| UNKNOWN_MODEL.to_string());
        let key = if by_version {
            let version = request.model_version.as_deref().unwrap_or(UNKNOWN_MODEL);
            format!("{} ({})", model, version)
        } else {
            model.clone()
        };

        groups
            .entry(key.clone())
            .or_insert_with(|| ModelGroup {
                key,
                model,
                requests: Vec::new(),
            })
            .requests
            .push(request);
    }

    let mut groups: Vec<ModelGroup> = groups.into_values().collect();
    groups.sort_by(|a, b| {
        b.requests
            .len()
            .cmp(&a.requests.len())
            .then_with(|| a.key.cmp(&b.key))
    });
    groups
}

/// A model left out of the batch and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedModel {
    pub key: String,
    pub requests: usize,
    pub reason: String,
}

/// Keep groups with at least `min_requests` requests, then the first `top_n` of those.
pub fn select_groups(
    groups: Vec<ModelGroup>,
    min_requests: usize,
    top_n: Option<usize>,
) -> (Vec<ModelGroup>, Vec<SkippedModel>) {
    let mut selected = Vec::new();
    let mut skipped = Vec::new();

    for group in groups {
        if group.requests.len() < min_requests {
            skipped.push(SkippedModel {
                key: group.key,
                requests: group.requests.len(),
                reason: format!("fewer than {} requests", min_requests),
            });
        } else if top_n.is_some_and(|n| selected.len() >= n) {
            skipped.push(SkippedModel {
                key: group.key,
                requests: group.requests.len(),
                reason: "outside the top models by request count".to_string(),
            });
        } else {
            selected.push(group);
        }
    }

    (selected, skipped)
}

/// Sweep outcome for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelResult {
    pub key: String,
    pub model: String,
    pub requests: usize,
    pub dataset: DatasetSummary,
    pub pricing: PriceLookup,
    /// Monthly cost with no reserved units.
    #[serde(rename = "paygoCost")]
    pub paygo_cost: Option<f64>,
    /// Zero when no reserved configuration was recommended.
    #[serde(rename = "recommendedUnits")]
    pub recommended_units: u64,
    /// Falls back to the pay-per-token cost when nothing was recommended.
    #[serde(rename = "recommendedCost")]
    pub recommended_cost: Option<f64>,
    pub sweep: SweepReport,
}

impl ModelResult {
    pub fn new(
        key: String,
        model: String,
        dataset: DatasetSummary,
        pricing: PriceLookup,
        sweep: SweepReport,
    ) -> Self {
        let recommended = sweep.recommended();
        let recommended_units = recommended.map(|r| r.num_units).unwrap_or(0);
        let recommended_cost = recommended
            .and_then(|r| r.total_monthly_cost())
            .or(sweep.baseline_cost);

        Self {
            key,
            model,
            requests: dataset.request_count,
            dataset,
            pricing,
            paygo_cost: sweep.baseline_cost,
            recommended_units,
            recommended_cost,
            sweep,
        }
    }

    /// Recommended minus pay-per-token monthly cost.
    pub fn cost_difference(&self) -> Option<f64> {
        Some(self.recommended_cost? - self.paygo_cost?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BatchTotals {
    #[serde(rename = "modelsAnalyzed")]
    pub models_analyzed: usize,
    #[serde(rename = "modelsSkipped")]
    pub models_skipped: usize,
    #[serde(rename = "totalPaygoCost")]
    pub total_paygo_cost: f64,
    #[serde(rename = "totalRecommendedCost")]
    pub total_recommended_cost: f64,
    pub difference: f64,
    /// Difference relative to the pay-per-token total; 0 when that total is 0.
    #[serde(rename = "differencePct")]
    pub difference_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub models: Vec<ModelResult>,
    pub skipped: Vec<SkippedModel>,
    pub totals: BatchTotals,
}

impl BatchReport {
    /// Order results by request count and sum the costs of models with a usable baseline.
    pub fn new(mut models: Vec<ModelResult>, skipped: Vec<SkippedModel>) -> Self {
        models.sort_by(|a, b| b.requests.cmp(&a.requests).then_with(|| a.key.cmp(&b.key)));

        let mut totals = BatchTotals {
            models_analyzed: models.len(),
            models_skipped: skipped.len(),
            ..BatchTotals::default()
        };
        for result in &models {
            if let (Some(paygo), Some(recommended)) = (result.paygo_cost, result.recommended_cost) {
                totals.total_paygo_cost += paygo;
                totals.total_recommended_cost += recommended;
            }
        }
        totals.difference = totals.total_recommended_cost - totals.total_paygo_cost;
        totals.difference_pct = if totals.total_paygo_cost > 0.0 {
            totals.difference / totals.total_paygo_cost * 100.0
        } else {
            0.0
        };

        Self {
            models,
            skipped,
            totals,
        }
    }

    /// Write one JSON file per model plus `summary.json` into `dir`.
    pub fn write_to_dir(&self, dir: &Path, pretty: bool) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

        let mut written = Vec::with_capacity(self.models.len() + 1);
        for result in &self.models {
            let path = dir.join(format!("{}_ptu_analysis.json", file_stem(&result.key)));
            write_json(&path, result, pretty)?;
            written.push(path);
        }

        let summary = dir.join("summary.json");
        write_json(
            &summary,
            &serde_json::json!({
                "totals": self.totals,
                "skipped": self.skipped,
                "models": self.models.iter().map(|m| serde_json::json!({
                    "key": m.key,
                    "requests": m.requests,
                    "peakTpm": m.dataset.minute_stats.peak_tpm,
                    "paygoCost": m.paygo_cost,
                    "recommendedUnits": m.recommended_units,
                    "recommendedCost": m.recommended_cost,
                    "costDifference": m.cost_difference(),
                })).collect::<Vec<_>>(),
            }),
            pretty,
        )?;
        written.push(summary);

        info!(dir = %dir.display(), files = written.len(), "Wrote batch results");
        Ok(written)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let content = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize batch result")?;

    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// File-name-safe form of a model key.
pub fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
