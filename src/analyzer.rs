//! Capacity Analysis Engine
//!
//! This module provides the engine that orchestrates the planning pipeline and serves as the
//! entry point for every CLI command.
//!
//! ## Pipeline
//! 1. **Loading**: Resolves input patterns and parses request logs
//! 2. **Aggregation**: Builds the time-sorted [`Dataset`] and its gap-free minute series
//! 3. **Pricing**: Resolves overflow prices for the model (or takes explicit prices)
//! 4. **Sweep**: Simulates every candidate capacity level on a blocking worker thread
//! 5. **Reporting**: Formats output for display or JSON export
//!
//! The `batch` command runs steps 2-4 once per model found in the logs.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ptu_planner::analyzer::{PtuAnalyzer, SweepOptions};
//! use ptu_planner::config::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let analyzer = PtuAnalyzer::new(Config::default());
//! let options = SweepOptions {
//!     inputs: vec!["logs/*.jsonl".to_string()],
//!     model: Some("gpt-4o".to_string()),
//!     ..SweepOptions::default()
//! };
//!
//! let analysis = analyzer.analyze(&options, Default::default()).await?;
//! println!("{:?}", analysis.report.recommended());
//! # Ok(())
//! # }
//! ```

use crate::batch::{
    group_by_model, select_groups, BatchReport, ModelGroup, ModelResult, SkippedModel,
};
use crate::config::Config;
use crate::cost::unit_pricing;
use crate::dataset::Dataset;
use crate::error::PlannerError;
use crate::models::{DatasetSummary, SweepParameters, SweepReport, UnitPricing};
use crate::parser::{LoadStats, RequestLogParser};
use crate::pricing::{ModelPrice, PriceLookup, PricingTable};
use crate::reports::ReportDisplayManager;
use crate::sweep::SweepOrchestrator;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

/// Inputs for a sweep; `None` fields fall back to configuration.
#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    pub inputs: Vec<String>,
    pub model: Option<String>,
    pub input_price: Option<f64>,
    pub output_price: Option<f64>,
    pub min_units: Option<u64>,
    pub max_units: Option<u64>,
    pub step: Option<u64>,
    pub capacity_per_unit: Option<u64>,
    pub unit_monthly_price: Option<f64>,
    /// Percentage taken off the unit price
    pub discount_pct: Option<f64>,
    pub sample_days: Option<f64>,
    pub fetch_pricing: bool,
    pub sequential: bool,
    pub json_output: bool,
}

/// Per-model analysis on top of the sweep options.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub sweep: SweepOptions,
    pub min_requests: usize,
    /// Key groups by `"model (version)"` instead of model name
    pub by_version: bool,
    pub top_n: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            sweep: SweepOptions::default(),
            min_requests: crate::batch::DEFAULT_MIN_REQUESTS,
            by_version: false,
            top_n: None,
            output_dir: None,
        }
    }
}

/// Everything one analysis produced, passed to the caller as an immutable value.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub summary: DatasetSummary,
    pub load_stats: LoadStats,
    pub pricing: PriceLookup,
    pub unit_pricing: UnitPricing,
    pub report: SweepReport,
}

/// Result of the per-model batch plus how the logs were loaded.
#[derive(Debug, Clone)]
pub struct BatchAnalysis {
    pub load_stats: LoadStats,
    pub unit_pricing: UnitPricing,
    pub report: BatchReport,
}

pub struct PtuAnalyzer {
    config: Config,
    parser: RequestLogParser,
    display_manager: ReportDisplayManager,
}

impl PtuAnalyzer {
    pub fn new(config: Config) -> Self {
        let display_manager = ReportDisplayManager::new()
            .with_currency(config.output.currency_symbol.clone())
            .with_json_pretty(config.output.json_pretty);

        Self {
            config,
            parser: RequestLogParser::new(),
            display_manager,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn load_dataset(&self, inputs: &[String]) -> Result<(Dataset, LoadStats)> {
        let (requests, stats) = self.parser.load(inputs)?;
        let dataset = Dataset::new(requests).context("Cannot analyze request logs")?;
        Ok((dataset, stats))
    }

    /// Built-in prices, optionally refreshed from LiteLLM, then config overrides.
    pub async fn pricing_table(&self, fetch: bool) -> Result<PricingTable> {
        let mut table =
            PricingTable::builtin().with_default_model(self.config.pricing.default_model.clone());

        if fetch || self.config.pricing.fetch_remote {
            self.merge_remote_pricing(&mut table).await;
        }

        table.merge(&self.config.pricing.models);
        Ok(table)
    }

    #[cfg(feature = "pricing")]
    async fn merge_remote_pricing(&self, table: &mut PricingTable) {
        match PricingTable::fetch_litellm().await {
            Ok(prices) => table.merge(&prices),
            Err(e) => warn!(error = %e, "Using built-in pricing, remote fetch failed"),
        }
    }

    #[cfg(not(feature = "pricing"))]
    async fn merge_remote_pricing(&self, _table: &mut PricingTable) {
        warn!("Remote pricing requested but the `pricing` feature is disabled");
    }

    pub async fn resolve_price(&self, options: &SweepOptions) -> Result<PriceLookup> {
        if let Some(manual) = Self::manual_price(options) {
            return Ok(manual);
        }

        let table = self.pricing_table(options.fetch_pricing).await?;
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.config.pricing.default_model.clone());
        Self::price_from_table(&table, &model, options)
    }

    fn manual_price(options: &SweepOptions) -> Option<PriceLookup> {
        match (options.input_price, options.output_price) {
            (Some(input), Some(output)) => Some(PriceLookup::manual(ModelPrice::new(input, output))),
            _ => None,
        }
    }

    fn price_from_table(table: &PricingTable, model: &str, options: &SweepOptions) -> Result<PriceLookup> {
        let mut lookup = table
            .lookup(model)
            .with_context(|| format!("No pricing available for model {}", model))?;

        // A single explicit price overrides its half of the lookup
        if let Some(input) = options.input_price {
            lookup.price.input_per_1k = input;
        }
        if let Some(output) = options.output_price {
            lookup.price.output_per_1k = output;
        }

        Ok(lookup)
    }

    /// List unit price with the configured or requested discount applied.
    pub fn unit_pricing(&self, options: &SweepOptions) -> Result<UnitPricing> {
        let sweep = &self.config.sweep;
        let pricing = unit_pricing(
            options.unit_monthly_price.unwrap_or(sweep.unit_monthly_price),
            options.discount_pct.unwrap_or(sweep.discount_pct),
        )?;
        if pricing.discount_pct > 0.0 {
            info!(
                base = pricing.base_monthly_price,
                discount_pct = pricing.discount_pct,
                unit_price = pricing.unit_monthly_price,
                "Applied unit discount"
            );
        }
        Ok(pricing)
    }

    pub fn sweep_parameters(
        &self,
        options: &SweepOptions,
        dataset: &Dataset,
        price: &ModelPrice,
        unit: &UnitPricing,
    ) -> SweepParameters {
        let sweep = &self.config.sweep;
        SweepParameters {
            min_units: options.min_units.unwrap_or(sweep.min_units),
            max_units: options.max_units.unwrap_or(sweep.max_units),
            step: options.step.unwrap_or(sweep.step),
            capacity_per_unit: options.capacity_per_unit.unwrap_or(sweep.capacity_per_unit),
            unit_monthly_price: unit.unit_monthly_price,
            input_price: price.input_per_1k,
            output_price: price.output_per_1k,
            sample_duration_days: options
                .sample_days
                .unwrap_or_else(|| dataset.sample_duration_days()),
        }
    }

    /// Load, price and sweep. The sweep runs on a blocking thread and stops starting new
    /// candidates once `cancel` is set.
    pub async fn analyze(&self, options: &SweepOptions, cancel: Arc<AtomicBool>) -> Result<Analysis> {
        let unit = self.unit_pricing(options)?;
        let (dataset, load_stats) = self.load_dataset(&options.inputs)?;
        let pricing = self.resolve_price(options).await?;
        let params = self.sweep_parameters(options, &dataset, &pricing.price, &unit);
        let summary = dataset.summary();

        if summary.estimated_requests > 0 {
            warn!(
                estimated = summary.estimated_requests,
                total = summary.request_count,
                "Some token counts are estimated from text length"
            );
        }

        let report = Self::sweep_blocking(dataset, params, options.sequential, cancel).await?;

        Ok(Analysis {
            summary,
            load_stats,
            pricing,
            unit_pricing: unit,
            report,
        })
    }

    async fn sweep_blocking(
        dataset: Dataset,
        params: SweepParameters,
        sequential: bool,
        cancel: Arc<AtomicBool>,
    ) -> Result<SweepReport> {
        let mut orchestrator = SweepOrchestrator::new().with_cancellation(cancel);
        if sequential {
            orchestrator = orchestrator.sequential();
        }

        let span = tracing::Span::current();
        let report = tokio::task::spawn_blocking(move || {
            let _enter = span.enter();
            orchestrator.run(&dataset, &params)
        })
        .await
        .context("Sweep worker panicked")??;
        Ok(report)
    }

    /// Group the logs by model and sweep every group that clears the request threshold.
    ///
    /// Each model is priced by its own name unless both prices are given explicitly, and its
    /// monthly scaling uses its own sample duration.
    pub async fn analyze_batch(&self, options: &BatchOptions, cancel: Arc<AtomicBool>) -> Result<BatchAnalysis> {
        let sweep_options = &options.sweep;
        let unit = self.unit_pricing(sweep_options)?;
        let (requests, load_stats) = self.parser.load(&sweep_options.inputs)?;
        if requests.is_empty() {
            return Err(PlannerError::EmptyDataset).context("Cannot analyze request logs");
        }

        let groups = group_by_model(requests, options.by_version);
        info!(models = groups.len(), "Grouped requests by model");
        let (selected, mut skipped) = select_groups(groups, options.min_requests, options.top_n);

        let table = self.pricing_table(sweep_options.fetch_pricing).await?;

        let mut results = Vec::with_capacity(selected.len());
        for ModelGroup { key, model, requests } in selected {
            let lookup = match Self::manual_price(sweep_options) {
                Some(manual) => Ok(manual),
                None => Self::price_from_table(&table, &model, sweep_options),
            };
            let pricing = match lookup {
                Ok(pricing) => pricing,
                Err(e) => {
                    warn!(model = %key, error = %e, "Skipping model without pricing");
                    skipped.push(SkippedModel {
                        key,
                        requests: requests.len(),
                        reason: format!("{:#}", e),
                    });
                    continue;
                }
            };

            let dataset = Dataset::new(requests)?;
            let params = self.sweep_parameters(sweep_options, &dataset, &pricing.price, &unit);
            let summary = dataset.summary();

            let span = tracing::info_span!("model", key = %key, requests = summary.request_count);
            let report = Self::sweep_blocking(dataset, params, sweep_options.sequential, cancel.clone())
                .instrument(span)
                .await?;
            results.push(ModelResult::new(key, model, summary, pricing, report));
        }

        Ok(BatchAnalysis {
            load_stats,
            unit_pricing: unit,
            report: BatchReport::new(results, skipped),
        })
    }

    pub async fn run_batch(&self, options: BatchOptions, cancel: Arc<AtomicBool>) -> Result<BatchAnalysis> {
        let span = crate::logging::run_span("batch");
        let analysis = self.analyze_batch(&options, cancel).instrument(span).await?;

        if let Some(dir) = &options.output_dir {
            analysis
                .report
                .write_to_dir(dir, self.config.output.json_pretty)?;
        }

        self.display_manager.display_batch(
            &analysis.report,
            &analysis.load_stats,
            &analysis.unit_pricing,
            options.output_dir.as_deref(),
            options.sweep.json_output,
        );

        info!(
            models = analysis.report.totals.models_analyzed,
            skipped = analysis.report.totals.models_skipped,
            "Batch command complete"
        );
        Ok(analysis)
    }

    pub async fn run_sweep(&self, options: SweepOptions, cancel: Arc<AtomicBool>) -> Result<Analysis> {
        let span = crate::logging::run_span("sweep");
        let analysis = self.analyze(&options, cancel).instrument(span).await?;

        self.display_manager.display_sweep(
            &analysis.report,
            &analysis.summary,
            &analysis.load_stats,
            &analysis.pricing,
            &analysis.unit_pricing,
            options.json_output,
        );

        info!(
            rows = analysis.report.rows.len(),
            recommended = ?analysis.report.recommended().map(|r| r.num_units),
            "Sweep command complete"
        );
        Ok(analysis)
    }

    pub fn run_minutes(&self, inputs: &[String], limit: Option<usize>, json_output: bool) -> Result<()> {
        let span = crate::logging::run_span("minutes");
        let _enter = span.enter();

        let (dataset, _stats) = self.load_dataset(inputs)?;
        self.display_manager.display_minutes(
            dataset.minutes(),
            &dataset.summary(),
            &dataset.daily_stats(),
            limit,
            json_output,
        );
        Ok(())
    }

    pub async fn run_pricing(&self, fetch: bool, json_output: bool) -> Result<()> {
        let table = self.pricing_table(fetch).await?;
        self.display_manager.display_pricing(&table, json_output);
        Ok(())
    }
}
