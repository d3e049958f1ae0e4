//! Output Formatting and Display Management
//!
//! Renders analysis results either as colored terminal tables or as structured JSON.
//!
//! ## Report Types
//! - **Sweep**: one row per candidate unit count with reserved/overflow split, monthly cost,
//!   utilization and the recommended row highlighted
//! - **Minutes**: the busiest minutes of the gap-filled minute series plus per-day statistics
//! - **Pricing**: the overflow price table
//! - **Batch**: one recommendation per model and the combined monthly totals
//!
//! Every cost shown next to a sample-derived figure states the sample duration, and monthly
//! overflow is labelled as extrapolated.

use crate::batch::BatchReport;
use crate::models::*;
use crate::parser::LoadStats;
use crate::pricing::{PriceLookup, PricingTable};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

pub struct ReportDisplayManager {
    currency: String,
    json_pretty: bool,
}

impl Default for ReportDisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportDisplayManager {
    pub fn new() -> Self {
        Self {
            currency: "$".to_string(),
            json_pretty: true,
        }
    }

    pub fn with_currency(mut self, symbol: impl Into<String>) -> Self {
        self.currency = symbol.into();
        self
    }

    pub fn with_json_pretty(mut self, pretty: bool) -> Self {
        self.json_pretty = pretty;
        self
    }

    pub fn display_sweep(
        &self,
        report: &SweepReport,
        summary: &DatasetSummary,
        stats: &LoadStats,
        pricing: &PriceLookup,
        unit_pricing: &UnitPricing,
        json_output: bool,
    ) {
        if json_output {
            let output = serde_json::json!({
                "dataset": summary,
                "load": stats,
                "pricing": pricing,
                "unitPricing": unit_pricing,
                "sweep": report,
            });
            self.print_json(&output);
            return;
        }

        self.print_header("Reserved Capacity Sweep");
        self.print_dataset(summary, stats);

        println!(
            "\n{} Pricing: {} (resolved {} via {:?}) • input {}/1k • output {}/1k • output weight {}",
            "💲".bright_yellow(),
            pricing.requested.bright_white(),
            pricing.resolved.bright_white(),
            pricing.matched,
            self.money_precise(report.parameters.input_price),
            self.money_precise(report.parameters.output_price),
            format!("{:.2}", report.output_weight).bright_white()
        );
        println!(
            "{} Capacity: {} tpm/unit • {}/unit/month",
            "⚙️".bright_blue(),
            report.parameters.capacity_per_unit.to_string().bright_white(),
            self.money(report.parameters.unit_monthly_price)
        );
        if unit_pricing.discount_pct > 0.0 {
            println!(
                "   list {}/unit/month less {}% discount",
                self.money(unit_pricing.base_monthly_price),
                unit_pricing.discount_pct
            );
        }

        println!();
        println!(
            "   {:>6} {:>12} {:>14} {:>14} {:>8} {:>12} {:>14} {:>14} {:>8}",
            "Units".bold(),
            "TPM".bold(),
            "Reserved tok".bold(),
            "Overflow tok".bold(),
            "PTU %".bold(),
            "Reserved/mo".bold(),
            "Overflow/mo*".bold(),
            "Total/mo".bold(),
            "Util %".bold()
        );

        for row in &report.rows {
            let marker = if row.recommended {
                "★".bright_green().bold().to_string()
            } else {
                " ".to_string()
            };
            let tpm = row
                .total_capacity_tpm
                .map(|t| t.to_string())
                .unwrap_or_else(|| "overflow".to_string());

            match &row.outcome {
                CandidateOutcome::Completed {
                    allocation,
                    cost,
                    utilization_pct,
                    reserved_share,
                } => {
                    let total = format!("{}{:.2}", self.currency, cost.total_monthly_cost);
                    let total = if row.recommended {
                        total.bright_green().bold()
                    } else {
                        total.normal()
                    };
                    println!(
                        " {} {:>6} {:>12} {:>14} {:>14} {:>8.1} {:>12} {:>14} {:>14} {:>8.1}",
                        marker,
                        row.num_units,
                        tpm,
                        format_tokens(allocation.reserved_total()),
                        format_tokens(allocation.overflow_total()),
                        reserved_share.total_pct,
                        format!("{}{:.2}", self.currency, cost.reserved_monthly_cost),
                        format!("{}{:.2}", self.currency, cost.overflow_monthly_cost),
                        total,
                        utilization_pct
                    );
                }
                CandidateOutcome::Failed { reason } => {
                    println!(
                        " {} {:>6} {:>12} {}",
                        marker,
                        row.num_units,
                        tpm,
                        format!("failed: {}", reason).bright_red()
                    );
                }
                CandidateOutcome::Cancelled => {
                    println!(
                        " {} {:>6} {:>12} {}",
                        marker,
                        row.num_units,
                        tpm,
                        "cancelled".yellow()
                    );
                }
            }
        }

        println!(
            "\n   * overflow cost extrapolated linearly from a {:.2}-day sample to a {}-day month",
            summary.sample_duration_days, DAYS_PER_MONTH
        );

        let warnings: Vec<&String> = report
            .rows
            .iter()
            .filter_map(|r| r.cost())
            .flat_map(|c| c.warnings.iter())
            .collect();
        if let Some(first) = warnings.first() {
            println!("   {} {}", "⚠".bright_yellow(), first.yellow());
        }

        match (report.recommended(), report.baseline_cost) {
            (Some(row), Some(baseline)) => {
                let total = row.total_monthly_cost().unwrap_or_default();
                println!(
                    "\n{} Recommended: {} units ({} tpm) at {}/month vs {}/month pay-per-token ({}{:.2})",
                    "🎯".bright_green(),
                    row.num_units.to_string().bright_white().bold(),
                    row.total_capacity_tpm.unwrap_or_default(),
                    self.money(total),
                    self.money(baseline),
                    if total >= baseline { "+" } else { "-" },
                    (total - baseline).abs()
                );
            }
            (None, Some(baseline)) => {
                println!(
                    "\n{} No reserved configuration to recommend; pay-per-token baseline is {}/month",
                    "ℹ️".bright_blue(),
                    self.money(baseline)
                );
            }
            _ => {
                println!("\n{} No baseline available", "⚠".bright_yellow());
            }
        }
    }

    pub fn display_minutes(
        &self,
        minutes: &[MinuteBucket],
        summary: &DatasetSummary,
        daily: &[DailyStats],
        limit: Option<usize>,
        json_output: bool,
    ) {
        let display_limit = limit.unwrap_or(10);
        let mut busiest: Vec<&MinuteBucket> = minutes.iter().collect();
        busiest.sort_by(|a, b| {
            b.total_tokens
                .cmp(&a.total_tokens)
                .then(a.minute.cmp(&b.minute))
        });
        busiest.truncate(display_limit);

        if json_output {
            let output = serde_json::json!({
                "dataset": summary,
                "busiestMinutes": busiest,
                "dailyStats": daily,
            });
            self.print_json(&output);
            return;
        }

        self.print_header("Per-Minute Token Throughput");
        self.print_dataset(summary, &LoadStats::default());

        println!(
            "\n{} Busiest minutes (top {}):",
            "📅".bright_blue(),
            busiest.len().to_string().bright_white().bold()
        );
        for bucket in busiest {
            println!(
                "   {}: {} tokens ({} in / {} out, {} requests)",
                bucket
                    .minute
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
                    .bright_white()
                    .bold(),
                bucket.total_tokens.to_string().bright_cyan(),
                bucket.input_tokens,
                bucket.output_tokens,
                bucket.request_count
            );
        }

        println!("\n{} Daily throughput (tokens per minute):", "📆".bright_blue());
        println!(
            "   {:<12} {:>8} {:>12} {:>12} {:>12} {:>12}",
            "Date".bold(),
            "Minutes".bold(),
            "Max".bold(),
            "Median".bold(),
            "Mean".bold(),
            "Min".bold()
        );
        for day in daily {
            println!(
                "   {:<12} {:>8} {:>12} {:>12.0} {:>12.0} {:>12}",
                day.date.to_string().bright_white(),
                day.minutes,
                day.max_tpm.to_string().bright_cyan(),
                day.median_tpm,
                day.mean_tpm,
                day.min_tpm
            );
        }
    }

    pub fn display_batch(
        &self,
        report: &BatchReport,
        stats: &LoadStats,
        unit_pricing: &UnitPricing,
        output_dir: Option<&Path>,
        json_output: bool,
    ) {
        if json_output {
            let output = serde_json::json!({
                "load": stats,
                "unitPricing": unit_pricing,
                "models": report.models,
                "skipped": report.skipped,
                "totals": report.totals,
            });
            self.print_json(&output);
            return;
        }

        self.print_header("Per-Model Reserved Capacity");
        println!(
            "\n{} {} requests loaded from {} files • unit price {}/month",
            "📊".bright_yellow(),
            stats.loaded.to_string().bright_white().bold(),
            stats.files,
            self.money(unit_pricing.unit_monthly_price)
        );

        for result in &report.models {
            println!(
                "\n{} {} ({} requests, {:.2} days, peak {} tpm)",
                "🔹".bright_blue(),
                result.key.bright_white().bold(),
                result.requests,
                result.dataset.sample_duration_days,
                result.dataset.minute_stats.peak_tpm
            );
            println!(
                "   Pricing: {} via {:?} • in {}/1k • out {}/1k",
                result.pricing.resolved,
                result.pricing.matched,
                self.money_precise(result.pricing.price.input_per_1k),
                self.money_precise(result.pricing.price.output_per_1k)
            );

            let Some(paygo) = result.paygo_cost else {
                println!("   {} No baseline available", "⚠".bright_yellow());
                continue;
            };
            println!("   Pay-per-token: {}/month", self.money(paygo));

            let share = result
                .sweep
                .recommended()
                .and_then(|r| r.reserved_share())
                .unwrap_or_default();
            let recommended = result.recommended_cost.unwrap_or(paygo);
            let diff = recommended - paygo;
            println!(
                "   Recommended: {} units at {}/month ({}{:.2}, {:.1}% of tokens reserved)",
                result.recommended_units.to_string().bright_white().bold(),
                self.money(recommended),
                if diff >= 0.0 { "+" } else { "-" },
                diff.abs(),
                share.total_pct
            );
        }

        if !report.skipped.is_empty() {
            println!("\n{} Skipped:", "⏭".yellow());
            for skipped in &report.skipped {
                println!(
                    "   {} ({} requests): {}",
                    skipped.key,
                    skipped.requests,
                    skipped.reason.yellow()
                );
            }
        }

        let totals = &report.totals;
        println!(
            "\n{} {} models • pay-per-token {}/month • with recommendations {}/month ({:+.2}, {:+.1}%)",
            "💰".bright_green(),
            totals.models_analyzed.to_string().bright_white().bold(),
            self.money(totals.total_paygo_cost),
            self.money(totals.total_recommended_cost),
            totals.difference,
            totals.difference_pct
        );

        if let Some(dir) = output_dir {
            println!("   Results written to {}", dir.display().to_string().bright_white());
        }
    }

    pub fn display_pricing(&self, table: &PricingTable, json_output: bool) {
        let models = table.list();

        if json_output {
            #[derive(Serialize)]
            struct Row<'a> {
                model: &'a str,
                input_per_1k: f64,
                output_per_1k: f64,
                output_weight: f64,
            }
            let rows: Vec<Row> = models
                .iter()
                .map(|&(model, price)| Row {
                    model,
                    input_per_1k: price.input_per_1k,
                    output_per_1k: price.output_per_1k,
                    output_weight: price.output_weight(),
                })
                .collect();
            self.print_json(&serde_json::json!({
                "defaultModel": table.default_model(),
                "models": rows,
            }));
            return;
        }

        self.print_header("Overflow Pricing (per 1k tokens)");
        println!(
            "\n   Default model: {}\n",
            table.default_model().bright_white().bold()
        );
        for (model, price) in models {
            println!(
                "   {:<28} in {:>12}  out {:>12}  weight {:>6.2}",
                model.bright_cyan(),
                self.money_precise(price.input_per_1k),
                self.money_precise(price.output_per_1k),
                price.output_weight()
            );
        }
    }

    fn print_header(&self, title: &str) {
        println!("\n{}", "=".repeat(80).bright_cyan());
        println!("{}", title.bright_white().bold());
        println!("{}", "=".repeat(80).bright_cyan());
    }

    fn print_dataset(&self, summary: &DatasetSummary, stats: &LoadStats) {
        println!(
            "\n{} {} requests • {} minutes • {} days sampled ({} → {})",
            "📊".bright_yellow(),
            summary.request_count.to_string().bright_white().bold(),
            summary.minute_count.to_string().bright_white().bold(),
            format!("{:.2}", summary.sample_duration_days).bright_white().bold(),
            summary.first_minute.format("%Y-%m-%d %H:%M"),
            summary.last_minute.format("%Y-%m-%d %H:%M"),
        );
        println!(
            "   Tokens: {} in / {} out • Peak {} tpm • p95 {} tpm • mean {:.0} tpm",
            format_tokens(summary.total_input_tokens as f64),
            format_tokens(summary.total_output_tokens as f64),
            summary.minute_stats.peak_tpm.to_string().bright_white(),
            summary.minute_stats.p95_tpm,
            summary.minute_stats.mean_tpm
        );
        if summary.estimated_requests > 0 {
            println!(
                "   {} {} of {} requests use estimated token counts",
                "⚠".bright_yellow(),
                summary.estimated_requests,
                summary.request_count
            );
        }
        if stats.skipped() > 0 {
            println!(
                "   {} {} log lines skipped ({} malformed, {} bad timestamps, {} without tokens)",
                "⚠".bright_yellow(),
                stats.skipped(),
                stats.malformed_lines,
                stats.bad_timestamps,
                stats.missing_tokens
            );
        }
    }

    fn print_json<T: Serialize>(&self, value: &T) {
        let rendered = if self.json_pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        match rendered {
            Ok(json_str) => println!("{}", json_str),
            Err(e) => eprintln!("Error serializing report to JSON: {}", e),
        }
    }

    fn money(&self, amount: f64) -> colored::ColoredString {
        format!("{}{:.2}", self.currency, amount).bright_green()
    }

    fn money_precise(&self, amount: f64) -> colored::ColoredString {
        format!("{}{:.5}", self.currency, amount).bright_green()
    }
}

/// Compact token count: 1234 -> "1.2K", 2500000 -> "2.5M".
pub fn format_tokens(tokens: f64) -> String {
    let abs = tokens.abs();
    if abs >= 1_000_000_000.0 {
        format!("{:.1}B", tokens / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("{:.1}M", tokens / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1}K", tokens / 1_000.0)
    } else {
        format!("{:.0}", tokens)
    }
}
