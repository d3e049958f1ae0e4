//! PTU Planner Library
//!
//! Capacity planning for LLM inference traffic. Given historical request logs, the library
//! estimates the monthly cost of serving that traffic with pre-purchased reserved throughput
//! ("PTU", a flat monthly price per unit of tokens-per-minute) versus pay-per-token overflow
//! billing ("PAYGO"), and recommends a reserved capacity level.
//!
//! ## Core Features
//!
//! - **Per-minute replay**: A greedy, first-come-first-served simulation splits every request
//!   between reserved capacity and overflow, with capacity resetting each minute
//! - **Weighted capacity**: Output tokens consume reserved capacity at the output/input price
//!   ratio
//! - **Capacity sweep**: Candidate unit counts are simulated independently, in parallel with
//!   the `parallel` feature, and ranked by monthly cost
//! - **Explicit reliability metadata**: Sample duration, extrapolation and estimated token
//!   counts travel with every result
//!
//! ## Architecture Overview
//!
//! - [`models`] - Requests, minute buckets, allocation and cost results, sweep tables
//! - [`aggregator`] - Gap-free per-minute aggregation and utilization statistics
//! - [`allocator`] - The capacity allocation simulator
//! - [`cost`] - Monthly cost evaluation
//! - [`sweep`] - Candidate generation, evaluation and the recommendation policy
//! - [`dataset`] - The validated, time-sorted request stream
//! - [`parser`] - JSONL request log loading
//! - [`pricing`] - Overflow price lookup
//! - [`batch`] - Per-model grouping and combined totals
//! - [`analyzer`] - End-to-end pipeline used by the CLI
//! - [`reports`] - Terminal and JSON output
//! - [`config`] - Configuration management with environment variable support
//! - [`logging`] - Structured logging with JSON and pretty-print formats
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use ptu_planner::{Dataset, Request, SweepOrchestrator, SweepParameters};
//!
//! let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
//! let dataset = Dataset::new(vec![Request::new(t0, 800, 200)]).unwrap();
//!
//! let params = SweepParameters {
//!     min_units: 1,
//!     max_units: 3,
//!     step: 1,
//!     capacity_per_unit: 500,
//!     unit_monthly_price: 0.01,
//!     input_price: 0.0025,
//!     output_price: 0.01,
//!     sample_duration_days: dataset.sample_duration_days(),
//! };
//!
//! let report = SweepOrchestrator::new().run(&dataset, &params).unwrap();
//! assert_eq!(report.rows.len(), 4);
//! ```

pub mod aggregator;
pub mod allocator;
pub mod analyzer;
pub mod batch;
pub mod config;
pub mod cost;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod models;
pub mod parser;
pub mod pricing;
pub mod reports;
pub mod sweep;
pub mod timestamp_parser;

pub use allocator::CapacityAllocator;
pub use analyzer::PtuAnalyzer;
pub use batch::BatchReport;
pub use cost::{output_weight, CostEvaluator};
pub use dataset::Dataset;
pub use error::PlannerError;
pub use models::*;
pub use sweep::SweepOrchestrator;
