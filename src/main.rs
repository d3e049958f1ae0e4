use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ptu_planner::analyzer::{BatchOptions, PtuAnalyzer, SweepOptions};
use ptu_planner::batch::DEFAULT_MIN_REQUESTS;
use ptu_planner::config::Config;
use ptu_planner::logging::init_logging;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

#[derive(Parser)]
#[command(name = "ptu-planner")]
#[command(about = "Compare reserved throughput units with pay-per-token billing for LLM traffic")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./ptu-planner.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a range of reserved capacity levels and recommend one
    Sweep(SweepArgs),
    /// Sweep each model in the logs separately and total the recommendations
    Batch(BatchArgs),
    /// Show per-minute throughput of the request logs
    Minutes {
        /// Request log files or glob patterns (JSONL)
        #[arg(long = "input", short = 'i', required = true, num_args = 1..)]
        inputs: Vec<String>,
        /// Show the N busiest minutes
        #[arg(long)]
        limit: Option<usize>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// List overflow prices per 1k tokens
    Pricing {
        /// Refresh prices from the LiteLLM price list
        #[arg(long)]
        fetch: bool,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Write the effective configuration to a TOML file
    InitConfig {
        #[arg(default_value = "ptu-planner.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct SweepArgs {
    /// Request log files or glob patterns (JSONL)
    #[arg(long = "input", short = 'i', required = true, num_args = 1..)]
    inputs: Vec<String>,
    /// Model used to look up overflow prices
    #[arg(long)]
    model: Option<String>,
    /// Overflow price per 1k input tokens (overrides the lookup)
    #[arg(long)]
    input_price: Option<f64>,
    /// Overflow price per 1k output tokens (overrides the lookup)
    #[arg(long)]
    output_price: Option<f64>,
    /// Smallest non-zero unit count to simulate
    #[arg(long)]
    min_units: Option<u64>,
    /// Largest unit count to simulate
    #[arg(long)]
    max_units: Option<u64>,
    /// Unit count increment
    #[arg(long)]
    step: Option<u64>,
    /// Tokens per minute provided by one unit
    #[arg(long)]
    capacity_per_unit: Option<u64>,
    /// Price of one unit per month
    #[arg(long)]
    unit_price: Option<f64>,
    /// Percentage discount applied to the unit price
    #[arg(long)]
    discount_pct: Option<f64>,
    /// Override the sample duration in days used for monthly scaling
    #[arg(long)]
    sample_days: Option<f64>,
    /// Refresh prices from the LiteLLM price list
    #[arg(long)]
    fetch_pricing: bool,
    /// Evaluate candidates one at a time
    #[arg(long)]
    sequential: bool,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct BatchArgs {
    #[command(flatten)]
    sweep: SweepArgs,
    /// Skip models with fewer requests than this
    #[arg(long, default_value_t = DEFAULT_MIN_REQUESTS)]
    min_requests: usize,
    /// Analyze each model version separately
    #[arg(long)]
    by_version: bool,
    /// Only analyze the N models with the most requests
    #[arg(long)]
    top_n: Option<usize>,
    /// Write per-model JSON results and summary.json to this directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl From<BatchArgs> for BatchOptions {
    fn from(args: BatchArgs) -> Self {
        Self {
            sweep: args.sweep.into(),
            min_requests: args.min_requests,
            by_version: args.by_version,
            top_n: args.top_n,
            output_dir: args.output_dir,
        }
    }
}

impl From<SweepArgs> for SweepOptions {
    fn from(args: SweepArgs) -> Self {
        Self {
            inputs: args.inputs,
            model: args.model,
            input_price: args.input_price,
            output_price: args.output_price,
            min_units: args.min_units,
            max_units: args.max_units,
            step: args.step,
            capacity_per_unit: args.capacity_per_unit,
            unit_monthly_price: args.unit_price,
            discount_pct: args.discount_pct,
            sample_days: args.sample_days,
            fetch_pricing: args.fetch_pricing,
            sequential: args.sequential,
            json_output: args.json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let json = match &cli.command {
        Commands::Sweep(args) => args.json,
        Commands::Batch(args) => args.sweep.json,
        Commands::Minutes { json, .. } | Commands::Pricing { json, .. } => *json,
        Commands::InitConfig { .. } => false,
    };

    let config = match &cli.config {
        Some(path) => Config::load_with_file(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => return handle_error(e, json),
    };

    let _log_guard = init_logging(&config);

    let result = match cli.command {
        Commands::Sweep(args) => {
            let analyzer = PtuAnalyzer::new(config);
            let cancel = Arc::new(AtomicBool::new(false));
            spawn_cancel_on_ctrl_c(cancel.clone());
            analyzer.run_sweep(args.into(), cancel).await.map(|_| ())
        }
        Commands::Batch(args) => {
            let analyzer = PtuAnalyzer::new(config);
            let cancel = Arc::new(AtomicBool::new(false));
            spawn_cancel_on_ctrl_c(cancel.clone());
            analyzer.run_batch(args.into(), cancel).await.map(|_| ())
        }
        Commands::Minutes {
            inputs,
            limit,
            json,
        } => PtuAnalyzer::new(config).run_minutes(&inputs, limit, json),
        Commands::Pricing { fetch, json } => PtuAnalyzer::new(config).run_pricing(fetch, json).await,
        Commands::InitConfig { path, force } => {
            if path.exists() && !force {
                Err(anyhow::anyhow!(
                    "{} already exists, use --force to overwrite",
                    path.display()
                ))
            } else {
                config.save_to_file(&path).map(|_| {
                    println!("Wrote configuration to {}", path.display());
                })
            }
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => handle_error(e, json),
    }
}

fn spawn_cancel_on_ctrl_c(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing candidates already in progress");
            flag.store(true, Ordering::Relaxed);
        }
    });
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
    } else {
        eprintln!("Error: {:#}", e);
    }
    process::exit(1);
}
